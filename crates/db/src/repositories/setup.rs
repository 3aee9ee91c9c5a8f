use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use offerdesk_core::domain::client::ClientId;
use offerdesk_core::domain::coupon::CouponId;
use offerdesk_core::domain::setup::{AddOn, ProjectSetup, ProjectSetupId};
use offerdesk_core::store::{ProjectSetupStore, StoreError};

use super::{add_on_from_row, backend, decode, get_decimal, get_u32};
use crate::DbPool;

pub struct SqlProjectSetupStore {
    pool: DbPool,
}

impl SqlProjectSetupStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn assemble(&self, row: &SqliteRow) -> Result<ProjectSetup, StoreError> {
        let id: String = row.try_get("id").map_err(backend)?;
        let features_raw: String = row.try_get("features").map_err(backend)?;
        let features: Vec<String> = serde_json::from_str(&features_raw)
            .map_err(|error| decode(format!("setup `{id}` features: {error}")))?;

        let add_on_rows =
            sqlx::query("SELECT * FROM setup_add_on WHERE setup_id = ?1 ORDER BY position")
                .bind(&id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        let add_ons =
            add_on_rows.iter().map(add_on_from_row).collect::<Result<Vec<AddOn>, _>>()?;

        let coupon_rows = sqlx::query("SELECT coupon_id FROM setup_coupon WHERE setup_id = ?1")
            .bind(&id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let coupon_ids = coupon_rows
            .iter()
            .map(|row| row.try_get::<String, _>("coupon_id").map(CouponId).map_err(backend))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProjectSetup {
            id: ProjectSetupId(id),
            client_id: ClientId(row.try_get("client_id").map_err(backend)?),
            client_code: row.try_get("client_code").map_err(backend)?,
            project_name: row.try_get("project_name").map_err(backend)?,
            description: row.try_get("description").map_err(backend)?,
            features,
            base_price: get_decimal(row, "base_price")?,
            base_delivery_days: get_u32(row, "base_delivery_days")?,
            add_ons,
            coupon_ids,
            created_at: row.try_get("created_at").map_err(backend)?,
            updated_at: row.try_get("updated_at").map_err(backend)?,
        })
    }
}

#[async_trait]
impl ProjectSetupStore for SqlProjectSetupStore {
    async fn insert(&self, setup: ProjectSetup) -> Result<(), StoreError> {
        let features = serde_json::to_string(&setup.features)
            .map_err(|error| decode(format!("setup features: {error}")))?;

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO project_setup \
             (id, client_id, client_code, project_name, description, features, \
              base_price, base_delivery_days, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&setup.id.0)
        .bind(&setup.client_id.0)
        .bind(&setup.client_code)
        .bind(&setup.project_name)
        .bind(&setup.description)
        .bind(features)
        .bind(setup.base_price.to_string())
        .bind(i64::from(setup.base_delivery_days))
        .bind(setup.created_at)
        .bind(setup.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for (position, add_on) in setup.add_ons.iter().enumerate() {
            sqlx::query(
                "INSERT INTO setup_add_on \
                 (setup_id, add_on_id, name, description, price, extra_delivery_days, \
                  category, required, position) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(&setup.id.0)
            .bind(&add_on.id.0)
            .bind(&add_on.name)
            .bind(&add_on.description)
            .bind(add_on.price.to_string())
            .bind(i64::from(add_on.extra_delivery_days))
            .bind(&add_on.category)
            .bind(add_on.required)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        for coupon_id in &setup.coupon_ids {
            sqlx::query("INSERT INTO setup_coupon (setup_id, coupon_id) VALUES (?1, ?2)")
                .bind(&setup.id.0)
                .bind(&coupon_id.0)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &ProjectSetupId) -> Result<Option<ProjectSetup>, StoreError> {
        let row = sqlx::query("SELECT * FROM project_setup WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => Ok(Some(self.assemble(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_client(
        &self,
        client_id: &ClientId,
    ) -> Result<Option<ProjectSetup>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM project_setup WHERE client_id = ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&client_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        match row {
            Some(row) => Ok(Some(self.assemble(&row).await?)),
            None => Ok(None),
        }
    }
}
