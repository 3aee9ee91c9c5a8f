use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use offerdesk_core::domain::access_code::AccessCodeId;
use offerdesk_core::domain::client::{Client, ClientId, ClientStatus};
use offerdesk_core::store::{ClientStore, StoreError};

use super::{backend, decode};
use crate::DbPool;

pub struct SqlClientStore {
    pool: DbPool,
}

impl SqlClientStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<Client, StoreError> {
        let status_raw: String = row.try_get("status").map_err(backend)?;
        let status = ClientStatus::parse(&status_raw)
            .ok_or_else(|| decode(format!("unknown client status `{status_raw}`")))?;

        Ok(Client {
            id: ClientId(row.try_get("id").map_err(backend)?),
            client_code: row.try_get("client_code").map_err(backend)?,
            name: row.try_get("name").map_err(backend)?,
            email: row.try_get("email").map_err(backend)?,
            phone: row.try_get("phone").map_err(backend)?,
            access_code_id: row
                .try_get::<Option<String>, _>("access_code_id")
                .map_err(backend)?
                .map(AccessCodeId),
            status,
            created_at: row.try_get("created_at").map_err(backend)?,
        })
    }

    async fn upsert(&self, client: &Client) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO client \
             (id, client_code, name, email, phone, access_code_id, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(id) DO UPDATE SET \
               client_code = excluded.client_code, \
               name = excluded.name, \
               email = excluded.email, \
               phone = excluded.phone, \
               access_code_id = excluded.access_code_id, \
               status = excluded.status",
        )
        .bind(&client.id.0)
        .bind(&client.client_code)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(client.access_code_id.as_ref().map(|id| id.0.clone()))
        .bind(client.status.as_str())
        .bind(client.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl ClientStore for SqlClientStore {
    async fn insert(&self, client: Client) -> Result<(), StoreError> {
        self.upsert(&client).await
    }

    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
        let row = sqlx::query("SELECT * FROM client WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_by_code(&self, client_code: &str) -> Result<Option<Client>, StoreError> {
        let row = sqlx::query("SELECT * FROM client WHERE client_code = ?1")
            .bind(client_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn save(&self, client: Client) -> Result<(), StoreError> {
        self.upsert(&client).await
    }
}
