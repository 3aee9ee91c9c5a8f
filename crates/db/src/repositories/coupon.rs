use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use offerdesk_core::domain::coupon::{Coupon, CouponId};
use offerdesk_core::domain::quotation::QuotationId;
use offerdesk_core::store::{CouponStore, StoreError, UsageOutcome};

use super::{backend, discount_kind_columns, discount_kind_from_columns, get_decimal, get_u32};
use crate::DbPool;

pub struct SqlCouponStore {
    pool: DbPool,
}

impl SqlCouponStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<Coupon, StoreError> {
        let discount_type: String = row.try_get("discount_type").map_err(backend)?;
        let discount_value: String = row.try_get("discount_value").map_err(backend)?;

        Ok(Coupon {
            id: CouponId(row.try_get("id").map_err(backend)?),
            code: row.try_get("code").map_err(backend)?,
            kind: discount_kind_from_columns(&discount_type, &discount_value)?,
            description: row.try_get("description").map_err(backend)?,
            min_order_amount: get_decimal(row, "min_order_amount")?,
            valid_until: row.try_get("valid_until").map_err(backend)?,
            usage_limit: get_u32(row, "usage_limit")?,
            used_count: get_u32(row, "used_count")?,
            active: row.try_get("active").map_err(backend)?,
        })
    }
}

#[async_trait]
impl CouponStore for SqlCouponStore {
    async fn insert(&self, coupon: Coupon) -> Result<(), StoreError> {
        let (discount_type, discount_value) = discount_kind_columns(&coupon.kind);
        sqlx::query(
            "INSERT INTO coupon \
             (id, code, discount_type, discount_value, description, min_order_amount, \
              valid_until, usage_limit, used_count, active) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&coupon.id.0)
        .bind(&coupon.code)
        .bind(discount_type)
        .bind(discount_value)
        .bind(&coupon.description)
        .bind(coupon.min_order_amount.to_string())
        .bind(coupon.valid_until)
        .bind(i64::from(coupon.usage_limit))
        .bind(i64::from(coupon.used_count))
        .bind(coupon.active)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query("SELECT * FROM coupon WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query("SELECT * FROM coupon WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn record_usage(
        &self,
        id: &CouponId,
        quotation_id: &QuotationId,
    ) -> Result<UsageOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // The ledger row is the idempotency guard: a retried confirmation
        // inserts nothing and the counter stays put.
        let ledger = sqlx::query(
            "INSERT INTO coupon_usage (coupon_id, quotation_id, recorded_at) \
             VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
        )
        .bind(&id.0)
        .bind(&quotation_id.0)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if ledger.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Ok(UsageOutcome::AlreadyRecorded);
        }

        let counter = sqlx::query(
            "UPDATE coupon SET used_count = used_count + 1 \
             WHERE id = ?1 AND used_count < usage_limit",
        )
        .bind(&id.0)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if counter.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM coupon WHERE id = ?1")
                .bind(&id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            tx.rollback().await.map_err(backend)?;
            return Ok(if exists.is_some() {
                UsageOutcome::LimitReached
            } else {
                UsageOutcome::Missing
            });
        }

        tx.commit().await.map_err(backend)?;
        Ok(UsageOutcome::Recorded)
    }

    async fn release_usage(
        &self,
        id: &CouponId,
        quotation_id: &QuotationId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let removed = sqlx::query(
            "DELETE FROM coupon_usage WHERE coupon_id = ?1 AND quotation_id = ?2",
        )
        .bind(&id.0)
        .bind(&quotation_id.0)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if removed.rows_affected() == 1 {
            sqlx::query(
                "UPDATE coupon SET used_count = max(used_count - 1, 0) WHERE id = ?1",
            )
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}
