use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use offerdesk_core::domain::client::ClientId;
use offerdesk_core::domain::coupon::CouponId;
use offerdesk_core::domain::quotation::{
    AppliedCoupon, Quotation, QuotationId, QuotationStatus,
};
use offerdesk_core::domain::setup::{AddOn, ProjectSetupId};
use offerdesk_core::store::{CasOutcome, QuotationDecision, QuotationStore, StoreError};

use super::{
    add_on_from_row, backend, decode, discount_kind_columns, discount_kind_from_columns,
    get_decimal, get_u32,
};
use crate::DbPool;

pub struct SqlQuotationStore {
    pool: DbPool,
}

impl SqlQuotationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn applied_coupon_from_row(row: &SqliteRow) -> Result<Option<AppliedCoupon>, StoreError> {
        let coupon_id: Option<String> = row.try_get("coupon_id").map_err(backend)?;
        let Some(coupon_id) = coupon_id else {
            return Ok(None);
        };

        let discount_type: Option<String> =
            row.try_get("coupon_discount_type").map_err(backend)?;
        let discount_value: Option<String> =
            row.try_get("coupon_discount_value").map_err(backend)?;
        let (Some(discount_type), Some(discount_value)) = (discount_type, discount_value) else {
            return Err(decode(format!("coupon `{coupon_id}` snapshot is incomplete")));
        };

        Ok(Some(AppliedCoupon {
            coupon_id: CouponId(coupon_id),
            code: row.try_get("coupon_code").map_err(backend)?,
            kind: discount_kind_from_columns(&discount_type, &discount_value)?,
            discount_amount: get_decimal(row, "coupon_discount_amount")?,
        }))
    }

    async fn assemble(&self, row: &SqliteRow) -> Result<Quotation, StoreError> {
        let id: String = row.try_get("id").map_err(backend)?;
        let status_raw: String = row.try_get("status").map_err(backend)?;
        let status = QuotationStatus::parse(&status_raw)
            .ok_or_else(|| decode(format!("unknown quotation status `{status_raw}`")))?;

        let add_on_rows =
            sqlx::query("SELECT * FROM quotation_add_on WHERE quotation_id = ?1 ORDER BY position")
                .bind(&id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        let selected_add_ons =
            add_on_rows.iter().map(add_on_from_row).collect::<Result<Vec<AddOn>, _>>()?;

        Ok(Quotation {
            id: QuotationId(id),
            client_id: ClientId(row.try_get("client_id").map_err(backend)?),
            client_code: row.try_get("client_code").map_err(backend)?,
            setup_id: ProjectSetupId(row.try_get("setup_id").map_err(backend)?),
            selected_add_ons,
            applied_coupon: Self::applied_coupon_from_row(row)?,
            base_price: get_decimal(row, "base_price")?,
            add_ons_total: get_decimal(row, "add_ons_total")?,
            subtotal: get_decimal(row, "subtotal")?,
            discount_amount: get_decimal(row, "discount_amount")?,
            final_price: get_decimal(row, "final_price")?,
            base_delivery_days: get_u32(row, "base_delivery_days")?,
            add_ons_delivery_days: get_u32(row, "add_ons_delivery_days")?,
            final_delivery_days: get_u32(row, "final_delivery_days")?,
            client_confirmed: row.try_get("client_confirmed").map_err(backend)?,
            confirmed_at: row.try_get("confirmed_at").map_err(backend)?,
            rejection_reason: row.try_get("rejection_reason").map_err(backend)?,
            status,
            created_at: row.try_get("created_at").map_err(backend)?,
            updated_at: row.try_get("updated_at").map_err(backend)?,
        })
    }
}

#[async_trait]
impl QuotationStore for SqlQuotationStore {
    async fn insert(&self, quotation: Quotation) -> Result<(), StoreError> {
        let (coupon_id, coupon_code, coupon_type, coupon_value, coupon_amount) =
            match &quotation.applied_coupon {
                Some(applied) => {
                    let (discount_type, discount_value) = discount_kind_columns(&applied.kind);
                    (
                        Some(applied.coupon_id.0.clone()),
                        Some(applied.code.clone()),
                        Some(discount_type.to_string()),
                        Some(discount_value),
                        Some(applied.discount_amount.to_string()),
                    )
                }
                None => (None, None, None, None, None),
            };

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO quotation \
             (id, client_id, client_code, setup_id, coupon_id, coupon_code, \
              coupon_discount_type, coupon_discount_value, coupon_discount_amount, \
              base_price, add_ons_total, subtotal, discount_amount, final_price, \
              base_delivery_days, add_ons_delivery_days, final_delivery_days, \
              client_confirmed, confirmed_at, rejection_reason, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
              ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        )
        .bind(&quotation.id.0)
        .bind(&quotation.client_id.0)
        .bind(&quotation.client_code)
        .bind(&quotation.setup_id.0)
        .bind(coupon_id)
        .bind(coupon_code)
        .bind(coupon_type)
        .bind(coupon_value)
        .bind(coupon_amount)
        .bind(quotation.base_price.to_string())
        .bind(quotation.add_ons_total.to_string())
        .bind(quotation.subtotal.to_string())
        .bind(quotation.discount_amount.to_string())
        .bind(quotation.final_price.to_string())
        .bind(i64::from(quotation.base_delivery_days))
        .bind(i64::from(quotation.add_ons_delivery_days))
        .bind(i64::from(quotation.final_delivery_days))
        .bind(quotation.client_confirmed)
        .bind(quotation.confirmed_at)
        .bind(&quotation.rejection_reason)
        .bind(quotation.status.as_str())
        .bind(quotation.created_at)
        .bind(quotation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for (position, add_on) in quotation.selected_add_ons.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quotation_add_on \
                 (quotation_id, add_on_id, name, description, price, extra_delivery_days, \
                  category, required, position) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(&quotation.id.0)
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

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError> {
        let row = sqlx::query("SELECT * FROM quotation WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => Ok(Some(self.assemble(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_for_client(&self, client_id: &ClientId) -> Result<Vec<Quotation>, StoreError> {
        let rows = sqlx::query("SELECT * FROM quotation WHERE client_id = ?1 ORDER BY created_at")
            .bind(&client_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut quotations = Vec::with_capacity(rows.len());
        for row in &rows {
            quotations.push(self.assemble(row).await?);
        }
        Ok(quotations)
    }

    async fn decide(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        decision: &QuotationDecision,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        // Status check and status write in one statement; rows_affected
        // tells the loser it lost.
        let result = match decision {
            QuotationDecision::Confirm => {
                sqlx::query(
                    "UPDATE quotation \
                     SET status = 'confirmed', client_confirmed = 1, confirmed_at = ?2, \
                         updated_at = ?2 \
                     WHERE id = ?1 AND status = ?3",
                )
                .bind(&id.0)
                .bind(at)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await
                .map_err(backend)?
            }
            QuotationDecision::Reject { reason } => {
                sqlx::query(
                    "UPDATE quotation \
                     SET status = 'rejected', rejection_reason = ?2, updated_at = ?3 \
                     WHERE id = ?1 AND status = ?4",
                )
                .bind(&id.0)
                .bind(reason)
                .bind(at)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await
                .map_err(backend)?
            }
        };

        if result.rows_affected() == 1 {
            return Ok(CasOutcome::Applied);
        }

        let exists = sqlx::query("SELECT 1 FROM quotation WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(if exists.is_some() { CasOutcome::Lost } else { CasOutcome::Missing })
    }
}
