use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use offerdesk_core::domain::access_code::{AccessCode, AccessCodeId, AccessRole};
use offerdesk_core::store::{AccessCodeStore, CasOutcome, StoreError};

use super::{backend, decode};
use crate::DbPool;

pub struct SqlAccessCodeStore {
    pool: DbPool,
}

impl SqlAccessCodeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<AccessCode, StoreError> {
        let role_raw: String = row.try_get("role").map_err(backend)?;
        let role = AccessRole::parse(&role_raw)
            .ok_or_else(|| decode(format!("unknown access role `{role_raw}`")))?;

        Ok(AccessCode {
            id: AccessCodeId(row.try_get("id").map_err(backend)?),
            code: row.try_get("code").map_err(backend)?,
            email: row.try_get("email").map_err(backend)?,
            holder_name: row.try_get("holder_name").map_err(backend)?,
            role,
            used: row.try_get("used").map_err(backend)?,
            used_at: row.try_get("used_at").map_err(backend)?,
            created_at: row.try_get("created_at").map_err(backend)?,
            expires_at: row.try_get("expires_at").map_err(backend)?,
        })
    }
}

#[async_trait]
impl AccessCodeStore for SqlAccessCodeStore {
    async fn insert(&self, code: AccessCode) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO access_code \
             (id, code, email, holder_name, role, used, used_at, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&code.id.0)
        .bind(&code.code)
        .bind(&code.email)
        .bind(&code.holder_name)
        .bind(code.role.as_str())
        .bind(code.used)
        .bind(code.used_at)
        .bind(code.created_at)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &AccessCodeId) -> Result<Option<AccessCode>, StoreError> {
        let row = sqlx::query("SELECT * FROM access_code WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<AccessCode>, StoreError> {
        let row = sqlx::query("SELECT * FROM access_code WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn mark_used(
        &self,
        id: &AccessCodeId,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        let result = sqlx::query(
            "UPDATE access_code SET used = 1, used_at = ?2 WHERE id = ?1 AND used = 0",
        )
        .bind(&id.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(CasOutcome::Applied);
        }

        let exists = sqlx::query("SELECT 1 FROM access_code WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(if exists.is_some() { CasOutcome::Lost } else { CasOutcome::Missing })
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM access_code WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }
}
