use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use offerdesk_core::domain::client::ClientId;
use offerdesk_core::domain::workflow::{StepRecord, WorkflowStatus, WorkflowStep};
use offerdesk_core::store::{StoreError, WorkflowStatusStore};

use super::{backend, decode};
use crate::DbPool;

/// One row per `(client, step)`. The fixed step enum keeps unknown step
/// names out of the table by construction; an unknown name on read is a
/// decode failure, not a silent extra entry.
pub struct SqlWorkflowStatusStore {
    pool: DbPool,
}

impl SqlWorkflowStatusStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStatusStore for SqlWorkflowStatusStore {
    async fn find(&self, client_id: &ClientId) -> Result<Option<WorkflowStatus>, StoreError> {
        let rows = sqlx::query("SELECT * FROM workflow_step_state WHERE client_id = ?1")
            .bind(&client_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut records = Vec::with_capacity(rows.len());
        let mut updated_at: Option<DateTime<Utc>> = None;
        for row in &rows {
            let step_raw: String = row.try_get("step").map_err(backend)?;
            let step = WorkflowStep::parse(&step_raw)
                .ok_or_else(|| decode(format!("unknown workflow step `{step_raw}`")))?;
            let record = StepRecord {
                completed: row.try_get("completed").map_err(backend)?,
                completed_at: row.try_get("completed_at").map_err(backend)?,
            };
            let row_updated: DateTime<Utc> = row.try_get("updated_at").map_err(backend)?;
            updated_at = Some(updated_at.map_or(row_updated, |prev| prev.max(row_updated)));
            records.push((step, record));
        }

        Ok(Some(WorkflowStatus::from_records(
            client_id.clone(),
            records,
            updated_at.unwrap_or_else(Utc::now),
        )))
    }

    async fn save(&self, status: WorkflowStatus) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        for (step, record) in status.records() {
            sqlx::query(
                "INSERT INTO workflow_step_state \
                 (client_id, step, completed, completed_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(client_id, step) DO UPDATE SET \
                   completed = excluded.completed, \
                   completed_at = excluded.completed_at, \
                   updated_at = excluded.updated_at",
            )
            .bind(&status.client_id.0)
            .bind(step.as_str())
            .bind(record.completed)
            .bind(record.completed_at)
            .bind(status.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}
