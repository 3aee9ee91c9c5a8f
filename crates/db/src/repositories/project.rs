use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use offerdesk_core::domain::client::ClientId;
use offerdesk_core::domain::project::{
    Milestone, MilestoneStatus, PaymentStage, PaymentStageStatus, PaymentStatus, ProjectStatus,
    RunningProject, RunningProjectId,
};
use offerdesk_core::domain::quotation::QuotationId;
use offerdesk_core::domain::setup::AddOn;
use offerdesk_core::store::{RunningProjectStore, StoreError};

use super::{backend, decode, get_decimal, get_u32};
use crate::DbPool;

pub struct SqlRunningProjectStore {
    pool: DbPool,
}

impl SqlRunningProjectStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn assemble(&self, row: &SqliteRow) -> Result<RunningProject, StoreError> {
        let id: String = row.try_get("id").map_err(backend)?;

        let status_raw: String = row.try_get("status").map_err(backend)?;
        let status = ProjectStatus::parse(&status_raw)
            .ok_or_else(|| decode(format!("unknown project status `{status_raw}`")))?;
        let payment_raw: String = row.try_get("payment_status").map_err(backend)?;
        let payment_status = PaymentStatus::parse(&payment_raw)
            .ok_or_else(|| decode(format!("unknown payment status `{payment_raw}`")))?;

        let features_raw: String = row.try_get("features").map_err(backend)?;
        let features: Vec<String> = serde_json::from_str(&features_raw)
            .map_err(|error| decode(format!("project `{id}` features: {error}")))?;
        let add_ons_raw: String = row.try_get("add_ons").map_err(backend)?;
        let selected_add_ons: Vec<AddOn> = serde_json::from_str(&add_ons_raw)
            .map_err(|error| decode(format!("project `{id}` add-ons: {error}")))?;

        let progress = get_u32(row, "overall_progress")?;
        let overall_progress = u8::try_from(progress)
            .map_err(|_| decode(format!("project `{id}` progress `{progress}`")))?;

        let milestone_rows =
            sqlx::query("SELECT * FROM project_milestone WHERE project_id = ?1 ORDER BY sequence")
                .bind(&id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        let milestones = milestone_rows
            .iter()
            .map(Self::milestone_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let stage_rows =
            sqlx::query("SELECT * FROM payment_stage WHERE project_id = ?1 ORDER BY sequence")
                .bind(&id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        let payment_stages =
            stage_rows.iter().map(Self::stage_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(RunningProject {
            id: RunningProjectId(id),
            client_id: ClientId(row.try_get("client_id").map_err(backend)?),
            client_code: row.try_get("client_code").map_err(backend)?,
            quotation_id: QuotationId(row.try_get("quotation_id").map_err(backend)?),
            project_name: row.try_get("project_name").map_err(backend)?,
            description: row.try_get("description").map_err(backend)?,
            features,
            selected_add_ons,
            start_date: row.try_get("start_date").map_err(backend)?,
            estimated_end_date: row.try_get("estimated_end_date").map_err(backend)?,
            actual_end_date: row.try_get("actual_end_date").map_err(backend)?,
            overall_progress,
            milestones,
            payment_status,
            payment_stages,
            final_price: get_decimal(row, "final_price")?,
            final_delivery_days: get_u32(row, "final_delivery_days")?,
            status,
            created_at: row.try_get("created_at").map_err(backend)?,
            updated_at: row.try_get("updated_at").map_err(backend)?,
        })
    }

    fn milestone_from_row(row: &SqliteRow) -> Result<Milestone, StoreError> {
        let status_raw: String = row.try_get("status").map_err(backend)?;
        let status = MilestoneStatus::parse(&status_raw)
            .ok_or_else(|| decode(format!("unknown milestone status `{status_raw}`")))?;
        let progress = get_u32(row, "progress")?;

        Ok(Milestone {
            title: row.try_get("title").map_err(backend)?,
            description: row.try_get("description").map_err(backend)?,
            target_date: row.try_get("target_date").map_err(backend)?,
            completed_date: row.try_get("completed_date").map_err(backend)?,
            status,
            progress: u8::try_from(progress)
                .map_err(|_| decode(format!("milestone progress `{progress}`")))?,
            sequence: get_u32(row, "sequence")?,
        })
    }

    fn stage_from_row(row: &SqliteRow) -> Result<PaymentStage, StoreError> {
        let status_raw: String = row.try_get("status").map_err(backend)?;
        let status = PaymentStageStatus::parse(&status_raw)
            .ok_or_else(|| decode(format!("unknown payment stage status `{status_raw}`")))?;

        Ok(PaymentStage {
            title: row.try_get("title").map_err(backend)?,
            amount: get_decimal(row, "amount")?,
            percentage: get_u32(row, "percentage")?,
            due_date: row.try_get("due_date").map_err(backend)?,
            paid_date: row.try_get("paid_date").map_err(backend)?,
            status,
            sequence: get_u32(row, "sequence")?,
        })
    }

    async fn write(&self, project: &RunningProject, replace: bool) -> Result<(), StoreError> {
        let features = serde_json::to_string(&project.features)
            .map_err(|error| decode(format!("project features: {error}")))?;
        let add_ons = serde_json::to_string(&project.selected_add_ons)
            .map_err(|error| decode(format!("project add-ons: {error}")))?;

        let mut tx = self.pool.begin().await.map_err(backend)?;

        if replace {
            for table in ["project_milestone", "payment_stage"] {
                sqlx::query(&format!("DELETE FROM {table} WHERE project_id = ?1"))
                    .bind(&project.id.0)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
            }
        }

        sqlx::query(
            "INSERT INTO running_project \
             (id, client_id, client_code, quotation_id, project_name, description, features, \
              add_ons, start_date, estimated_end_date, actual_end_date, overall_progress, \
              payment_status, final_price, final_delivery_days, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
              ?17, ?18) \
             ON CONFLICT(id) DO UPDATE SET \
               actual_end_date = excluded.actual_end_date, \
               overall_progress = excluded.overall_progress, \
               payment_status = excluded.payment_status, \
               status = excluded.status, \
               updated_at = excluded.updated_at",
        )
        .bind(&project.id.0)
        .bind(&project.client_id.0)
        .bind(&project.client_code)
        .bind(&project.quotation_id.0)
        .bind(&project.project_name)
        .bind(&project.description)
        .bind(features)
        .bind(add_ons)
        .bind(project.start_date)
        .bind(project.estimated_end_date)
        .bind(project.actual_end_date)
        .bind(i64::from(project.overall_progress))
        .bind(project.payment_status.as_str())
        .bind(project.final_price.to_string())
        .bind(i64::from(project.final_delivery_days))
        .bind(project.status.as_str())
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for milestone in &project.milestones {
            sqlx::query(
                "INSERT INTO project_milestone \
                 (project_id, sequence, title, description, target_date, completed_date, \
                  status, progress) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&project.id.0)
            .bind(i64::from(milestone.sequence))
            .bind(&milestone.title)
            .bind(&milestone.description)
            .bind(milestone.target_date)
            .bind(milestone.completed_date)
            .bind(milestone.status.as_str())
            .bind(i64::from(milestone.progress))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        for stage in &project.payment_stages {
            sqlx::query(
                "INSERT INTO payment_stage \
                 (project_id, sequence, title, amount, percentage, due_date, paid_date, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&project.id.0)
            .bind(i64::from(stage.sequence))
            .bind(&stage.title)
            .bind(stage.amount.to_string())
            .bind(i64::from(stage.percentage))
            .bind(stage.due_date)
            .bind(stage.paid_date)
            .bind(stage.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl RunningProjectStore for SqlRunningProjectStore {
    async fn insert(&self, project: RunningProject) -> Result<(), StoreError> {
        self.write(&project, false).await
    }

    async fn find_by_id(
        &self,
        id: &RunningProjectId,
    ) -> Result<Option<RunningProject>, StoreError> {
        let row = sqlx::query("SELECT * FROM running_project WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => Ok(Some(self.assemble(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Option<RunningProject>, StoreError> {
        let row = sqlx::query("SELECT * FROM running_project WHERE quotation_id = ?1")
            .bind(&quotation_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => Ok(Some(self.assemble(&row).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, project: RunningProject) -> Result<(), StoreError> {
        self.write(&project, true).await
    }
}
