use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// True once the engine's baseline tables exist.
pub async fn schema_ready(pool: &DbPool) -> Result<bool, sqlx::Error> {
    use sqlx::Row;

    let count = sqlx::query(
        "SELECT COUNT(*) AS count FROM sqlite_master \
         WHERE type = 'table' AND name IN ('quotation', 'access_code', 'coupon')",
    )
    .fetch_one(pool)
    .await?
    .get::<i64, _>("count");
    Ok(count == 3)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use crate::connect_with_settings;

    const MANAGED_TABLES: &[&str] = &[
        "client",
        "access_code",
        "coupon",
        "coupon_usage",
        "project_setup",
        "setup_add_on",
        "setup_coupon",
        "quotation",
        "quotation_add_on",
        "running_project",
        "project_milestone",
        "payment_stage",
        "workflow_step_state",
    ];

    async fn table_count(pool: &sqlx::SqlitePool, name: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_every_managed_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 1, "table `{table}` should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 0, "table `{table}` should be gone");
        }
    }

    #[tokio::test]
    async fn migrations_reapply_cleanly_after_undo() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first apply");
        MIGRATOR.undo(&pool, 0).await.expect("undo");
        run_pending(&pool).await.expect("second apply");

        assert_eq!(table_count(&pool, "quotation").await, 1);
    }
}
