use sqlx::{Executor, Row};

use crate::connection::DbPool;

const SEED_CLIENT_ID: &str = "cl-demo-001";
const SEED_SETUP_ID: &str = "setup-demo-001";
const SEED_ACCESS_CODE_ID: &str = "ac-demo-001";
const SEED_COUPON_CODES: &[&str] = &["WELCOME10", "SUMMER20", "SAVE50"];

/// Deterministic demo dataset: a client with an open invitation, a
/// priced setup with two add-ons, and three coupons covering both
/// discount kinds.
pub struct DemoSeedDataset;

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub client_id: &'static str,
    pub setup_id: &'static str,
    pub coupon_codes: &'static [&'static str],
}

#[derive(Clone, Debug)]
pub struct SeedVerification {
    pub checks: Vec<(&'static str, bool)>,
    pub all_present: bool,
}

impl DemoSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            client_id: SEED_CLIENT_ID,
            setup_id: SEED_SETUP_ID,
            coupon_codes: SEED_COUPON_CODES,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<SeedVerification, sqlx::Error> {
        let mut checks = Vec::new();

        checks.push((
            "client",
            count(pool, "SELECT COUNT(*) AS count FROM client WHERE id = ?1", SEED_CLIENT_ID)
                .await?
                == 1,
        ));
        checks.push((
            "access_code",
            count(
                pool,
                "SELECT COUNT(*) AS count FROM access_code WHERE id = ?1",
                SEED_ACCESS_CODE_ID,
            )
            .await?
                == 1,
        ));
        checks.push((
            "project_setup",
            count(pool, "SELECT COUNT(*) AS count FROM project_setup WHERE id = ?1", SEED_SETUP_ID)
                .await?
                == 1,
        ));
        checks.push((
            "setup_add_ons",
            count(
                pool,
                "SELECT COUNT(*) AS count FROM setup_add_on WHERE setup_id = ?1",
                SEED_SETUP_ID,
            )
            .await?
                == 2,
        ));

        let coupon_count = sqlx::query("SELECT COUNT(*) AS count FROM coupon")
            .fetch_one(pool)
            .await?
            .get::<i64, _>("count");
        checks.push(("coupons", coupon_count == SEED_COUPON_CODES.len() as i64));

        let step_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM workflow_step_state WHERE client_id = ?1",
        )
        .bind(SEED_CLIENT_ID)
        .fetch_one(pool)
        .await?
        .get::<i64, _>("count");
        checks.push(("workflow_steps", step_count == 6));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(SeedVerification { checks, all_present })
    }
}

async fn count(pool: &DbPool, sql: &str, id: &str) -> Result<i64, sqlx::Error> {
    Ok(sqlx::query(sql).bind(id).fetch_one(pool).await?.get::<i64, _>("count"))
}
