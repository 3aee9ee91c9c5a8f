//! Round-trip and conditional-update coverage for the SQLite stores.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use offerdesk_core::domain::access_code::{AccessCode, AccessCodeId, AccessRole};
use offerdesk_core::domain::client::{Client, ClientId, ClientStatus};
use offerdesk_core::domain::coupon::{Coupon, CouponId, DiscountKind};
use offerdesk_core::domain::project::{
    default_milestones, default_payment_stages, PaymentStatus, ProjectStatus, RunningProject,
    RunningProjectId,
};
use offerdesk_core::domain::quotation::{
    AppliedCoupon, Quotation, QuotationId, QuotationStatus,
};
use offerdesk_core::domain::setup::{AddOn, AddOnId, ProjectSetup, ProjectSetupId};
use offerdesk_core::domain::workflow::{WorkflowStatus, WorkflowStep};
use offerdesk_core::store::{
    AccessCodeStore, CasOutcome, ClientStore, CouponStore, ProjectSetupStore, QuotationDecision,
    QuotationStore, RunningProjectStore, StoreError, UsageOutcome, WorkflowStatusStore,
};

use offerdesk_db::repositories::{
    SqlAccessCodeStore, SqlClientStore, SqlCouponStore, SqlProjectSetupStore, SqlQuotationStore,
    SqlRunningProjectStore, SqlWorkflowStatusStore,
};
use offerdesk_db::{connect_with_settings, migrations, DbPool};

async fn pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    pool
}

fn client(id: &str, code: &str) -> Client {
    Client {
        id: ClientId(id.to_string()),
        client_code: code.to_string(),
        name: "Acme Studios".to_string(),
        email: "dana@acme.test".to_string(),
        phone: "+1 555 0100".to_string(),
        access_code_id: None,
        status: ClientStatus::Active,
        created_at: Utc::now(),
    }
}

fn add_on(id: &str, price: i64, days: u32) -> AddOn {
    AddOn {
        id: AddOnId(id.to_string()),
        name: format!("{id} add-on"),
        description: String::new(),
        price: Decimal::new(price, 0),
        extra_delivery_days: days,
        category: None,
        required: false,
    }
}

fn setup(id: &str, client_id: &str, coupon_ids: Vec<CouponId>) -> ProjectSetup {
    ProjectSetup {
        id: ProjectSetupId(id.to_string()),
        client_id: ClientId(client_id.to_string()),
        client_code: "CLI001AB".to_string(),
        project_name: "Marketing site".to_string(),
        description: "Corporate site relaunch".to_string(),
        features: vec!["responsive layout".to_string()],
        base_price: Decimal::new(1200, 0),
        base_delivery_days: 21,
        add_ons: vec![add_on("seo", 99, 0), add_on("cms", 149, 3)],
        coupon_ids,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn coupon(id: &str, code: &str, limit: u32) -> Coupon {
    Coupon {
        id: CouponId(id.to_string()),
        code: code.to_string(),
        kind: DiscountKind::Fixed(Decimal::new(50, 0)),
        description: "Fixed 50 off".to_string(),
        min_order_amount: Decimal::new(300, 0),
        valid_until: Utc::now() + Duration::days(30),
        usage_limit: limit,
        used_count: 0,
        active: true,
    }
}

fn quotation(id: &str, client_id: &str, setup_id: &str, applied: Option<AppliedCoupon>) -> Quotation {
    let discount = applied.as_ref().map(|a| a.discount_amount).unwrap_or_default();
    Quotation {
        id: QuotationId(id.to_string()),
        client_id: ClientId(client_id.to_string()),
        client_code: "CLI001AB".to_string(),
        setup_id: ProjectSetupId(setup_id.to_string()),
        selected_add_ons: vec![add_on("seo", 99, 0), add_on("cms", 149, 3)],
        applied_coupon: applied,
        base_price: Decimal::new(1200, 0),
        add_ons_total: Decimal::new(248, 0),
        subtotal: Decimal::new(1448, 0),
        discount_amount: discount,
        final_price: Decimal::new(1448, 0) - discount,
        base_delivery_days: 21,
        add_ons_delivery_days: 3,
        final_delivery_days: 24,
        client_confirmed: false,
        confirmed_at: None,
        rejection_reason: None,
        status: QuotationStatus::PendingApproval,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

async fn seed_client_and_setup(pool: &DbPool) {
    SqlClientStore::new(pool.clone()).insert(client("cl-1", "CLI001AB")).await.expect("client");
    SqlProjectSetupStore::new(pool.clone())
        .insert(setup("setup-1", "cl-1", Vec::new()))
        .await
        .expect("setup");
}

#[tokio::test]
async fn access_code_round_trip_and_single_use() {
    let pool = pool().await;
    let store = SqlAccessCodeStore::new(pool.clone());

    let now = Utc::now();
    let code = AccessCode {
        id: AccessCodeId("ac-1".to_string()),
        code: "K7Q2M9XT".to_string(),
        email: "dana@acme.test".to_string(),
        holder_name: "Dana Lee".to_string(),
        role: AccessRole::Client,
        used: false,
        used_at: None,
        created_at: now,
        expires_at: now + Duration::days(7),
    };
    store.insert(code.clone()).await.expect("insert");

    let found = store.find_by_code("K7Q2M9XT").await.expect("find").expect("present");
    assert_eq!(found.id, code.id);
    assert_eq!(found.role, AccessRole::Client);
    assert!(!found.used);

    assert_eq!(store.mark_used(&code.id, Utc::now()).await.expect("first"), CasOutcome::Applied);
    assert_eq!(store.mark_used(&code.id, Utc::now()).await.expect("second"), CasOutcome::Lost);
    assert_eq!(
        store
            .mark_used(&AccessCodeId("ghost".to_string()), Utc::now())
            .await
            .expect("missing id"),
        CasOutcome::Missing
    );

    let reloaded = store.find_by_id(&code.id).await.expect("find").expect("present");
    assert!(reloaded.used);
    assert!(reloaded.used_at.is_some());

    pool.close().await;
}

#[tokio::test]
async fn expired_codes_are_swept_live_ones_stay() {
    let pool = pool().await;
    let store = SqlAccessCodeStore::new(pool.clone());

    let now = Utc::now();
    for (id, code, offset_days) in
        [("ac-stale", "AAAA1111", -1i64), ("ac-live", "BBBB2222", 7)]
    {
        store
            .insert(AccessCode {
                id: AccessCodeId(id.to_string()),
                code: code.to_string(),
                email: "dana@acme.test".to_string(),
                holder_name: "Dana".to_string(),
                role: AccessRole::Client,
                used: false,
                used_at: None,
                created_at: now - Duration::days(8),
                expires_at: now + Duration::days(offset_days),
            })
            .await
            .expect("insert");
    }

    let removed = store.delete_expired(now).await.expect("sweep");
    assert_eq!(removed, 1);
    assert!(store.find_by_code("BBBB2222").await.expect("find").is_some());
    assert!(store.find_by_code("AAAA1111").await.expect("find").is_none());

    pool.close().await;
}

#[tokio::test]
async fn coupon_usage_counter_is_conditional_and_idempotent() {
    let pool = pool().await;
    let store = SqlCouponStore::new(pool.clone());
    store.insert(coupon("cpn-1", "SAVE50", 1)).await.expect("insert");

    let id = CouponId("cpn-1".to_string());
    let qt1 = QuotationId("qt-1".to_string());
    let qt2 = QuotationId("qt-2".to_string());

    assert_eq!(store.record_usage(&id, &qt1).await.expect("first"), UsageOutcome::Recorded);
    assert_eq!(
        store.record_usage(&id, &qt1).await.expect("retry"),
        UsageOutcome::AlreadyRecorded
    );
    assert_eq!(store.record_usage(&id, &qt2).await.expect("full"), UsageOutcome::LimitReached);
    assert_eq!(
        store
            .record_usage(&CouponId("ghost".to_string()), &qt1)
            .await
            .expect("missing coupon"),
        UsageOutcome::Missing
    );

    let stored = store.find_by_id(&id).await.expect("find").expect("present");
    assert_eq!(stored.used_count, 1);

    store.release_usage(&id, &qt1).await.expect("release");
    assert_eq!(store.record_usage(&id, &qt2).await.expect("reopened"), UsageOutcome::Recorded);

    pool.close().await;
}

#[tokio::test]
async fn quotation_round_trips_with_add_ons_and_coupon_snapshot() {
    let pool = pool().await;
    seed_client_and_setup(&pool).await;
    let store = SqlQuotationStore::new(pool.clone());

    let applied = AppliedCoupon {
        coupon_id: CouponId("cpn-1".to_string()),
        code: "WELCOME10".to_string(),
        kind: DiscountKind::Percentage(Decimal::new(10, 0)),
        discount_amount: Decimal::new(1448, 1),
    };
    let quotation = quotation("qt-1", "cl-1", "setup-1", Some(applied.clone()));
    store.insert(quotation.clone()).await.expect("insert");

    let found = store.find_by_id(&quotation.id).await.expect("find").expect("present");
    assert_eq!(found.status, QuotationStatus::PendingApproval);
    assert_eq!(found.applied_coupon, Some(applied));
    assert_eq!(found.subtotal, Decimal::new(1448, 0));
    assert_eq!(
        found.selected_add_ons.iter().map(|a| a.id.0.as_str()).collect::<Vec<_>>(),
        ["seo", "cms"],
        "selection order survives storage"
    );

    pool.close().await;
}

#[tokio::test]
async fn decide_applies_once_and_tells_the_loser() {
    let pool = pool().await;
    seed_client_and_setup(&pool).await;
    let store = SqlQuotationStore::new(pool.clone());
    store.insert(quotation("qt-1", "cl-1", "setup-1", None)).await.expect("insert");

    let id = QuotationId("qt-1".to_string());
    let confirm = store
        .decide(&id, QuotationStatus::PendingApproval, &QuotationDecision::Confirm, Utc::now())
        .await
        .expect("confirm");
    assert_eq!(confirm, CasOutcome::Applied);

    let reject = store
        .decide(
            &id,
            QuotationStatus::PendingApproval,
            &QuotationDecision::Reject { reason: "late".to_string() },
            Utc::now(),
        )
        .await
        .expect("reject after confirm");
    assert_eq!(reject, CasOutcome::Lost);

    let missing = store
        .decide(
            &QuotationId("ghost".to_string()),
            QuotationStatus::PendingApproval,
            &QuotationDecision::Confirm,
            Utc::now(),
        )
        .await
        .expect("missing quotation");
    assert_eq!(missing, CasOutcome::Missing);

    let stored = store.find_by_id(&id).await.expect("find").expect("present");
    assert_eq!(stored.status, QuotationStatus::Confirmed);
    assert!(stored.client_confirmed);
    assert!(stored.confirmed_at.is_some());
    assert_eq!(stored.rejection_reason, None);

    pool.close().await;
}

#[tokio::test]
async fn setup_round_trips_with_catalog_and_coupon_references() {
    let pool = pool().await;
    SqlClientStore::new(pool.clone()).insert(client("cl-1", "CLI001AB")).await.expect("client");
    SqlCouponStore::new(pool.clone()).insert(coupon("cpn-1", "SAVE50", 5)).await.expect("coupon");

    let store = SqlProjectSetupStore::new(pool.clone());
    let setup = setup("setup-1", "cl-1", vec![CouponId("cpn-1".to_string())]);
    store.insert(setup.clone()).await.expect("insert");

    let found = store.find_by_id(&setup.id).await.expect("find").expect("present");
    assert_eq!(found.base_price, Decimal::new(1200, 0));
    assert_eq!(found.add_ons.len(), 2);
    assert_eq!(found.coupon_ids, vec![CouponId("cpn-1".to_string())]);
    assert!(found.allows_coupon(&CouponId("cpn-1".to_string())));

    let by_client = store
        .find_by_client(&ClientId("cl-1".to_string()))
        .await
        .expect("find by client")
        .expect("present");
    assert_eq!(by_client.id, setup.id);

    pool.close().await;
}

#[tokio::test]
async fn running_project_round_trips_and_saves_progress() {
    let pool = pool().await;
    seed_client_and_setup(&pool).await;
    let quotations = SqlQuotationStore::new(pool.clone());
    quotations.insert(quotation("qt-1", "cl-1", "setup-1", None)).await.expect("quotation");

    let store = SqlRunningProjectStore::new(pool.clone());
    let now = Utc::now();
    let mut project = RunningProject {
        id: RunningProjectId("rp-1".to_string()),
        client_id: ClientId("cl-1".to_string()),
        client_code: "CLI001AB".to_string(),
        quotation_id: QuotationId("qt-1".to_string()),
        project_name: "Marketing site".to_string(),
        description: "Corporate site relaunch".to_string(),
        features: vec!["responsive layout".to_string()],
        selected_add_ons: vec![add_on("seo", 99, 0)],
        start_date: now,
        estimated_end_date: now + Duration::days(24),
        actual_end_date: None,
        overall_progress: 0,
        milestones: default_milestones(now, 24),
        payment_status: PaymentStatus::Pending,
        payment_stages: default_payment_stages(Decimal::new(1448, 0), now),
        final_price: Decimal::new(1448, 0),
        final_delivery_days: 24,
        status: ProjectStatus::Active,
        created_at: now,
        updated_at: now,
    };
    store.insert(project.clone()).await.expect("insert");

    let found =
        store.find_by_quotation(&project.quotation_id).await.expect("find").expect("present");
    assert_eq!(found.milestones.len(), 5);
    assert_eq!(found.payment_stages.len(), 3);
    assert_eq!(
        found.payment_stages.iter().map(|s| s.amount).sum::<Decimal>(),
        Decimal::new(1448, 0)
    );

    project.overall_progress = 40;
    project.milestones[0].progress = 100;
    store.save(project.clone()).await.expect("save");

    let updated = store.find_by_id(&project.id).await.expect("find").expect("present");
    assert_eq!(updated.overall_progress, 40);
    assert_eq!(updated.milestones[0].progress, 100);

    pool.close().await;
}

#[tokio::test]
async fn workflow_status_round_trips_through_step_rows() {
    let pool = pool().await;
    SqlClientStore::new(pool.clone()).insert(client("cl-1", "CLI001AB")).await.expect("client");
    let store = SqlWorkflowStatusStore::new(pool.clone());

    let client_id = ClientId("cl-1".to_string());
    assert!(store.find(&client_id).await.expect("empty lookup").is_none());

    let mut status = WorkflowStatus::new(client_id.clone(), Utc::now());
    status.complete_step(WorkflowStep::ClientCreated, Utc::now()).expect("step 1");
    status.complete_step(WorkflowStep::ProjectSetup, Utc::now()).expect("step 2");
    store.save(status.clone()).await.expect("save");

    let found = store.find(&client_id).await.expect("find").expect("present");
    assert_eq!(found.current_step(), Some(WorkflowStep::ProjectSetup));
    assert_eq!(found.next_step(), Some(WorkflowStep::InvitationSent));
    assert!(found.record(WorkflowStep::ClientCreated).completed_at.is_some());

    pool.close().await;
}

#[tokio::test]
async fn decode_failures_surface_as_store_errors() {
    let pool = pool().await;
    SqlClientStore::new(pool.clone()).insert(client("cl-1", "CLI001AB")).await.expect("client");

    // Bypass the store to corrupt a stored status value.
    sqlx::query(
        "INSERT INTO workflow_step_state (client_id, step, completed, completed_at, updated_at) \
         VALUES ('cl-1', 'teleported', 1, NULL, ?1)",
    )
    .bind(Utc::now())
    .execute(&pool)
    .await
    .expect("raw insert");

    let store = SqlWorkflowStatusStore::new(pool.clone());
    let error = store.find(&ClientId("cl-1".to_string())).await.expect_err("corrupt row");
    assert!(matches!(error, StoreError::Decode(_)));

    pool.close().await;
}
