use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::access_code::{AccessCode, AccessCodeId};
use crate::domain::client::{Client, ClientId};
use crate::domain::coupon::{Coupon, CouponId};
use crate::domain::project::{RunningProject, RunningProjectId};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::domain::setup::{ProjectSetup, ProjectSetupId};
use crate::domain::workflow::WorkflowStatus;

use super::{
    AccessCodeStore, CasOutcome, ClientStore, CouponStore, ProjectSetupStore, QuotationDecision,
    QuotationStore, RunningProjectStore, StoreError, UsageOutcome, WorkflowStatusStore,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Default)]
pub struct InMemoryAccessCodeStore {
    codes: Mutex<HashMap<String, AccessCode>>,
}

#[async_trait]
impl AccessCodeStore for InMemoryAccessCodeStore {
    async fn insert(&self, code: AccessCode) -> Result<(), StoreError> {
        lock(&self.codes).insert(code.id.0.clone(), code);
        Ok(())
    }

    async fn find_by_id(&self, id: &AccessCodeId) -> Result<Option<AccessCode>, StoreError> {
        Ok(lock(&self.codes).get(&id.0).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<AccessCode>, StoreError> {
        Ok(lock(&self.codes).values().find(|record| record.code == code).cloned())
    }

    async fn mark_used(
        &self,
        id: &AccessCodeId,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        let mut codes = lock(&self.codes);
        let Some(record) = codes.get_mut(&id.0) else {
            return Ok(CasOutcome::Missing);
        };
        if record.used {
            return Ok(CasOutcome::Lost);
        }
        record.used = true;
        record.used_at = Some(at);
        Ok(CasOutcome::Applied)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut codes = lock(&self.codes);
        let before = codes.len();
        codes.retain(|_, record| record.expires_at > now);
        Ok((before - codes.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryCouponStore {
    coupons: Mutex<HashMap<String, Coupon>>,
    usages: Mutex<HashSet<(String, String)>>,
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn insert(&self, coupon: Coupon) -> Result<(), StoreError> {
        lock(&self.coupons).insert(coupon.id.0.clone(), coupon);
        Ok(())
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, StoreError> {
        Ok(lock(&self.coupons).get(&id.0).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(lock(&self.coupons).values().find(|coupon| coupon.code == code).cloned())
    }

    async fn record_usage(
        &self,
        id: &CouponId,
        quotation_id: &QuotationId,
    ) -> Result<UsageOutcome, StoreError> {
        let mut coupons = lock(&self.coupons);
        let mut usages = lock(&self.usages);

        let Some(coupon) = coupons.get_mut(&id.0) else {
            return Ok(UsageOutcome::Missing);
        };
        let key = (id.0.clone(), quotation_id.0.clone());
        if usages.contains(&key) {
            return Ok(UsageOutcome::AlreadyRecorded);
        }
        if coupon.used_count >= coupon.usage_limit {
            return Ok(UsageOutcome::LimitReached);
        }
        coupon.used_count += 1;
        usages.insert(key);
        Ok(UsageOutcome::Recorded)
    }

    async fn release_usage(
        &self,
        id: &CouponId,
        quotation_id: &QuotationId,
    ) -> Result<(), StoreError> {
        let mut coupons = lock(&self.coupons);
        let mut usages = lock(&self.usages);

        let key = (id.0.clone(), quotation_id.0.clone());
        if usages.remove(&key) {
            if let Some(coupon) = coupons.get_mut(&id.0) {
                coupon.used_count = coupon.used_count.saturating_sub(1);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryClientStore {
    clients: Mutex<HashMap<String, Client>>,
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn insert(&self, client: Client) -> Result<(), StoreError> {
        lock(&self.clients).insert(client.id.0.clone(), client);
        Ok(())
    }

    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
        Ok(lock(&self.clients).get(&id.0).cloned())
    }

    async fn find_by_code(&self, client_code: &str) -> Result<Option<Client>, StoreError> {
        Ok(lock(&self.clients).values().find(|client| client.client_code == client_code).cloned())
    }

    async fn save(&self, client: Client) -> Result<(), StoreError> {
        lock(&self.clients).insert(client.id.0.clone(), client);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProjectSetupStore {
    setups: Mutex<HashMap<String, ProjectSetup>>,
}

#[async_trait]
impl ProjectSetupStore for InMemoryProjectSetupStore {
    async fn insert(&self, setup: ProjectSetup) -> Result<(), StoreError> {
        lock(&self.setups).insert(setup.id.0.clone(), setup);
        Ok(())
    }

    async fn find_by_id(&self, id: &ProjectSetupId) -> Result<Option<ProjectSetup>, StoreError> {
        Ok(lock(&self.setups).get(&id.0).cloned())
    }

    async fn find_by_client(
        &self,
        client_id: &ClientId,
    ) -> Result<Option<ProjectSetup>, StoreError> {
        Ok(lock(&self.setups).values().find(|setup| &setup.client_id == client_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryQuotationStore {
    quotations: Mutex<HashMap<String, Quotation>>,
}

#[async_trait]
impl QuotationStore for InMemoryQuotationStore {
    async fn insert(&self, quotation: Quotation) -> Result<(), StoreError> {
        lock(&self.quotations).insert(quotation.id.0.clone(), quotation);
        Ok(())
    }

    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError> {
        Ok(lock(&self.quotations).get(&id.0).cloned())
    }

    async fn list_for_client(&self, client_id: &ClientId) -> Result<Vec<Quotation>, StoreError> {
        let mut list: Vec<Quotation> = lock(&self.quotations)
            .values()
            .filter(|quotation| &quotation.client_id == client_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }

    async fn decide(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        decision: &QuotationDecision,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        let mut quotations = lock(&self.quotations);
        let Some(quotation) = quotations.get_mut(&id.0) else {
            return Ok(CasOutcome::Missing);
        };
        if quotation.status != expected {
            return Ok(CasOutcome::Lost);
        }

        quotation.status = decision.target_status();
        quotation.updated_at = at;
        match decision {
            QuotationDecision::Confirm => {
                quotation.client_confirmed = true;
                quotation.confirmed_at = Some(at);
            }
            QuotationDecision::Reject { reason } => {
                quotation.rejection_reason = Some(reason.clone());
            }
        }
        Ok(CasOutcome::Applied)
    }
}

#[derive(Default)]
pub struct InMemoryRunningProjectStore {
    projects: Mutex<HashMap<String, RunningProject>>,
}

#[async_trait]
impl RunningProjectStore for InMemoryRunningProjectStore {
    async fn insert(&self, project: RunningProject) -> Result<(), StoreError> {
        lock(&self.projects).insert(project.id.0.clone(), project);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &RunningProjectId,
    ) -> Result<Option<RunningProject>, StoreError> {
        Ok(lock(&self.projects).get(&id.0).cloned())
    }

    async fn find_by_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Option<RunningProject>, StoreError> {
        Ok(lock(&self.projects)
            .values()
            .find(|project| &project.quotation_id == quotation_id)
            .cloned())
    }

    async fn save(&self, project: RunningProject) -> Result<(), StoreError> {
        lock(&self.projects).insert(project.id.0.clone(), project);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowStatusStore {
    statuses: Mutex<HashMap<String, WorkflowStatus>>,
}

#[async_trait]
impl WorkflowStatusStore for InMemoryWorkflowStatusStore {
    async fn find(&self, client_id: &ClientId) -> Result<Option<WorkflowStatus>, StoreError> {
        Ok(lock(&self.statuses).get(&client_id.0).cloned())
    }

    async fn save(&self, status: WorkflowStatus) -> Result<(), StoreError> {
        lock(&self.statuses).insert(status.client_id.0.clone(), status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::access_code::{AccessCode, AccessCodeId, AccessRole};
    use crate::domain::coupon::{Coupon, CouponId, DiscountKind};
    use crate::domain::quotation::QuotationId;
    use crate::store::{AccessCodeStore, CasOutcome, CouponStore, UsageOutcome};

    use super::{InMemoryAccessCodeStore, InMemoryCouponStore};

    fn access_code(id: &str) -> AccessCode {
        let now = Utc::now();
        AccessCode {
            id: AccessCodeId(id.to_string()),
            code: "K7Q2M9XT".to_string(),
            email: "dana@acme.test".to_string(),
            holder_name: "Dana".to_string(),
            role: AccessRole::Client,
            used: false,
            used_at: None,
            created_at: now,
            expires_at: now + Duration::days(7),
        }
    }

    fn coupon(limit: u32) -> Coupon {
        Coupon {
            id: CouponId("cpn-1".to_string()),
            code: "WELCOME10".to_string(),
            kind: DiscountKind::Percentage(Decimal::new(10, 0)),
            description: String::new(),
            min_order_amount: Decimal::ZERO,
            valid_until: Utc::now() + Duration::days(30),
            usage_limit: limit,
            used_count: 0,
            active: true,
        }
    }

    #[tokio::test]
    async fn mark_used_applies_exactly_once() {
        let store = InMemoryAccessCodeStore::default();
        store.insert(access_code("ac-1")).await.expect("insert");

        let id = AccessCodeId("ac-1".to_string());
        let first = store.mark_used(&id, Utc::now()).await.expect("first call");
        let second = store.mark_used(&id, Utc::now()).await.expect("second call");

        assert_eq!(first, CasOutcome::Applied);
        assert_eq!(second, CasOutcome::Lost);
    }

    #[tokio::test]
    async fn mark_used_on_unknown_id_is_missing() {
        let store = InMemoryAccessCodeStore::default();
        let outcome =
            store.mark_used(&AccessCodeId("nope".to_string()), Utc::now()).await.expect("call");
        assert_eq!(outcome, CasOutcome::Missing);
    }

    #[tokio::test]
    async fn delete_expired_only_removes_past_codes() {
        let store = InMemoryAccessCodeStore::default();
        let mut stale = access_code("ac-stale");
        stale.expires_at = Utc::now() - Duration::days(1);
        store.insert(stale).await.expect("insert stale");
        store.insert(access_code("ac-live")).await.expect("insert live");

        let removed = store.delete_expired(Utc::now()).await.expect("cleanup");

        assert_eq!(removed, 1);
        assert!(store
            .find_by_id(&AccessCodeId("ac-live".to_string()))
            .await
            .expect("find")
            .is_some());
    }

    #[tokio::test]
    async fn usage_limit_admits_exactly_limit_distinct_quotations() {
        let store = InMemoryCouponStore::default();
        store.insert(coupon(1)).await.expect("insert");

        let id = CouponId("cpn-1".to_string());
        let first = store
            .record_usage(&id, &QuotationId("qt-1".to_string()))
            .await
            .expect("first usage");
        let second = store
            .record_usage(&id, &QuotationId("qt-2".to_string()))
            .await
            .expect("second usage");

        assert_eq!(first, UsageOutcome::Recorded);
        assert_eq!(second, UsageOutcome::LimitReached);
    }

    #[tokio::test]
    async fn re_recording_the_same_quotation_does_not_double_count() {
        let store = InMemoryCouponStore::default();
        store.insert(coupon(5)).await.expect("insert");

        let id = CouponId("cpn-1".to_string());
        let quotation = QuotationId("qt-1".to_string());
        store.record_usage(&id, &quotation).await.expect("first usage");
        let retry = store.record_usage(&id, &quotation).await.expect("retried usage");

        assert_eq!(retry, UsageOutcome::AlreadyRecorded);
        let stored = store.find_by_id(&id).await.expect("find").expect("present");
        assert_eq!(stored.used_count, 1);
    }

    #[tokio::test]
    async fn release_usage_reopens_a_slot() {
        let store = InMemoryCouponStore::default();
        store.insert(coupon(1)).await.expect("insert");

        let id = CouponId("cpn-1".to_string());
        let quotation = QuotationId("qt-1".to_string());
        store.record_usage(&id, &quotation).await.expect("record");
        store.release_usage(&id, &quotation).await.expect("release");

        let outcome = store
            .record_usage(&id, &QuotationId("qt-2".to_string()))
            .await
            .expect("slot reopened");
        assert_eq!(outcome, UsageOutcome::Recorded);
    }
}
