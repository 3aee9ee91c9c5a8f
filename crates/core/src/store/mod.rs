//! Narrow persistence capabilities the engine calls. Implementations
//! live elsewhere (SQL in `offerdesk-db`, in-memory here); the engine
//! never sees a connection, only these traits.
//!
//! Shared counters (coupon usage, access-code used flags, quotation
//! status) are mutated exclusively through conditional primitives so a
//! lost race is an observable outcome, not a silent overwrite.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::access_code::{AccessCode, AccessCodeId};
use crate::domain::client::{Client, ClientId};
use crate::domain::coupon::{Coupon, CouponId};
use crate::domain::project::{RunningProject, RunningProjectId};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::domain::setup::{ProjectSetup, ProjectSetupId};
use crate::domain::workflow::WorkflowStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
}

/// Result of a compare-and-set update. `Lost` means the guard predicate
/// no longer held — some other caller got there first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    Lost,
    Missing,
}

/// Result of a conditional coupon-usage increment. Idempotent per
/// quotation: the same quotation re-recording is `AlreadyRecorded`,
/// never a second count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageOutcome {
    Recorded,
    AlreadyRecorded,
    LimitReached,
    Missing,
}

/// Confirmation or rejection applied to a quotation in a single
/// conditional update; the expected current status is part of the guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuotationDecision {
    Confirm,
    Reject { reason: String },
}

impl QuotationDecision {
    pub fn target_status(&self) -> QuotationStatus {
        match self {
            Self::Confirm => QuotationStatus::Confirmed,
            Self::Reject { .. } => QuotationStatus::Rejected,
        }
    }
}

#[async_trait]
pub trait AccessCodeStore: Send + Sync {
    async fn insert(&self, code: AccessCode) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &AccessCodeId) -> Result<Option<AccessCode>, StoreError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<AccessCode>, StoreError>;
    /// Sets the used flag, guarded on it still being clear. Exactly one
    /// of two concurrent consumers observes `Applied`.
    async fn mark_used(
        &self,
        id: &AccessCodeId,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn insert(&self, coupon: Coupon) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, StoreError>;
    /// Lookup by normalized code (see `coupon::normalize_code`).
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError>;
    /// Conditional increment guarded by `used_count < usage_limit`,
    /// keyed by quotation id for retry safety.
    async fn record_usage(
        &self,
        id: &CouponId,
        quotation_id: &QuotationId,
    ) -> Result<UsageOutcome, StoreError>;
    /// Compensation for a confirm race lost after usage was recorded.
    async fn release_usage(
        &self,
        id: &CouponId,
        quotation_id: &QuotationId,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn insert(&self, client: Client) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, StoreError>;
    async fn find_by_code(&self, client_code: &str) -> Result<Option<Client>, StoreError>;
    async fn save(&self, client: Client) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProjectSetupStore: Send + Sync {
    async fn insert(&self, setup: ProjectSetup) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &ProjectSetupId) -> Result<Option<ProjectSetup>, StoreError>;
    async fn find_by_client(&self, client_id: &ClientId)
        -> Result<Option<ProjectSetup>, StoreError>;
}

#[async_trait]
pub trait QuotationStore: Send + Sync {
    async fn insert(&self, quotation: Quotation) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError>;
    async fn list_for_client(&self, client_id: &ClientId) -> Result<Vec<Quotation>, StoreError>;
    /// Applies a decision with the status check and the status write in
    /// one atomic update; simultaneous confirm and reject cannot both win.
    async fn decide(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        decision: &QuotationDecision,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError>;
}

#[async_trait]
pub trait RunningProjectStore: Send + Sync {
    async fn insert(&self, project: RunningProject) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &RunningProjectId)
        -> Result<Option<RunningProject>, StoreError>;
    async fn find_by_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Option<RunningProject>, StoreError>;
    async fn save(&self, project: RunningProject) -> Result<(), StoreError>;
}

#[async_trait]
pub trait WorkflowStatusStore: Send + Sync {
    async fn find(&self, client_id: &ClientId) -> Result<Option<WorkflowStatus>, StoreError>;
    async fn save(&self, status: WorkflowStatus) -> Result<(), StoreError>;
}
