use thiserror::Error;

use crate::domain::access_code::AccessCodeError;
use crate::domain::coupon::CouponRejection;
use crate::domain::quotation::QuotationStatus;
use crate::domain::workflow::WorkflowSequenceError;
use crate::store::StoreError;

/// Logical failures. Every variant is caller-recoverable and carries a
/// specific user-facing message; retrying without changing the input
/// cannot change the outcome.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    AccessCode(#[from] AccessCodeError),
    #[error(transparent)]
    Coupon(#[from] CouponRejection),
    #[error("invalid quotation transition from {from:?} to {to:?}")]
    IllegalTransition { from: QuotationStatus, to: QuotationStatus },
    #[error(transparent)]
    WorkflowSequence(#[from] WorkflowSequenceError),
    #[error("coupon `{code}` usage was exhausted by a concurrent quotation")]
    CouponExhausted { code: String },
}

/// Engine-level failures: domain errors plus storage unavailability.
/// Storage is the only category eligible for caller-driven retry.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Domain(DomainError::NotFound { entity, id: id.into() })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Domain(DomainError::Validation(message.into()))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<AccessCodeError> for EngineError {
    fn from(error: AccessCodeError) -> Self {
        Self::Domain(error.into())
    }
}

impl From<CouponRejection> for EngineError {
    fn from(error: CouponRejection) -> Self {
        Self::Domain(error.into())
    }
}

impl From<WorkflowSequenceError> for EngineError {
    fn from(error: WorkflowSequenceError) -> Self {
        Self::Domain(error.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::access_code::AccessCodeError;
    use crate::store::StoreError;

    use super::{DomainError, EngineError};

    #[test]
    fn only_storage_failures_are_retryable() {
        let storage: EngineError = StoreError::Backend("disk full".to_string()).into();
        assert!(storage.is_retryable());

        let logical = EngineError::validation("negative base price");
        assert!(!logical.is_retryable());

        let access: EngineError = AccessCodeError::AlreadyUsed.into();
        assert!(!access.is_retryable());
    }

    #[test]
    fn access_code_outcomes_stay_distinct_through_the_stack() {
        let expired: EngineError = AccessCodeError::Expired.into();
        let used: EngineError = AccessCodeError::AlreadyUsed.into();
        let missing: EngineError = AccessCodeError::NotFound.into();

        assert_ne!(expired, used);
        assert_ne!(used, missing);
        assert!(matches!(
            expired,
            EngineError::Domain(DomainError::AccessCode(AccessCodeError::Expired))
        ));
    }
}
