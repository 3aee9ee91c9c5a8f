use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::coupon::{normalize_code, Coupon, CouponRejection};
use crate::domain::quotation::{AppliedCoupon, QuotationId};
use crate::errors::{DomainError, EngineError};
use crate::store::{CouponStore, UsageOutcome};

/// Validates coupon codes against the catalog and owns the usage
/// counter. The counter only moves through the store's conditional
/// increment, so two validations racing toward the last slot cannot
/// both record usage.
pub struct CouponValidator {
    coupons: Arc<dyn CouponStore>,
}

impl CouponValidator {
    pub fn new(coupons: Arc<dyn CouponStore>) -> Self {
        Self { coupons }
    }

    /// One rejection reason per call, in fixed priority order: unknown
    /// code, inactive, expired, below minimum, usage limit reached.
    pub async fn validate(
        &self,
        code: &str,
        order_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Coupon, EngineError> {
        let normalized = normalize_code(code);
        let Some(coupon) = self.coupons.find_by_code(&normalized).await? else {
            return Err(CouponRejection::NotFound.into());
        };
        coupon.check_applicable(order_amount, now)?;
        Ok(coupon)
    }

    /// Counts one use against the coupon, keyed by quotation so a retried
    /// confirmation cannot double-count. Losing the race for the last
    /// slot is `CouponExhausted`.
    pub async fn record_usage(
        &self,
        applied: &AppliedCoupon,
        quotation_id: &QuotationId,
    ) -> Result<(), EngineError> {
        match self.coupons.record_usage(&applied.coupon_id, quotation_id).await? {
            UsageOutcome::Recorded | UsageOutcome::AlreadyRecorded => Ok(()),
            UsageOutcome::LimitReached => {
                Err(DomainError::CouponExhausted { code: applied.code.clone() }.into())
            }
            UsageOutcome::Missing => {
                Err(EngineError::not_found("coupon", applied.coupon_id.0.clone()))
            }
        }
    }

    pub async fn release_usage(
        &self,
        applied: &AppliedCoupon,
        quotation_id: &QuotationId,
    ) -> Result<(), EngineError> {
        Ok(self.coupons.release_usage(&applied.coupon_id, quotation_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::coupon::{Coupon, CouponId, CouponRejection, DiscountKind};
    use crate::domain::quotation::{AppliedCoupon, QuotationId};
    use crate::errors::{DomainError, EngineError};
    use crate::store::memory::InMemoryCouponStore;
    use crate::store::CouponStore;

    use super::CouponValidator;

    fn coupon(code: &str, limit: u32) -> Coupon {
        Coupon {
            id: CouponId(format!("cpn-{}", code.to_ascii_lowercase())),
            code: code.to_string(),
            kind: DiscountKind::Percentage(Decimal::new(10, 0)),
            description: String::new(),
            min_order_amount: Decimal::new(100, 0),
            valid_until: Utc::now() + Duration::days(30),
            usage_limit: limit,
            used_count: 0,
            active: true,
        }
    }

    fn applied(coupon: &Coupon) -> AppliedCoupon {
        AppliedCoupon {
            coupon_id: coupon.id.clone(),
            code: coupon.code.clone(),
            kind: coupon.kind.clone(),
            discount_amount: coupon.kind.discount_for(Decimal::new(500, 0)),
        }
    }

    async fn validator_with(coupons: Vec<Coupon>) -> CouponValidator {
        let store = Arc::new(InMemoryCouponStore::default());
        for coupon in coupons {
            store.insert(coupon).await.expect("seed coupon");
        }
        CouponValidator::new(store)
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let validator = validator_with(vec![coupon("WELCOME10", 10)]).await;
        let found = validator
            .validate(" welcome10 ", Decimal::new(500, 0), Utc::now())
            .await
            .expect("normalized lookup");
        assert_eq!(found.code, "WELCOME10");
    }

    #[tokio::test]
    async fn unknown_code_is_the_first_rejection_checked() {
        let validator = validator_with(Vec::new()).await;
        let error = validator
            .validate("MYSTERY", Decimal::ZERO, Utc::now())
            .await
            .expect_err("nothing seeded");
        assert!(matches!(
            error,
            EngineError::Domain(DomainError::Coupon(CouponRejection::NotFound))
        ));
    }

    #[tokio::test]
    async fn below_minimum_is_reported_with_one_reason() {
        let validator = validator_with(vec![coupon("WELCOME10", 10)]).await;
        let error = validator
            .validate("WELCOME10", Decimal::new(99, 0), Utc::now())
            .await
            .expect_err("below minimum");
        assert!(matches!(
            error,
            EngineError::Domain(DomainError::Coupon(CouponRejection::BelowMinimum { .. }))
        ));
    }

    #[tokio::test]
    async fn losing_the_last_slot_is_coupon_exhausted() {
        let validator = validator_with(vec![coupon("LAST1", 1)]).await;
        let snapshot = validator
            .validate("LAST1", Decimal::new(500, 0), Utc::now())
            .await
            .expect("slot still open");

        validator
            .record_usage(&applied(&snapshot), &QuotationId("qt-1".to_string()))
            .await
            .expect("first quotation takes the slot");
        let error = validator
            .record_usage(&applied(&snapshot), &QuotationId("qt-2".to_string()))
            .await
            .expect_err("second quotation lost");

        assert!(matches!(
            error,
            EngineError::Domain(DomainError::CouponExhausted { code }) if code == "LAST1"
        ));
    }

    #[tokio::test]
    async fn retried_recording_for_the_same_quotation_is_accepted() {
        let validator = validator_with(vec![coupon("RETRY", 1)]).await;
        let snapshot = validator
            .validate("RETRY", Decimal::new(500, 0), Utc::now())
            .await
            .expect("validate");

        let quotation = QuotationId("qt-1".to_string());
        validator.record_usage(&applied(&snapshot), &quotation).await.expect("first record");
        validator.record_usage(&applied(&snapshot), &quotation).await.expect("idempotent retry");
    }
}
