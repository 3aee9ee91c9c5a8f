use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponId(pub String);

/// Discount rule as a tagged variant so each kind carries exactly one
/// evaluation arm; adding a kind is a compile-checked addition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage(Decimal),
    Fixed(Decimal),
}

impl DiscountKind {
    /// Discount owed on `amount`, in full precision. A fixed discount is
    /// capped at the amount itself so it can never drive a total negative.
    pub fn discount_for(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Percentage(pct) => amount * *pct / Decimal::ONE_HUNDRED,
            Self::Fixed(value) => (*value).min(amount),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Percentage(pct) => format!("{pct}% off"),
            Self::Fixed(value) => format!("{value} off"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Stored case-normalized; lookups go through [`normalize_code`].
    pub code: String,
    pub kind: DiscountKind,
    pub description: String,
    pub min_order_amount: Decimal,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: u32,
    pub used_count: u32,
    pub active: bool,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl Coupon {
    pub fn has_remaining_uses(&self) -> bool {
        self.used_count < self.usage_limit
    }

    /// Applicability checks in fixed priority order; the first failing
    /// check is the only one reported.
    pub fn check_applicable(
        &self,
        order_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), CouponRejection> {
        if !self.active {
            return Err(CouponRejection::Inactive);
        }
        if now >= self.valid_until {
            return Err(CouponRejection::Expired);
        }
        if order_amount < self.min_order_amount {
            return Err(CouponRejection::BelowMinimum { minimum: self.min_order_amount });
        }
        if !self.has_remaining_uses() {
            return Err(CouponRejection::LimitReached);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CouponRejection {
    #[error("coupon code is not recognized")]
    NotFound,
    #[error("coupon is no longer active")]
    Inactive,
    #[error("coupon has expired")]
    Expired,
    #[error("order amount is below the coupon minimum of {minimum}")]
    BelowMinimum { minimum: Decimal },
    #[error("coupon usage limit has been reached")]
    LimitReached,
}

impl CouponRejection {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => "That coupon code is not recognized.",
            Self::Inactive => "That coupon is no longer active.",
            Self::Expired => "That coupon has expired.",
            Self::BelowMinimum { .. } => "Your order does not meet the coupon minimum.",
            Self::LimitReached => "That coupon has reached its usage limit.",
        }
    }
}
