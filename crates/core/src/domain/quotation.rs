use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::coupon::{CouponId, DiscountKind};
use crate::domain::setup::{AddOn, ProjectSetupId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    PendingApproval,
    Confirmed,
    Rejected,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

/// Coupon figures frozen onto the quotation at creation time, so later
/// coupon edits cannot change an already-priced offer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub kind: DiscountKind,
    pub discount_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub client_id: ClientId,
    pub client_code: String,
    pub setup_id: ProjectSetupId,
    pub selected_add_ons: Vec<AddOn>,
    pub applied_coupon: Option<AppliedCoupon>,
    pub base_price: Decimal,
    pub add_ons_total: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
    pub base_delivery_days: u32,
    pub add_ons_delivery_days: u32,
    pub final_delivery_days: u32,
    pub client_confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub status: QuotationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (&self.status, next),
            (QuotationStatus::Draft, QuotationStatus::PendingApproval)
                | (QuotationStatus::PendingApproval, QuotationStatus::Confirmed)
                | (QuotationStatus::PendingApproval, QuotationStatus::Rejected)
        )
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::IllegalTransition { from: self.status, to: next })
    }
}
