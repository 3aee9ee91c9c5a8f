pub mod access;
pub mod audit;
pub mod config;
pub mod coupons;
pub mod domain;
pub mod engagement;
pub mod errors;
pub mod notify;
pub mod pricing;
pub mod service;
pub mod store;

pub use access::AccessCodeIssuer;
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use coupons::CouponValidator;
pub use domain::access_code::{AccessCode, AccessCodeError, AccessCodeId, AccessRole};
pub use domain::client::{Client, ClientId, ClientStatus};
pub use domain::coupon::{Coupon, CouponId, CouponRejection, DiscountKind};
pub use domain::project::{
    Milestone, PaymentStage, PaymentStatus, ProjectStatus, RunningProject, RunningProjectId,
};
pub use domain::quotation::{AppliedCoupon, Quotation, QuotationId, QuotationStatus};
pub use domain::setup::{AddOn, AddOnId, ProjectSetup, ProjectSetupId};
pub use domain::workflow::{WorkflowSequenceError, WorkflowStatus, WorkflowStep};
pub use engagement::{EngagementService, SetupDraft};
pub use errors::{DomainError, EngineError};
pub use notify::{
    DecisionNotice, InMemoryNotificationSink, InvitationNotice, NoopNotificationSink,
    Notification, NotificationSink,
};
pub use pricing::{round_display, PricingBreakdown};
pub use service::QuotationService;
pub use store::{CasOutcome, QuotationDecision, StoreError, UsageOutcome};
