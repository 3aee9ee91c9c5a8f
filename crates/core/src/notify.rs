use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quotation::{QuotationId, QuotationStatus};

/// Everything an outbound channel needs to compose an invitation
/// message. The engine hands this over; it never formats or sends mail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationNotice {
    pub client_name: String,
    pub client_email: String,
    pub client_code: String,
    pub project_name: String,
    pub access_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNotice {
    pub client_email: String,
    pub quotation_id: QuotationId,
    pub status: QuotationStatus,
    pub final_price: Decimal,
    pub final_delivery_days: u32,
    pub rejection_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    Invitation(InvitationNotice),
    QuotationDecided(DecisionNotice),
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn deliver(&self, _notification: Notification) {}
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn notifications(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(notifications) => notifications.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn deliver(&self, notification: Notification) {
        match self.notifications.lock() {
            Ok(mut notifications) => notifications.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
