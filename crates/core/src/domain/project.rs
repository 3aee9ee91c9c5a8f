use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::quotation::QuotationId;
use crate::domain::setup::AddOn;
use crate::pricing::round_display;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunningProjectId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "on_hold" => Some(Self::OnHold),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    PartiallyConfirmed,
    FullyConfirmed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PartiallyConfirmed => "partially_confirmed",
            Self::FullyConfirmed => "fully_confirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "partially_confirmed" => Some(Self::PartiallyConfirmed),
            "fully_confirmed" => Some(Self::FullyConfirmed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Delayed,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Delayed => "delayed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "delayed" => Some(Self::Delayed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStageStatus {
    Pending,
    Paid,
    Overdue,
}

impl PaymentStageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub title: String,
    pub description: String,
    pub target_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub status: MilestoneStatus,
    pub progress: u8,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStage {
    pub title: String,
    pub amount: Decimal,
    pub percentage: u32,
    pub due_date: DateTime<Utc>,
    pub paid_date: Option<DateTime<Utc>>,
    pub status: PaymentStageStatus,
    pub sequence: u32,
}

/// The frozen, in-execution record created once a quotation is confirmed.
/// Price and delivery figures are copied verbatim from the quotation and
/// never recomputed here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningProject {
    pub id: RunningProjectId,
    pub client_id: ClientId,
    pub client_code: String,
    pub quotation_id: QuotationId,
    pub project_name: String,
    pub description: String,
    pub features: Vec<String>,
    pub selected_add_ons: Vec<AddOn>,
    pub start_date: DateTime<Utc>,
    pub estimated_end_date: DateTime<Utc>,
    pub actual_end_date: Option<DateTime<Utc>>,
    pub overall_progress: u8,
    pub milestones: Vec<Milestone>,
    pub payment_status: PaymentStatus,
    pub payment_stages: Vec<PaymentStage>,
    pub final_price: Decimal,
    pub final_delivery_days: u32,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunningProject {
    /// Rolls the payment status up from the individual stages.
    pub fn derived_payment_status(&self) -> PaymentStatus {
        let paid =
            self.payment_stages.iter().filter(|s| s.status == PaymentStageStatus::Paid).count();
        if paid == 0 {
            PaymentStatus::Pending
        } else if paid == self.payment_stages.len() {
            PaymentStatus::FullyConfirmed
        } else {
            PaymentStatus::PartiallyConfirmed
        }
    }
}

const MILESTONE_PLAN: &[(&str, u32)] = &[
    ("Project Kickoff", 10),
    ("Design Phase", 30),
    ("Development Phase", 60),
    ("Testing Phase", 85),
    ("Project Delivery", 100),
];

const PAYMENT_PLAN: &[(&str, u32)] = &[
    ("First Payment (60%)", 60),
    ("Second Payment (20%)", 20),
    ("Final Payment (20%)", 20),
];

/// Default schedule: one milestone at each plan percentage of the
/// delivery window, counted in whole days from the start date.
pub fn default_milestones(start: DateTime<Utc>, delivery_days: u32) -> Vec<Milestone> {
    MILESTONE_PLAN
        .iter()
        .enumerate()
        .map(|(index, (title, percentage))| Milestone {
            title: (*title).to_string(),
            description: format!("{title} completion"),
            target_date: start + Duration::days(i64::from(delivery_days * percentage / 100)),
            completed_date: None,
            status: MilestoneStatus::Pending,
            progress: 0,
            sequence: index as u32 + 1,
        })
        .collect()
}

/// Default 60/20/20 split due at 15-day intervals. Each stage amount is
/// rounded to the minor unit; the last stage absorbs the rounding drift
/// so the stages always sum to the project price.
pub fn default_payment_stages(final_price: Decimal, start: DateTime<Utc>) -> Vec<PaymentStage> {
    let mut stages = Vec::with_capacity(PAYMENT_PLAN.len());
    let mut allocated = Decimal::ZERO;

    for (index, (title, percentage)) in PAYMENT_PLAN.iter().enumerate() {
        let sequence = index as u32 + 1;
        let amount = if index + 1 == PAYMENT_PLAN.len() {
            final_price - allocated
        } else {
            round_display(final_price * Decimal::from(*percentage) / Decimal::ONE_HUNDRED)
        };
        allocated += amount;

        stages.push(PaymentStage {
            title: (*title).to_string(),
            amount,
            percentage: *percentage,
            due_date: start + Duration::days(i64::from(sequence) * 15),
            paid_date: None,
            status: PaymentStageStatus::Pending,
            sequence,
        });
    }

    stages
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{default_milestones, default_payment_stages, PaymentStageStatus};

    #[test]
    fn milestones_cover_the_delivery_window_in_order() {
        let start = Utc::now();
        let milestones = default_milestones(start, 24);

        assert_eq!(milestones.len(), 5);
        assert_eq!(milestones[0].target_date, start + Duration::days(2));
        assert_eq!(milestones[4].target_date, start + Duration::days(24));
        assert!(milestones.windows(2).all(|w| w[0].target_date <= w[1].target_date));
        assert!(milestones.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn payment_stages_sum_exactly_to_the_project_price() {
        let price = Decimal::new(1303_20, 2);
        let stages = default_payment_stages(price, Utc::now());

        assert_eq!(stages.len(), 3);
        assert_eq!(stages.iter().map(|s| s.amount).sum::<Decimal>(), price);
        assert!(stages.iter().all(|s| s.status == PaymentStageStatus::Pending));
        assert_eq!(stages[0].amount, Decimal::new(781_92, 2));
    }

    #[test]
    fn last_stage_absorbs_rounding_drift() {
        // 100.01 splits as 60.01 / 20.00 / 20.00
        let price = Decimal::new(100_01, 2);
        let stages = default_payment_stages(price, Utc::now());

        assert_eq!(stages.iter().map(|s| s.amount).sum::<Decimal>(), price);
        assert_eq!(stages[0].amount, Decimal::new(60_01, 2));
        assert_eq!(stages[2].amount, Decimal::new(20_00, 2));
    }
}
