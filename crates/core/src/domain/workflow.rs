use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::client::ClientId;

/// Fixed, ordered engagement lifecycle. Each step's predecessor is the
/// previous variant; completing a step out of order is unrepresentable
/// in storage because [`WorkflowStatus::complete_step`] is the only way
/// to mark progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    ClientCreated,
    ProjectSetup,
    InvitationSent,
    ClientApproval,
    ProjectRunning,
    ProjectCompleted,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 6] = [
        WorkflowStep::ClientCreated,
        WorkflowStep::ProjectSetup,
        WorkflowStep::InvitationSent,
        WorkflowStep::ClientApproval,
        WorkflowStep::ProjectRunning,
        WorkflowStep::ProjectCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientCreated => "client_created",
            Self::ProjectSetup => "project_setup",
            Self::InvitationSent => "invitation_sent",
            Self::ClientApproval => "client_approval",
            Self::ProjectRunning => "project_running",
            Self::ProjectCompleted => "project_completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "client_created" => Some(Self::ClientCreated),
            "project_setup" => Some(Self::ProjectSetup),
            "invitation_sent" => Some(Self::InvitationSent),
            "client_approval" => Some(Self::ClientApproval),
            "project_running" => Some(Self::ProjectRunning),
            "project_completed" => Some(Self::ProjectCompleted),
            _ => None,
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|step| *step == self).unwrap_or(0)
    }

    pub fn predecessor(self) -> Option<WorkflowStep> {
        let index = self.index();
        (index > 0).then(|| Self::ALL[index - 1])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("workflow step {step:?} cannot complete before {missing:?}")]
pub struct WorkflowSequenceError {
    pub step: WorkflowStep,
    pub missing: WorkflowStep,
}

/// Per-client progress tracker over the engagement lifecycle. Used for
/// dashboard display, never for authorization decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub client_id: ClientId,
    steps: [StepRecord; 6],
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStatus {
    pub fn new(client_id: ClientId, now: DateTime<Utc>) -> Self {
        Self { client_id, steps: Default::default(), updated_at: now }
    }

    pub fn from_records(
        client_id: ClientId,
        records: impl IntoIterator<Item = (WorkflowStep, StepRecord)>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut status = Self::new(client_id, updated_at);
        for (step, record) in records {
            status.steps[step.index()] = record;
        }
        status
    }

    pub fn record(&self, step: WorkflowStep) -> &StepRecord {
        &self.steps[step.index()]
    }

    pub fn is_complete(&self, step: WorkflowStep) -> bool {
        self.record(step).completed
    }

    /// Marks a step complete; every predecessor must already be complete.
    /// Re-completing a step is a no-op that keeps the original timestamp.
    pub fn complete_step(
        &mut self,
        step: WorkflowStep,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowSequenceError> {
        if let Some(missing) =
            WorkflowStep::ALL[..step.index()].iter().find(|s| !self.is_complete(**s))
        {
            return Err(WorkflowSequenceError { step, missing: *missing });
        }

        let record = &mut self.steps[step.index()];
        if !record.completed {
            *record = StepRecord { completed: true, completed_at: Some(now) };
            self.updated_at = now;
        }
        Ok(())
    }

    /// Furthest completed step; `None` until anything completes.
    pub fn current_step(&self) -> Option<WorkflowStep> {
        WorkflowStep::ALL.iter().rev().copied().find(|step| self.is_complete(*step))
    }

    /// First incomplete step; `None` once the engagement has finished.
    pub fn next_step(&self) -> Option<WorkflowStep> {
        WorkflowStep::ALL.iter().copied().find(|step| !self.is_complete(*step))
    }

    pub fn records(&self) -> impl Iterator<Item = (WorkflowStep, &StepRecord)> {
        WorkflowStep::ALL.iter().map(move |step| (*step, self.record(*step)))
    }
}
