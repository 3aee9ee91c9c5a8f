use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::coupons::CouponValidator;
use crate::domain::client::{Client, ClientId};
use crate::domain::coupon::CouponRejection;
use crate::domain::project::{
    default_milestones, default_payment_stages, PaymentStatus, ProjectStatus, RunningProject,
    RunningProjectId,
};
use crate::domain::quotation::{AppliedCoupon, Quotation, QuotationId, QuotationStatus};
use crate::domain::setup::{AddOnId, ProjectSetupId};
use crate::domain::workflow::{WorkflowStatus, WorkflowStep};
use crate::errors::{DomainError, EngineError};
use crate::notify::{DecisionNotice, Notification, NotificationSink};
use crate::pricing;
use crate::store::{
    CasOutcome, ClientStore, CouponStore, ProjectSetupStore, QuotationDecision, QuotationStore,
    RunningProjectStore, WorkflowStatusStore,
};

const ACTOR: &str = "quotation-service";

/// Orchestrates pricing, coupon validation and the quotation state
/// machine against the storage capabilities. This is the boundary
/// external callers use; everything behind it is deterministic.
pub struct QuotationService {
    clients: Arc<dyn ClientStore>,
    setups: Arc<dyn ProjectSetupStore>,
    coupons: CouponValidator,
    quotations: Arc<dyn QuotationStore>,
    projects: Arc<dyn RunningProjectStore>,
    statuses: Arc<dyn WorkflowStatusStore>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationSink>,
}

impl QuotationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clients: Arc<dyn ClientStore>,
        setups: Arc<dyn ProjectSetupStore>,
        coupons: Arc<dyn CouponStore>,
        quotations: Arc<dyn QuotationStore>,
        projects: Arc<dyn RunningProjectStore>,
        statuses: Arc<dyn WorkflowStatusStore>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            clients,
            setups,
            coupons: CouponValidator::new(coupons),
            quotations,
            projects,
            statuses,
            audit,
            notifier,
        }
    }

    /// Prices a selection against the setup catalog and persists the
    /// quotation awaiting approval. Unknown add-on ids and a missing
    /// setup are hard errors; nothing is silently dropped or zeroed.
    pub async fn create_quotation(
        &self,
        client_id: &ClientId,
        setup_id: &ProjectSetupId,
        selected_add_on_ids: &[AddOnId],
        coupon_code: Option<&str>,
    ) -> Result<Quotation, EngineError> {
        let now = Utc::now();

        let client = self
            .clients
            .find_by_id(client_id)
            .await?
            .ok_or_else(|| EngineError::not_found("client", client_id.0.clone()))?;
        if client.is_archived() {
            return Err(EngineError::validation(format!(
                "client `{}` is archived and cannot request quotations",
                client.client_code
            )));
        }

        let setup = self
            .setups
            .find_by_id(setup_id)
            .await?
            .ok_or_else(|| EngineError::not_found("project setup", setup_id.0.clone()))?;
        if setup.client_id != client.id {
            return Err(EngineError::validation(format!(
                "setup `{}` belongs to a different client",
                setup.id.0
            )));
        }

        let selected = setup.resolve_selection(selected_add_on_ids)?;
        let subtotal = pricing::subtotal(setup.base_price, &selected)?;

        let applied_coupon = match coupon_code {
            Some(code) => {
                let coupon = self.coupons.validate(code, subtotal, now).await?;
                // A coupon outside the setup's own catalog is as good as
                // unknown for this engagement.
                if !setup.allows_coupon(&coupon.id) {
                    return Err(CouponRejection::NotFound.into());
                }
                let discount_amount = coupon.kind.discount_for(subtotal);
                Some(AppliedCoupon {
                    coupon_id: coupon.id,
                    code: coupon.code,
                    kind: coupon.kind,
                    discount_amount,
                })
            }
            None => None,
        };

        let discount =
            applied_coupon.as_ref().map(|c| c.discount_amount).unwrap_or_default();
        let breakdown =
            pricing::price_selection(setup.base_price, setup.base_delivery_days, &selected, discount)?;

        let quotation = Quotation {
            id: QuotationId(Uuid::new_v4().to_string()),
            client_id: client.id.clone(),
            client_code: client.client_code.clone(),
            setup_id: setup.id.clone(),
            selected_add_ons: selected,
            applied_coupon,
            base_price: breakdown.base_price,
            add_ons_total: breakdown.add_ons_total,
            subtotal: breakdown.subtotal,
            discount_amount: breakdown.discount_amount,
            final_price: breakdown.final_price,
            base_delivery_days: breakdown.base_delivery_days,
            add_ons_delivery_days: breakdown.add_ons_delivery_days,
            final_delivery_days: breakdown.final_delivery_days,
            client_confirmed: false,
            confirmed_at: None,
            rejection_reason: None,
            status: QuotationStatus::PendingApproval,
            created_at: now,
            updated_at: now,
        };

        self.quotations.insert(quotation.clone()).await?;
        self.audit.emit(
            AuditEvent::new(
                Some(quotation.id.clone()),
                Some(client.id.clone()),
                "quotation.created",
                AuditCategory::Pricing,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("subtotal", quotation.subtotal.to_string())
            .with_metadata("final_price", quotation.final_price.to_string())
            .with_metadata("delivery_days", quotation.final_delivery_days.to_string()),
        );

        Ok(quotation)
    }

    /// Approves a pending quotation and synthesizes the running project
    /// from its frozen figures. Coupon usage is counted exactly once per
    /// quotation; the status check and status write happen in one
    /// conditional update, so a simultaneous reject cannot also apply.
    pub async fn confirm_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<RunningProject, EngineError> {
        let now = Utc::now();

        let quotation = self
            .quotations
            .find_by_id(quotation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("quotation", quotation_id.0.clone()))?;
        if !quotation.can_transition_to(QuotationStatus::Confirmed) {
            return Err(DomainError::IllegalTransition {
                from: quotation.status,
                to: QuotationStatus::Confirmed,
            }
            .into());
        }

        let client = self
            .clients
            .find_by_id(&quotation.client_id)
            .await?
            .ok_or_else(|| EngineError::not_found("client", quotation.client_id.0.clone()))?;
        let setup = self
            .setups
            .find_by_id(&quotation.setup_id)
            .await?
            .ok_or_else(|| EngineError::not_found("project setup", quotation.setup_id.0.clone()))?;

        // Rehearse the workflow advance before touching shared counters;
        // an out-of-order engagement aborts the whole confirmation.
        let mut status = self
            .statuses
            .find(&quotation.client_id)
            .await?
            .unwrap_or_else(|| WorkflowStatus::new(quotation.client_id.clone(), now));
        status.complete_step(WorkflowStep::ClientApproval, now)?;
        status.complete_step(WorkflowStep::ProjectRunning, now)?;

        if let Some(applied) = &quotation.applied_coupon {
            self.coupons.record_usage(applied, &quotation.id).await?;
        }

        match self
            .quotations
            .decide(&quotation.id, QuotationStatus::PendingApproval, &QuotationDecision::Confirm, now)
            .await?
        {
            CasOutcome::Applied => {}
            CasOutcome::Lost => {
                if let Some(applied) = &quotation.applied_coupon {
                    self.coupons.release_usage(applied, &quotation.id).await?;
                }
                let current = self
                    .quotations
                    .find_by_id(&quotation.id)
                    .await?
                    .map(|q| q.status)
                    .unwrap_or(QuotationStatus::PendingApproval);
                return Err(DomainError::IllegalTransition {
                    from: current,
                    to: QuotationStatus::Confirmed,
                }
                .into());
            }
            CasOutcome::Missing => {
                if let Some(applied) = &quotation.applied_coupon {
                    self.coupons.release_usage(applied, &quotation.id).await?;
                }
                return Err(EngineError::not_found("quotation", quotation.id.0.clone()));
            }
        }

        let project = RunningProject {
            id: RunningProjectId(Uuid::new_v4().to_string()),
            client_id: quotation.client_id.clone(),
            client_code: quotation.client_code.clone(),
            quotation_id: quotation.id.clone(),
            project_name: setup.project_name.clone(),
            description: setup.description.clone(),
            features: setup.features.clone(),
            selected_add_ons: quotation.selected_add_ons.clone(),
            start_date: now,
            estimated_end_date: now
                + Duration::days(i64::from(quotation.final_delivery_days)),
            actual_end_date: None,
            overall_progress: 0,
            milestones: default_milestones(now, quotation.final_delivery_days),
            payment_status: PaymentStatus::Pending,
            payment_stages: default_payment_stages(quotation.final_price, now),
            final_price: quotation.final_price,
            final_delivery_days: quotation.final_delivery_days,
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.projects.insert(project.clone()).await?;
        self.statuses.save(status).await?;

        self.audit.emit(
            AuditEvent::new(
                Some(quotation.id.clone()),
                Some(quotation.client_id.clone()),
                "quotation.confirmed",
                AuditCategory::Workflow,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("project_id", project.id.0.clone())
            .with_metadata("final_price", project.final_price.to_string()),
        );
        self.notify_decision(&client, &quotation, QuotationStatus::Confirmed, None);

        Ok(project)
    }

    /// Declines a pending quotation. Coupon usage is untouched; the
    /// discount was never consumed.
    pub async fn reject_quotation(
        &self,
        quotation_id: &QuotationId,
        reason: &str,
    ) -> Result<(), EngineError> {
        let now = Utc::now();

        let quotation = self
            .quotations
            .find_by_id(quotation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("quotation", quotation_id.0.clone()))?;
        if !quotation.can_transition_to(QuotationStatus::Rejected) {
            return Err(DomainError::IllegalTransition {
                from: quotation.status,
                to: QuotationStatus::Rejected,
            }
            .into());
        }

        let decision = QuotationDecision::Reject { reason: reason.to_string() };
        match self
            .quotations
            .decide(&quotation.id, QuotationStatus::PendingApproval, &decision, now)
            .await?
        {
            CasOutcome::Applied => {}
            CasOutcome::Lost => {
                let current = self
                    .quotations
                    .find_by_id(&quotation.id)
                    .await?
                    .map(|q| q.status)
                    .unwrap_or(QuotationStatus::PendingApproval);
                return Err(DomainError::IllegalTransition {
                    from: current,
                    to: QuotationStatus::Rejected,
                }
                .into());
            }
            CasOutcome::Missing => {
                return Err(EngineError::not_found("quotation", quotation.id.0.clone()));
            }
        }

        self.audit.emit(
            AuditEvent::new(
                Some(quotation.id.clone()),
                Some(quotation.client_id.clone()),
                "quotation.rejected",
                AuditCategory::Workflow,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("reason", reason),
        );
        if let Ok(Some(client)) = self.clients.find_by_id(&quotation.client_id).await {
            self.notify_decision(&client, &quotation, QuotationStatus::Rejected, Some(reason));
        }

        Ok(())
    }

    pub async fn list_for_client(
        &self,
        client_id: &ClientId,
    ) -> Result<Vec<Quotation>, EngineError> {
        Ok(self.quotations.list_for_client(client_id).await?)
    }

    /// Closes out a delivered project and completes the engagement.
    pub async fn complete_project(
        &self,
        project_id: &RunningProjectId,
    ) -> Result<RunningProject, EngineError> {
        let now = Utc::now();

        let mut project = self
            .projects
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| EngineError::not_found("running project", project_id.0.clone()))?;
        if project.status != ProjectStatus::Active {
            return Err(EngineError::validation(format!(
                "project `{}` is {} and cannot be completed",
                project.id.0,
                project.status.as_str()
            )));
        }

        let mut status = self
            .statuses
            .find(&project.client_id)
            .await?
            .ok_or_else(|| EngineError::not_found("workflow status", project.client_id.0.clone()))?;
        status.complete_step(WorkflowStep::ProjectCompleted, now)?;

        project.status = ProjectStatus::Completed;
        project.overall_progress = 100;
        project.actual_end_date = Some(now);
        project.updated_at = now;

        self.projects.save(project.clone()).await?;
        self.statuses.save(status).await?;

        self.audit.emit(
            AuditEvent::new(
                Some(project.quotation_id.clone()),
                Some(project.client_id.clone()),
                "project.completed",
                AuditCategory::Workflow,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("project_id", project.id.0.clone()),
        );

        Ok(project)
    }

    fn notify_decision(
        &self,
        client: &Client,
        quotation: &Quotation,
        status: QuotationStatus,
        reason: Option<&str>,
    ) {
        self.notifier.deliver(Notification::QuotationDecided(DecisionNotice {
            client_email: client.email.clone(),
            quotation_id: quotation.id.clone(),
            status,
            final_price: quotation.final_price,
            final_delivery_days: quotation.final_delivery_days,
            rejection_reason: reason.map(str::to_string),
        }));
    }
}
