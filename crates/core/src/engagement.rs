use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::access::{validate_email, AccessCodeIssuer};
use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::access_code::AccessCode;
use crate::domain::client::{Client, ClientId, ClientStatus};
use crate::domain::coupon::CouponId;
use crate::domain::setup::{AddOn, ProjectSetup, ProjectSetupId};
use crate::domain::workflow::{WorkflowStatus, WorkflowStep};
use crate::errors::EngineError;
use crate::notify::{InvitationNotice, Notification, NotificationSink};
use crate::store::{ClientStore, ProjectSetupStore, WorkflowStatusStore};

const ACTOR: &str = "engagement-service";

/// Operator-side flow: register a client, set up the priced template,
/// invite the client in. Each stage advances the per-client workflow
/// tracker; stages cannot run out of order.
pub struct EngagementService {
    clients: Arc<dyn ClientStore>,
    setups: Arc<dyn ProjectSetupStore>,
    statuses: Arc<dyn WorkflowStatusStore>,
    issuer: AccessCodeIssuer,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationSink>,
}

/// Operator input for a new project setup.
#[derive(Clone, Debug)]
pub struct SetupDraft {
    pub client_id: ClientId,
    pub project_name: String,
    pub description: String,
    pub features: Vec<String>,
    pub base_price: Decimal,
    pub base_delivery_days: u32,
    pub add_ons: Vec<AddOn>,
    pub coupon_ids: Vec<CouponId>,
}

impl EngagementService {
    pub fn new(
        clients: Arc<dyn ClientStore>,
        setups: Arc<dyn ProjectSetupStore>,
        statuses: Arc<dyn WorkflowStatusStore>,
        issuer: AccessCodeIssuer,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { clients, setups, statuses, issuer, audit, notifier }
    }

    pub async fn register_client(
        &self,
        name: &str,
        email: &str,
        phone: &str,
    ) -> Result<Client, EngineError> {
        validate_email(email)?;
        if name.trim().is_empty() {
            return Err(EngineError::validation("client name must not be empty"));
        }

        let now = Utc::now();
        let client = Client {
            id: ClientId(Uuid::new_v4().to_string()),
            client_code: generate_client_code(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.trim().to_string(),
            access_code_id: None,
            status: ClientStatus::Active,
            created_at: now,
        };
        self.clients.insert(client.clone()).await?;

        let mut status = WorkflowStatus::new(client.id.clone(), now);
        status.complete_step(WorkflowStep::ClientCreated, now)?;
        self.statuses.save(status).await?;

        self.audit.emit(
            AuditEvent::new(
                None,
                Some(client.id.clone()),
                "client.registered",
                AuditCategory::Workflow,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("client_code", client.client_code.clone()),
        );

        Ok(client)
    }

    pub async fn create_setup(&self, draft: SetupDraft) -> Result<ProjectSetup, EngineError> {
        let client = self
            .clients
            .find_by_id(&draft.client_id)
            .await?
            .ok_or_else(|| EngineError::not_found("client", draft.client_id.0.clone()))?;
        if client.is_archived() {
            return Err(EngineError::validation(format!(
                "client `{}` is archived",
                client.client_code
            )));
        }

        if draft.project_name.trim().is_empty() {
            return Err(EngineError::validation("project name must not be empty"));
        }
        if draft.base_price.is_sign_negative() {
            return Err(EngineError::validation(format!(
                "base price {} is negative",
                draft.base_price
            )));
        }
        for add_on in &draft.add_ons {
            if add_on.price.is_sign_negative() {
                return Err(EngineError::validation(format!(
                    "add-on `{}` has negative price {}",
                    add_on.id.0, add_on.price
                )));
            }
            let duplicates =
                draft.add_ons.iter().filter(|other| other.id == add_on.id).count();
            if duplicates > 1 {
                return Err(EngineError::validation(format!(
                    "add-on id `{}` appears {duplicates} times in the catalog",
                    add_on.id.0
                )));
            }
        }

        let now = Utc::now();
        let setup = ProjectSetup {
            id: ProjectSetupId(Uuid::new_v4().to_string()),
            client_id: client.id.clone(),
            client_code: client.client_code.clone(),
            project_name: draft.project_name.trim().to_string(),
            description: draft.description,
            features: draft.features,
            base_price: draft.base_price,
            base_delivery_days: draft.base_delivery_days,
            add_ons: draft.add_ons,
            coupon_ids: draft.coupon_ids,
            created_at: now,
            updated_at: now,
        };
        self.setups.insert(setup.clone()).await?;
        self.advance_workflow(&client.id, WorkflowStep::ProjectSetup).await?;

        self.audit.emit(
            AuditEvent::new(
                None,
                Some(client.id.clone()),
                "setup.created",
                AuditCategory::Workflow,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("setup_id", setup.id.0.clone())
            .with_metadata("base_price", setup.base_price.to_string()),
        );

        Ok(setup)
    }

    /// Issues the one-time access code and hands the invitation to the
    /// notification capability; delivery itself happens elsewhere.
    pub async fn send_invitation(
        &self,
        client_id: &ClientId,
        setup_id: &ProjectSetupId,
    ) -> Result<AccessCode, EngineError> {
        let mut client = self
            .clients
            .find_by_id(client_id)
            .await?
            .ok_or_else(|| EngineError::not_found("client", client_id.0.clone()))?;
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

        let code = self.issuer.issue(&client.email, &client.name, "client").await?;
        client.access_code_id = Some(code.id.clone());
        self.clients.save(client.clone()).await?;
        self.advance_workflow(&client.id, WorkflowStep::InvitationSent).await?;

        self.notifier.deliver(Notification::Invitation(InvitationNotice {
            client_name: client.name.clone(),
            client_email: client.email.clone(),
            client_code: client.client_code.clone(),
            project_name: setup.project_name.clone(),
            access_code: code.code.clone(),
            expires_at: code.expires_at,
        }));
        self.audit.emit(
            AuditEvent::new(
                None,
                Some(client.id.clone()),
                "invitation.sent",
                AuditCategory::Access,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("access_code_id", code.id.0.clone()),
        );

        Ok(code)
    }

    async fn advance_workflow(
        &self,
        client_id: &ClientId,
        step: WorkflowStep,
    ) -> Result<(), EngineError> {
        let mut status = self
            .statuses
            .find(client_id)
            .await?
            .ok_or_else(|| EngineError::not_found("workflow status", client_id.0.clone()))?;
        status.complete_step(step, Utc::now())?;
        Ok(self.statuses.save(status).await?)
    }
}

fn generate_client_code() -> String {
    let mut rng = rand::thread_rng();
    let digits: u32 = rng.gen_range(0..1000);
    let letters: String = (0..2).map(|_| (b'A' + rng.gen_range(0..26)) as char).collect();
    format!("CLI{digits:03}{letters}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use crate::access::AccessCodeIssuer;
    use crate::audit::InMemoryAuditSink;
    use crate::domain::client::ClientId;
    use crate::domain::setup::{AddOn, AddOnId};
    use crate::domain::workflow::WorkflowStep;
    use crate::errors::{DomainError, EngineError};
    use crate::notify::{InMemoryNotificationSink, Notification};
    use crate::store::memory::{
        InMemoryAccessCodeStore, InMemoryClientStore, InMemoryProjectSetupStore,
        InMemoryWorkflowStatusStore,
    };
    use crate::store::WorkflowStatusStore;

    use super::{EngagementService, SetupDraft};

    struct Harness {
        service: EngagementService,
        statuses: Arc<InMemoryWorkflowStatusStore>,
        notifier: InMemoryNotificationSink,
    }

    fn harness() -> Harness {
        let clients = Arc::new(InMemoryClientStore::default());
        let setups = Arc::new(InMemoryProjectSetupStore::default());
        let statuses = Arc::new(InMemoryWorkflowStatusStore::default());
        let notifier = InMemoryNotificationSink::default();

        let service = EngagementService::new(
            clients,
            setups,
            statuses.clone(),
            AccessCodeIssuer::with_defaults(Arc::new(InMemoryAccessCodeStore::default())),
            Arc::new(InMemoryAuditSink::default()),
            Arc::new(notifier.clone()),
        );

        Harness { service, statuses, notifier }
    }

    fn draft(client_id: &ClientId) -> SetupDraft {
        SetupDraft {
            client_id: client_id.clone(),
            project_name: "Marketing site".to_string(),
            description: "Corporate site relaunch".to_string(),
            features: vec!["responsive layout".to_string()],
            base_price: Decimal::new(1200, 0),
            base_delivery_days: 21,
            add_ons: vec![AddOn {
                id: AddOnId("seo".to_string()),
                name: "SEO package".to_string(),
                description: String::new(),
                price: Decimal::new(99, 0),
                extra_delivery_days: 0,
                category: None,
                required: false,
            }],
            coupon_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn registration_starts_the_workflow() {
        let h = harness();
        let client =
            h.service.register_client("Acme Studios", "dana@acme.test", "+1 555 0100").await
                .expect("register");

        assert!(client.client_code.starts_with("CLI"));
        assert_eq!(client.client_code.len(), 8);

        let status =
            h.statuses.find(&client.id).await.expect("find status").expect("status exists");
        assert_eq!(status.current_step(), Some(WorkflowStep::ClientCreated));
    }

    #[tokio::test]
    async fn full_operator_flow_reaches_invitation_sent() {
        let h = harness();
        let client = h
            .service
            .register_client("Acme Studios", "dana@acme.test", "+1 555 0100")
            .await
            .expect("register");
        let setup = h.service.create_setup(draft(&client.id)).await.expect("setup");
        let code = h.service.send_invitation(&client.id, &setup.id).await.expect("invite");

        assert_eq!(code.email, "dana@acme.test");
        let status =
            h.statuses.find(&client.id).await.expect("find status").expect("status exists");
        assert_eq!(status.current_step(), Some(WorkflowStep::InvitationSent));

        let notifications = h.notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert!(matches!(
            &notifications[0],
            Notification::Invitation(notice) if notice.access_code == code.code
        ));
    }

    #[tokio::test]
    async fn negative_base_price_is_rejected() {
        let h = harness();
        let client = h
            .service
            .register_client("Acme Studios", "dana@acme.test", "+1 555 0100")
            .await
            .expect("register");

        let mut bad = draft(&client.id);
        bad.base_price = Decimal::new(-1200, 0);
        let error = h.service.create_setup(bad).await.expect_err("negative base price");

        assert!(matches!(error, EngineError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn setup_for_unknown_client_is_not_found() {
        let h = harness();
        let error = h
            .service
            .create_setup(draft(&ClientId("ghost".to_string())))
            .await
            .expect_err("unknown client");

        assert!(matches!(error, EngineError::Domain(DomainError::NotFound { .. })));
    }
}
