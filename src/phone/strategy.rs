//! The four ways an outbound call gets established.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::ApiError;
use crate::models::{BridgedCallRequest, CallbackCallRequest, InitiatedCall, SipCredentials};
use crate::phone::normalize::is_same_phone;
use crate::phone::resolver::ResolvedCallerId;
use crate::phone::{
    CallBackend, CallHooks, DialError, DialerEvent, EstablishmentStrategy, PendingCallStore,
    PurposePrompt, SoftphoneCredentials, SoftphoneHandle,
};
use crate::state::BackendCallHandle;

/// Everything decided about a call before it is placed.
#[derive(Debug, Clone)]
pub struct DialPlan {
    pub session_id: Uuid,
    /// E.164 destination.
    pub destination: String,
    pub caller_id: ResolvedCallerId,
    pub display_name: String,
    /// The user's own phone, which may not be dialed.
    pub own_number: Option<String>,
    pub sip_credentials: Option<SipCredentials>,
}

#[derive(Debug)]
pub struct Established {
    pub handle: BackendCallHandle,
    pub call_record_id: Option<String>,
}

fn backend_failure(err: ApiError) -> DialError {
    if err.is_insufficient_credits() {
        DialError::InsufficientCredits
    } else {
        DialError::EstablishmentFailed(err.to_string())
    }
}

fn signaling(call: InitiatedCall) -> Established {
    debug!(
        "Backend accepted call {} ({})",
        call.call_sid,
        call.status.as_deref().unwrap_or("initiated")
    );
    Established {
        handle: BackendCallHandle::Signaling {
            call_sid: call.call_sid,
        },
        call_record_id: call.call_record_id,
    }
}

pub struct Establisher {
    backend: Arc<dyn CallBackend>,
    sip: Arc<SoftphoneHandle>,
    trunk: Arc<SoftphoneHandle>,
    prompt: Arc<dyn PurposePrompt>,
    pending: Arc<PendingCallStore>,
    events: mpsc::UnboundedSender<DialerEvent>,
}

impl Establisher {
    pub fn new(
        backend: Arc<dyn CallBackend>,
        sip: Arc<SoftphoneHandle>,
        trunk: Arc<SoftphoneHandle>,
        prompt: Arc<dyn PurposePrompt>,
        pending: Arc<PendingCallStore>,
        events: mpsc::UnboundedSender<DialerEvent>,
    ) -> Self {
        Self {
            backend,
            sip,
            trunk,
            prompt,
            pending,
            events,
        }
    }

    /// Place the call. Dialing the user's own phone is refused before any
    /// backend is touched.
    pub async fn establish(
        &self,
        strategy: EstablishmentStrategy,
        plan: &DialPlan,
    ) -> Result<Established, DialError> {
        if let Some(own) = plan.own_number.as_deref() {
            if is_same_phone(&plan.destination, own) {
                return Err(DialError::OwnNumberBlocked(plan.destination.clone()));
            }
        }

        info!(
            "Placing {} call to {} from {}",
            strategy, plan.destination, plan.caller_id.caller_id_number
        );

        match strategy {
            EstablishmentStrategy::BridgedAgent => self.bridged_agent(plan).await,
            EstablishmentStrategy::Callback => self.callback(plan).await,
            EstablishmentStrategy::DirectSip => self.direct_sip(plan).await,
            EstablishmentStrategy::DirectExternalTrunk => self.direct_trunk(plan).await,
        }
    }

    async fn bridged_agent(&self, plan: &DialPlan) -> Result<Established, DialError> {
        let purpose = match self.pending.take() {
            Some(purpose) => purpose,
            None => self
                .prompt
                .collect(&plan.destination)
                .await
                .ok_or(DialError::Cancelled)?,
        };

        let request = BridgedCallRequest {
            phone_number: plan.destination.clone(),
            caller_id: plan.caller_id.caller_id_number.clone(),
            purpose: purpose.purpose,
            goal: purpose.goal,
            template_id: purpose.template_id,
        };

        let call = self
            .backend
            .initiate_bridged_call(&request)
            .await
            .map_err(backend_failure)?;
        Ok(signaling(call))
    }

    async fn callback(&self, plan: &DialPlan) -> Result<Established, DialError> {
        let request = CallbackCallRequest {
            destination_number: plan.destination.clone(),
            caller_id: plan.caller_id.caller_id_number.clone(),
        };

        let call = self
            .backend
            .initiate_callback_call(&request)
            .await
            .map_err(backend_failure)?;
        Ok(signaling(call))
    }

    async fn direct_sip(&self, plan: &DialPlan) -> Result<Established, DialError> {
        let credentials = plan.sip_credentials.clone().ok_or_else(|| {
            DialError::SipRegistrationFailed("SIP credentials are not configured".to_string())
        })?;

        debug!("Using SIP endpoint {}", credentials.uri());
        let client = self
            .sip
            .ensure_registered(&SoftphoneCredentials::Sip(credentials))
            .await
            .map_err(|e| DialError::SipRegistrationFailed(e.to_string()))?;

        let session = client
            .make_call(
                &plan.destination,
                &plan.caller_id.caller_id_number,
                &plan.display_name,
                CallHooks::new(plan.session_id, self.events.clone()),
            )
            .await
            .map_err(|e| DialError::EstablishmentFailed(e.to_string()))?;

        Ok(Established {
            handle: BackendCallHandle::SipSession(session),
            call_record_id: None,
        })
    }

    async fn direct_trunk(&self, plan: &DialPlan) -> Result<Established, DialError> {
        let trunk_id = plan.caller_id.trunk_id.clone().ok_or_else(|| {
            DialError::EstablishmentFailed("Caller id has no external trunk".to_string())
        })?;

        let client = self
            .trunk
            .ensure_registered(&SoftphoneCredentials::Trunk { trunk_id })
            .await
            .map_err(|e| DialError::SipRegistrationFailed(e.to_string()))?;

        let session = client
            .make_call(
                &plan.destination,
                &plan.caller_id.caller_id_number,
                &plan.display_name,
                CallHooks::new(plan.session_id, self.events.clone()),
            )
            .await
            .map_err(|e| DialError::EstablishmentFailed(e.to_string()))?;

        Ok(Established {
            handle: BackendCallHandle::TrunkCall(session),
            call_record_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::fakes::{softphone_handle, FakeBackend, FakePrompt, FakeSoftphone};
    use crate::phone::CallPurpose;
    use std::time::Duration;

    struct Fixture {
        backend: Arc<FakeBackend>,
        prompt: Arc<FakePrompt>,
        pending: Arc<PendingCallStore>,
        establisher: Establisher,
    }

    fn fixture(prompt: FakePrompt) -> Fixture {
        let backend = Arc::new(FakeBackend::default());
        let prompt = Arc::new(prompt);
        let pending = Arc::new(PendingCallStore::new(Duration::from_secs(300)));
        let (events, _) = mpsc::unbounded_channel();
        let establisher = Establisher::new(
            backend.clone(),
            Arc::new(softphone_handle("sip", Arc::new(FakeSoftphone::default()))),
            Arc::new(softphone_handle("trunk", Arc::new(FakeSoftphone::default()))),
            prompt.clone(),
            pending.clone(),
            events,
        );
        Fixture {
            backend,
            prompt,
            pending,
            establisher,
        }
    }

    fn plan(destination: &str) -> DialPlan {
        DialPlan {
            session_id: Uuid::new_v4(),
            destination: destination.to_string(),
            caller_id: ResolvedCallerId {
                caller_id_number: "+16045550000".to_string(),
                is_external_trunk_call: false,
                trunk_id: None,
            },
            display_name: "Ada L".to_string(),
            own_number: Some("(604) 555-9999".to_string()),
            sip_credentials: None,
        }
    }

    #[tokio::test]
    async fn test_own_number_is_blocked_for_every_strategy() {
        let f = fixture(FakePrompt::answering(CallPurpose::new("p", "g")));
        for strategy in [
            EstablishmentStrategy::BridgedAgent,
            EstablishmentStrategy::Callback,
            EstablishmentStrategy::DirectSip,
            EstablishmentStrategy::DirectExternalTrunk,
        ] {
            let err = f.establisher.establish(strategy, &plan("+16045559999")).await.unwrap_err();
            assert_eq!(err, DialError::OwnNumberBlocked("+16045559999".to_string()));
        }
        assert!(f.backend.requests().is_empty());
        assert_eq!(f.prompt.times_asked(), 0);
    }

    #[tokio::test]
    async fn test_bridged_call_uses_stashed_context_without_prompting() {
        let f = fixture(FakePrompt::cancelling());
        f.pending.stash(CallPurpose::new("Reservation", "Book a table"));

        let established = f
            .establisher
            .establish(EstablishmentStrategy::BridgedAgent, &plan("+16045551234"))
            .await
            .unwrap();

        assert_eq!(established.call_record_id.as_deref(), Some("abc-123"));
        assert_eq!(established.handle.call_sid(), Some("CA-bridged"));
        assert_eq!(f.prompt.times_asked(), 0);
        assert_eq!(f.backend.bridged_requests()[0].goal.as_deref(), Some("Book a table"));
    }

    #[tokio::test]
    async fn test_cancelled_prompt_places_no_call() {
        let f = fixture(FakePrompt::cancelling());
        let err = f
            .establisher
            .establish(EstablishmentStrategy::BridgedAgent, &plan("+16045551234"))
            .await
            .unwrap_err();
        assert_eq!(err, DialError::Cancelled);
        assert!(f.backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_credits_is_reported_as_such() {
        let f = fixture(FakePrompt::cancelling());
        f.backend.fail_with(ApiError::Function {
            status: 402,
            code: None,
            message: "Payment required".to_string(),
        });
        let err = f
            .establisher
            .establish(EstablishmentStrategy::Callback, &plan("+16045551234"))
            .await
            .unwrap_err();
        assert_eq!(err, DialError::InsufficientCredits);
    }

    #[tokio::test]
    async fn test_direct_sip_without_credentials_fails_registration() {
        let f = fixture(FakePrompt::cancelling());
        let err = f
            .establisher
            .establish(EstablishmentStrategy::DirectSip, &plan("+16045551234"))
            .await
            .unwrap_err();
        assert!(matches!(err, DialError::SipRegistrationFailed(_)));
    }
}
