use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::phone::{EstablishmentStrategy, SoftphoneSession};

/// Dialer-visible call state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    Connecting,
    Ringing,
    Connected,
    Transferring,
    /// Establishment failed; resets to idle straight away.
    Error,
}

/// Inputs that move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Dial,
    /// Local softphone reports the far end is ringing.
    Progress,
    /// Local softphone reports the far end answered.
    Accepted,
    /// Call record reports the destination leg answered.
    Answered,
    EstablishFailed,
    TransferStarted,
    TransferFailed,
    TransferSucceeded,
    Ended,
}

impl CallState {
    pub fn display_name(&self) -> &str {
        match self {
            CallState::Idle => "Ready",
            CallState::Connecting => "Connecting...",
            CallState::Ringing => "Ringing...",
            CallState::Connected => "Connected",
            CallState::Transferring => "Transferring...",
            CallState::Error => "Call Failed",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CallState::Idle)
    }

    pub fn is_in_call(&self) -> bool {
        !matches!(self, CallState::Idle | CallState::Error)
    }

    /// Transition table. `None` means the trigger does not apply here.
    pub fn next(self, trigger: Trigger) -> Option<CallState> {
        use CallState::*;

        match (self, trigger) {
            (Idle, Trigger::Dial) => Some(Connecting),
            (Connecting, Trigger::Progress) => Some(Ringing),
            (Connecting | Ringing, Trigger::Accepted | Trigger::Answered) => Some(Connected),
            (Connecting, Trigger::EstablishFailed) => Some(Error),
            (Connected, Trigger::TransferStarted) => Some(Transferring),
            (Transferring, Trigger::TransferFailed) => Some(Connected),
            (Transferring, Trigger::TransferSucceeded) => Some(Idle),
            (Idle, Trigger::Ended) => None,
            (_, Trigger::Ended) => Some(Idle),
            _ => None,
        }
    }
}

/// Whatever identifies the live call to the backend that owns it.
pub enum BackendCallHandle {
    /// Server-placed call, addressed by its telephony sid.
    Signaling { call_sid: String },
    SipSession(Box<dyn SoftphoneSession>),
    TrunkCall(Box<dyn SoftphoneSession>),
}

impl BackendCallHandle {
    pub fn call_sid(&self) -> Option<&str> {
        match self {
            BackendCallHandle::Signaling { call_sid } => Some(call_sid),
            _ => None,
        }
    }
}

impl std::fmt::Debug for BackendCallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendCallHandle::Signaling { call_sid } => {
                f.debug_struct("Signaling").field("call_sid", call_sid).finish()
            }
            BackendCallHandle::SipSession(_) => f.write_str("SipSession"),
            BackendCallHandle::TrunkCall(_) => f.write_str("TrunkCall"),
        }
    }
}

/// The one outbound call the dialer is working on.
#[derive(Debug)]
pub struct CallSession {
    pub id: Uuid,
    pub destination_number: String,
    pub caller_id_number: String,
    strategy: EstablishmentStrategy,
    backend_call_handle: Option<BackendCallHandle>,
    call_record_id: Option<String>,
    pub is_muted: bool,
    pub is_external_trunk_call: bool,
    pub trunk_id: Option<String>,
    /// SIP endpoint user, needed to transfer a direct SIP call.
    pub sip_username: Option<String>,
    pub user_initiated_hangup: bool,
    pub started_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl CallSession {
    pub fn new(
        id: Uuid,
        destination_number: String,
        caller_id_number: String,
        strategy: EstablishmentStrategy,
    ) -> Self {
        Self {
            id,
            destination_number,
            caller_id_number,
            strategy,
            backend_call_handle: None,
            call_record_id: None,
            is_muted: false,
            is_external_trunk_call: strategy == EstablishmentStrategy::DirectExternalTrunk,
            trunk_id: None,
            sip_username: None,
            user_initiated_hangup: false,
            started_at: Utc::now(),
            connected_at: None,
        }
    }

    /// Fixed for the life of the session.
    pub fn strategy(&self) -> EstablishmentStrategy {
        self.strategy
    }

    pub fn backend_call_handle(&self) -> Option<&BackendCallHandle> {
        self.backend_call_handle.as_ref()
    }

    pub fn call_record_id(&self) -> Option<&str> {
        self.call_record_id.as_deref()
    }

    pub fn call_sid(&self) -> Option<&str> {
        self.backend_call_handle.as_ref().and_then(|h| h.call_sid())
    }

    /// Seconds since the far end answered.
    pub fn duration_secs(&self) -> Option<i64> {
        self.connected_at
            .map(|at| Utc::now().signed_duration_since(at).num_seconds())
    }
}

/// Owns the call state and the active session. Every state change is
/// published on a watch channel.
#[derive(Debug)]
pub struct CallStateMachine {
    state: CallState,
    session_id: Option<Uuid>,
    session: Option<CallSession>,
    watchers: watch::Sender<CallState>,
}

impl Default for CallStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStateMachine {
    pub fn new() -> Self {
        let (watchers, _) = watch::channel(CallState::Idle);
        Self {
            state: CallState::Idle,
            session_id: None,
            session: None,
            watchers,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<CallState> {
        self.watchers.subscribe()
    }

    /// Id of the session being dialed or in progress.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn is_current(&self, session_id: Uuid) -> bool {
        self.session_id == Some(session_id)
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CallSession> {
        self.session.as_mut()
    }

    /// Apply a trigger. Returns false if it did not apply in the current state.
    pub fn fire(&mut self, trigger: Trigger) -> bool {
        let Some(next) = self.state.next(trigger) else {
            debug!("Ignoring {:?} in state {:?}", trigger, self.state);
            return false;
        };

        info!("Call state {:?} -> {:?} ({:?})", self.state, next, trigger);
        self.state = next;
        self.watchers.send_replace(next);

        if next == CallState::Connected {
            if let Some(session) = self.session.as_mut() {
                session.connected_at.get_or_insert_with(Utc::now);
            }
        }
        true
    }

    /// Start dialing a new session. Only valid from idle.
    pub fn begin(&mut self) -> Option<Uuid> {
        if !self.fire(Trigger::Dial) {
            return None;
        }
        let id = Uuid::new_v4();
        self.session_id = Some(id);
        Some(id)
    }

    /// Attach the session once its caller id and strategy are known.
    pub fn attach(&mut self, session: CallSession) {
        debug_assert_eq!(Some(session.id), self.session_id);
        self.session = Some(session);
    }

    pub fn set_established(&mut self, handle: BackendCallHandle, call_record_id: Option<String>) {
        if let Some(session) = self.session.as_mut() {
            session.backend_call_handle = Some(handle);
            session.call_record_id = call_record_id;
        }
    }

    /// Forget the backend side of the call, e.g. once it has been handed off.
    pub fn clear_backend(&mut self) -> Option<BackendCallHandle> {
        let session = self.session.as_mut()?;
        session.call_record_id = None;
        session.backend_call_handle.take()
    }

    /// Return to idle and hand back the session so its resources can be
    /// released. Safe to call repeatedly.
    pub fn release(&mut self) -> Option<CallSession> {
        if self.state != CallState::Idle {
            self.fire(Trigger::Ended);
        }
        self.session_id = None;
        self.session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut machine = CallStateMachine::new();
        let watcher = machine.subscribe();

        let id = machine.begin().unwrap();
        assert_eq!(machine.state(), CallState::Connecting);
        assert!(machine.is_current(id));

        assert!(machine.fire(Trigger::Progress));
        assert!(machine.fire(Trigger::Accepted));
        assert_eq!(machine.state(), CallState::Connected);
        assert_eq!(*watcher.borrow(), CallState::Connected);

        assert!(machine.fire(Trigger::TransferStarted));
        assert!(machine.fire(Trigger::TransferFailed));
        assert_eq!(machine.state(), CallState::Connected);
    }

    #[test]
    fn test_only_one_session_at_a_time() {
        let mut machine = CallStateMachine::new();
        assert!(machine.begin().is_some());
        assert!(machine.begin().is_none());
    }

    #[test]
    fn test_invalid_triggers_are_ignored() {
        let mut machine = CallStateMachine::new();
        assert!(!machine.fire(Trigger::Accepted));
        assert!(!machine.fire(Trigger::Ended));
        assert_eq!(machine.state(), CallState::Idle);

        machine.begin();
        assert!(!machine.fire(Trigger::TransferStarted));
        assert_eq!(machine.state(), CallState::Connecting);
    }

    #[test]
    fn test_establish_failure_passes_through_error() {
        let mut machine = CallStateMachine::new();
        machine.begin();
        assert!(machine.fire(Trigger::EstablishFailed));
        assert_eq!(machine.state(), CallState::Error);
        assert!(!machine.state().is_in_call());

        machine.release();
        assert_eq!(machine.state(), CallState::Idle);
        assert!(machine.session_id().is_none());
    }

    #[test]
    fn test_release_is_idempotent_and_drops_session() {
        let mut machine = CallStateMachine::new();
        let id = machine.begin().unwrap();
        machine.attach(CallSession::new(
            id,
            "+16045551234".to_string(),
            "+16045550000".to_string(),
            EstablishmentStrategy::Callback,
        ));
        machine.set_established(
            BackendCallHandle::Signaling {
                call_sid: "CA123".to_string(),
            },
            Some("abc-123".to_string()),
        );
        assert_eq!(machine.session().and_then(|s| s.call_sid()), Some("CA123"));

        let released = machine.release().unwrap();
        assert_eq!(released.call_record_id(), Some("abc-123"));
        assert!(machine.release().is_none());
        assert_eq!(machine.state(), CallState::Idle);
    }
}
