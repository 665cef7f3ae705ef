//! The call orchestrator.
//!
//! [`Dialer`] is the single writer of call state. Its methods take
//! `&mut self`; softphone callbacks, realtime updates and polling results
//! arrive as [`DialerEvent`]s tagged with the session they belong to and are
//! applied one at a time, so events from a session that has already ended
//! are dropped instead of touching the next call.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::ApiError;
use crate::config::DialerConfig;
use crate::models::{
    CallRecordStatus, CallerIdCandidate, RecentNumber, SipTransferRequest, TransferCallRequest,
    TransferTarget,
};
use crate::phone::control::{mute_target, transfer_route, MuteTarget, TransferRoute};
use crate::phone::history::{recent_numbers, MAX_RECENT_NUMBERS, RECENT_CALL_WINDOW};
use crate::phone::normalize::{display_name_for, format_for_display, has_digits, to_e164};
use crate::phone::reconcile::{Observation, Reconciliation};
use crate::phone::resolver::{lookup_failed, NumberResolver};
use crate::phone::strategy::{DialPlan, Establisher};
use crate::phone::{
    CallBackend, CallModeToggles, CallRecordSource, DialError, MediaEvent, NumberDirectory,
    PendingCallStore, PurposePrompt, RealtimeFeed, RegistrationStatus, SoftphoneCredentials,
    SoftphoneHandle,
};
use crate::state::{
    BackendCallHandle, CallSession, CallState, CallStateMachine, EndSource, Notice, NotificationType,
    Notifier, Trigger,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialerTimings {
    pub poll_interval: Duration,
    pub transfer_settle_delay: Duration,
    pub pending_context_ttl: Duration,
    /// How long a realtime subscription may take to come up before the
    /// call is tracked by polling alone.
    pub subscribe_timeout: Duration,
}

impl Default for DialerTimings {
    fn default() -> Self {
        Self::from(&DialerConfig::default())
    }
}

impl From<&DialerConfig> for DialerTimings {
    fn from(config: &DialerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            transfer_settle_delay: config.transfer_settle_delay(),
            pending_context_ttl: config.pending_context_ttl(),
            subscribe_timeout: config.request_timeout(),
        }
    }
}

/// The collaborators a dialer is wired to.
pub struct DialerParts {
    pub backend: Arc<dyn CallBackend>,
    pub directory: Arc<dyn NumberDirectory>,
    pub records: Arc<dyn CallRecordSource>,
    pub feed: Arc<dyn RealtimeFeed>,
    pub sip: Arc<SoftphoneHandle>,
    pub trunk: Arc<SoftphoneHandle>,
    pub prompt: Arc<dyn PurposePrompt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub destination: String,
    /// Explicit caller id; the newest native number is used when absent.
    pub caller_id: Option<String>,
    pub toggles: CallModeToggles,
}

impl CallRequest {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            caller_id: None,
            toggles: CallModeToggles::default(),
        }
    }

    pub fn from_number(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn with_toggles(mut self, toggles: CallModeToggles) -> Self {
        self.toggles = toggles;
        self
    }
}

#[derive(Debug)]
pub enum DialerEvent {
    Media { session_id: Uuid, event: MediaEvent },
    RecordStatus(Observation),
    /// A transfer's confirmation delay has passed.
    TransferSettled { session_id: Uuid },
}

pub struct Dialer {
    timings: DialerTimings,
    backend: Arc<dyn CallBackend>,
    directory: Arc<dyn NumberDirectory>,
    records: Arc<dyn CallRecordSource>,
    feed: Arc<dyn RealtimeFeed>,
    sip: Arc<SoftphoneHandle>,
    trunk: Arc<SoftphoneHandle>,
    pending: Arc<PendingCallStore>,
    resolver: NumberResolver,
    establisher: Establisher,
    machine: CallStateMachine,
    reconciliation: Option<Reconciliation>,
    notifier: Notifier,
    events_tx: mpsc::UnboundedSender<DialerEvent>,
    events_rx: mpsc::UnboundedReceiver<DialerEvent>,
}

impl Dialer {
    pub fn new(parts: DialerParts, timings: DialerTimings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingCallStore::new(timings.pending_context_ttl));

        let establisher = Establisher::new(
            parts.backend.clone(),
            parts.sip.clone(),
            parts.trunk.clone(),
            parts.prompt,
            pending.clone(),
            events_tx.clone(),
        );

        Self {
            timings,
            resolver: NumberResolver::new(parts.directory.clone()),
            backend: parts.backend,
            directory: parts.directory,
            records: parts.records,
            feed: parts.feed,
            sip: parts.sip,
            trunk: parts.trunk,
            pending,
            establisher,
            machine: CallStateMachine::new(),
            reconciliation: None,
            notifier: Notifier::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> CallState {
        self.machine.state()
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.machine.session()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CallState> {
        self.machine.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// Where an assistant conversation stashes purpose/goal for the next
    /// agent call.
    pub fn pending_calls(&self) -> Arc<PendingCallStore> {
        self.pending.clone()
    }

    pub fn is_tracking_record(&self) -> bool {
        self.reconciliation.as_ref().is_some_and(|r| r.is_active())
    }

    /// Caller ids the user can pick from.
    pub async fn candidates(&self) -> Result<Vec<CallerIdCandidate>, DialError> {
        self.resolver.candidates().await
    }

    /// Saved numbers a call can be transferred to, the default one first.
    pub async fn transfer_targets(&self) -> Result<Vec<TransferTarget>, DialError> {
        self.directory.transfer_targets().await.map_err(lookup_failed)
    }

    /// Numbers from the latest calls, excluding the user's own lines.
    pub async fn recent_numbers(&self) -> Result<Vec<RecentNumber>, DialError> {
        let history = self
            .directory
            .recent_calls(RECENT_CALL_WINDOW)
            .await
            .map_err(lookup_failed)?;
        let own: Vec<String> = self
            .resolver
            .candidates()
            .await?
            .into_iter()
            .map(|candidate| candidate.phone_number)
            .collect();
        Ok(recent_numbers(&history, &own, MAX_RECENT_NUMBERS))
    }

    /// Start an outbound call. On success the dialer is connecting (or
    /// further along); on failure it is back to idle with nothing held.
    pub async fn place_call(&mut self, request: CallRequest) -> Result<Uuid, DialError> {
        if !self.state().is_idle() {
            warn!("Ignoring call to {} while {:?}", request.destination, self.state());
            return Err(DialError::CallInProgress);
        }

        self.release_resources();
        let Some(session_id) = self.machine.begin() else {
            return Err(DialError::CallInProgress);
        };

        match self.dial(session_id, &request).await {
            Ok(()) => Ok(session_id),
            Err(err) => {
                self.abandon(&err);
                Err(err)
            }
        }
    }

    async fn dial(&mut self, session_id: Uuid, request: &CallRequest) -> Result<(), DialError> {
        let destination = to_e164(&request.destination);
        if !has_digits(&destination) {
            return Err(DialError::InvalidNumber(request.destination.clone()));
        }

        let caller_id = self.resolver.resolve(request.caller_id.as_deref()).await?;

        let profile = self
            .directory
            .user_profile()
            .await
            .map_err(|e| DialError::EstablishmentFailed(format!("Failed to load profile: {}", e)))?;

        if let Some(balance) = profile.credits_balance.filter(|b| *b < 0.0) {
            warn!("Placing call with negative balance {}", balance);
            self.notifier.emit(Notice::LowBalance { balance });
        }

        let strategy = request.toggles.strategy_for(caller_id.is_external_trunk_call);

        let mut session = CallSession::new(
            session_id,
            destination.clone(),
            caller_id.caller_id_number.clone(),
            strategy,
        );
        session.trunk_id = caller_id.trunk_id.clone();
        session.sip_username = profile.sip_username.clone();
        self.machine.attach(session);

        let plan = DialPlan {
            session_id,
            display_name: display_name_for(profile.name.as_deref(), &caller_id.caller_id_number),
            destination,
            caller_id,
            own_number: profile.phone_number.clone(),
            sip_credentials: profile.sip_credentials(),
        };

        let established = self.establisher.establish(strategy, &plan).await?;
        let call_record_id = established.call_record_id.clone();
        self.machine.set_established(established.handle, established.call_record_id);

        match call_record_id {
            Some(call_record_id) => {
                self.reconciliation = Some(Reconciliation::start(
                    self.feed.clone(),
                    session_id,
                    call_record_id,
                    self.timings.poll_interval,
                    self.timings.subscribe_timeout,
                ));
            }
            None if strategy.has_call_record() => {
                warn!("Call {} has no call record; status will not be tracked", session_id);
            }
            None => {}
        }

        self.notifier.show(
            &format!("Calling {}...", format_for_display(&plan.destination)),
            NotificationType::Info,
        );
        Ok(())
    }

    /// Undo a failed `place_call`.
    fn abandon(&mut self, err: &DialError) {
        match err {
            DialError::Cancelled => info!("Call cancelled before dialing"),
            DialError::OwnNumberBlocked(number) => {
                warn!("Refusing to call own number {}", number);
                self.notifier.emit(Notice::OwnNumberBlocked {
                    number: number.clone(),
                });
            }
            DialError::InsufficientCredits => {
                warn!("Call refused: insufficient credits");
                self.notifier.emit(Notice::InsufficientCredits);
            }
            other => {
                error!("Call failed: {}", other);
                self.machine.fire(Trigger::EstablishFailed);
                self.notifier.show(&other.to_string(), NotificationType::Error);
            }
        }

        self.release_resources();
        if let Some(session) = self.machine.release() {
            self.reset_media(&session);
        }
    }

    fn release_resources(&mut self) {
        if let Some(mut reconciliation) = self.reconciliation.take() {
            reconciliation.teardown();
        }
    }

    /// Softphones outlive calls, so a muted one is unmuted for the next call.
    fn reset_media(&self, session: &CallSession) {
        if !session.is_muted {
            return;
        }
        match mute_target(session.strategy()) {
            MuteTarget::SipClient => {
                if let Some(client) = self.sip.loaded() {
                    client.set_mute(false);
                }
            }
            MuteTarget::TrunkClient => {
                if let Some(client) = self.trunk.loaded() {
                    client.set_mute(false);
                }
            }
            MuteTarget::LocalOnly => {}
        }
    }

    /// Return to idle and release everything. A no-op once the session is
    /// gone, so each call ends exactly once.
    fn end_session(&mut self, source: EndSource, status: Option<CallRecordStatus>) {
        let Some(session_id) = self.machine.session_id() else {
            return;
        };

        self.release_resources();
        if let Some(session) = self.machine.release() {
            info!(
                "Call {} to {} ended via {:?} after {}s",
                session_id,
                session.destination_number,
                source,
                session.duration_secs().unwrap_or(0)
            );
            self.reset_media(&session);
        }

        self.notifier.emit(Notice::CallEnded {
            session_id,
            status,
            source,
        });
    }

    /// Apply one event to the active session.
    pub fn apply(&mut self, event: DialerEvent) {
        match event {
            DialerEvent::Media { session_id, event } => {
                if !self.machine.is_current(session_id) {
                    debug!("Dropping {:?} from stale session {}", event, session_id);
                    return;
                }
                match event {
                    MediaEvent::Progress => {
                        self.machine.fire(Trigger::Progress);
                    }
                    MediaEvent::Accepted => {
                        if self.machine.fire(Trigger::Accepted) {
                            self.notifier.show("Call connected", NotificationType::Success);
                        }
                    }
                    MediaEvent::Ended => self.end_session(EndSource::Softphone, None),
                    MediaEvent::Failed(cause) => {
                        warn!("Call failed: {}", cause);
                        self.notifier
                            .show(&format!("Call failed: {}", cause), NotificationType::Error);
                        self.end_session(EndSource::Softphone, None);
                    }
                }
            }
            DialerEvent::RecordStatus(observation) => self.observe(observation),
            DialerEvent::TransferSettled { session_id } => {
                if self.machine.is_current(session_id) {
                    self.machine.fire(Trigger::TransferSucceeded);
                    self.end_session(EndSource::Transfer, None);
                }
            }
        }
    }

    fn observe(&mut self, observation: Observation) {
        if !self.machine.is_current(observation.session_id) {
            debug!("Dropping status {} from stale session", observation.status);
            return;
        }

        let status = observation.status;
        if status.is_terminal() {
            info!("Call record reached {} ({:?})", status, observation.source);
            self.end_session(observation.source, Some(status));
        } else if status.is_answered() {
            if self.machine.fire(Trigger::Answered) {
                self.notifier.show("Call connected", NotificationType::Success);
            }
        } else {
            debug!("Call record status {}", status);
        }
    }

    /// Wait for the next event: a queued softphone/transfer event or a call
    /// record status.
    pub async fn next_event(&mut self) -> DialerEvent {
        let records = self.records.clone();
        match self.reconciliation.as_mut() {
            Some(reconciliation) => tokio::select! {
                Some(event) = self.events_rx.recv() => event,
                observation = reconciliation.next_observation(records.as_ref()) => {
                    DialerEvent::RecordStatus(observation)
                }
            },
            None => match self.events_rx.recv().await {
                Some(event) => event,
                None => std::future::pending().await,
            },
        }
    }

    /// Wait for one event and apply it.
    pub async fn step(&mut self) {
        let event = self.next_event().await;
        self.apply(event);
    }

    /// End the active call from the user's side. A no-op when idle.
    pub async fn hang_up(&mut self) {
        if self.state().is_idle() {
            debug!("Hang up with no active call");
            return;
        }

        let call_sid = match self.machine.session_mut() {
            Some(session) => {
                session.user_initiated_hangup = true;
                match session.backend_call_handle() {
                    Some(BackendCallHandle::Signaling { call_sid }) => Some(call_sid.clone()),
                    Some(BackendCallHandle::SipSession(sip_session)) => {
                        sip_session.terminate();
                        None
                    }
                    Some(BackendCallHandle::TrunkCall(_)) => {
                        if let Some(client) = self.trunk.loaded() {
                            client.hangup();
                        }
                        None
                    }
                    None => None,
                }
            }
            None => None,
        };

        if let Some(call_sid) = call_sid {
            if let Err(e) = self.backend.terminate_call(&call_sid).await {
                error!("Failed to terminate call {}: {}", call_sid, e);
            }
        }

        self.end_session(EndSource::UserHangup, None);
    }

    /// Flip mute on the active call and return the new value.
    pub fn toggle_mute(&mut self) -> bool {
        let Some(session) = self.machine.session_mut() else {
            return false;
        };

        session.is_muted = !session.is_muted;
        let muted = session.is_muted;

        match mute_target(session.strategy()) {
            MuteTarget::SipClient => {
                if let Some(client) = self.sip.loaded() {
                    client.set_mute(muted);
                }
            }
            MuteTarget::TrunkClient => {
                if let Some(client) = self.trunk.loaded() {
                    client.set_mute(muted);
                }
            }
            MuteTarget::LocalOnly => {}
        }

        info!("Call {}", if muted { "muted" } else { "unmuted" });
        muted
    }

    /// Hand the connected call to `target`. On success the dialer stays in
    /// transferring until the settle delay passes, then goes idle.
    pub async fn transfer(&mut self, target: &str) -> Result<(), DialError> {
        let target_number = to_e164(target);
        if !has_digits(&target_number) {
            return Err(DialError::InvalidNumber(target.to_string()));
        }
        if self.state() != CallState::Connected {
            return Err(DialError::NoActiveCallToTransfer);
        }

        let sip_call_active = self.sip.loaded().is_some_and(|client| client.is_call_active());
        let Some(session) = self.machine.session() else {
            return Err(DialError::NoActiveCallToTransfer);
        };
        let session_id = session.id;
        let current_to_number = session.destination_number.clone();
        let sip_username = session.sip_username.clone();
        let route = transfer_route(session.backend_call_handle(), sip_call_active)
            .ok_or(DialError::NoActiveCallToTransfer)?;

        self.machine.fire(Trigger::TransferStarted);
        info!("Transferring call {} to {}", session_id, target_number);

        let result = match &route {
            TransferRoute::Signaling { call_sid } => {
                self.backend
                    .transfer_call(&TransferCallRequest {
                        call_sid: call_sid.clone(),
                        target_number: target_number.clone(),
                    })
                    .await
            }
            TransferRoute::Sip => match sip_username {
                Some(sip_username) => {
                    self.backend
                        .sip_transfer_call(&SipTransferRequest {
                            sip_username,
                            target_number: target_number.clone(),
                            current_to_number,
                        })
                        .await
                }
                None => Err(ApiError::NotFound("SIP username".to_string())),
            },
        };

        if let Err(e) = result {
            error!("Transfer failed: {}", e);
            self.machine.fire(Trigger::TransferFailed);
            let err = DialError::TransferFailed(e.to_string());
            self.notifier.show(&err.to_string(), NotificationType::Error);
            return Err(err);
        }

        // The backend owns the call from here on.
        self.release_resources();
        self.machine.clear_backend();
        if route == TransferRoute::Sip {
            if let Some(client) = self.sip.loaded() {
                client.hangup();
            }
        }

        self.notifier.show(
            &format!("Call transferred to {}", format_for_display(&target_number)),
            NotificationType::Success,
        );
        self.schedule_settle(session_id);
        Ok(())
    }

    fn schedule_settle(&self, session_id: Uuid) {
        let events = self.events_tx.clone();
        let delay = self.timings.transfer_settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(DialerEvent::TransferSettled { session_id });
        });
    }

    pub fn registration_status(&self) -> RegistrationStatus {
        self.sip.status()
    }

    /// Re-register the SIP endpoint if it has been loaded but dropped its
    /// registration. An unloaded client stays unloaded until a call needs it.
    pub async fn refresh_registration(&mut self) -> Result<RegistrationStatus, DialError> {
        if self.sip.status() != RegistrationStatus::Unregistered {
            return Ok(self.sip.status());
        }

        let profile = self
            .directory
            .user_profile()
            .await
            .map_err(|e| DialError::SipRegistrationFailed(e.to_string()))?;
        let credentials = profile.sip_credentials().ok_or_else(|| {
            DialError::SipRegistrationFailed("SIP credentials are not configured".to_string())
        })?;

        info!("SIP client unregistered, registering {} again", credentials.uri());
        self.sip
            .ensure_registered(&SoftphoneCredentials::Sip(credentials))
            .await
            .map_err(|e| DialError::SipRegistrationFailed(e.to_string()))?;
        Ok(self.sip.status())
    }

    async fn execute(&mut self, command: DialerCommand) {
        match command {
            DialerCommand::PlaceCall { request, reply } => {
                let _ = reply.send(self.place_call(request).await);
            }
            DialerCommand::HangUp { reply } => {
                self.hang_up().await;
                let _ = reply.send(());
            }
            DialerCommand::ToggleMute { reply } => {
                let _ = reply.send(self.toggle_mute());
            }
            DialerCommand::Transfer { target, reply } => {
                let _ = reply.send(self.transfer(&target).await);
            }
            DialerCommand::Candidates { reply } => {
                let _ = reply.send(self.candidates().await);
            }
            DialerCommand::TransferTargets { reply } => {
                let _ = reply.send(self.transfer_targets().await);
            }
            DialerCommand::RecentNumbers { reply } => {
                let _ = reply.send(self.recent_numbers().await);
            }
            DialerCommand::RefreshRegistration { reply } => {
                let _ = reply.send(self.refresh_registration().await);
            }
        }
    }

    /// Serve commands until every handle is dropped, then hang up.
    pub async fn run(mut self, mut commands: mpsc::Receiver<DialerCommand>) {
        info!("Dialer started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
                event = self.next_event() => self.apply(event),
            }
        }
        self.hang_up().await;
        info!("Dialer stopped");
    }

    /// Move the dialer onto its own task.
    pub fn spawn(self) -> (DialerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let handle = DialerHandle {
            commands: tx,
            state: self.subscribe_state(),
            notifier: self.notifier.clone(),
            pending: self.pending_calls(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }
}

pub enum DialerCommand {
    PlaceCall {
        request: CallRequest,
        reply: oneshot::Sender<Result<Uuid, DialError>>,
    },
    HangUp {
        reply: oneshot::Sender<()>,
    },
    ToggleMute {
        reply: oneshot::Sender<bool>,
    },
    Transfer {
        target: String,
        reply: oneshot::Sender<Result<(), DialError>>,
    },
    Candidates {
        reply: oneshot::Sender<Result<Vec<CallerIdCandidate>, DialError>>,
    },
    TransferTargets {
        reply: oneshot::Sender<Result<Vec<TransferTarget>, DialError>>,
    },
    RecentNumbers {
        reply: oneshot::Sender<Result<Vec<RecentNumber>, DialError>>,
    },
    RefreshRegistration {
        reply: oneshot::Sender<Result<RegistrationStatus, DialError>>,
    },
}

/// Cloneable front for a spawned dialer.
#[derive(Clone)]
pub struct DialerHandle {
    commands: mpsc::Sender<DialerCommand>,
    state: watch::Receiver<CallState>,
    notifier: Notifier,
    pending: Arc<PendingCallStore>,
}

fn stopped() -> DialError {
    DialError::EstablishmentFailed("dialer is not running".to_string())
}

impl DialerHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> DialerCommand,
    ) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(command(reply)).await.ok()?;
        rx.await.ok()
    }

    pub async fn place_call(&self, request: CallRequest) -> Result<Uuid, DialError> {
        self.request(|reply| DialerCommand::PlaceCall { request, reply })
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn hang_up(&self) {
        self.request(|reply| DialerCommand::HangUp { reply }).await;
    }

    pub async fn toggle_mute(&self) -> bool {
        self.request(|reply| DialerCommand::ToggleMute { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn transfer(&self, target: &str) -> Result<(), DialError> {
        let target = target.to_string();
        self.request(|reply| DialerCommand::Transfer { target, reply })
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn candidates(&self) -> Result<Vec<CallerIdCandidate>, DialError> {
        self.request(|reply| DialerCommand::Candidates { reply })
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn transfer_targets(&self) -> Result<Vec<TransferTarget>, DialError> {
        self.request(|reply| DialerCommand::TransferTargets { reply })
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn recent_numbers(&self) -> Result<Vec<RecentNumber>, DialError> {
        self.request(|reply| DialerCommand::RecentNumbers { reply })
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn refresh_registration(&self) -> Result<RegistrationStatus, DialError> {
        self.request(|reply| DialerCommand::RefreshRegistration { reply })
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CallState> {
        self.state.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn pending_calls(&self) -> Arc<PendingCallStore> {
        self.pending.clone()
    }
}
