//! In-memory collaborators for dialer tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;
use crate::models::{
    BridgedCallRequest, CallHistoryEntry, CallRecordStatus, CallbackCallRequest, ExternalTrunk,
    InitiatedCall, ServiceNumber, SipTransferRequest, TransferCallRequest, TransferTarget,
    TrunkNumber, UserProfile,
};
use crate::phone::{
    CallBackend, CallHooks, CallPurpose, CallRecordSource, NumberDirectory, PurposePrompt,
    RealtimeFeed, Softphone, SoftphoneCredentials, SoftphoneError, SoftphoneHandle,
    SoftphoneSession, StatusStream,
};

#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    Bridged(BridgedCallRequest),
    Callback(CallbackCallRequest),
    Terminate(String),
    Transfer(TransferCallRequest),
    SipTransfer(SipTransferRequest),
}

/// Records every request; the next request fails if a failure is queued.
#[derive(Default)]
pub struct FakeBackend {
    requests: Mutex<Vec<BackendRequest>>,
    failure: Mutex<Option<ApiError>>,
}

impl FakeBackend {
    pub fn fail_with(&self, err: ApiError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn bridged_requests(&self) -> Vec<BridgedCallRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                BackendRequest::Bridged(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, request: BackendRequest) -> Result<(), ApiError> {
        self.requests.lock().unwrap().push(request);
        match self.failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CallBackend for FakeBackend {
    async fn initiate_bridged_call(&self, request: &BridgedCallRequest) -> Result<InitiatedCall, ApiError> {
        self.record(BackendRequest::Bridged(request.clone()))?;
        Ok(InitiatedCall {
            call_sid: "CA-bridged".to_string(),
            call_record_id: Some("abc-123".to_string()),
            status: Some("initiated".to_string()),
        })
    }

    async fn initiate_callback_call(&self, request: &CallbackCallRequest) -> Result<InitiatedCall, ApiError> {
        self.record(BackendRequest::Callback(request.clone()))?;
        Ok(InitiatedCall {
            call_sid: "CA-callback".to_string(),
            call_record_id: Some("abc-456".to_string()),
            status: None,
        })
    }

    async fn terminate_call(&self, call_sid: &str) -> Result<(), ApiError> {
        self.record(BackendRequest::Terminate(call_sid.to_string()))
    }

    async fn transfer_call(&self, request: &TransferCallRequest) -> Result<(), ApiError> {
        self.record(BackendRequest::Transfer(request.clone()))
    }

    async fn sip_transfer_call(&self, request: &SipTransferRequest) -> Result<(), ApiError> {
        self.record(BackendRequest::SipTransfer(request.clone()))
    }
}

/// Numbers are listed in insertion order, so add the newest first.
#[derive(Default)]
pub struct FakeDirectory {
    native: Vec<String>,
    trunk: Vec<TrunkNumber>,
    profile: UserProfile,
    transfer_targets: Vec<TransferTarget>,
    history: Vec<CallHistoryEntry>,
}

impl FakeDirectory {
    pub fn with_native(mut self, phone_number: &str) -> Self {
        self.native.push(phone_number.to_string());
        self
    }

    pub fn with_trunk(mut self, phone_number: &str, trunk_id: &str, trunk_name: &str) -> Self {
        self.trunk.push(TrunkNumber {
            phone_number: phone_number.to_string(),
            friendly_name: None,
            trunk: ExternalTrunk {
                id: trunk_id.to_string(),
                name: Some(trunk_name.to_string()),
                is_active: true,
            },
        });
        self
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_transfer_target(mut self, label: &str, phone_number: &str) -> Self {
        self.transfer_targets.push(TransferTarget {
            id: format!("target-{}", self.transfer_targets.len() + 1),
            label: Some(label.to_string()),
            phone_number: phone_number.to_string(),
        });
        self
    }

    /// Add a call record; add the newest first.
    pub fn with_call(mut self, direction: &str, counterpart: &str) -> Self {
        let (caller_number, contact_phone) = match direction {
            "outbound" => (None, Some(counterpart.to_string())),
            _ => (Some(counterpart.to_string()), None),
        };
        self.history.push(CallHistoryEntry {
            caller_number,
            contact_phone,
            direction: Some(direction.to_string()),
            started_at: None,
        });
        self
    }
}

#[async_trait]
impl NumberDirectory for FakeDirectory {
    async fn active_native_numbers(&self) -> Result<Vec<ServiceNumber>, ApiError> {
        Ok(self
            .native
            .iter()
            .map(|n| ServiceNumber {
                phone_number: n.clone(),
                purchased_at: None,
            })
            .collect())
    }

    async fn find_native_number(&self, phone_number: &str) -> Result<Option<ServiceNumber>, ApiError> {
        Ok(self
            .active_native_numbers()
            .await?
            .into_iter()
            .find(|n| n.phone_number == phone_number))
    }

    async fn active_trunk_numbers(&self) -> Result<Vec<TrunkNumber>, ApiError> {
        Ok(self.trunk.clone())
    }

    async fn find_trunk_number(&self, phone_number: &str) -> Result<Option<TrunkNumber>, ApiError> {
        Ok(self.trunk.iter().find(|t| t.phone_number == phone_number).cloned())
    }

    async fn user_profile(&self) -> Result<UserProfile, ApiError> {
        Ok(self.profile.clone())
    }

    async fn transfer_targets(&self) -> Result<Vec<TransferTarget>, ApiError> {
        Ok(self.transfer_targets.clone())
    }

    async fn recent_calls(&self, limit: usize) -> Result<Vec<CallHistoryEntry>, ApiError> {
        Ok(self.history.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeRecords {
    statuses: Mutex<HashMap<String, CallRecordStatus>>,
    failures: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeRecords {
    pub fn set(&self, call_record_id: &str, status: CallRecordStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(call_record_id.to_string(), status);
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallRecordSource for FakeRecords {
    async fn fetch_status(&self, call_record_id: &str) -> Result<Option<CallRecordStatus>, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ApiError::Network("connection reset".to_string()));
        }
        Ok(self.statuses.lock().unwrap().get(call_record_id).cloned())
    }
}

/// Realtime feed driven by `push`.
#[derive(Default)]
pub struct FakeFeed {
    unavailable: bool,
    stalled: bool,
    channels: Mutex<HashMap<String, (mpsc::Sender<CallRecordStatus>, CancellationToken)>>,
}

impl FakeFeed {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    /// A feed whose connect never completes.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Default::default()
        }
    }

    pub fn is_subscribed(&self, call_record_id: &str) -> bool {
        self.channels.lock().unwrap().contains_key(call_record_id)
    }

    pub fn is_unsubscribed(&self, call_record_id: &str) -> bool {
        self.channels
            .lock()
            .unwrap()
            .get(call_record_id)
            .map(|(_, cancel)| cancel.is_cancelled())
            .unwrap_or(false)
    }

    /// Deliver a status; dropped silently once the subscriber has gone.
    pub async fn push(&self, call_record_id: &str, status: CallRecordStatus) {
        let sender = self
            .channels
            .lock()
            .unwrap()
            .get(call_record_id)
            .map(|(tx, _)| tx.clone());
        if let Some(tx) = sender {
            let _ = tx.send(status).await;
        }
    }
}

#[async_trait]
impl RealtimeFeed for FakeFeed {
    async fn subscribe(&self, call_record_id: &str) -> Result<StatusStream, ApiError> {
        if self.unavailable {
            return Err(ApiError::Realtime("socket refused".to_string()));
        }
        if self.stalled {
            std::future::pending::<()>().await;
        }
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        self.channels
            .lock()
            .unwrap()
            .insert(call_record_id.to_string(), (tx, cancel.clone()));
        Ok(StatusStream::new(rx, cancel))
    }
}

pub struct NullSession;

impl SoftphoneSession for NullSession {
    fn terminate(&self) {}
}

struct LoggingSession {
    log: Arc<Mutex<Vec<String>>>,
}

impl SoftphoneSession for LoggingSession {
    fn terminate(&self) {
        self.log.lock().unwrap().push("terminate".to_string());
    }
}

/// Softphone that logs every call made on it.
#[derive(Default)]
pub struct FakeSoftphone {
    registration_error: Option<String>,
    never_registers: bool,
    call_error: Option<String>,
    registered: AtomicBool,
    active: AtomicBool,
    log: Arc<Mutex<Vec<String>>>,
    hooks: Mutex<Option<CallHooks>>,
}

impl FakeSoftphone {
    pub fn failing_registration(reason: &str) -> Self {
        Self {
            registration_error: Some(reason.to_string()),
            ..Default::default()
        }
    }

    /// Accepts credentials without ever reaching the registrar.
    pub fn never_registering() -> Self {
        Self {
            never_registers: true,
            ..Default::default()
        }
    }

    /// Registers fine but every call attempt is rejected.
    pub fn failing_calls(reason: &str) -> Self {
        Self {
            call_error: Some(reason.to_string()),
            ..Default::default()
        }
    }

    /// Simulate the registrar dropping the endpoint.
    pub fn drop_registration(&self) {
        self.registered.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Hooks of the most recent call.
    pub fn hooks(&self) -> CallHooks {
        self.hooks.lock().unwrap().clone().expect("no call placed")
    }
}

#[async_trait]
impl Softphone for FakeSoftphone {
    async fn initialize(&self, _credentials: &SoftphoneCredentials) -> Result<(), SoftphoneError> {
        self.log.lock().unwrap().push("initialize".to_string());
        if let Some(reason) = &self.registration_error {
            return Err(SoftphoneError::Registration(reason.clone()));
        }
        self.registered.store(!self.never_registers, Ordering::SeqCst);
        Ok(())
    }

    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    async fn make_call(
        &self,
        destination: &str,
        _caller_id: &str,
        _display_name: &str,
        hooks: CallHooks,
    ) -> Result<Box<dyn SoftphoneSession>, SoftphoneError> {
        self.log.lock().unwrap().push(format!("make_call {}", destination));
        if let Some(reason) = &self.call_error {
            return Err(SoftphoneError::CallFailed(reason.clone()));
        }
        *self.hooks.lock().unwrap() = Some(hooks);
        self.active.store(true, Ordering::SeqCst);
        Ok(Box::new(LoggingSession {
            log: self.log.clone(),
        }))
    }

    fn set_mute(&self, muted: bool) {
        self.log.lock().unwrap().push(format!("mute {}", muted));
    }

    fn hangup(&self) {
        self.log.lock().unwrap().push("hangup".to_string());
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_call_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub fn softphone_handle(name: &'static str, fake: Arc<FakeSoftphone>) -> SoftphoneHandle {
    SoftphoneHandle::new(name, Box::new(move || fake.clone() as Arc<dyn Softphone>))
}

pub struct FakePrompt {
    answer: Option<CallPurpose>,
    asked: AtomicUsize,
}

impl FakePrompt {
    pub fn answering(purpose: CallPurpose) -> Self {
        Self {
            answer: Some(purpose),
            asked: AtomicUsize::new(0),
        }
    }

    pub fn cancelling() -> Self {
        Self {
            answer: None,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PurposePrompt for FakePrompt {
    async fn collect(&self, _destination: &str) -> Option<CallPurpose> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}
