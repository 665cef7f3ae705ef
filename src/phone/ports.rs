//! Collaborator seams the dialer talks through.
//!
//! The Supabase implementations live in `crate::api`; tests swap in fakes.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;
use crate::models::{
    BridgedCallRequest, CallHistoryEntry, CallRecordStatus, CallbackCallRequest, InitiatedCall,
    ServiceNumber, SipTransferRequest, TransferCallRequest, TransferTarget, TrunkNumber,
    UserProfile,
};

/// Server-side call control (edge functions).
#[async_trait]
pub trait CallBackend: Send + Sync {
    async fn initiate_bridged_call(&self, request: &BridgedCallRequest) -> Result<InitiatedCall, ApiError>;

    async fn initiate_callback_call(&self, request: &CallbackCallRequest) -> Result<InitiatedCall, ApiError>;

    async fn terminate_call(&self, call_sid: &str) -> Result<(), ApiError>;

    async fn transfer_call(&self, request: &TransferCallRequest) -> Result<(), ApiError>;

    async fn sip_transfer_call(&self, request: &SipTransferRequest) -> Result<(), ApiError>;
}

/// The signed-in user's numbers and profile.
#[async_trait]
pub trait NumberDirectory: Send + Sync {
    /// Active native numbers, most recently purchased first.
    async fn active_native_numbers(&self) -> Result<Vec<ServiceNumber>, ApiError>;

    async fn find_native_number(&self, phone_number: &str) -> Result<Option<ServiceNumber>, ApiError>;

    /// Active trunk numbers whose trunk is also active.
    async fn active_trunk_numbers(&self) -> Result<Vec<TrunkNumber>, ApiError>;

    async fn find_trunk_number(&self, phone_number: &str) -> Result<Option<TrunkNumber>, ApiError>;

    async fn user_profile(&self) -> Result<UserProfile, ApiError>;

    /// Saved transfer destinations, the default one first.
    async fn transfer_targets(&self) -> Result<Vec<TransferTarget>, ApiError>;

    /// The user's latest call records, newest first.
    async fn recent_calls(&self, limit: usize) -> Result<Vec<CallHistoryEntry>, ApiError>;
}

/// One-shot reads of a call record's status.
#[async_trait]
pub trait CallRecordSource: Send + Sync {
    async fn fetch_status(&self, call_record_id: &str) -> Result<Option<CallRecordStatus>, ApiError>;
}

/// Push notifications for call record status changes.
#[async_trait]
pub trait RealtimeFeed: Send + Sync {
    async fn subscribe(&self, call_record_id: &str) -> Result<StatusStream, ApiError>;
}

/// Status updates for one call record. Dropping the stream unsubscribes.
#[derive(Debug)]
pub struct StatusStream {
    updates: mpsc::Receiver<CallRecordStatus>,
    cancel: CancellationToken,
}

impl StatusStream {
    pub fn new(updates: mpsc::Receiver<CallRecordStatus>, cancel: CancellationToken) -> Self {
        Self { updates, cancel }
    }

    /// Next status, or `None` once the feed has closed.
    pub async fn recv(&mut self) -> Option<CallRecordStatus> {
        self.updates.recv().await
    }

    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.updates.close();
    }
}

impl Drop for StatusStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
