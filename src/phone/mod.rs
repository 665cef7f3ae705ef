//! Outbound call orchestration.
//!
//! The [`Dialer`] owns the single active call session. It resolves the
//! caller id, picks how the call is established, drives the call state
//! machine from softphone callbacks and call record updates, and routes
//! mute, transfer and hang-up requests to whichever backend owns the call.

pub mod context;
pub mod control;
pub mod dialer;
pub mod history;
pub mod mode;
pub mod normalize;
pub mod ports;
pub mod reconcile;
pub mod resolver;
pub mod softphone;
pub mod strategy;

#[cfg(test)]
pub(crate) mod fakes;

use thiserror::Error;

pub use context::{CallPurpose, PendingCallStore, PurposePrompt};
pub use dialer::{CallRequest, Dialer, DialerCommand, DialerEvent, DialerHandle, DialerParts, DialerTimings};
pub use mode::{select_strategy, CallModeToggles, EstablishmentStrategy};
pub use ports::{CallBackend, CallRecordSource, NumberDirectory, RealtimeFeed, StatusStream};
pub use softphone::{
    CallHooks, MediaEvent, RegistrationStatus, Softphone, SoftphoneCredentials, SoftphoneError,
    SoftphoneHandle, SoftphoneSession,
};

/// Why a dialer operation did not go through.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DialError {
    #[error("No active phone number found. Please purchase a number first.")]
    NoActiveNumber,
    #[error("Selected number not found or inactive: {0}")]
    NumberNotFound(String),
    #[error("Cannot call your own number ({0})")]
    OwnNumberBlocked(String),
    #[error("Insufficient credits")]
    InsufficientCredits,
    #[error("Failed to initiate call: {0}")]
    EstablishmentFailed(String),
    #[error("No active call to transfer")]
    NoActiveCallToTransfer,
    #[error("SIP registration failed: {0}")]
    SipRegistrationFailed(String),
    #[error("A call is already in progress")]
    CallInProgress,
    #[error("Call cancelled")]
    Cancelled,
    #[error("Invalid phone number: {0:?}")]
    InvalidNumber(String),
    #[error("Transfer failed: {0}")]
    TransferFailed(String),
}
