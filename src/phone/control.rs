//! Routing of in-call controls to the backend that owns the call.

use crate::phone::EstablishmentStrategy;
use crate::state::BackendCallHandle;

/// Where a mute toggle goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteTarget {
    SipClient,
    TrunkClient,
    /// Server-bridged audio; mute is a UI flag only.
    LocalOnly,
}

pub fn mute_target(strategy: EstablishmentStrategy) -> MuteTarget {
    match strategy {
        EstablishmentStrategy::DirectSip => MuteTarget::SipClient,
        EstablishmentStrategy::DirectExternalTrunk => MuteTarget::TrunkClient,
        EstablishmentStrategy::BridgedAgent | EstablishmentStrategy::Callback => MuteTarget::LocalOnly,
    }
}

/// How a transfer request is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferRoute {
    /// Redirect the server-placed call by sid.
    Signaling { call_sid: String },
    /// Ask the platform to transfer the user's live SIP leg.
    Sip,
}

/// Pick a transfer route: a call sid wins, then a live SIP session.
pub fn transfer_route(handle: Option<&BackendCallHandle>, sip_call_active: bool) -> Option<TransferRoute> {
    match handle {
        Some(BackendCallHandle::Signaling { call_sid }) => Some(TransferRoute::Signaling {
            call_sid: call_sid.clone(),
        }),
        Some(BackendCallHandle::SipSession(_)) if sip_call_active => Some(TransferRoute::Sip),
        _ => None,
    }
}
