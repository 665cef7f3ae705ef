//! How an outbound call gets established.

use serde::{Deserialize, Serialize};

use crate::models::CallerIdCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstablishmentStrategy {
    /// An AI agent places the call server-side and bridges the destination.
    BridgedAgent,
    /// The platform rings the user's own phone, then bridges the destination.
    Callback,
    /// The user's in-app SIP endpoint dials the destination.
    DirectSip,
    /// A customer-owned trunk's client dials the destination.
    DirectExternalTrunk,
}

impl EstablishmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstablishmentStrategy::BridgedAgent => "bridged_agent",
            EstablishmentStrategy::Callback => "callback",
            EstablishmentStrategy::DirectSip => "direct_sip",
            EstablishmentStrategy::DirectExternalTrunk => "direct_external_trunk",
        }
    }

    /// Server-side strategies leave a call record to reconcile against.
    pub fn has_call_record(&self) -> bool {
        matches!(
            self,
            EstablishmentStrategy::BridgedAgent | EstablishmentStrategy::Callback
        )
    }
}

impl std::fmt::Display for EstablishmentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Choose the strategy. A trunk caller id always wins; otherwise agent mode
/// beats SIP mode, and callback is the fallback.
pub fn select_strategy(
    agent_mode: bool,
    sip_mode: bool,
    is_external_trunk_call: bool,
) -> EstablishmentStrategy {
    if is_external_trunk_call {
        EstablishmentStrategy::DirectExternalTrunk
    } else if agent_mode {
        EstablishmentStrategy::BridgedAgent
    } else if sip_mode {
        EstablishmentStrategy::DirectSip
    } else {
        EstablishmentStrategy::Callback
    }
}

/// The dialer's agent/SIP mode switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallModeToggles {
    pub agent_mode: bool,
    pub sip_mode: bool,
}

impl CallModeToggles {
    pub fn new(agent_mode: bool, sip_mode: bool) -> Self {
        Self { agent_mode, sip_mode }
    }

    /// Picking a trunk number turns agent mode off and SIP mode on: trunk
    /// calls always dial from a local client.
    pub fn select_caller_id(&mut self, candidate: &CallerIdCandidate) {
        if candidate.is_external_trunk() {
            self.agent_mode = false;
            self.sip_mode = true;
        }
    }

    pub fn strategy_for(&self, is_external_trunk_call: bool) -> EstablishmentStrategy {
        select_strategy(self.agent_mode, self.sip_mode, is_external_trunk_call)
    }
}
