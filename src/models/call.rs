use serde::{Deserialize, Serialize};

/// Status column of a `call_records` row, as written by the telephony webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallRecordStatus {
    Initiated,
    Queued,
    Ringing,
    InProgress,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    Canceled,
    /// Anything the webhooks write that we don't model explicitly.
    Other(String),
}

impl CallRecordStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CallRecordStatus::Initiated => "initiated",
            CallRecordStatus::Queued => "queued",
            CallRecordStatus::Ringing => "ringing",
            CallRecordStatus::InProgress => "in-progress",
            CallRecordStatus::Completed => "completed",
            CallRecordStatus::Failed => "failed",
            CallRecordStatus::Busy => "busy",
            CallRecordStatus::NoAnswer => "no-answer",
            CallRecordStatus::Canceled => "canceled",
            CallRecordStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            CallRecordStatus::Initiated | CallRecordStatus::Queued => "Dialing...",
            CallRecordStatus::Ringing => "Ringing",
            CallRecordStatus::InProgress => "Connected",
            CallRecordStatus::Completed => "Completed",
            CallRecordStatus::Failed => "Failed",
            CallRecordStatus::Busy => "Busy",
            CallRecordStatus::NoAnswer => "No Answer",
            CallRecordStatus::Canceled => "Canceled",
            CallRecordStatus::Other(raw) => raw.as_str(),
        }
    }

    /// The call is over; no further status will follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallRecordStatus::Completed
                | CallRecordStatus::Failed
                | CallRecordStatus::Busy
                | CallRecordStatus::NoAnswer
                | CallRecordStatus::Canceled
        )
    }

    /// The destination leg has been answered.
    pub fn is_answered(&self) -> bool {
        matches!(self, CallRecordStatus::InProgress)
    }
}

impl From<&str> for CallRecordStatus {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "initiated" => CallRecordStatus::Initiated,
            "queued" => CallRecordStatus::Queued,
            "ringing" => CallRecordStatus::Ringing,
            "in-progress" | "in_progress" => CallRecordStatus::InProgress,
            "completed" => CallRecordStatus::Completed,
            "failed" => CallRecordStatus::Failed,
            "busy" => CallRecordStatus::Busy,
            "no-answer" | "no_answer" => CallRecordStatus::NoAnswer,
            "canceled" => CallRecordStatus::Canceled,
            _ => CallRecordStatus::Other(raw.to_string()),
        }
    }
}

impl From<String> for CallRecordStatus {
    fn from(raw: String) -> Self {
        CallRecordStatus::from(raw.as_str())
    }
}

impl From<CallRecordStatus> for String {
    fn from(status: CallRecordStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for CallRecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Projection of a `call_records` row used for status reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: String,
    pub status: CallRecordStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgedCallRequest {
    pub phone_number: String,
    pub caller_id: String,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackCallRequest {
    pub destination_number: String,
    pub caller_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerminateCallRequest {
    pub call_sid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferCallRequest {
    pub call_sid: String,
    pub target_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SipTransferRequest {
    pub sip_username: String,
    pub target_number: String,
    pub current_to_number: String,
}

/// Response of `initiate-bridged-call` and `initiate-callback-call`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitiatedCall {
    pub call_sid: String,
    pub call_record_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
