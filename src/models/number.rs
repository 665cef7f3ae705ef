use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which telephony backend owns a provisioned number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOwner {
    /// Numbers bought through the product (`service_numbers`).
    Native,
    /// Numbers on a customer-owned SIP trunk (`external_sip_numbers`).
    ExternalTrunk,
}

/// A number the user may present as caller id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdCandidate {
    pub phone_number: String,
    pub backend_owner: BackendOwner,
    pub trunk_id: Option<String>,
    pub label: String,
}

impl CallerIdCandidate {
    pub fn native(phone_number: &str) -> Self {
        Self {
            phone_number: phone_number.to_string(),
            backend_owner: BackendOwner::Native,
            trunk_id: None,
            label: phone_number.to_string(),
        }
    }

    pub fn is_external_trunk(&self) -> bool {
        self.backend_owner == BackendOwner::ExternalTrunk
    }
}

/// Row from `service_numbers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNumber {
    pub phone_number: String,
    #[serde(default)]
    pub purchased_at: Option<DateTime<Utc>>,
}

/// Row from `external_sip_trunks`, embedded in a trunk number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTrunk {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub is_active: bool,
}

/// Row from `external_sip_numbers` with its owning trunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrunkNumber {
    pub phone_number: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(rename = "external_sip_trunks")]
    pub trunk: ExternalTrunk,
}

impl TrunkNumber {
    pub fn to_candidate(&self) -> CallerIdCandidate {
        let trunk_name = self.trunk.name.as_deref().unwrap_or("External");
        CallerIdCandidate {
            phone_number: self.phone_number.clone(),
            backend_owner: BackendOwner::ExternalTrunk,
            trunk_id: Some(self.trunk.id.clone()),
            label: format!("{} ({})", self.phone_number, trunk_name),
        }
    }
}

/// The slice of the `users` row the dialer needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    /// The user's personal phone, rung first by callback calls.
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub sip_username: Option<String>,
    #[serde(default)]
    pub sip_password: Option<String>,
    #[serde(default)]
    pub sip_realm: Option<String>,
    #[serde(default)]
    pub sip_ws_server: Option<String>,
    #[serde(default)]
    pub credits_balance: Option<f64>,
}

impl UserProfile {
    /// SIP endpoint credentials, if the account has a complete set.
    pub fn sip_credentials(&self) -> Option<SipCredentials> {
        let username = self.sip_username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.sip_password.as_deref().filter(|p| !p.is_empty())?;
        Some(SipCredentials {
            username: username.to_string(),
            password: password.to_string(),
            domain: self.sip_realm.clone().unwrap_or_default(),
            ws_server: self.sip_ws_server.clone().unwrap_or_default(),
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SipCredentials {
    pub username: String,
    pub password: String,
    pub domain: String,
    pub ws_server: String,
}

impl SipCredentials {
    pub fn uri(&self) -> String {
        format!("sip:{}@{}", self.username, self.domain)
    }
}

impl std::fmt::Debug for SipCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipCredentials")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("ws_server", &self.ws_server)
            .finish_non_exhaustive()
    }
}

/// Row from `transfer_numbers`: a saved destination for call transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTarget {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub phone_number: String,
}

impl TransferTarget {
    pub fn display_label(&self) -> String {
        match self.label.as_deref().filter(|l| !l.trim().is_empty()) {
            Some(label) => format!("{} ({})", label, self.phone_number),
            None => self.phone_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inbound" => Some(CallDirection::Inbound),
            "outbound" => Some(CallDirection::Outbound),
            _ => None,
        }
    }
}

/// The columns of a `call_records` row used to suggest recent numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHistoryEntry {
    #[serde(default)]
    pub caller_number: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl CallHistoryEntry {
    pub fn direction(&self) -> Option<CallDirection> {
        self.direction.as_deref().and_then(CallDirection::parse)
    }

    /// The other party: who we called, or who called us.
    pub fn counterpart(&self) -> Option<&str> {
        let number = match self.direction() {
            Some(CallDirection::Outbound) => self.contact_phone.as_deref(),
            _ => self.caller_number.as_deref(),
        };
        number.filter(|n| !n.trim().is_empty())
    }
}

/// A number the user talked to recently, offered as a quick redial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentNumber {
    pub phone_number: String,
    pub direction: Option<CallDirection>,
    pub last_call_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trunk_number_row_to_candidate() {
        let row: TrunkNumber = serde_json::from_str(
            r#"{
                "phone_number": "+16045550000",
                "friendly_name": null,
                "external_sip_trunks": {"id": "trunk-1", "name": "Twilio", "is_active": true}
            }"#,
        )
        .unwrap();

        let candidate = row.to_candidate();
        assert!(candidate.is_external_trunk());
        assert_eq!(candidate.trunk_id.as_deref(), Some("trunk-1"));
        assert_eq!(candidate.label, "+16045550000 (Twilio)");
    }

    #[test]
    fn test_sip_credentials_require_username_and_password() {
        let mut profile = UserProfile {
            sip_username: Some("user42".to_string()),
            sip_password: Some(String::new()),
            sip_realm: Some("example.signalwire.com".to_string()),
            ..Default::default()
        };
        assert!(profile.sip_credentials().is_none());

        profile.sip_password = Some("secret".to_string());
        let creds = profile.sip_credentials().unwrap();
        assert_eq!(creds.uri(), "sip:user42@example.signalwire.com");
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_history_counterpart_follows_direction() {
        let outbound: CallHistoryEntry = serde_json::from_str(
            r#"{"caller_number": "+16045550000", "contact_phone": "+16045551234",
                "direction": "outbound", "started_at": "2025-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(outbound.counterpart(), Some("+16045551234"));

        let inbound: CallHistoryEntry = serde_json::from_str(
            r#"{"caller_number": "+16045554321", "contact_phone": null, "direction": "inbound"}"#,
        )
        .unwrap();
        assert_eq!(inbound.counterpart(), Some("+16045554321"));

        let blank: CallHistoryEntry =
            serde_json::from_str(r#"{"contact_phone": "", "direction": "outbound"}"#).unwrap();
        assert_eq!(blank.counterpart(), None);
    }

    #[test]
    fn test_transfer_target_label() {
        let mut target = TransferTarget {
            id: "t-1".to_string(),
            label: Some("Front desk".to_string()),
            phone_number: "+16045552222".to_string(),
        };
        assert_eq!(target.display_label(), "Front desk (+16045552222)");
        target.label = None;
        assert_eq!(target.display_label(), "+16045552222");
    }
}
