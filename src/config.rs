//! Dialer Configuration
//!
//! Connection settings for the Supabase project and timing knobs for the
//! call orchestrator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dialer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialerConfig {
    /// Project URL (e.g., "https://abcd.supabase.co")
    pub supabase_url: String,

    /// Anonymous API key sent as `apikey`
    pub anon_key: String,

    /// The signed-in user's access token
    #[serde(skip_serializing)]
    pub access_token: String,

    /// Authenticated account id, used to scope number and profile lookups
    pub user_id: String,

    /// Realtime websocket endpoint
    pub realtime_url: String,

    /// Call record polling period while a bridged/callback call is live
    pub poll_interval_ms: u64,

    /// Confirmation delay between a successful transfer and returning to idle
    pub transfer_settle_ms: u64,

    /// How long a stashed purpose/goal stays usable
    pub pending_context_ttl_secs: u64,

    /// HTTP request timeout
    pub request_timeout_secs: u64,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            anon_key: String::new(),
            access_token: String::new(),
            user_id: String::new(),
            realtime_url: String::new(),
            poll_interval_ms: 2000,
            transfer_settle_ms: 1500,
            pending_context_ttl_secs: 300,
            request_timeout_secs: 30,
        }
    }
}

impl DialerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Option<Self> {
        let supabase_url = std::env::var("SUPABASE_URL").ok()?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY").ok()?;
        let access_token = std::env::var("SUPABASE_ACCESS_TOKEN").ok()?;
        let user_id = std::env::var("DIALER_USER_ID").ok()?;

        let supabase_url = supabase_url.trim_end_matches('/').to_string();
        let realtime_url = std::env::var("SUPABASE_REALTIME_URL")
            .unwrap_or_else(|_| realtime_url_for(&supabase_url));

        let defaults = Self::default();

        Some(Self {
            supabase_url,
            anon_key,
            access_token,
            user_id,
            realtime_url,
            poll_interval_ms: env_u64("DIALER_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval_ms),
            transfer_settle_ms: env_u64("DIALER_TRANSFER_SETTLE_MS")
                .unwrap_or(defaults.transfer_settle_ms),
            pending_context_ttl_secs: env_u64("DIALER_PENDING_CONTEXT_TTL_SECS")
                .unwrap_or(defaults.pending_context_ttl_secs),
            request_timeout_secs: env_u64("DIALER_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.supabase_url.is_empty() {
            return Err("Supabase URL is required".to_string());
        }
        if self.anon_key.is_empty() {
            return Err("Supabase anon key is required".to_string());
        }
        if self.access_token.is_empty() {
            return Err("Access token is required".to_string());
        }
        if self.user_id.is_empty() {
            return Err("User id is required".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be positive".to_string());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn transfer_settle_delay(&self) -> Duration {
        Duration::from_millis(self.transfer_settle_ms)
    }

    pub fn pending_context_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_context_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL for edge functions
    pub fn functions_url(&self) -> String {
        format!("{}/functions/v1", self.supabase_url)
    }

    /// Base URL for PostgREST
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Derive the realtime websocket endpoint from the project URL.
fn realtime_url_for(supabase_url: &str) -> String {
    let ws_base = if let Some(rest) = supabase_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = supabase_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        supabase_url.to_string()
    };
    format!("{}/realtime/v1/websocket", ws_base)
}
