//! Purpose/goal context for agent calls.
//!
//! An assistant conversation can stash the purpose of a call before the
//! dial button is pressed; the stash is consumed by the next agent call as
//! long as it has not gone stale. Otherwise the user is prompted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallPurpose {
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<String>,
}

impl CallPurpose {
    pub fn new(purpose: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            purpose: Some(purpose.into()),
            goal: Some(goal.into()),
            template_id: None,
        }
    }

    /// Carries a purpose or a goal.
    pub fn has_context(&self) -> bool {
        self.purpose.is_some() || self.goal.is_some()
    }
}

/// Asks the user what an agent call is for. `None` means they backed out.
#[async_trait]
pub trait PurposePrompt: Send + Sync {
    async fn collect(&self, destination: &str) -> Option<CallPurpose>;
}

#[derive(Debug)]
struct PendingCall {
    purpose: CallPurpose,
    stashed_at: DateTime<Utc>,
}

/// Single-slot stash for call context with an expiry.
#[derive(Debug)]
pub struct PendingCallStore {
    ttl: Duration,
    slot: Mutex<Option<PendingCall>>,
}

impl PendingCallStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn stash(&self, purpose: CallPurpose) {
        self.stash_at(purpose, Utc::now());
    }

    pub fn stash_at(&self, purpose: CallPurpose, stashed_at: DateTime<Utc>) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(PendingCall { purpose, stashed_at });
    }

    /// Consume the stash if it is still fresh and says what the call is for.
    /// Anything else is discarded.
    pub fn take(&self) -> Option<CallPurpose> {
        self.take_at(Utc::now())
    }

    pub fn take_at(&self, now: DateTime<Utc>) -> Option<CallPurpose> {
        let pending = self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()?;

        let age = now.signed_duration_since(pending.stashed_at);
        let fresh = age.to_std().map(|age| age <= self.ttl).unwrap_or(true);
        if !fresh {
            debug!("Discarding stale call context stashed at {}", pending.stashed_at);
            return None;
        }
        Some(pending.purpose).filter(CallPurpose::has_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_fresh_context() {
        let store = PendingCallStore::new(Duration::from_secs(300));
        store.stash(CallPurpose::new("Reservation", "Book a table for two"));

        let taken = store.take().unwrap();
        assert_eq!(taken.goal.as_deref(), Some("Book a table for two"));
        assert!(store.take().is_none());
    }

    #[test]
    fn test_stale_context_is_discarded() {
        let store = PendingCallStore::new(Duration::from_secs(300));
        let now = Utc::now();
        store.stash_at(CallPurpose::new("Reservation", "Book"), now - chrono::Duration::seconds(301));

        assert!(store.take_at(now).is_none());
        assert!(store.take_at(now).is_none());
    }

    #[test]
    fn test_context_without_purpose_or_goal_is_ignored() {
        let store = PendingCallStore::new(Duration::from_secs(300));
        store.stash(CallPurpose {
            template_id: Some("tpl-1".to_string()),
            ..Default::default()
        });
        assert!(store.take().is_none());
    }

    #[test]
    fn test_restash_replaces_previous() {
        let store = PendingCallStore::new(Duration::from_secs(300));
        store.stash(CallPurpose::new("First", "one"));
        store.stash(CallPurpose::new("Second", "two"));
        assert_eq!(store.take().unwrap().purpose.as_deref(), Some("Second"));
    }
}
