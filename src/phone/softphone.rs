//! Local softphone clients: the user's SIP endpoint and the external trunk
//! client.
//!
//! Both are loaded on first use and registered lazily. Call lifecycle
//! callbacks are delivered through [`CallHooks`], which tags each event with
//! the session it belongs to so the dialer can drop events from calls that
//! have already ended.

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::models::SipCredentials;
use crate::phone::DialerEvent;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SoftphoneError {
    #[error("Registration failed: {0}")]
    Registration(String),
    #[error("Call failed: {0}")]
    CallFailed(String),
    #[error("Softphone not ready")]
    NotReady,
}

/// What a client needs to come online.
#[derive(Debug, Clone, PartialEq)]
pub enum SoftphoneCredentials {
    Sip(SipCredentials),
    Trunk { trunk_id: String },
}

/// Lifecycle of a locally placed call.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Progress,
    Accepted,
    Ended,
    Failed(String),
}

/// Callback sink handed to a client when it places a call.
#[derive(Debug, Clone)]
pub struct CallHooks {
    session_id: Uuid,
    events: mpsc::UnboundedSender<DialerEvent>,
}

impl CallHooks {
    pub(crate) fn new(session_id: Uuid, events: mpsc::UnboundedSender<DialerEvent>) -> Self {
        Self { session_id, events }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(DialerEvent::Media {
            session_id: self.session_id,
            event,
        });
    }

    pub fn progress(&self) {
        self.emit(MediaEvent::Progress);
    }

    pub fn accepted(&self) {
        self.emit(MediaEvent::Accepted);
    }

    pub fn ended(&self) {
        self.emit(MediaEvent::Ended);
    }

    pub fn failed(&self, cause: impl Into<String>) {
        self.emit(MediaEvent::Failed(cause.into()));
    }
}

/// A call placed by a softphone client.
pub trait SoftphoneSession: Send + Sync {
    fn terminate(&self);
}

#[async_trait]
pub trait Softphone: Send + Sync {
    async fn initialize(&self, credentials: &SoftphoneCredentials) -> Result<(), SoftphoneError>;

    fn is_registered(&self) -> bool;

    async fn make_call(
        &self,
        destination: &str,
        caller_id: &str,
        display_name: &str,
        hooks: CallHooks,
    ) -> Result<Box<dyn SoftphoneSession>, SoftphoneError>;

    fn set_mute(&self, muted: bool);

    fn hangup(&self);

    fn is_call_active(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// The client has not been loaded yet.
    NotLoaded,
    Registered,
    Unregistered,
}

impl RegistrationStatus {
    pub fn display_status(&self) -> &str {
        match self {
            RegistrationStatus::NotLoaded => "Not Loaded",
            RegistrationStatus::Registered => "Phone Ready",
            RegistrationStatus::Unregistered => "Disconnected",
        }
    }
}

pub type SoftphoneFactory = Box<dyn Fn() -> Arc<dyn Softphone> + Send + Sync>;

/// Lazily loaded, shared softphone client.
pub struct SoftphoneHandle {
    name: &'static str,
    factory: SoftphoneFactory,
    client: OnceLock<Arc<dyn Softphone>>,
}

impl SoftphoneHandle {
    pub fn new(name: &'static str, factory: SoftphoneFactory) -> Self {
        Self {
            name,
            factory,
            client: OnceLock::new(),
        }
    }

    /// The client, if something has already loaded it.
    pub fn loaded(&self) -> Option<&Arc<dyn Softphone>> {
        self.client.get()
    }

    /// The client, loading it on first use.
    pub fn get(&self) -> &Arc<dyn Softphone> {
        self.client.get_or_init(|| {
            info!("Loading {} client", self.name);
            (self.factory)()
        })
    }

    /// Load the client and register it if it is not registered yet. A
    /// client that accepts the credentials but does not come up registered
    /// is not ready to place calls.
    pub async fn ensure_registered(
        &self,
        credentials: &SoftphoneCredentials,
    ) -> Result<Arc<dyn Softphone>, SoftphoneError> {
        let client = self.get().clone();
        if !client.is_registered() {
            info!("Registering {} client", self.name);
            client.initialize(credentials).await?;
            if !client.is_registered() {
                return Err(SoftphoneError::NotReady);
            }
        }
        Ok(client)
    }

    pub fn status(&self) -> RegistrationStatus {
        match self.loaded() {
            None => RegistrationStatus::NotLoaded,
            Some(client) if client.is_registered() => RegistrationStatus::Registered,
            Some(_) => RegistrationStatus::Unregistered,
        }
    }
}

impl std::fmt::Debug for SoftphoneHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftphoneHandle")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::fakes::FakeSoftphone;

    #[tokio::test]
    async fn test_client_loads_once_and_registers_lazily() {
        let fake = Arc::new(FakeSoftphone::default());
        let for_factory = fake.clone();
        let handle = SoftphoneHandle::new("sip", Box::new(move || for_factory.clone() as Arc<dyn Softphone>));

        assert_eq!(handle.status(), RegistrationStatus::NotLoaded);

        let credentials = SoftphoneCredentials::Trunk {
            trunk_id: "trunk-1".to_string(),
        };
        handle.ensure_registered(&credentials).await.unwrap();
        handle.ensure_registered(&credentials).await.unwrap();

        assert_eq!(handle.status(), RegistrationStatus::Registered);
        assert_eq!(fake.calls(), vec!["initialize".to_string()]);
    }

    #[tokio::test]
    async fn test_registration_failure_is_reported() {
        let fake = Arc::new(FakeSoftphone::failing_registration("bad password"));
        let for_factory = fake.clone();
        let handle = SoftphoneHandle::new("sip", Box::new(move || for_factory.clone() as Arc<dyn Softphone>));

        let credentials = SoftphoneCredentials::Trunk {
            trunk_id: "trunk-1".to_string(),
        };
        let err = handle.ensure_registered(&credentials).await.err().unwrap();
        assert_eq!(err, SoftphoneError::Registration("bad password".to_string()));
        assert_eq!(handle.status(), RegistrationStatus::Unregistered);
    }

    #[tokio::test]
    async fn test_client_that_never_registers_is_not_ready() {
        let fake = Arc::new(FakeSoftphone::never_registering());
        let for_factory = fake.clone();
        let handle = SoftphoneHandle::new("trunk", Box::new(move || for_factory.clone() as Arc<dyn Softphone>));

        let credentials = SoftphoneCredentials::Trunk {
            trunk_id: "trunk-1".to_string(),
        };
        let err = handle.ensure_registered(&credentials).await.err().unwrap();
        assert_eq!(err, SoftphoneError::NotReady);
    }
}
