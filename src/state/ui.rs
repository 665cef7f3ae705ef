use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::CallRecordStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub notification_type: NotificationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationType {
    pub fn label(&self) -> &str {
        match self {
            NotificationType::Success => "ok",
            NotificationType::Error => "error",
            NotificationType::Warning => "warning",
            NotificationType::Info => "info",
        }
    }
}

/// What ended a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndSource {
    Realtime,
    Polling,
    Softphone,
    UserHangup,
    Transfer,
}

/// Everything the dialer tells the surrounding UI besides its state.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Notification(Notification),
    /// Show the buy-credits prompt.
    InsufficientCredits,
    OwnNumberBlocked { number: String },
    LowBalance { balance: f64 },
    CallEnded {
        session_id: Uuid,
        status: Option<CallRecordStatus>,
        source: EndSource,
    },
}

/// Fan-out of notices to whoever is listening. Sending with no listeners is
/// not an error.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn emit(&self, notice: Notice) {
        debug!("Notice: {:?}", notice);
        let _ = self.tx.send(notice);
    }

    pub fn show(&self, message: &str, notification_type: NotificationType) {
        self.emit(Notice::Notification(Notification {
            message: message.to_string(),
            notification_type,
        }));
    }
}
