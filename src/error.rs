use thiserror::Error;

#[derive(Error, Debug)]
pub enum PingletError {
    #[error("Failed to load project configuration: {0}")]
    ConfigLoad(String),

    #[error("Malformed stream event: {0}")]
    MalformedEvent(String),

    #[error("Unsupported widget version: expected {expected}, running {running}")]
    UnsupportedVersion { expected: String, running: String },

    #[error("Missing checksum on the widget script tag")]
    MissingChecksum,

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Push subscription error: {0}")]
    Subscription(String),

    #[error("Request signing failed: {0}")]
    Signature(String),

    #[error("Widget already initialized on this page")]
    AlreadyInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// What a user-facing failure looks like once it reaches the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub message: String,
    /// Name of the event the retry button emits, if the failure is retryable.
    pub retry_event: Option<String>,
}

pub const RETRY_CONFIG_EVENT: &str = "pinglet:retry-config";
pub const RETRY_SUBSCRIBE_EVENT: &str = "pinglet:retry-subscribe";

impl PingletError {
    /// Popup for failures the page user should see. Internal failures
    /// (signing, transport noise, malformed single events) return `None`.
    pub fn user_popup(&self) -> Option<Popup> {
        let popup = match self {
            PingletError::ConfigLoad(msg) => Popup {
                title: "Notifications unavailable".to_string(),
                message: msg.clone(),
                retry_event: Some(RETRY_CONFIG_EVENT.to_string()),
            },
            PingletError::UnsupportedVersion { expected, .. } => Popup {
                title: "Unsupported widget version".to_string(),
                message: format!("Please update the Pinglet script to version {}", expected),
                retry_event: None,
            },
            PingletError::MissingChecksum => Popup {
                title: "Widget misconfigured".to_string(),
                message: "The Pinglet script tag is missing its data-checksum attribute".to_string(),
                retry_event: None,
            },
            PingletError::PermissionDenied => Popup {
                title: "Notifications blocked".to_string(),
                message: "You can re-enable notifications from your browser settings".to_string(),
                retry_event: None,
            },
            PingletError::Subscription(msg) => Popup {
                title: "Could not enable notifications".to_string(),
                message: msg.clone(),
                retry_event: Some(RETRY_SUBSCRIBE_EVENT.to_string()),
            },
            _ => return None,
        };
        Some(popup)
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PingletError::UnsupportedVersion { .. }
                | PingletError::MissingChecksum
                | PingletError::PermissionDenied
                | PingletError::AlreadyInitialized
        )
    }
}

impl From<anyhow::Error> for PingletError {
    fn from(err: anyhow::Error) -> Self {
        PingletError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PingletError>;
