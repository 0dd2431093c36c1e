use thiserror::Error;

/// Main error type for the order watcher
#[derive(Error, Debug)]
pub enum WatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Credential errors
    #[error("Secret unavailable: {name} - {reason}")]
    SecretUnavailable { name: String, reason: String },

    // Upstream order API errors
    #[error("Order API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Order API returned malformed response: {0}")]
    UpstreamMalformed(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Ledger errors
    #[error("Failed to read alert ledger: {0}")]
    LedgerRead(String),

    #[error("Failed to write alert ledger: {0}")]
    LedgerWrite(String),

    // Notification errors
    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for WatchError
pub type Result<T> = std::result::Result<T, WatchError>;

/// Coarse error classification used by the cycle orchestrator to decide
/// whether a stage failure aborts the cycle or falls back to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    SecretUnavailable,
    UpstreamUnavailable,
    UpstreamMalformed,
    LedgerReadFailure,
    LedgerWriteFailure,
    NotificationDeliveryFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::SecretUnavailable => "secret_unavailable",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamMalformed => "upstream_malformed",
            ErrorKind::LedgerReadFailure => "ledger_read_failure",
            ErrorKind::LedgerWriteFailure => "ledger_write_failure",
            ErrorKind::NotificationDeliveryFailure => "notification_delivery_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl WatchError {
    pub fn secret_unavailable(name: &str, reason: impl std::fmt::Display) -> Self {
        WatchError::SecretUnavailable {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchError::Config(_) | WatchError::InvalidConfig(_) => ErrorKind::Configuration,
            WatchError::SecretUnavailable { .. } => ErrorKind::SecretUnavailable,
            WatchError::UpstreamUnavailable(_) | WatchError::Http(_) => {
                ErrorKind::UpstreamUnavailable
            }
            WatchError::UpstreamMalformed(_) | WatchError::Json(_) => ErrorKind::UpstreamMalformed,
            WatchError::LedgerRead(_) => ErrorKind::LedgerReadFailure,
            WatchError::LedgerWrite(_) => ErrorKind::LedgerWriteFailure,
            WatchError::NotificationDelivery(_) => ErrorKind::NotificationDeliveryFailure,
            WatchError::Storage(_)
            | WatchError::Io(_)
            | WatchError::Internal(_)
            | WatchError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Only initialization failures abort a cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::SecretUnavailable
        )
    }
}
