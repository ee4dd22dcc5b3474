//! Error types and handlers for replication operations
//!
//! Every failure carries a stable code token (see [`ReplicationError::code`]) so
//! operators can grep run logs for a specific condition.

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplicationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// Task-level input problems (source not allow-listed, unknown target, bad reference)
    #[error("Validation error: {0}")]
    Validation(String),
    /// Static configuration problems detected before any task runs
    #[error("Configuration error: {0}")]
    Config(String),
    /// 401/403 from the management API; retrying cannot help
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Engine reports the image or manifest is absent
    #[error("Not found: {0}")]
    NotFound(String),
    /// Engine or API call exceeded its timeout
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Unclassified non-zero exits and unexpected HTTP codes
    #[error("Transient error: {0}")]
    Transient(String),
    /// Post-push existence check failed
    #[error("Verification error: {0}")]
    Verification(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Interrupted by user")]
    Interrupted,
}

impl ReplicationError {
    /// Stable token used in log lines for this class of failure
    pub fn code(&self) -> &'static str {
        match self {
            ReplicationError::Validation(_) => "VALIDATION_FAILED",
            ReplicationError::Config(_) => "CONFIG_INVALID",
            ReplicationError::Auth(_) => "AUTH_FAILED",
            ReplicationError::NotFound(_) => "NOT_FOUND",
            ReplicationError::Timeout(_) => "TIMEOUT",
            ReplicationError::Transient(_) => "TRANSIENT",
            ReplicationError::Verification(_) => "VERIFY_FAILED",
            ReplicationError::Parse(_) => "PARSE_ERROR",
            ReplicationError::Io(_) => "IO_ERROR",
            ReplicationError::Interrupted => "USER_STOP",
        }
    }

    /// Only timeouts and unclassified failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReplicationError::Timeout(_) | ReplicationError::Transient(_)
        )
    }
}

impl From<std::io::Error> for ReplicationError {
    fn from(err: std::io::Error) -> Self {
        ReplicationError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ReplicationError {
    fn from(err: serde_json::Error) -> Self {
        ReplicationError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for ReplicationError {
    fn from(err: toml::de::Error) -> Self {
        ReplicationError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ReplicationError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "API request")
    }
}

impl From<url::ParseError> for ReplicationError {
    fn from(err: url::ParseError) -> Self {
        ReplicationError::Validation(err.to_string())
    }
}
