//! Standardized interpretation of engine exits and management API responses

use crate::engine::EngineOutput;
use crate::error::{ReplicationError, Result};
use crate::registry::provisioner::ProvisionOutcome;
use reqwest::StatusCode;

/// Phrases the engine prints when an image or manifest does not exist
const NOT_FOUND_PHRASES: &[&str] = &["not found", "manifest unknown", "no such image"];

/// Phrase in a 400 body meaning the repository is already there
const ALREADY_EXISTS_PHRASE: &str = "already exists";

/// Classification of container engine exits
pub struct EngineErrorHandler;

impl EngineErrorHandler {
    /// `None` for a clean exit, otherwise the classified failure
    pub fn classify(command: &str, output: &EngineOutput) -> Option<ReplicationError> {
        if output.is_success() {
            return None;
        }

        let message = output.error_message();
        let lowered = message.to_lowercase();
        let exit = output
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());

        if NOT_FOUND_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
            return Some(ReplicationError::NotFound(format!(
                "{} (exit {}): {}",
                command, exit, message
            )));
        }

        Some(ReplicationError::Transient(format!(
            "{} (exit {}): {}",
            command, exit, message
        )))
    }
}

/// Standard error handler for management API responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Interpret a repository creation response
    pub fn classify_repository_creation(
        status: StatusCode,
        body: &str,
        repository: &str,
    ) -> Result<ProvisionOutcome> {
        match status.as_u16() {
            201 => Ok(ProvisionOutcome::Created),
            400 if body.to_lowercase().contains(ALREADY_EXISTS_PHRASE) => {
                Ok(ProvisionOutcome::AlreadyExists)
            }
            400 => Err(ReplicationError::Transient(format!(
                "Bad request creating {}: {}",
                repository,
                body.trim()
            ))),
            401 => Err(ReplicationError::Auth(format!(
                "Authentication failed creating {} - check API token",
                repository
            ))),
            403 => Err(ReplicationError::Auth(format!(
                "Permission denied creating {} - insufficient privileges",
                repository
            ))),
            code => Err(ReplicationError::Transient(format!(
                "Unexpected HTTP code {} creating {}: {}",
                code,
                repository,
                body.trim()
            ))),
        }
    }

    /// Map a non-success listing response to an error
    pub fn handle_listing_error(status: StatusCode, body: &str, context: &str) -> ReplicationError {
        match status.as_u16() {
            401 => ReplicationError::Auth(format!("Unauthorized during {}: {}", context, body)),
            403 => ReplicationError::Auth(format!(
                "Forbidden: insufficient permissions for {}: {}",
                context, body
            )),
            404 => ReplicationError::NotFound(format!("Resource not found for {}: {}", context, body)),
            _ => ReplicationError::Transient(format!(
                "{} failed (status {}): {}",
                context, status, body
            )),
        }
    }
}

/// Network error categorization
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> ReplicationError {
        if error.is_timeout() {
            ReplicationError::Timeout(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            ReplicationError::Transient(format!("Connection error during {}: {}", context, error))
        } else if error.is_decode() {
            ReplicationError::Parse(format!("Failed to decode {} response: {}", context, error))
        } else {
            ReplicationError::Transient(format!("{} network error: {}", context, error))
        }
    }
}
