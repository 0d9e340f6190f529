//! Error taxonomy for authorization, refresh and interactive authentication.
//!
//! Every fallible operation in this crate funnels into [`IdentityError`].
//! Transport and parsing failures inside the refresh step are translated
//! here and handled by the manager's state machine; they only surface to the
//! caller when no recovery path remains.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// OAuth 2.0 error response from an authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., `invalid_grant`)
    pub error: String,

    /// Human-readable description of the failure
    #[serde(default)]
    pub error_description: Option<String>,

    /// URI pointing at documentation for the failure
    #[serde(default)]
    pub error_uri: Option<String>,
}

impl ErrorResponse {
    /// Create an error response carrying only an error code.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), error_description: None, error_uri: None }
    }

    /// Attach a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for ErrorResponse {}

/// Error type for identity and authorization operations
///
/// Callers of [`authorize`](crate::manager::IdentityManager::authorize)
/// either receive a fully authorized request or one of these errors; the
/// original request is never modified on failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No credential is available and none can be obtained without user
    /// interaction
    #[error("no credential available to authorize the request")]
    NoCredential,

    /// The token grant body could not be parsed into an access token
    /// response
    #[error("invalid access token response: {0}")]
    InvalidResponse(String),

    /// Transport-level failure; retryable by the caller
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The server rejected the credentials or grant
    #[error("authentication failed: {0}")]
    AuthenticationFailed(ErrorResponse),

    /// The user aborted the interactive flow; terminal for that call
    #[error("interactive authentication was cancelled")]
    InteractiveAuthCancelled,

    /// Invalid client or provider configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IdentityError {
    /// Whether retrying the failed operation unchanged can succeed.
    ///
    /// Only transport failures qualify; a rejected grant or a cancelled
    /// login will not heal on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }
}
