//! Unified error types for railchat.
//!
//! This module provides the error hierarchy covering:
//! - Remote completion failures (authentication, rate limiting, transport)
//! - Guardrail check failures
//! - Startup misconfiguration (duplicate or unknown checks)

use std::fmt;
use std::time::Duration;

use crate::guardrail::GuardrailGroup;

/// Result type alias for railchat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for railchat.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The remote completion service could not produce a reply.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A check with the same name is already registered in the group.
    #[error("Guardrail '{name}' is already registered in the {group} group")]
    DuplicateName {
        /// Group the registration targeted.
        group: GuardrailGroup,
        /// The conflicting name.
        name: String,
    },

    /// A configured check refers to a function the catalog does not know.
    #[error("Guardrail '{name}' refers to unknown check function '{function}'")]
    UnknownCheck {
        /// Name of the configured guardrail.
        name: String,
        /// The unresolved function identifier.
        function: String,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A retry was requested but no user turn is awaiting a reply.
    #[error("No pending user message to retry")]
    NothingToRetry,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a duplicate name error.
    #[must_use]
    pub fn duplicate_name(group: GuardrailGroup, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            group,
            name: name.into(),
        }
    }

    /// Returns `true` if this error came from the remote completion service.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Failure raised by a single guardrail check.
///
/// For the blocking group a failure counts as a `false` result; it never
/// aborts the conversation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GuardrailError {
    /// The check reported an internal error.
    #[error("{0}")]
    Check(String),

    /// The check did not finish within the executor's time limit.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The check panicked.
    #[error("check panicked")]
    Panicked,

    /// The task running the check was cancelled.
    #[error("check task was cancelled")]
    Cancelled,
}

impl GuardrailError {
    /// Create a check error with a message.
    #[must_use]
    pub fn check(msg: impl Into<String>) -> Self {
        Self::Check(msg.into())
    }
}

/// Error type for remote completion calls.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RemoteError {
    /// The error kind.
    pub kind: RemoteErrorKind,
    /// The provider name (e.g., "anthropic").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// Optional error code from the provider.
    pub code: Option<String>,
}

/// Categories of remote completion errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RemoteErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit exceeded.
    RateLimited,
    /// The response could not be interpreted.
    ResponseFormat,
    /// Network, connection or timeout failure.
    Network,
    /// Non-success HTTP status.
    HttpStatus,
    /// Provider-specific error.
    Provider,
    /// Internal error.
    Internal,
}

impl RemoteError {
    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Auth,
            provider: Some(provider.into()),
            message: message.into(),
            code: None,
        }
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::RateLimited,
            provider: Some(provider.into()),
            message: "Rate limit exceeded. Please retry after some time.".into(),
            code: None,
        }
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::ResponseFormat,
            provider: None,
            message: format!("Expected {}, got {}", expected.into(), got.into()),
            code: None,
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Network,
            provider: None,
            message: message.into(),
            code: None,
        }
    }

    /// Create an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::HttpStatus,
            provider: None,
            message: format!("HTTP {status}: {}", body.into()),
            code: Some(status.to_string()),
        }
    }

    /// Map a non-success HTTP status to the matching error kind.
    #[must_use]
    pub fn from_status(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let provider = provider.into();
        match status {
            401 | 403 => Self {
                code: Some(status.to_string()),
                ..Self::auth(provider, body)
            },
            429 => Self {
                code: Some(status.to_string()),
                ..Self::rate_limited(provider)
            },
            _ => Self {
                provider: Some(provider),
                ..Self::http_status(status, body)
            },
        }
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Provider,
            provider: Some(provider.into()),
            message: message.into(),
            code: None,
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Internal,
            provider: None,
            message: message.into(),
            code: None,
        }
    }

    /// Check if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::RateLimited | RemoteErrorKind::Network
        )
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::response_format("JSON response body", err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}
