//! Error types for kubecheck

use std::time::Duration;

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for kubecheck
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed before a response was observed
    #[error("{0}")]
    Http(String),

    /// Name resolution failed
    #[error("{0}")]
    Dns(String),

    /// Kubernetes API call failed
    #[error("{0}")]
    Kubernetes(String),

    /// Probe did not finish within its timeout
    #[error("healthcheck timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lifecycle hook error
    #[error("Hook '{hook}' failed: {message}")]
    Hook {
        /// Hook name
        hook: String,
        /// Error message
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a hook error
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from a probe observation rather than from
    /// configuration or the process itself
    pub fn is_observation(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Dns(_) | Error::Kubernetes(_) | Error::Timeout(_)
        )
    }
}
