//! Error types for the ctxforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type:
//!
//! - [`ConfigError`] — deployment/programming mistakes. Never degraded.
//! - [`TransportError`] — the remote knowledge service misbehaved.
//! - [`KnowledgeError`] — everything the gateway can report to a caller.

use thiserror::Error;

/// The top-level error type for all ctxforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // --- Knowledge service errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Invalid configuration or addressing. These fail fast and are never
/// converted into an empty result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid project_id '{value}': {reason}")]
    InvalidProjectId { value: String, reason: String },

    #[error("{name} threshold must be between 0.0 and 1.0, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("group name cannot be empty")]
    EmptyGroupName,

    #[error("group '{group}' is tenant-scoped but no project namespace is configured")]
    MissingNamespace { group: String },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Failures talking to the remote knowledge-graph service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Everything the knowledge gateway can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KnowledgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("knowledge service disabled")]
    Disabled,

    #[error("knowledge service not connected")]
    NotConnected,

    #[error("circuit breaker open after {failures} consecutive failures")]
    CircuitOpen { failures: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl KnowledgeError {
    /// Whether this failure should degrade to an empty result.
    ///
    /// Configuration errors are the only non-transient kind.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_correctly() {
        let err = Error::Knowledge(KnowledgeError::Transport(TransportError::Api {
            status_code: 503,
            message: "Service Unavailable".into(),
        }));
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn threshold_error_names_the_field() {
        let err = ConfigError::InvalidThreshold {
            name: "standard",
            value: 1.5,
        };
        assert!(err.to_string().contains("threshold must be between 0.0 and 1.0"));
        assert!(err.to_string().contains("standard"));
    }

    #[test]
    fn only_config_errors_are_permanent() {
        assert!(KnowledgeError::Disabled.is_transient());
        assert!(KnowledgeError::NotConnected.is_transient());
        assert!(KnowledgeError::CircuitOpen { failures: 3 }.is_transient());
        assert!(KnowledgeError::Transport(TransportError::Network("reset".into())).is_transient());
        assert!(!KnowledgeError::Config(ConfigError::EmptyGroupName).is_transient());
    }
}
