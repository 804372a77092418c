//! Error types for Switchyard.

use thiserror::Error;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Credential,
    Connection,
    Timeout,
    Lifecycle,
    Persistence,
    Network,
    Serialization,
    ToolExecution,
    Unknown,
}

/// Primary error type for all Switchyard operations.
#[derive(Error, Debug)]
pub enum SwitchyardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential decryption failed for integration '{integration}': {message}")]
    CredentialDecryption {
        integration: String,
        message: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Agent '{0}' is inactive")]
    AgentInactive(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SwitchyardError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::CredentialDecryption { .. } => ErrorCategory::Credential,
            Self::Connection(_) => ErrorCategory::Connection,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::AgentInactive(_) => ErrorCategory::Lifecycle,
            Self::Persistence(_) => ErrorCategory::Persistence,
            Self::Network(_) => ErrorCategory::Network,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection | ErrorCategory::Timeout | ErrorCategory::Network
        )
    }

    /// Whether this error is local to a single integration.
    ///
    /// Integration-local errors are absorbed at the orchestrator boundary:
    /// logged and turned into omission from the tool set, never surfaced as a
    /// whole-agent failure.
    pub fn is_integration_local(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration
                | ErrorCategory::Credential
                | ErrorCategory::Connection
                | ErrorCategory::Timeout
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SwitchyardError>;
