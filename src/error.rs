//! Custom error types for Otto.
//!
//! This module provides structured error types that enable better
//! error handling, reporting, and recovery throughout the application.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for Otto operations
#[derive(Error, Debug)]
pub enum OttoError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Unknown task id
    #[error("Task not found: {id}")]
    TaskNotFound { id: Uuid },

    // =========================================================================
    // Planner Errors
    // =========================================================================
    /// Language-model call failed
    #[error("LLM request failed: {message}")]
    Llm { message: String },

    /// Model reply did not match the ANALYSIS/COMMANDS contract
    #[error("Plan parse error: {reason}")]
    PlanParse { reason: String },

    // =========================================================================
    // Executor Errors
    // =========================================================================
    /// Command rejected by the allow-list policy
    #[error("Command blocked by policy: {command}")]
    CommandBlocked { command: String },

    /// Subprocess execution failed
    #[error("Command execution failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    // =========================================================================
    // Loop Errors
    // =========================================================================
    /// Cycle execution failed
    #[error("Cycle error: {message}")]
    Cycle { message: String },

    /// Bounded fix loop exhausted without tests passing
    #[error("Maximum fix attempts ({max}) reached, tests still failing")]
    MaxAttempts { max: u32 },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OttoError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create a plan parse error
    pub fn plan_parse(reason: impl Into<String>) -> Self {
        Self::PlanParse {
            reason: reason.into(),
        }
    }

    /// Create a cycle error
    pub fn cycle(message: impl Into<String>) -> Self {
        Self::Cycle {
            message: message.into(),
        }
    }

    /// Create a command failure error
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error is recoverable (the loop logs it and keeps going)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Llm { .. }
                | Self::PlanParse { .. }
                | Self::CommandBlocked { .. }
                | Self::CommandFailed { .. }
                | Self::Cycle { .. }
                | Self::MaxAttempts { .. }
        )
    }

    /// Check if this error maps to a client-side HTTP error
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::TaskNotFound { .. })
    }
}

/// Type alias for Otto results
pub type Result<T> = std::result::Result<T, OttoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OttoError::MaxAttempts { max: 5 };
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_task_not_found_display_includes_id() {
        let id = Uuid::new_v4();
        let err = OttoError::TaskNotFound { id };
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(OttoError::llm("timeout").is_recoverable());
        assert!(OttoError::cycle("tests never passed").is_recoverable());
        assert!(!OttoError::config("bad port").is_recoverable());
    }

    #[test]
    fn test_is_client_error() {
        assert!(OttoError::TaskNotFound { id: Uuid::new_v4() }.is_client_error());
        assert!(!OttoError::llm("boom").is_client_error());
    }

    #[test]
    fn test_constructor_helpers() {
        let err = OttoError::command_failed("ls -la", "timed out");
        if let OttoError::CommandFailed { command, message } = err {
            assert_eq!(command, "ls -la");
            assert_eq!(message, "timed out");
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let otto_err: OttoError = io_err.into();
        assert!(matches!(otto_err, OttoError::Io(_)));
        assert!(otto_err.to_string().contains("access denied"));
    }
}
