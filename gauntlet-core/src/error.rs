//! Custom error types for Gauntlet.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed operation against the system under test.
///
/// The retry policy consults this taxonomy: transient kinds may be retried,
/// terminal kinds never are, and `Indeterminate` is resolved by the
/// fault-recovery harness rather than the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend rejected the operation due to rate limiting.
    RateLimited,
    /// The operation did not complete within its per-attempt timeout.
    Timeout,
    /// Transport-level failure (connection refused, reset, DNS).
    Connection,
    /// The operation was rejected as invalid. Never retried.
    Validation,
    /// Authentication or authorization failure. Never retried.
    Auth,
    /// A crash occurred mid-operation; the outcome is unknown until verified.
    Indeterminate,
}

impl ErrorKind {
    /// Get the kind name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RateLimited => "RateLimited",
            Self::Timeout => "Timeout",
            Self::Connection => "Connection",
            Self::Validation => "Validation",
            Self::Auth => "Auth",
            Self::Indeterminate => "Indeterminate",
        }
    }

    /// Transient failures are candidates for retry under the default policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Connection)
    }

    /// Terminal failures are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Validation | Self::Auth)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Failure reported by a `SystemUnderTest` operation.
///
/// Carries the taxonomy kind so the executor can classify without parsing
/// adapter-specific messages.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TargetError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TargetError {
    /// Create a new target error with an explicit kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn indeterminate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Indeterminate, message)
    }
}

/// Harness-side faults, distinct from failures of the system under test.
///
/// A harness fault aborts only the cycle it occurred in, never the run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Failed to disconnect target: {last}")]
    Disconnect { last: TargetError },

    #[error("Failed to restart target after {attempts} attempts: {last}")]
    Restart { attempts: u32, last: TargetError },

    #[error("In-flight operation task failed: {reason}")]
    TaskJoin { reason: String },
}

/// Hard validation errors for suite configuration.
/// Used when configuration is invalid and the run cannot safely start.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Load step grid is empty - at least one step is required")]
    EmptyStepGrid,

    #[error("Threshold ordering invalid for criterion '{criterion}': passed={passed}, partial={partial} with direction {direction}")]
    ThresholdOrdering {
        criterion: String,
        passed: f64,
        partial: f64,
        direction: &'static str,
    },

    #[error("Duplicate criterion name: {name}")]
    DuplicateCriterion { name: String },
}

/// Top-level error type for the Gauntlet engine.
#[derive(Debug, Error)]
pub enum GauntletError {
    #[error("Configuration validation error: {0}")]
    ConfigValidation(#[from] ConfigValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    #[error("Harness fault: {0}")]
    Harness(#[from] HarnessError),

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using GauntletError.
pub type GauntletResult<T> = Result<T, GauntletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_and_terminal_partition() {
        assert!(ErrorKind::RateLimited.is_transient());
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::Connection.is_transient());
        assert!(!ErrorKind::Validation.is_transient());
        assert!(!ErrorKind::Auth.is_transient());

        assert!(ErrorKind::Validation.is_terminal());
        assert!(ErrorKind::Auth.is_terminal());

        // Indeterminate is neither: resolved by the harness, not the executor.
        assert!(!ErrorKind::Indeterminate.is_transient());
        assert!(!ErrorKind::Indeterminate.is_terminal());
    }

    #[test]
    fn test_target_error_display() {
        let err = TargetError::rate_limited("429 from backend");
        assert!(err.to_string().contains("RateLimited"));
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_error_chain() {
        let validation_err = ConfigValidationError::EmptyStepGrid;
        let gauntlet_err: GauntletError = validation_err.into();
        assert!(matches!(gauntlet_err, GauntletError::ConfigValidation(_)));
    }
}
