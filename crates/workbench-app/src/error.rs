//! Error types for the Workbench configurator service.
//!
//! Variants are grouped by subsystem. The display text of the validation
//! variants is shown to the user as-is; everything else is logged and the
//! user sees a fixed per-workflow message instead.

use std::path::PathBuf;

use workbench_store::StoreError;

use crate::generation::GenerationError;

/// A specialized `Result` type for Workbench operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors that can occur in the configurator service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your workbench.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// User input was missing or malformed.
    #[error("{0}")]
    Validation(String),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The auth provider refused or failed a sign-in or sign-out.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A workflow needed a signed-in user and there was none.
    #[error("Authentication not ready. Please try again.")]
    NotAuthenticated,

    /// Invalid session transition attempted.
    #[error("Invalid session transition: cannot go from {from} to {to}")]
    InvalidSessionTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// Document store failure.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The generation API could not produce a usable result.
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // ========================================================================
    // General Errors
    // ========================================================================
    /// I/O error while binding or serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl AppError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a new `Auth` error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates a new `InvalidSessionTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidSessionTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Persistence(StoreError::Unavailable(_))
                | Self::Generation(GenerationError::Exhausted { .. })
                | Self::NotAuthenticated
        )
    }

    /// Returns `true` if this error is fatal and the service cannot start.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. } | Self::HttpClient(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = AppError::validation("Please fill out all required fields.");
        assert_eq!(err.to_string(), "Please fill out all required fields.");
    }

    #[test]
    fn test_config_errors_carry_suggestion() {
        let err = AppError::config_validation("appId must not be empty", "Set appId");
        let msg = err.to_string();
        assert!(msg.contains("appId must not be empty"));
        assert!(msg.contains("Suggestion: Set appId"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = AppError::invalid_transition("authenticated", "authenticated");
        assert_eq!(
            err.to_string(),
            "Invalid session transition: cannot go from authenticated to authenticated"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_is_transient() {
        let offline: AppError = StoreError::Unavailable("offline".into()).into();
        assert!(offline.is_transient());

        let corrupted: AppError = StoreError::Corrupted {
            path: "p".into(),
            message: "bad".into(),
        }
        .into();
        assert!(!corrupted.is_transient());

        assert!(!AppError::validation("x").is_transient());
        assert!(!AppError::Generation(GenerationError::Cancelled).is_transient());
    }

    #[test]
    fn test_from_store_error() {
        let err: AppError = StoreError::PermissionDenied {
            path: "artifacts".into(),
        }
        .into();
        assert!(matches!(err, AppError::Persistence(_)));
        assert!(!err.is_fatal());
    }
}
