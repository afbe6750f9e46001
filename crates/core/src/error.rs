//! Error types for Jan-Seva.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! provider exhaustion, cache and serialization failures.

use thiserror::Error;

/// Unified error type for Jan-Seva.
///
/// Provider and credential failures never surface individually; the
/// dispatcher folds them into `ProvidersExhausted`. Cache failures surface as
/// `CacheUnavailable` and callers degrade to bypassing the cache.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every credential of every provider family failed
    #[error("All providers exhausted: {0}")]
    ProvidersExhausted(String),

    /// Research cache storage errors
    #[error("Research cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: AppError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_display_includes_category() {
        let err = AppError::CacheUnavailable("disk full".to_string());
        assert_eq!(err.to_string(), "Research cache unavailable: disk full");

        let err = AppError::ProvidersExhausted("groq#1: 503".to_string());
        assert_eq!(err.to_string(), "All providers exhausted: groq#1: 503");
    }
}
