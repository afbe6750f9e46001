//! Jan-Seva Core Library
//!
//! This crate provides the foundational utilities shared by the Jan-Seva crates:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - The query intent taxonomy

pub mod config;
pub mod error;
pub mod intent;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, CacheConfig, DispatchConfig, FamilyConfig, VerificationConfig};
pub use error::{AppError, AppResult};
pub use intent::IntentClass;
