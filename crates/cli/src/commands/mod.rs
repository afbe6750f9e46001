//! Command handlers for the Jan-Seva CLI.

pub mod ask;
pub mod cache;
pub mod providers;

pub use ask::AskCommand;
pub use cache::CacheCommand;
pub use providers::ProvidersCommand;
