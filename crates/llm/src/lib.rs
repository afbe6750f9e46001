//! Multi-provider LLM dispatch for Jan-Seva.
//!
//! Answers are generated through a [`FailoverDispatcher`] that walks provider
//! families in fixed priority order (Groq, then Gemini, then OpenAI) and, within
//! a family, that family's API keys. A shared [`CredentialPool`] tracks which
//! keys are cooling down after transient failures and which are disabled.
//!
//! # Example
//! ```no_run
//! use seva_core::{AppConfig, IntentClass};
//! use seva_llm::{build_dispatcher, GenerationRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None, None)?;
//! let dispatcher = build_dispatcher(&config);
//! let request = GenerationRequest::new("What is PM-KISAN?", IntentClass::SchemeDiscovery);
//! let generation = dispatcher.generate(&request).await.into_result()?;
//! println!("{} ({})", generation.text, generation.credential_used);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod credentials;
pub mod dispatcher;
pub mod factory;
pub mod family;
pub mod providers;

pub use client::{
    AttemptError, Completion, DispatchFailure, FailureKind, Generation, GenerationOutcome,
    GenerationRequest, ProviderAdapter, ProviderError, TokenUsage,
};
pub use credentials::{
    BackoffPolicy, Credential, CredentialId, CredentialPool, CredentialStatus, HealthReport,
};
pub use dispatcher::FailoverDispatcher;
pub use factory::{build_dispatcher, build_pool, create_adapter};
pub use family::ProviderFamily;
