//! Verified research for Jan-Seva answers.
//!
//! Candidate sources from the search collaborator are scored against a domain
//! reputation table, filtered by the verification policy and only then handed
//! to the LLM dispatcher. Verified answers are cached in SQLite by query
//! fingerprint.

pub mod cache;
pub mod fingerprint;
pub mod pipeline;
pub mod policy;
pub mod scorer;
pub mod types;

#[cfg(test)]
mod tests;

pub use cache::{CacheEntry, CacheStats, ResearchCache};
pub use fingerprint::{fingerprint, normalize_query};
pub use pipeline::ResearchService;
pub use policy::verify;
pub use scorer::SourceScorer;
pub use types::{
    BundleStatus, Citation, GenerationInfo, ResearchQuery, ResultBundle, ScoredSource, Source,
    VerdictReason, VerificationSummary, VerificationVerdict,
};
