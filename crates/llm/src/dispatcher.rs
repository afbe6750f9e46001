//! Failover dispatcher.
//!
//! Walks families in priority order and, within a family, credentials in
//! pool order. Attempts are strictly sequential. An oversized request on a
//! family that supports shrinking is retried once on the same credential
//! before the next credential is spent, since every key of that family would
//! reject it identically.

use crate::client::{
    AttemptError, Completion, DispatchFailure, FailureKind, Generation, GenerationOutcome,
    GenerationRequest, ProviderAdapter, ProviderError,
};
use crate::credentials::{Credential, CredentialId, CredentialPool, HealthReport};
use crate::family::ProviderFamily;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sequential multi-family, multi-credential dispatcher.
pub struct FailoverDispatcher {
    pool: Arc<CredentialPool>,
    adapters: BTreeMap<ProviderFamily, Arc<dyn ProviderAdapter>>,
    timeout: Duration,
}

impl FailoverDispatcher {
    /// Create a dispatcher over a shared credential pool.
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self {
            pool,
            adapters: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every adapter invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register the adapter for its family, replacing any previous one.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.family(), adapter);
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn adapter(&self, family: ProviderFamily) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&family)
    }

    /// The attempt plan: families with both an adapter and credentials,
    /// in fixed priority order.
    pub fn families(&self) -> Vec<ProviderFamily> {
        let mut plan: Vec<ProviderFamily> = self
            .pool
            .families()
            .into_iter()
            .filter(|family| self.adapters.contains_key(family))
            .collect();
        plan.sort_by_key(|family| family.priority());
        plan
    }

    /// Generate a completion, failing over until one attempt succeeds.
    ///
    /// Dropping the returned future abandons the in-flight call; nothing is
    /// reported to the pool for an attempt whose outcome was never observed.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let plan = self.families();
        if plan.is_empty() {
            tracing::error!("No provider family has both an adapter and credentials");
            return GenerationOutcome::Failure {
                kind: DispatchFailure::NoProvidersConfigured,
                last_errors_by_attempt: Vec::new(),
            };
        }

        tracing::debug!(
            "Dispatch plan: {}",
            plan.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(" -> ")
        );

        let mut tried: Vec<CredentialId> = Vec::new();
        let mut last_errors: BTreeMap<ProviderFamily, AttemptError> = BTreeMap::new();

        // Second pass: credentials skipped while another family was ready
        // come back as last resorts once nothing is ready.
        for pass in 0..2 {
            for &family in &plan {
                let Some(adapter) = self.adapters.get(&family) else {
                    continue;
                };
                let mut acquired = false;

                while let Some(credential) = self.pool.acquire_at(family, Instant::now(), &tried)
                {
                    acquired = true;
                    tried.push(credential.id);
                    if pass > 0 {
                        tracing::info!("Revisiting {} after the first pass", credential.identifier);
                    }

                    match self.attempt(adapter.as_ref(), &credential, request).await {
                        Ok(generation) => return GenerationOutcome::Success(generation),
                        Err(error) => {
                            last_errors.insert(family, error);
                        }
                    }
                }

                if !acquired && pass == 0 {
                    tracing::debug!("No credential available for {}, skipping", family);
                }
            }
        }

        tracing::error!(
            "All providers exhausted after {} attempt(s)",
            tried.len()
        );
        GenerationOutcome::Failure {
            kind: DispatchFailure::AllProvidersExhausted,
            last_errors_by_attempt: last_errors.into_values().collect(),
        }
    }

    /// One credential's turn, including the optional shrink retry.
    async fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<Generation, AttemptError> {
        tracing::info!(
            "Attempting {} with {} (max_tokens: {})",
            adapter.family(),
            credential.identifier,
            request.max_tokens
        );

        let mut error = match self.invoke(adapter, credential, request).await {
            Ok(completion) => return Ok(self.succeed(adapter, credential, completion)),
            Err(error) => error,
        };
        let mut kind = adapter.classify(&error);
        let mut after_shrink = false;

        if kind == FailureKind::Transient
            && adapter.family().supports_shrink()
            && adapter.is_oversized(&error)
        {
            if let Some(shrunk) = adapter.shrink(request) {
                tracing::warn!(
                    "{} rejected an oversized request; retrying with max_tokens {} -> {}",
                    credential.identifier,
                    request.max_tokens,
                    shrunk.max_tokens
                );
                match self.invoke(adapter, credential, &shrunk).await {
                    Ok(completion) => return Ok(self.succeed(adapter, credential, completion)),
                    Err(retry_error) => {
                        kind = adapter.classify(&retry_error);
                        error = retry_error;
                        after_shrink = true;
                    }
                }
            }
        }

        tracing::warn!(
            "{} failed ({:?}): {}",
            credential.identifier,
            kind,
            error
        );
        self.pool.report(credential.id, HealthReport::from(kind));

        Err(AttemptError {
            family: adapter.family(),
            credential: credential.identifier.clone(),
            kind,
            message: error.to_string(),
            after_shrink,
        })
    }

    async fn invoke(
        &self,
        adapter: &dyn ProviderAdapter,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<Completion, ProviderError> {
        match tokio::time::timeout(self.timeout, adapter.invoke(credential, request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }

    fn succeed(
        &self,
        adapter: &dyn ProviderAdapter,
        credential: &Credential,
        completion: Completion,
    ) -> Generation {
        self.pool.report(credential.id, HealthReport::Success);
        tracing::info!(
            "Response from {}/{} ({} chars)",
            credential.identifier,
            completion.model,
            completion.text.len()
        );

        Generation {
            text: completion.text,
            provider_used: adapter.family(),
            credential_used: credential.identifier.clone(),
            model: completion.model,
            tokens_used: completion.usage.total_tokens,
        }
    }
}

impl std::fmt::Debug for FailoverDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverDispatcher")
            .field("families", &self.families())
            .field("timeout", &self.timeout)
            .finish()
    }
}
