//! Builds adapters and the dispatcher from application configuration.

use crate::client::ProviderAdapter;
use crate::credentials::{BackoffPolicy, CredentialPool};
use crate::dispatcher::FailoverDispatcher;
use crate::family::ProviderFamily;
use crate::providers::{GeminiAdapter, GroqAdapter, OpenAiAdapter};
use seva_core::{AppConfig, FamilyConfig};
use std::sync::Arc;
use std::time::Duration;

/// Create the adapter for `family`, honoring a configured endpoint override.
pub fn create_adapter(family: ProviderFamily, config: &FamilyConfig) -> Arc<dyn ProviderAdapter> {
    let model = config.model.clone();
    match (family, config.endpoint.as_deref()) {
        (ProviderFamily::GroqLike, Some(endpoint)) => {
            Arc::new(GroqAdapter::with_endpoint(endpoint, model))
        }
        (ProviderFamily::GroqLike, None) => Arc::new(GroqAdapter::new(model)),
        (ProviderFamily::GeminiLike, Some(base_url)) => {
            Arc::new(GeminiAdapter::with_base_url(base_url, model))
        }
        (ProviderFamily::GeminiLike, None) => Arc::new(GeminiAdapter::new(model)),
        (ProviderFamily::OpenAiLike, Some(endpoint)) => {
            Arc::new(OpenAiAdapter::with_endpoint(endpoint, model))
        }
        (ProviderFamily::OpenAiLike, None) => Arc::new(OpenAiAdapter::new(model)),
    }
}

/// Per-family settings from the application config.
pub fn family_config(config: &AppConfig, family: ProviderFamily) -> &FamilyConfig {
    match family {
        ProviderFamily::GroqLike => &config.groq,
        ProviderFamily::GeminiLike => &config.gemini,
        ProviderFamily::OpenAiLike => &config.openai,
    }
}

/// Build the credential pool for every configured family.
pub fn build_pool(config: &AppConfig) -> CredentialPool {
    let backoff = BackoffPolicy::new(
        Duration::from_secs(config.dispatch.backoff_base_secs),
        Duration::from_secs(config.dispatch.backoff_cap_secs),
    );

    ProviderFamily::ALL
        .iter()
        .fold(CredentialPool::new(backoff), |pool, &family| {
            pool.with_family(family, family_config(config, family).api_keys.iter().cloned())
        })
}

/// Build a dispatcher with one adapter per configured family.
///
/// Families without keys get no adapter. With no keys at all the dispatcher
/// still builds; every generation then fails with `NoProvidersConfigured`.
pub fn build_dispatcher(config: &AppConfig) -> FailoverDispatcher {
    let pool = Arc::new(build_pool(config));

    if pool.is_empty() {
        tracing::warn!("No provider API keys configured; answers cannot be generated");
    }

    let mut dispatcher = FailoverDispatcher::new(Arc::clone(&pool)).with_timeout(config.dispatch.timeout());
    for family in pool.families() {
        let family_config = family_config(config, family);
        tracing::info!(
            "Provider {} enabled: {} key(s), model {}",
            family,
            pool.len(family),
            family_config.model
        );
        dispatcher = dispatcher.with_adapter(create_adapter(family, family_config));
    }
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with(vars: &[(&str, &str)]) -> (TempDir, AppConfig) {
        let dir = TempDir::new().unwrap();
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = AppConfig::from_lookup(Some(dir.path().to_path_buf()), None, |key| {
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();
        (dir, config)
    }

    #[test]
    fn test_pool_follows_configured_keys() {
        let (_dir, config) = config_with(&[
            ("GROQ_API_KEY", "g-primary"),
            ("GROQ_API_KEY_2", "g-secondary"),
            ("OPENAI_API_KEY", "o-primary"),
        ]);
        let pool = build_pool(&config);

        assert_eq!(
            pool.families(),
            vec![ProviderFamily::GroqLike, ProviderFamily::OpenAiLike]
        );
        assert_eq!(pool.len(ProviderFamily::GroqLike), 2);
        assert_eq!(pool.len(ProviderFamily::GeminiLike), 0);
    }

    #[test]
    fn test_dispatcher_registers_only_configured_families() {
        let (_dir, config) = config_with(&[("GOOGLE_API_KEY", "k")]);
        let dispatcher = build_dispatcher(&config);
        assert_eq!(dispatcher.families(), vec![ProviderFamily::GeminiLike]);
        assert!(dispatcher.adapter(ProviderFamily::GroqLike).is_none());
    }

    #[test]
    fn test_no_keys_builds_empty_dispatcher() {
        let (_dir, config) = config_with(&[]);
        let dispatcher = build_dispatcher(&config);
        assert!(dispatcher.families().is_empty());
    }

    #[test]
    fn test_create_adapter_uses_model() {
        let (_dir, config) = config_with(&[("OPENAI_MODEL", "gpt-4.1")]);
        let adapter = create_adapter(ProviderFamily::OpenAiLike, &config.openai);
        assert_eq!(adapter.family(), ProviderFamily::OpenAiLike);
        assert_eq!(adapter.model(), "gpt-4.1");
    }
}
