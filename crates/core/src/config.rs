//! Configuration management for Jan-Seva.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.seva/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Environment variables use the flat names of the original deployment
//! (`STRICT_VERIFIED_MODE`, `GROQ_API_KEY_2`, ...) so existing `.env` files
//! keep working.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Source verification policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerificationConfig {
    /// Refuse to answer when no source survives verification
    pub strict_mode: bool,

    /// Minimum reliability score (0.0 - 1.0) for a source to be kept
    pub min_reliability: f64,

    /// Maximum source age for non-news intents
    pub max_source_age_days: u32,

    /// Maximum source age for `latest_news` queries
    pub max_news_age_days: u32,

    /// News answers need at least two distinct corroborating domains
    pub require_multi_source_for_news: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            min_reliability: 0.67,
            max_source_age_days: 45,
            max_news_age_days: 21,
            require_multi_source_for_news: true,
        }
    }
}

/// Research cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub enabled: bool,

    /// Entry lifetime in minutes (values below 1 are treated as 1)
    pub ttl_minutes: u64,

    /// SQLite file; relative paths resolve against the workspace
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: 180,
            path: PathBuf::from("data/research_cache.sqlite3"),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.max(1).saturating_mul(60))
    }

    /// Absolute location of the cache file.
    pub fn resolved_path(&self, workspace: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace.join(&self.path)
        }
    }
}

/// Generation and failover settings shared by all provider families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Default `max_tokens` for answer generation
    pub max_tokens: u32,

    /// Default sampling temperature
    pub temperature: f32,

    /// Upper bound for a single provider call
    pub timeout_secs: u64,

    /// First cooldown after a transient failure
    pub backoff_base_secs: u64,

    /// Cooldown ceiling
    pub backoff_cap_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.15,
            timeout_secs: 30,
            backoff_base_secs: 2,
            backoff_cap_secs: 120,
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for one provider family.
#[derive(Clone, PartialEq)]
pub struct FamilyConfig {
    /// API keys in priority order (primary first)
    pub api_keys: Vec<String>,

    /// Model identifier sent to the provider
    pub model: String,

    /// Endpoint override (proxies, self-hosted gateways)
    pub endpoint: Option<String>,
}

impl FamilyConfig {
    fn with_model(model: &str) -> Self {
        Self {
            api_keys: Vec::new(),
            model: model.to_string(),
            endpoint: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

// Keys never reach logs.
impl fmt::Debug for FamilyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyConfig")
            .field("api_keys", &format_args!("<{} redacted>", self.api_keys.len()))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the workspace root (contains .seva/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    pub verification: VerificationConfig,

    pub cache: CacheConfig,

    pub dispatch: DispatchConfig,

    /// Fast/cheap family, tried first
    pub groq: FamilyConfig,

    /// Middle family
    pub gemini: FamilyConfig,

    /// Most capable family, tried last
    pub openai: FamilyConfig,

    /// Domain reliability overrides merged over the built-in table
    pub domain_overrides: HashMap<String, f64>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    verification: Option<VerificationConfig>,
    cache: Option<CacheConfig>,
    llm: Option<LlmSection>,
    logging: Option<LoggingSection>,
    domains: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LlmSection {
    #[serde(flatten)]
    dispatch: DispatchConfig,
    providers: HashMap<String, ProviderSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ProviderSection {
    model: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            verification: VerificationConfig::default(),
            cache: CacheConfig::default(),
            dispatch: DispatchConfig::default(),
            groq: FamilyConfig::with_model("llama-3.3-70b-versatile"),
            gemini: FamilyConfig::with_model("gemini-2.0-flash"),
            openai: FamilyConfig::with_model("gpt-5-nano"),
            domain_overrides: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment and defaults.
    ///
    /// `workspace` and `config_file` come from CLI flags and take precedence
    /// over `SEVA_WORKSPACE` / `SEVA_CONFIG`.
    ///
    /// # Example
    /// ```no_run
    /// use seva_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None, None).expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        Self::from_lookup(workspace, config_file, |key| std::env::var(key).ok())
    }

    /// Load configuration with an injectable environment lookup.
    pub fn from_lookup<F>(
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        lookup: F,
    ) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| lookup("SEVA_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| lookup("SEVA_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.seva_dir().join("config.yaml"));

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        config.apply_env(&lookup)?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(verification) = file.verification {
            self.verification = verification;
        }

        if let Some(cache) = file.cache {
            self.cache = cache;
        }

        if let Some(llm) = file.llm {
            self.dispatch = llm.dispatch;
            for (name, section) in llm.providers {
                let family = self.family_mut(&name).ok_or_else(|| {
                    AppError::Config(format!(
                        "Unknown provider family in {:?}: {} (expected groq, gemini or openai)",
                        path, name
                    ))
                })?;
                if let Some(model) = section.model {
                    family.model = model;
                }
                if section.endpoint.is_some() {
                    family.endpoint = section.endpoint;
                }
            }
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }

        self.domain_overrides.extend(
            file.domains
                .into_iter()
                .map(|(domain, score)| (domain.to_lowercase(), score)),
        );

        tracing::debug!("Merged config file {:?}", path);
        Ok(())
    }

    /// Apply environment variable overrides.
    fn apply_env<F>(&mut self, lookup: &F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let v = &mut self.verification;
        if let Some(value) = lookup("STRICT_VERIFIED_MODE") {
            v.strict_mode = parse_bool("STRICT_VERIFIED_MODE", &value)?;
        }
        if let Some(value) = lookup("MIN_SOURCE_RELIABILITY") {
            v.min_reliability = parse_value("MIN_SOURCE_RELIABILITY", &value)?;
        }
        if let Some(value) = lookup("MAX_SOURCE_AGE_DAYS") {
            v.max_source_age_days = parse_value("MAX_SOURCE_AGE_DAYS", &value)?;
        }
        if let Some(value) = lookup("MAX_NEWS_AGE_DAYS") {
            v.max_news_age_days = parse_value("MAX_NEWS_AGE_DAYS", &value)?;
        }
        if let Some(value) = lookup("REQUIRE_MULTI_SOURCE_FOR_NEWS") {
            v.require_multi_source_for_news = parse_bool("REQUIRE_MULTI_SOURCE_FOR_NEWS", &value)?;
        }

        if let Some(value) = lookup("RESEARCH_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("RESEARCH_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = lookup("RESEARCH_CACHE_TTL_MINUTES") {
            self.cache.ttl_minutes = parse_value("RESEARCH_CACHE_TTL_MINUTES", &value)?;
        }
        if let Some(value) = lookup("RESEARCH_CACHE_PATH") {
            self.cache.path = PathBuf::from(value);
        }

        if let Some(value) = lookup("LLM_MAX_TOKENS") {
            self.dispatch.max_tokens = parse_value("LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("LLM_TEMPERATURE") {
            self.dispatch.temperature = parse_value("LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = lookup("LLM_TIMEOUT_SECS") {
            self.dispatch.timeout_secs = parse_value("LLM_TIMEOUT_SECS", &value)?;
        }

        self.groq.api_keys = collect_keys(lookup, "GROQ_API_KEY", None);
        self.gemini.api_keys = collect_keys(lookup, "GOOGLE_API_KEY", None);
        self.openai.api_keys = collect_keys(lookup, "OPENAI_API_KEY", Some("OPENAI_API_KEYS_CSV"));

        if let Some(model) = lookup("GROQ_MODEL") {
            self.groq.model = model;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.openai.model = model;
        }

        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }

        Ok(())
    }

    /// Apply CLI overrides for logging behavior.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    fn family_mut(&mut self, name: &str) -> Option<&mut FamilyConfig> {
        match name.to_lowercase().as_str() {
            "groq" => Some(&mut self.groq),
            "gemini" | "google" => Some(&mut self.gemini),
            "openai" => Some(&mut self.openai),
            _ => None,
        }
    }

    /// Get the path to the .seva directory.
    pub fn seva_dir(&self) -> PathBuf {
        self.workspace.join(".seva")
    }

    /// Ensure the .seva directory exists.
    pub fn ensure_seva_dir(&self) -> AppResult<()> {
        let seva_dir = self.seva_dir();
        if !seva_dir.exists() {
            std::fs::create_dir_all(&seva_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .seva directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Absolute location of the research cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.cache.resolved_path(&self.workspace)
    }

    /// Whether at least one provider family has credentials.
    pub fn has_credentials(&self) -> bool {
        self.groq.is_configured() || self.gemini.is_configured() || self.openai.is_configured()
    }

    /// Validate value ranges.
    pub fn validate(&self) -> AppResult<()> {
        let min = self.verification.min_reliability;
        if !(0.0..=1.0).contains(&min) {
            return Err(AppError::Config(format!(
                "MIN_SOURCE_RELIABILITY must be within 0.0-1.0, got {}",
                min
            )));
        }

        if !(0.0..=2.0).contains(&self.dispatch.temperature) {
            return Err(AppError::Config(format!(
                "LLM_TEMPERATURE must be within 0.0-2.0, got {}",
                self.dispatch.temperature
            )));
        }

        if self.dispatch.timeout_secs == 0 {
            return Err(AppError::Config(
                "LLM_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        if self.dispatch.backoff_base_secs > self.dispatch.backoff_cap_secs {
            return Err(AppError::Config(format!(
                "Backoff base ({}s) exceeds cap ({}s)",
                self.dispatch.backoff_base_secs, self.dispatch.backoff_cap_secs
            )));
        }

        for (domain, score) in &self.domain_overrides {
            if !(0.0..=1.0).contains(score) {
                return Err(AppError::Config(format!(
                    "Reliability for domain {} must be within 0.0-1.0, got {}",
                    domain, score
                )));
            }
        }

        Ok(())
    }
}

/// Parse an environment boolean (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Config(format!(
            "Invalid boolean for {}: {}",
            key, other
        ))),
    }
}

fn parse_value<T>(key: &str, value: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid value for {}: {} ({})", key, value, e)))
}

/// Collect `PREFIX`, `PREFIX_2`, `PREFIX_3` and an optional CSV list,
/// dropping blanks and duplicates while keeping declared order.
fn collect_keys<F>(lookup: &F, prefix: &str, csv_var: Option<&str>) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut raw: Vec<String> = [
        prefix.to_string(),
        format!("{}_2", prefix),
        format!("{}_3", prefix),
    ]
    .iter()
    .filter_map(|name| lookup(name))
    .collect();

    if let Some(csv) = csv_var.and_then(|name| lookup(name)) {
        raw.extend(csv.split(',').map(|k| k.to_string()));
    }

    let mut keys: Vec<String> = Vec::new();
    for key in raw {
        let key = key.trim();
        if key.is_empty() || keys.iter().any(|k| k == key) {
            continue;
        }
        keys.push(key.to_string());
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.verification.strict_mode);
        assert_eq!(config.verification.min_reliability, 0.67);
        assert_eq!(config.verification.max_source_age_days, 45);
        assert_eq!(config.verification.max_news_age_days, 21);
        assert_eq!(config.cache.ttl_minutes, 180);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_env_overrides() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::from_lookup(
            Some(temp.path().to_path_buf()),
            None,
            lookup_from(&[
                ("STRICT_VERIFIED_MODE", "false"),
                ("MIN_SOURCE_RELIABILITY", "0.5"),
                ("MAX_NEWS_AGE_DAYS", "7"),
                ("RESEARCH_CACHE_ENABLED", "off"),
                ("RESEARCH_CACHE_TTL_MINUTES", "15"),
                ("GROQ_API_KEY", "g1"),
                ("GROQ_API_KEY_3", "g3"),
            ]),
        )
        .unwrap();

        assert!(!config.verification.strict_mode);
        assert_eq!(config.verification.min_reliability, 0.5);
        assert_eq!(config.verification.max_news_age_days, 7);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(15 * 60));
        assert_eq!(config.groq.api_keys, vec!["g1", "g3"]);
        assert!(config.has_credentials());
    }

    #[test]
    fn test_openai_keys_deduplicated_with_csv() {
        let lookup = lookup_from(&[
            ("OPENAI_API_KEY", "a"),
            ("OPENAI_API_KEY_2", "b"),
            ("OPENAI_API_KEYS_CSV", "b, c,,a ,d"),
        ]);
        let keys = collect_keys(&lookup, "OPENAI_API_KEY", Some("OPENAI_API_KEYS_CSV"));
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_invalid_bool_is_config_error() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::from_lookup(
            Some(temp.path().to_path_buf()),
            None,
            lookup_from(&[("STRICT_VERIFIED_MODE", "maybe")]),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_yaml_then_env_precedence() {
        let temp = TempDir::new().unwrap();
        let seva_dir = temp.path().join(".seva");
        std::fs::create_dir_all(&seva_dir).unwrap();
        std::fs::write(
            seva_dir.join("config.yaml"),
            r#"
verification:
  minReliability: 0.8
  maxSourceAgeDays: 30
cache:
  ttlMinutes: 60
llm:
  timeoutSecs: 10
  providers:
    openai:
      model: gpt-4o-mini
      endpoint: http://localhost:9000/v1/chat/completions
domains:
  Example.GOV.in: 0.9
"#,
        )
        .unwrap();

        let config = AppConfig::from_lookup(
            Some(temp.path().to_path_buf()),
            None,
            lookup_from(&[("MAX_SOURCE_AGE_DAYS", "10")]),
        )
        .unwrap();

        assert_eq!(config.verification.min_reliability, 0.8);
        assert_eq!(config.verification.max_source_age_days, 10);
        assert!(config.verification.strict_mode);
        assert_eq!(config.cache.ttl_minutes, 60);
        assert_eq!(config.dispatch.timeout_secs, 10);
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert!(config.openai.endpoint.is_some());
        assert_eq!(config.domain_overrides.get("example.gov.in"), Some(&0.9));
    }

    #[test]
    fn test_unknown_provider_in_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        std::fs::write(&path, "llm:\n  providers:\n    mistral:\n      model: x\n").unwrap();

        let result = AppConfig::from_lookup(
            Some(temp.path().to_path_buf()),
            Some(path),
            lookup_from(&[]),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_cache_path_resolution() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/seva");
        assert_eq!(
            config.cache_path(),
            PathBuf::from("/srv/seva/data/research_cache.sqlite3")
        );

        config.cache.path = PathBuf::from("/var/cache/seva.db");
        assert_eq!(config.cache_path(), PathBuf::from("/var/cache/seva.db"));
    }

    #[test]
    fn test_cache_ttl_saturates() {
        let mut cache = CacheConfig::default();
        assert_eq!(cache.ttl(), Duration::from_secs(180 * 60));

        cache.ttl_minutes = 0;
        assert_eq!(cache.ttl(), Duration::from_secs(60));

        cache.ttl_minutes = u64::MAX;
        assert_eq!(cache.ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(None, true, false, true);
        assert!(config.verbose);
        assert!(config.log_json);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_reliability_range() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        config.verification.min_reliability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let mut family = FamilyConfig::with_model("m");
        family.api_keys = vec!["sk-secret".to_string()];
        let rendered = format!("{:?}", family);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("redacted"));
    }
}
