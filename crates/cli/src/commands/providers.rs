//! Providers command handler.
//!
//! Lists provider families in attempt order with credential health.
//! Secrets are never printed.

use clap::Args;
use seva_core::{config::AppConfig, AppResult};
use seva_llm::{build_dispatcher, FailoverDispatcher};
use serde::Serialize;
use std::time::Instant;

/// List configured provider families and credentials
#[derive(Args, Debug)]
pub struct ProvidersCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FamilyReport {
    family: String,
    model: String,
    credentials: Vec<CredentialReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialReport {
    id: String,
    ready: bool,
    disabled: bool,
    consecutive_failures: u32,
    cooldown_secs: Option<u64>,
}

impl ProvidersCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing providers command");

        let dispatcher = build_dispatcher(config);
        let report = collect(&dispatcher, Instant::now());

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if report.is_empty() {
            println!("No provider credentials configured.");
            println!("Set GROQ_API_KEY, GOOGLE_API_KEY or OPENAI_API_KEY.");
            return Ok(());
        }

        for family in &report {
            println!("{} ({})", family.family, family.model);
            for credential in &family.credentials {
                let state = if credential.disabled {
                    "disabled".to_string()
                } else if let Some(secs) = credential.cooldown_secs {
                    format!("cooling down {}s", secs)
                } else {
                    "ready".to_string()
                };
                println!(
                    "  {:<10} {} (failures: {})",
                    credential.id, state, credential.consecutive_failures
                );
            }
        }
        Ok(())
    }
}

fn collect(dispatcher: &FailoverDispatcher, now: Instant) -> Vec<FamilyReport> {
    let statuses = dispatcher.pool().status_at(now);

    dispatcher
        .families()
        .into_iter()
        .map(|family| FamilyReport {
            family: family.to_string(),
            model: dispatcher
                .adapter(family)
                .map(|adapter| adapter.model().to_string())
                .unwrap_or_default(),
            credentials: statuses
                .iter()
                .filter(|status| status.id.family == family)
                .map(|status| CredentialReport {
                    id: status.id.to_string(),
                    ready: status.ready,
                    disabled: status.disabled,
                    consecutive_failures: status.consecutive_failures,
                    cooldown_secs: status.cooldown_remaining.map(|d| d.as_secs()),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(vars: &[(&str, &str)]) -> (TempDir, AppConfig) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_lookup(Some(dir.path().to_path_buf()), None, |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();
        (dir, config)
    }

    #[test]
    fn test_collect_lists_families_in_priority_order() {
        let (_dir, config) = config(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("GROQ_API_KEY", "gsk-one"),
            ("GROQ_API_KEY_2", "gsk-two"),
        ]);
        let dispatcher = build_dispatcher(&config);
        let report = collect(&dispatcher, Instant::now());

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].family, "groq");
        assert_eq!(report[0].model, "llama-3.3-70b-versatile");
        let ids: Vec<_> = report[0].credentials.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["groq#1", "groq#2"]);
        assert!(report[0].credentials.iter().all(|c| c.ready));
        assert_eq!(report[1].model, "gpt-5-nano");
    }

    #[test]
    fn test_report_never_contains_secrets() {
        let (_dir, config) = config(&[("GROQ_API_KEY", "gsk-secret-value")]);
        let dispatcher = build_dispatcher(&config);
        let json = serde_json::to_string(&collect(&dispatcher, Instant::now())).unwrap();
        assert!(!json.contains("gsk-secret-value"));
    }

    #[test]
    fn test_empty_config_has_no_families() {
        let (_dir, config) = config(&[]);
        assert!(collect(&build_dispatcher(&config), Instant::now()).is_empty());
    }
}
