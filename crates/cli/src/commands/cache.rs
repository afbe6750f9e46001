//! Cache command handler.
//!
//! Inspects and maintains the research cache.

use chrono::Utc;
use clap::{Args, Subcommand};
use seva_core::{config::AppConfig, AppResult};
use seva_research::ResearchCache;
use serde::Serialize;

/// Inspect or maintain the research cache
#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Show entry counts
    Stats,

    /// Delete expired entries
    Sweep,

    /// Delete every entry
    Clear,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheReport {
    enabled: bool,
    path: Option<String>,
    ttl_minutes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expired: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<usize>,
}

impl CacheCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing cache command");
        tracing::debug!("Cache options: {:?}", self);

        let cache = ResearchCache::from_config(&config.cache, &config.workspace);
        let report = self.run(&cache)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }

    fn run(&self, cache: &ResearchCache) -> AppResult<CacheReport> {
        let mut report = CacheReport {
            enabled: cache.is_enabled(),
            path: cache.path().map(|p| p.display().to_string()),
            ttl_minutes: cache.ttl().as_secs() / 60,
            entries: None,
            expired: None,
            removed: None,
        };

        match self.action {
            CacheAction::Stats => {
                let stats = cache.stats(Utc::now())?;
                report.entries = Some(stats.entries);
                report.expired = Some(stats.expired);
            }
            CacheAction::Sweep => {
                let removed = cache.sweep(Utc::now())?;
                tracing::info!(removed, "Swept expired cache entries");
                report.removed = Some(removed);
            }
            CacheAction::Clear => {
                report.removed = Some(cache.clear()?);
            }
        }
        Ok(report)
    }
}

fn print_report(report: &CacheReport) {
    match (&report.path, report.enabled) {
        (Some(path), true) => println!("Research cache: {} (ttl {} min)", path, report.ttl_minutes),
        _ => println!("Research cache: disabled"),
    }
    if let Some(entries) = report.entries {
        println!("  Entries:         {}", entries);
    }
    if let Some(expired) = report.expired {
        println!("  Expired entries: {}", expired);
    }
    if let Some(removed) = report.removed {
        println!("  Removed:         {}", removed);
    }
}
