//! Ask command handler.
//!
//! Runs one query through the research pipeline.

use clap::Args;
use seva_core::{config::AppConfig, AppError, AppResult, IntentClass};
use seva_research::{BundleStatus, ResearchQuery, ResearchService, ResultBundle, Source};
use std::path::{Path, PathBuf};

/// Answer a query from candidate sources
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Question text (omit when using --input)
    #[arg(conflicts_with = "input", required_unless_present = "input")]
    pub text: Option<String>,

    /// JSON query record: {"text", "intentClass", "candidateSources", ...}
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Intent class (scheme_discovery, latest_news, greeting, ...)
    #[arg(long, conflicts_with = "input")]
    pub intent: Option<IntentClass>,

    /// JSON array of candidate sources
    #[arg(short, long, conflicts_with = "input")]
    pub sources: Option<PathBuf>,

    /// Response language code
    #[arg(long)]
    pub language: Option<String>,

    /// State code (e.g. TN)
    #[arg(long)]
    pub state: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask options: {:?}", self);

        let query = self.load_query()?;
        let service = ResearchService::from_config(config);
        let bundle = service.answer(&query).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&bundle)?);
        } else {
            print!("{}", render(&bundle));
        }

        Ok(())
    }

    /// Build the query from `--input` or from the positional text and flags.
    pub fn load_query(&self) -> AppResult<ResearchQuery> {
        let mut query = match (&self.input, &self.text) {
            (Some(path), _) => read_json::<ResearchQuery>(path)?,
            (None, Some(text)) => {
                let sources = match &self.sources {
                    Some(path) => read_json::<Vec<Source>>(path)?,
                    None => Vec::new(),
                };
                ResearchQuery::new(text.clone(), self.intent.unwrap_or_default())
                    .with_sources(sources)
            }
            (None, None) => {
                return Err(AppError::Config(
                    "Provide question text or --input <file>".to_string(),
                ))
            }
        };

        if let Some(language) = &self.language {
            query.language = Some(language.clone());
        }
        if let Some(state) = &self.state {
            query.state_code = Some(state.clone());
        }

        if query.text.trim().is_empty() {
            return Err(AppError::Config("Query text is empty".to_string()));
        }
        Ok(query)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read {:?}: {}", path, e)))?;
    Ok(serde_json::from_str(&content)?)
}

/// Plain-text rendering of a result bundle.
pub fn render(bundle: &ResultBundle) -> String {
    let mut out = String::new();

    match (&bundle.status, &bundle.answer_text) {
        (BundleStatus::Answered, Some(answer)) => {
            out.push_str(answer);
            out.push('\n');
        }
        (BundleStatus::Answered, None) => {}
        (BundleStatus::InsufficientVerifiedInformation { reason }, _) => {
            out.push_str(&format!(
                "Insufficient verified information: {}.\n\
                 Please check the official government portal before acting on this.\n",
                reason
            ));
        }
    }

    if !bundle.citations.is_empty() {
        out.push_str("\nSources:\n");
        for (i, citation) in bundle.citations.iter().enumerate() {
            out.push_str(&format!(
                "  [{}] {} ({}, reliability {:.2}{}{})\n",
                i + 1,
                citation.url,
                citation.domain,
                citation.reliability,
                citation
                    .publish_date
                    .as_deref()
                    .map(|d| format!(", published {}", d))
                    .unwrap_or_default(),
                if citation.verified { "" } else { ", unverified" },
            ));
        }
    }

    if bundle.served_from_cache {
        out.push_str("\n(served from cache)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use seva_research::{Citation, VerdictReason, VerificationSummary};
    use tempfile::TempDir;

    fn command(text: Option<&str>) -> AskCommand {
        AskCommand {
            text: text.map(str::to_string),
            input: None,
            intent: None,
            sources: None,
            language: None,
            state: None,
            json: false,
        }
    }

    fn bundle(status: BundleStatus, answer: Option<&str>) -> ResultBundle {
        ResultBundle {
            answer_text: answer.map(str::to_string),
            citations: vec![Citation {
                url: "https://pmkisan.gov.in/".to_string(),
                domain: "pmkisan.gov.in".to_string(),
                score: 0.91,
                reliability: 1.0,
                publish_date: Some("2026-10-01".to_string()),
                verified: true,
            }],
            served_from_cache: false,
            status,
            verification: VerificationSummary {
                strict_mode: true,
                trusted_source_count: 1,
                multi_source_news_verified: true,
            },
            intent: IntentClass::SchemeDiscovery,
            generation: None,
        }
    }

    #[test]
    fn test_load_query_from_text_and_sources() {
        let dir = TempDir::new().unwrap();
        let sources = dir.path().join("sources.json");
        std::fs::write(
            &sources,
            r#"[{"url": "https://pib.gov.in/a", "domain": "pib.gov.in", "publishDate": "2026-10-10"}]"#,
        )
        .unwrap();

        let mut cmd = command(Some("PM Kisan installment"));
        cmd.intent = Some(IntentClass::LatestNews);
        cmd.sources = Some(sources);
        cmd.state = Some("tn".to_string());

        let query = cmd.load_query().unwrap();
        assert_eq!(query.intent_class, IntentClass::LatestNews);
        assert_eq!(query.candidate_sources.len(), 1);
        assert_eq!(query.state_code.as_deref(), Some("tn"));
    }

    #[test]
    fn test_load_query_from_input_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("query.json");
        std::fs::write(&input, r#"{"text": "hello", "intentClass": "greeting"}"#).unwrap();

        let mut cmd = command(None);
        cmd.input = Some(input);
        let query = cmd.load_query().unwrap();
        assert_eq!(query.intent_class, IntentClass::Greeting);
    }

    #[test]
    fn test_load_query_rejects_blank_text() {
        assert!(matches!(
            command(Some("   ")).load_query(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_render_answer_with_sources() {
        let text = render(&bundle(BundleStatus::Answered, Some("Farmers get 6000 a year.")));
        assert!(text.starts_with("Farmers get 6000 a year.\n"));
        assert!(text.contains("[1] https://pmkisan.gov.in/ (pmkisan.gov.in, reliability 1.00, published 2026-10-01)"));
    }

    #[test]
    fn test_render_refusal() {
        let text = render(&bundle(
            BundleStatus::InsufficientVerifiedInformation {
                reason: VerdictReason::NoVerifiedSources,
            },
            None,
        ));
        assert!(text.starts_with("Insufficient verified information"));
    }
}
