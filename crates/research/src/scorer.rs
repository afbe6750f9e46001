//! Deterministic source scoring.
//!
//! Reliability comes from a fixed domain reputation table plus suffix rules,
//! never from model output. Recency only matters through `now`, so the same
//! `(source, now)` pair always scores identically.

use crate::types::{ScoredSource, Source};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use seva_core::IntentClass;
use std::collections::{HashMap, HashSet};

/// Reputation for domains missing from the table and matching no suffix rule.
pub const DEFAULT_RELIABILITY: f64 = 0.40;

/// Official portals at or above this score may stay undated on news queries.
pub const OFFICIAL_RELIABILITY: f64 = 0.95;

/// Recency score for undated sources.
pub const UNKNOWN_RECENCY: f64 = 0.5;

/// `(domain, reputation, is_news)`.
const DOMAIN_TABLE: &[(&str, f64, bool)] = &[
    // Central government
    ("myscheme.gov.in", 1.0, false),
    ("india.gov.in", 1.0, false),
    ("pmkisan.gov.in", 1.0, false),
    ("pmjay.gov.in", 1.0, false),
    ("nrega.nic.in", 1.0, false),
    ("pmayg.nic.in", 1.0, false),
    ("pmaymis.gov.in", 1.0, false),
    ("pib.gov.in", 0.97, false),
    ("nic.in", 0.97, false),
    // State governments
    ("tn.gov.in", 1.0, false),
    ("tahdco.tn.gov.in", 1.0, false),
    ("tnschemes.tn.gov.in", 1.0, false),
    ("tnsocialwelfare.tn.gov.in", 0.97, false),
    ("tnau.ac.in", 0.97, false),
    ("sipcot.com", 0.95, false),
    ("ap.gov.in", 1.0, false),
    ("ts.gov.in", 1.0, false),
    ("tsiic.telangana.gov.in", 0.95, false),
    ("karnataka.gov.in", 1.0, false),
    ("sevasindhu.karnataka.gov.in", 0.97, false),
    ("kerala.gov.in", 1.0, false),
    ("maharashtra.gov.in", 1.0, false),
    ("mahadbt.maharashtra.gov.in", 0.97, false),
    ("gujarat.gov.in", 1.0, false),
    ("up.gov.in", 1.0, false),
    ("sspy-up.gov.in", 0.97, false),
    ("bihar.gov.in", 1.0, false),
    ("wb.gov.in", 1.0, false),
    ("odisha.gov.in", 1.0, false),
    ("rajasthan.gov.in", 1.0, false),
    ("mp.gov.in", 1.0, false),
    ("cgstate.gov.in", 1.0, false),
    // Reference
    ("wikipedia.org", 0.80, false),
    ("britannica.com", 0.80, false),
    // News
    ("thehindu.com", 0.72, true),
    ("ndtv.com", 0.70, true),
    ("livemint.com", 0.70, true),
    ("economictimes.com", 0.70, true),
    ("economictimes.indiatimes.com", 0.70, true),
    ("business-standard.com", 0.70, true),
    ("businessstandard.com", 0.70, true),
    ("financialexpress.com", 0.68, true),
    ("hindustantimes.com", 0.67, true),
    ("timesofindia.com", 0.67, true),
    ("timesofindia.indiatimes.com", 0.67, true),
    ("moneycontrol.com", 0.65, true),
    ("news18.com", 0.63, true),
    // Research vendors
    ("nvidia.com", 0.75, false),
    ("google.com", 0.75, false),
];

const SUFFIX_RULES: &[(&str, f64)] = &[
    (".gov.in", 1.0),
    (".nic.in", 1.0),
    (".gov", 0.9),
    (".edu", 0.85),
    (".ac.in", 0.85),
    (".org", 0.70),
];

/// Lower-case a domain (or URL) down to its bare host, dropping `www.`.
pub fn normalize_domain(raw: &str) -> String {
    let raw = raw.trim().to_lowercase();
    let without_scheme = raw.split_once("://").map_or(raw.as_str(), |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    let host = host.trim_end_matches('.');
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Parse a publish date; unparseable dates are treated as absent.
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days between `published` and `now`, floored at zero.
pub fn age_days(published: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - published).num_days().max(0)
}

/// Recency tier for citation ranking.
pub fn recency_score(age_days: Option<i64>) -> f64 {
    match age_days {
        None => UNKNOWN_RECENCY,
        Some(days) if days <= 7 => 1.0,
        Some(days) if days <= 30 => 0.9,
        Some(days) if days <= 90 => 0.75,
        Some(days) if days <= 365 => 0.5,
        Some(_) => 0.3,
    }
}

/// Share of query keywords found in the source snippet and URL.
pub fn relevance(query: &str, source: &Source) -> f64 {
    let query_words = keywords(query);
    if query_words.is_empty() {
        return 0.5;
    }
    let content = format!("{} {}", source.raw_snippet, source.url);
    let content_words = keywords(&content);
    let overlap = query_words.intersection(&content_words).count();
    overlap as f64 / query_words.len() as f64
}

fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Blended ranking score, rounded to three decimals.
pub fn citation_score(relevance: f64, recency: f64, reliability: f64) -> f64 {
    let score = relevance * 0.4 + recency * 0.3 + reliability * 0.3;
    (score * 1000.0).round() / 1000.0
}

/// Domain reputation lookup plus recency classification.
#[derive(Debug, Clone)]
pub struct SourceScorer {
    max_news_age_days: u32,
    overrides: HashMap<String, f64>,
}

impl SourceScorer {
    pub fn new(max_news_age_days: u32) -> Self {
        Self {
            max_news_age_days,
            overrides: HashMap::new(),
        }
    }

    /// Extra or replacement reputations, keyed by domain.
    pub fn with_overrides(mut self, overrides: &HashMap<String, f64>) -> Self {
        self.overrides = overrides
            .iter()
            .map(|(domain, score)| (normalize_domain(domain), score.clamp(0.0, 1.0)))
            .collect();
        self
    }

    /// Reputation and news flag for a normalized domain.
    pub fn reputation(&self, domain: &str) -> (f64, bool) {
        if domain.is_empty() {
            return (DEFAULT_RELIABILITY, false);
        }

        let builtin = DOMAIN_TABLE
            .iter()
            .filter(|(entry, _, _)| matches_host(domain, entry))
            .max_by_key(|(entry, _, _)| entry.len());
        let overridden = self
            .overrides
            .iter()
            .filter(|(entry, _)| matches_host(domain, entry))
            .max_by_key(|(entry, _)| entry.len());

        match (builtin, overridden) {
            (Some((entry, _, news)), Some((key, score))) if entry.len() <= key.len() => {
                (*score, *news)
            }
            (Some((_, score, news)), _) => (*score, *news),
            (None, Some((_, score))) => (*score, false),
            (None, None) => (suffix_reputation(domain), false),
        }
    }

    /// Score a source without any intent-specific penalty.
    pub fn score(&self, source: &Source, now: DateTime<Utc>) -> ScoredSource {
        self.score_for(source, IntentClass::default(), now)
    }

    /// Score a source for a query of the given intent.
    ///
    /// Time-sensitive intents zero the reliability of dated sources older
    /// than the news age limit.
    pub fn score_for(
        &self,
        source: &Source,
        intent: IntentClass,
        now: DateTime<Utc>,
    ) -> ScoredSource {
        let raw_domain = if source.domain.trim().is_empty() {
            source.url.as_str()
        } else {
            source.domain.as_str()
        };
        let normalized_domain = normalize_domain(raw_domain);
        let (domain_reputation, is_news) = self.reputation(&normalized_domain);

        let age_days = source
            .publish_date
            .as_deref()
            .and_then(parse_publish_date)
            .map(|published| age_days(published, now));

        let stale = intent.is_time_sensitive()
            && age_days.is_some_and(|days| days > i64::from(self.max_news_age_days));
        let reliability_score = if stale { 0.0 } else { domain_reputation };

        ScoredSource {
            source: source.clone(),
            normalized_domain,
            reliability_score,
            domain_reputation,
            age_days,
            is_news,
            recency_score: recency_score(age_days),
        }
    }
}

impl Default for SourceScorer {
    fn default() -> Self {
        Self::new(21)
    }
}

fn matches_host(domain: &str, entry: &str) -> bool {
    domain == entry
        || domain
            .strip_suffix(entry)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn suffix_reputation(domain: &str) -> f64 {
    SUFFIX_RULES
        .iter()
        .find(|(suffix, _)| domain.ends_with(suffix))
        .map_or(DEFAULT_RELIABILITY, |(_, score)| *score)
}
