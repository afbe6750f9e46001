//! Query intent taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intent class of an incoming query, assigned by the caller's classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentClass {
    Greeting,
    #[default]
    SchemeDiscovery,
    EligibilityCheck,
    ApplicationHelp,
    LatestNews,
    GeneralKnowledge,
    Comparison,
    Documents,
}

impl IntentClass {
    /// All intent classes, in declaration order.
    pub const ALL: [IntentClass; 8] = [
        Self::Greeting,
        Self::SchemeDiscovery,
        Self::EligibilityCheck,
        Self::ApplicationHelp,
        Self::LatestNews,
        Self::GeneralKnowledge,
        Self::Comparison,
        Self::Documents,
    ];

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::SchemeDiscovery => "scheme_discovery",
            Self::EligibilityCheck => "eligibility_check",
            Self::ApplicationHelp => "application_help",
            Self::LatestNews => "latest_news",
            Self::GeneralKnowledge => "general_knowledge",
            Self::Comparison => "comparison",
            Self::Documents => "documents",
        }
    }

    /// Whether answers for this intent must be backed by recent sources.
    pub fn is_time_sensitive(&self) -> bool {
        matches!(self, Self::LatestNews)
    }
}

impl fmt::Display for IntentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == normalized)
            .ok_or_else(|| format!("Unknown intent class: {}", s))
    }
}
