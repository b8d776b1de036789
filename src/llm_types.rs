// LLM Types - Core types for the summary pipeline
//
// These types are always available (not feature-gated) so callers can
// render results and match on errors without pulling in the HTTP transport.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model identifier substrings, in match order. First match wins.
const FAMILY_MARKERS: &[(&str, ProviderFamily)] = &[
    ("anthropic", ProviderFamily::Anthropic),
    ("amazon.titan", ProviderFamily::Titan),
    ("meta.llama", ProviderFamily::Llama),
    ("cohere", ProviderFamily::Cohere),
];

/// Wire-format dialect a model identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    Anthropic,
    Titan,
    Llama,
    Cohere,
    Default,
}

impl ProviderFamily {
    pub const ALL: [ProviderFamily; 5] = [
        Self::Anthropic,
        Self::Titan,
        Self::Llama,
        Self::Cohere,
        Self::Default,
    ];

    /// Resolve the family for a model identifier (case-insensitive substring match)
    pub fn from_model_id(model_id: &str) -> Self {
        let lowered = model_id.to_lowercase();
        FAMILY_MARKERS
            .iter()
            .find(|(marker, _)| lowered.contains(marker))
            .map_or(Self::Default, |(_, family)| *family)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Titan => "titan",
            Self::Llama => "llama",
            Self::Cohere => "cohere",
            Self::Default => "default",
        }
    }

}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model identifier with its family resolved once at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    pub model_id: String,
    pub family: ProviderFamily,
}

impl ModelTarget {
    pub fn new(model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        let family = ProviderFamily::from_model_id(&model_id);
        Self { model_id, family }
    }
}

/// One entry of the provider's foundation model catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundationModel {
    pub id: String,
    pub provider: String,
    pub name: String,
}

/// A single metric reported by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub name: String,
    pub impact_range: String,
    pub probability: String,
    pub annualized_impact: String,
    pub interpretation: String,
}

impl KeyMetric {
    /// Metric known only by name (heuristic extraction has no numbers)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            impact_range: NOT_AVAILABLE.to_string(),
            probability: NOT_AVAILABLE.to_string(),
            annualized_impact: NOT_AVAILABLE.to_string(),
            interpretation: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Placeholder for metric fields the model did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Canonical interpreted model output
///
/// Always fully populated: absent data is represented by empty lists or
/// sentinel strings, never by missing fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub summary: String,
    pub key_metrics: Vec<KeyMetric>,
    pub recommendations: Vec<String>,
    pub limitations: Vec<String>,
    pub statistical_significance: String,
    pub raw_response: String,
}

impl StructuredResult {
    /// Result used when the pipeline could not produce model output
    pub fn from_error(raw_response: impl Into<String>, reason: &str) -> Self {
        Self {
            summary: format!("Error generating summary: {reason}"),
            key_metrics: Vec::new(),
            recommendations: vec!["Unable to generate recommendations due to an error".to_string()],
            limitations: Vec::new(),
            statistical_significance: "Not specified".to_string(),
            raw_response: raw_response.into(),
        }
    }
}

/// Failure of a single inference call
///
/// `Display` never includes provider-supplied text; the raw error body of a
/// non-success status is kept on the value for callers that want it.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider returned status {status}")]
    Status { status: u16, body: String },
    #[error("inference call timed out after {0} ms")]
    Timeout(u64),
    #[error("missing credentials: {0}")]
    Credentials(String),
}

impl TransportError {
    /// Short classified reason for inline markers
    pub fn reason(&self) -> String {
        match self {
            Self::Network(_) => "network error".to_string(),
            Self::Status { status, .. } => format!("provider returned status {status}"),
            Self::Timeout(ms) => format!("inference call timed out after {ms} ms"),
            Self::Credentials(_) => "missing credentials".to_string(),
        }
    }
}

/// Failure to read generated text out of a provider response
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("invalid JSON in provider response: {0}")]
    InvalidJson(String),
    #[error("provider response contained no results")]
    EmptyResults,
}

impl ExtractError {
    /// Short classified reason for inline markers
    pub fn reason(&self) -> String {
        match self {
            Self::InvalidJson(_) => "invalid JSON in provider response".to_string(),
            Self::EmptyResults => "provider response contained no results".to_string(),
        }
    }
}

/// Failure of one chunk, rendered inline in the joined output
///
/// Displays only the classified reason, so a marker never carries braces or
/// provider text into the interpreter.
#[derive(Debug, Clone, Error)]
pub enum ChunkError {
    #[error("{}", TransportError::reason(.0))]
    Transport(#[from] TransportError),
    #[error("{}", ExtractError::reason(.0))]
    Extract(#[from] ExtractError),
}

/// Failure while building a prompt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("instructions cannot be empty")]
    EmptyInstructions,
    #[error("analysis data cannot be empty")]
    EmptyAnalysisData,
}

/// Failure outside the per-chunk boundary of an invocation
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("chunk budget for {0} must be greater than zero")]
    InvalidChunkBudget(ProviderFamily),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Failure loading engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_model_id() {
        assert_eq!(
            ProviderFamily::from_model_id("anthropic.claude-v2:1"),
            ProviderFamily::Anthropic
        );
        assert_eq!(
            ProviderFamily::from_model_id("amazon.titan-text-express-v1"),
            ProviderFamily::Titan
        );
        assert_eq!(
            ProviderFamily::from_model_id("meta.llama3-70b-instruct-v1:0"),
            ProviderFamily::Llama
        );
        assert_eq!(
            ProviderFamily::from_model_id("cohere.command-text-v14"),
            ProviderFamily::Cohere
        );
        assert_eq!(
            ProviderFamily::from_model_id("mistral.mistral-7b-instruct-v0:2"),
            ProviderFamily::Default
        );
    }

    #[test]
    fn test_family_match_is_case_insensitive() {
        assert_eq!(
            ProviderFamily::from_model_id("Anthropic.Claude-3-Haiku"),
            ProviderFamily::Anthropic
        );
        assert_eq!(
            ProviderFamily::from_model_id("AMAZON.TITAN-TEXT-LITE-V1"),
            ProviderFamily::Titan
        );
    }

    #[test]
    fn test_first_marker_wins() {
        // "anthropic" is checked before "cohere"
        assert_eq!(
            ProviderFamily::from_model_id("cohere-proxy/anthropic.claude"),
            ProviderFamily::Anthropic
        );
        // "titan" alone is not the "amazon.titan" marker
        assert_eq!(
            ProviderFamily::from_model_id("titan-lite"),
            ProviderFamily::Default
        );
    }

    #[test]
    fn test_model_target_resolves_once() {
        let target = ModelTarget::new("meta.llama2-13b-chat-v1");
        assert_eq!(target.family, ProviderFamily::Llama);
        assert_eq!(target.model_id, "meta.llama2-13b-chat-v1");
    }

    #[test]
    fn test_error_result_is_fully_populated() {
        let result = StructuredResult::from_error("raw", "boom");
        assert!(result.summary.contains("boom"));
        assert_eq!(result.recommendations.len(), 1);
        assert!(result.limitations.is_empty());
        assert_eq!(result.statistical_significance, "Not specified");
        assert_eq!(result.raw_response, "raw");
    }

    #[test]
    fn test_status_error_display_omits_body() {
        let error = TransportError::Status {
            status: 400,
            body: r#"{"message":"Input is too long for requested model."}"#.to_string(),
        };
        assert_eq!(error.to_string(), "provider returned status 400");
    }

    #[test]
    fn test_chunk_error_uses_short_reasons() {
        let cases = [
            (
                ChunkError::from(TransportError::Network("error sending request for url (https://x/{id})".to_string())),
                "network error",
            ),
            (
                ChunkError::from(TransportError::Status {
                    status: 429,
                    body: r#"{"message":"Too many requests"}"#.to_string(),
                }),
                "provider returned status 429",
            ),
            (
                ChunkError::from(TransportError::Timeout(50)),
                "inference call timed out after 50 ms",
            ),
            (
                ChunkError::from(ExtractError::InvalidJson("expected value at line 1 column 1".to_string())),
                "invalid JSON in provider response",
            ),
            (ChunkError::from(ExtractError::EmptyResults), "provider response contained no results"),
        ];

        for (error, expected) in cases {
            let text = error.to_string();
            assert_eq!(text, expected);
            assert!(!text.contains('{') && !text.contains('}'));
        }
    }

    #[test]
    fn test_named_metric_uses_placeholders() {
        let metric = KeyMetric::named("Conversion rate up 3%");
        assert_eq!(metric.name, "Conversion rate up 3%");
        assert_eq!(metric.impact_range, NOT_AVAILABLE);
        assert_eq!(metric.interpretation, NOT_AVAILABLE);
    }
}
