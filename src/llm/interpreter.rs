// Response Interpreter - Structured results from model output
//
// Tries strict JSON extraction first (fenced ```json block, then the widest
// brace-delimited region). When no decodable structure is found, falls back
// to a line-based section parser.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::llm_types::{KeyMetric, StructuredResult, NOT_AVAILABLE};

lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?is)```json\s*(.*?)```").unwrap();
    static ref LIST_PREFIX: Regex = Regex::new(r"^(?:[-*]\s+|\d+[.)]\s+)").unwrap();
}

const NO_SUMMARY_PROVIDED: &str = "No summary provided";
const NO_SUMMARY_EXTRACTED: &str = "No summary extracted";
const NO_RECOMMENDATIONS_EXTRACTED: &str = "No specific recommendations extracted";
const NOT_SPECIFIED: &str = "Not specified";

/// Header lines are shorter than this many characters
const MAX_HEADER_LEN: usize = 30;

/// Significance lines are shorter than this many characters
const MAX_SIGNIFICANCE_LEN: usize = 50;

/// Interpret concatenated model output
pub fn interpret(text: &str) -> StructuredResult {
    tracing::info!("interpret: Received response_len={}", text.len());

    if let Some(result) = interpret_structured(text) {
        tracing::debug!(
            "interpret: Decoded structured block, {} recommendations, {} metrics",
            result.recommendations.len(),
            result.key_metrics.len()
        );
        return result;
    }

    tracing::debug!("interpret: No structured block, using section parser");
    interpret_sections(text)
}

/// Locate the candidate JSON region
///
/// A fenced ```json block wins; otherwise the span from the first `{` to the
/// last `}`.
fn extract_json_region(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim());
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default)]
    key_metrics: Option<Value>,
    #[serde(default)]
    recommendations: Option<Value>,
    #[serde(default)]
    limitations: Option<Value>,
    #[serde(default)]
    statistical_significance: Option<Value>,
}

fn interpret_structured(text: &str) -> Option<StructuredResult> {
    let region = extract_json_region(text)?;
    let raw: RawResult = match serde_json::from_str(region) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("interpret: Structured block did not decode: {}", e);
            return None;
        }
    };

    Some(StructuredResult {
        summary: raw
            .summary
            .as_ref()
            .and_then(value_text)
            .unwrap_or_else(|| NO_SUMMARY_PROVIDED.to_string()),
        key_metrics: raw.key_metrics.as_ref().map(metric_list).unwrap_or_default(),
        recommendations: raw.recommendations.as_ref().map(text_list).unwrap_or_default(),
        limitations: raw.limitations.as_ref().map(text_list).unwrap_or_default(),
        statistical_significance: raw
            .statistical_significance
            .as_ref()
            .and_then(value_text)
            .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        raw_response: text.to_string(),
    })
}

/// Render a scalar as text; `null` counts as absent
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn metric_list(value: &Value) -> Vec<KeyMetric> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(fields) => Some(metric_from_fields(fields)),
            Value::String(name) => Some(KeyMetric::named(name.clone())),
            _ => None,
        })
        .collect()
}

fn metric_from_fields(fields: &Map<String, Value>) -> KeyMetric {
    let field = |key: &str| {
        fields
            .get(key)
            .and_then(value_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    KeyMetric {
        name: field("name"),
        impact_range: field("impact_range"),
        probability: field("probability"),
        annualized_impact: field("annualized_impact"),
        interpretation: field("interpretation"),
    }
}

/// Section of free-text output currently being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    None,
    Summary,
    Recommendations,
    Limitations,
    Metrics,
}

/// Classification of one line of free-text output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    /// Short line naming a section; not content itself
    Header(Section),
    /// Short line stating significance; captured verbatim
    Significance(&'a str),
    /// Anything else, with list markers stripped
    Content(&'a str),
}

impl Section {
    /// Only header lines change the current section
    pub fn transition(self, line: &LineKind<'_>) -> Section {
        match line {
            LineKind::Header(next) => *next,
            _ => self,
        }
    }
}

/// Classify a single line of output
pub fn classify_line(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }

    let lower = line.to_lowercase();
    let len = line.chars().count();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if len < MAX_HEADER_LEN {
        if mentions(&["summary"]) {
            return LineKind::Header(Section::Summary);
        }
        if mentions(&["recommend", "action", "next step"]) {
            return LineKind::Header(Section::Recommendations);
        }
        if mentions(&["limitation", "caveat", "constraint"]) {
            return LineKind::Header(Section::Limitations);
        }
        if mentions(&["metric", "measure", "kpi"]) {
            return LineKind::Header(Section::Metrics);
        }
    }

    if len < MAX_SIGNIFICANCE_LEN
        && mentions(&["significance", "confidence", "p-value"])
        && !lower.contains("statistical_significance")
    {
        return LineKind::Significance(line);
    }

    LineKind::Content(strip_list_marker(line))
}

fn strip_list_marker(line: &str) -> &str {
    match LIST_PREFIX.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line,
    }
}

#[derive(Debug, Default)]
struct SectionCollector {
    summary: Vec<String>,
    recommendations: Vec<String>,
    limitations: Vec<String>,
    metrics: Vec<KeyMetric>,
    significance: Option<String>,
}

impl SectionCollector {
    fn push(&mut self, section: Section, content: &str) {
        if content.is_empty() {
            return;
        }
        match section {
            // Content before the first header is dropped
            Section::None => {}
            Section::Summary => self.summary.push(content.to_string()),
            Section::Recommendations => self.recommendations.push(content.to_string()),
            Section::Limitations => self.limitations.push(content.to_string()),
            Section::Metrics => self.metrics.push(KeyMetric::named(content)),
        }
    }

    fn finish(self, raw_response: &str) -> StructuredResult {
        let summary = if self.summary.is_empty() {
            NO_SUMMARY_EXTRACTED.to_string()
        } else {
            self.summary.join(" ")
        };
        let recommendations = if self.recommendations.is_empty() {
            vec![NO_RECOMMENDATIONS_EXTRACTED.to_string()]
        } else {
            self.recommendations
        };

        StructuredResult {
            summary,
            key_metrics: self.metrics,
            recommendations,
            limitations: self.limitations,
            statistical_significance: self
                .significance
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            raw_response: raw_response.to_string(),
        }
    }
}

/// Heuristic section parser for unstructured output
fn interpret_sections(text: &str) -> StructuredResult {
    let mut section = Section::None;
    let mut collector = SectionCollector::default();

    for line in text.lines() {
        let kind = classify_line(line);
        match kind {
            LineKind::Significance(value) => collector.significance = Some(value.to_string()),
            LineKind::Content(content) => collector.push(section, content),
            LineKind::Blank | LineKind::Header(_) => {}
        }
        section = section.transition(&kind);
    }

    collector.finish(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_block() {
        let text = r#"Here is the analysis:
```json
{"summary": "X", "recommendations": ["A", "B"]}
```
Thanks!"#;
        let result = interpret(text);

        assert_eq!(result.summary, "X");
        assert_eq!(result.recommendations, vec!["A", "B"]);
        assert!(result.limitations.is_empty());
        assert!(result.key_metrics.is_empty());
        assert_eq!(result.statistical_significance, "Not specified");
        assert_eq!(result.raw_response, text);
    }

    #[test]
    fn test_bare_json_object_with_surrounding_text() {
        let text = r#"Sure. {"summary": "Treatment wins", "limitations": ["Short test window"], "statistical_significance": "p = 0.04"} Let me know."#;
        let result = interpret(text);

        assert_eq!(result.summary, "Treatment wins");
        assert_eq!(result.limitations, vec!["Short test window"]);
        assert_eq!(result.statistical_significance, "p = 0.04");
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_widest_brace_region_spans_nested_objects() {
        let text = r#"{"summary": "S", "key_metrics": [{"name": "conversion", "probability": 0.97}]}"#;
        let result = interpret(text);

        assert_eq!(result.key_metrics.len(), 1);
        let metric = &result.key_metrics[0];
        assert_eq!(metric.name, "conversion");
        assert_eq!(metric.probability, "0.97");
        assert_eq!(metric.impact_range, "N/A");
        assert_eq!(metric.interpretation, "N/A");
    }

    #[test]
    fn test_missing_summary_uses_default() {
        let result = interpret(r#"{"recommendations": "Ship it"}"#);
        assert_eq!(result.summary, "No summary provided");
        assert_eq!(result.recommendations, vec!["Ship it"]);
    }

    #[test]
    fn test_null_fields_use_defaults() {
        let result = interpret(r#"{"summary": null, "statistical_significance": null, "limitations": null}"#);
        assert_eq!(result.summary, "No summary provided");
        assert_eq!(result.statistical_significance, "Not specified");
        assert!(result.limitations.is_empty());
    }

    #[test]
    fn test_string_metrics_become_named_metrics() {
        let result = interpret(r#"{"summary": "S", "key_metrics": ["Revenue per visitor"]}"#);
        assert_eq!(result.key_metrics, vec![KeyMetric::named("Revenue per visitor")]);
    }

    #[test]
    fn test_malformed_json_falls_back_to_sections() {
        let text = "Summary:\nThe treatment {clearly} improved things, {maybe}.\nRecommendations:\n- Roll out";
        let result = interpret(text);

        assert_eq!(
            result.summary,
            "The treatment {clearly} improved things, {maybe}."
        );
        assert_eq!(result.recommendations, vec!["Roll out"]);
    }

    #[test]
    fn test_section_fallback() {
        let text = "Summary:\nThe new checkout flow lifted conversion.\nIt did not hurt order value.\n\nRecommendations:\n- Do X\n* Do Y\n1. Do Z\n2) Do W";
        let result = interpret(text);

        assert_eq!(
            result.summary,
            "The new checkout flow lifted conversion. It did not hurt order value."
        );
        assert_eq!(result.recommendations, vec!["Do X", "Do Y", "Do Z", "Do W"]);
        assert!(result.limitations.is_empty());
        assert_eq!(result.statistical_significance, "Not specified");
    }

    #[test]
    fn test_section_fallback_limitations_metrics_and_significance() {
        let text = "Key Metrics:\n- Conversion rate +3 points\nLimitations:\n- Only two weeks of data\nSignificance: p = 0.04";
        let result = interpret(text);

        assert_eq!(
            result.key_metrics,
            vec![KeyMetric::named("Conversion rate +3 points")]
        );
        assert_eq!(result.limitations, vec!["Only two weeks of data"]);
        assert_eq!(result.statistical_significance, "Significance: p = 0.04");
        assert_eq!(result.summary, "No summary extracted");
        assert_eq!(
            result.recommendations,
            vec!["No specific recommendations extracted"]
        );
    }

    #[test]
    fn test_leading_unlabeled_content_is_dropped() {
        let text = "The experiment ran for two weeks.\nSummary:\nTreatment won.";
        let result = interpret(text);
        assert_eq!(result.summary, "Treatment won.");
    }

    #[test]
    fn test_interpret_is_idempotent_on_raw_response() {
        let inputs = [
            "```json\n{\"summary\": \"X\", \"recommendations\": [\"A\"]}\n```",
            "Summary:\nAll good.\nNext steps:\n- Ship",
            "",
        ];

        for input in inputs {
            let first = interpret(input);
            let second = interpret(&first.raw_response);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_classify_headers() {
        assert_eq!(classify_line("Summary:"), LineKind::Header(Section::Summary));
        assert_eq!(
            classify_line("## Recommended Actions"),
            LineKind::Header(Section::Recommendations)
        );
        assert_eq!(classify_line("Next steps"), LineKind::Header(Section::Recommendations));
        assert_eq!(classify_line("Caveats"), LineKind::Header(Section::Limitations));
        assert_eq!(classify_line("KPIs"), LineKind::Header(Section::Metrics));
    }

    #[test]
    fn test_long_keyword_line_is_content() {
        let line = "In summary, the treatment outperformed control on every metric.";
        assert_eq!(classify_line(line), LineKind::Content(line));
    }

    #[test]
    fn test_classify_significance() {
        assert_eq!(
            classify_line("Confidence level: 95%"),
            LineKind::Significance("Confidence level: 95%")
        );
        assert_eq!(
            classify_line("\"statistical_significance\": \"high\""),
            LineKind::Content("\"statistical_significance\": \"high\"")
        );
    }

    #[test]
    fn test_classify_strips_list_markers() {
        assert_eq!(classify_line("  - Do X"), LineKind::Content("Do X"));
        assert_eq!(classify_line("* Do Y"), LineKind::Content("Do Y"));
        assert_eq!(classify_line("12. Do Z"), LineKind::Content("Do Z"));
        assert_eq!(classify_line("3) Do W"), LineKind::Content("Do W"));
        assert_eq!(classify_line(""), LineKind::Blank);
    }

    #[test]
    fn test_transitions_only_on_headers() {
        let state = Section::None;
        let state = state.transition(&LineKind::Content("ignored"));
        assert_eq!(state, Section::None);

        let state = state.transition(&LineKind::Header(Section::Limitations));
        assert_eq!(state, Section::Limitations);

        let state = state.transition(&LineKind::Significance("p-value 0.01"));
        assert_eq!(state, Section::Limitations);

        let state = state.transition(&LineKind::Blank);
        assert_eq!(state, Section::Limitations);

        let state = state.transition(&LineKind::Header(Section::Summary));
        assert_eq!(state, Section::Summary);
    }
}
