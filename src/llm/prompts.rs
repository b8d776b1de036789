// LLM Prompts - Summary prompt for experiment analysis results
//
// Combines the formatted analysis data, the analyst's instructions and any
// few-shot example blocks, and asks for the JSON shape the interpreter reads.

use crate::llm_types::PromptError;

/// Maximum number of few-shot examples included in a prompt
const MAX_EXAMPLES: usize = 3;

const OUTPUT_FORMAT: &str = r#"Output JSON format (wrap it in a ```json code block):
{
  "summary": "two or three sentence overview of the experiment outcome",
  "key_metrics": [
    {
      "name": "metric name",
      "impact_range": "estimated range of the effect",
      "probability": "probability the effect is real",
      "annualized_impact": "projected yearly impact",
      "interpretation": "what the number means for the business"
    }
  ],
  "recommendations": ["concrete next step"],
  "limitations": ["caveat about the data or method"],
  "statistical_significance": "overall significance assessment"
}

Rules:
- Base every statement on the analysis data; do not invent numbers
- Use "N/A" for metric fields the data does not support
- If nothing is significant, say so in "statistical_significance""#;

/// Build the summary prompt
///
/// # Arguments
/// * `analysis_data` - Descriptive statistics of the uploaded results
/// * `instructions` - What the analyst wants the summary to focus on
/// * `examples` - Few-shot example blocks (at most the first three are used)
pub fn build_summary_prompt(
    analysis_data: &str,
    instructions: &str,
    examples: &[String],
) -> Result<String, PromptError> {
    validate_inputs(analysis_data, instructions)?;

    let context = "You are an experimentation analyst. You summarize A/B test results \
         for product and business stakeholders and recommend what to do next.";

    let examples_section = build_examples_section(examples);

    Ok(format!(
        "{context}\n\n\
         Based on the following statistical analysis data:\n{}\n\n\
         Please consider the following instructions:\n{}\n\
         {examples_section}\n\
         Generate a summary with recommended actions.\n\n\
         {OUTPUT_FORMAT}",
        analysis_data.trim(),
        instructions.trim(),
    ))
}

fn validate_inputs(analysis_data: &str, instructions: &str) -> Result<(), PromptError> {
    if instructions.trim().is_empty() {
        return Err(PromptError::EmptyInstructions);
    }
    if analysis_data.trim().is_empty() {
        return Err(PromptError::EmptyAnalysisData);
    }
    Ok(())
}

fn build_examples_section(examples: &[String]) -> String {
    let blocks: Vec<String> = examples
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .take(MAX_EXAMPLES)
        .enumerate()
        .map(|(i, e)| format!("Example {}:\n{e}", i + 1))
        .collect();

    if blocks.is_empty() {
        return String::new();
    }

    format!(
        "\nHere are examples of good summaries for similar experiments:\n\n{}\n",
        blocks.join("\n\n")
    )
}
