// Provider Adapter - Wire formats for each provider family
//
// Maps a prompt plus generation parameters to the request body a family
// expects, and reads the generated text back out of its response body.
// Pure data transformation: the transport owns the network call.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::config::GenerationParameters;
use crate::llm_types::{ExtractError, ProviderFamily};

/// Build the request body for a family
pub fn build_request(family: ProviderFamily, text: &str, params: &GenerationParameters) -> Value {
    match family {
        ProviderFamily::Anthropic => json!({
            "prompt": format!("\n\nHuman: {text}\n\nAssistant:"),
            "max_tokens_to_sample": params.max_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
        }),
        ProviderFamily::Titan => json!({
            "inputText": text,
            "textGenerationConfig": {
                "maxTokenCount": params.max_tokens,
                "temperature": params.temperature,
                "topP": params.top_p,
            },
        }),
        ProviderFamily::Llama => json!({
            "prompt": text,
            "max_gen_len": params.max_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
        }),
        ProviderFamily::Cohere => json!({
            "prompt": text,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "p": params.top_p,
        }),
        ProviderFamily::Default => json!({
            "prompt": text,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    completion: String,
}

#[derive(Debug, Deserialize)]
struct TitanResponse {
    #[serde(default = "default_titan_results")]
    results: Vec<TitanResult>,
}

#[derive(Debug, Default, Deserialize)]
struct TitanResult {
    #[serde(rename = "outputText", default)]
    output_text: String,
}

// A body without `results` reads as one empty result
fn default_titan_results() -> Vec<TitanResult> {
    vec![TitanResult::default()]
}

#[derive(Debug, Deserialize)]
struct LlamaResponse {
    #[serde(default)]
    generation: String,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    #[serde(default)]
    text: String,
}

/// Extract the generated text from a response body
///
/// Missing text fields read as an empty string. The Default family has no
/// known schema, so its whole body is returned in serialized form.
pub fn extract_text(family: ProviderFamily, body: &[u8]) -> Result<String, ExtractError> {
    let text = match family {
        ProviderFamily::Anthropic => decode::<AnthropicResponse>(body)?.completion,
        ProviderFamily::Titan => decode::<TitanResponse>(body)?
            .results
            .into_iter()
            .next()
            .ok_or(ExtractError::EmptyResults)?
            .output_text,
        ProviderFamily::Llama => decode::<LlamaResponse>(body)?.generation,
        ProviderFamily::Cohere => decode::<CohereResponse>(body)?.text,
        ProviderFamily::Default => decode::<Value>(body)?.to_string(),
    };

    tracing::debug!(
        "extract_text: family={} body_len={} text_len={}",
        family,
        body.len(),
        text.len()
    );

    Ok(text)
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ExtractError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(
            "extract_text: Failed to decode provider response: category={:?} line={} column={}",
            e.classify(),
            e.line(),
            e.column()
        );
        ExtractError::InvalidJson(e.to_string())
    })
}
