// Inference Transport - The narrow network seam of the pipeline
//
// The invoker only needs `call(model_id, payload) -> body`. The HTTP
// implementation talks to the Bedrock runtime REST API with a bearer token;
// tests substitute in-memory transports.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::llm_types::{FoundationModel, TransportError};

/// Performs a single inference call
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Send `payload` to `model_id` and return the raw response body
    async fn call(&self, model_id: &str, payload: &Value) -> Result<Vec<u8>, TransportError>;
}

#[derive(Debug, Deserialize)]
struct ModelSummaries {
    #[serde(rename = "modelSummaries", default)]
    model_summaries: Vec<ModelSummary>,
}

#[derive(Debug, Deserialize)]
struct ModelSummary {
    #[serde(rename = "modelId", default)]
    model_id: String,
    #[serde(rename = "providerName", default)]
    provider_name: String,
}

/// Parse a foundation model catalog response
pub fn parse_model_summaries(body: &[u8]) -> Result<Vec<FoundationModel>, serde_json::Error> {
    let parsed: ModelSummaries = serde_json::from_slice(body)?;
    Ok(parsed
        .model_summaries
        .into_iter()
        .map(|m| FoundationModel {
            name: format!("{} - {}", m.provider_name, m.model_id),
            id: m.model_id,
            provider: m.provider_name,
        })
        .collect())
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use reqwest::header::{ACCEPT, CONTENT_TYPE};
    use serde_json::Value;

    use super::{parse_model_summaries, InferenceTransport};
    use crate::llm::config::{EngineConfig, API_KEY_ENV};
    use crate::llm_types::{FoundationModel, TransportError};

    /// Bedrock runtime client authenticated with a bearer token
    #[derive(Clone)]
    pub struct HttpTransport {
        client: reqwest::Client,
        runtime_endpoint: String,
        catalog_endpoint: String,
        api_key: String,
    }

    impl HttpTransport {
        pub fn new(config: &EngineConfig, api_key: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                runtime_endpoint: config.runtime_endpoint().trim_end_matches('/').to_string(),
                catalog_endpoint: config.catalog_endpoint(),
                api_key: api_key.into(),
            }
        }

        /// Create a transport using the bearer token from the environment
        pub fn from_env(config: &EngineConfig) -> Result<Self, TransportError> {
            let api_key = std::env::var(API_KEY_ENV)
                .map_err(|_| TransportError::Credentials(format!("{API_KEY_ENV} is not set")))?;
            Ok(Self::new(config, api_key))
        }

        pub fn invoke_url(&self, model_id: &str) -> String {
            format!("{}/model/{}/invoke", self.runtime_endpoint, model_id)
        }

        /// List the foundation models available in the configured region
        ///
        /// Errors are logged and reported as an empty list.
        pub async fn list_foundation_models(&self) -> Vec<FoundationModel> {
            match self.fetch_foundation_models().await {
                Ok(models) => {
                    tracing::info!("list_foundation_models: Found {} models", models.len());
                    models
                }
                Err(e) => {
                    tracing::warn!("list_foundation_models: {}", e);
                    Vec::new()
                }
            }
        }

        async fn fetch_foundation_models(&self) -> Result<Vec<FoundationModel>, TransportError> {
            let url = format!("{}/foundation-models", self.catalog_endpoint);
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let body = read_body(response).await?;
            parse_model_summaries(&body).map_err(|e| TransportError::Network(e.to_string()))
        }
    }

    #[async_trait]
    impl InferenceTransport for HttpTransport {
        async fn call(&self, model_id: &str, payload: &Value) -> Result<Vec<u8>, TransportError> {
            let response = self
                .client
                .post(self.invoke_url(model_id))
                .bearer_auth(&self.api_key)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .json(payload)
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            read_body(response).await
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_summaries() {
        let body = br#"{
            "modelSummaries": [
                {"modelId": "anthropic.claude-v2", "providerName": "Anthropic", "modelName": "Claude"},
                {"modelId": "amazon.titan-text-express-v1", "providerName": "Amazon"}
            ]
        }"#;

        let models = parse_model_summaries(body).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "anthropic.claude-v2");
        assert_eq!(models[0].provider, "Anthropic");
        assert_eq!(models[0].name, "Anthropic - anthropic.claude-v2");
        assert_eq!(models[1].name, "Amazon - amazon.titan-text-express-v1");
    }

    #[test]
    fn test_parse_model_summaries_empty() {
        assert!(parse_model_summaries(b"{}").unwrap().is_empty());
        assert!(parse_model_summaries(b"not json").is_err());
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_invoke_url() {
        use crate::llm::config::EngineConfig;

        let mut config = EngineConfig::default();
        config.endpoint = Some("http://localhost:4566/".to_string());
        let transport = HttpTransport::new(&config, "token");

        assert_eq!(
            transport.invoke_url("anthropic.claude-v2"),
            "http://localhost:4566/model/anthropic.claude-v2/invoke"
        );
    }
}
