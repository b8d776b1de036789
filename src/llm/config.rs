// LLM Configuration - Provider tables and engine settings
//
// Defines the per-family chunk budgets and generation parameters, plus the
// engine configuration loaded from disk and the environment.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm_types::{ConfigError, ProviderFamily};

/// Prefix sent ahead of every chunk after the first
pub const CONTINUATION_MARKER: &str = "Continuing from previous part: ";

/// Budget used when a family has no entry in the table
pub const FALLBACK_CHUNK_BUDGET: usize = 1000;

/// Environment variable holding the bearer token for the runtime API
pub const API_KEY_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

const DEFAULT_REGION: &str = "us-west-2";

/// Maximum chunk size in characters for each provider family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSizeTable {
    #[serde(default)]
    budgets: HashMap<ProviderFamily, usize>,
    #[serde(default = "default_fallback_budget")]
    fallback: usize,
}

fn default_fallback_budget() -> usize {
    FALLBACK_CHUNK_BUDGET
}

impl Default for ChunkSizeTable {
    fn default() -> Self {
        let budgets = HashMap::from([
            (ProviderFamily::Anthropic, 1800),
            (ProviderFamily::Titan, 1500),
            (ProviderFamily::Llama, 1500),
            (ProviderFamily::Cohere, 1500),
            (ProviderFamily::Default, FALLBACK_CHUNK_BUDGET),
        ]);
        Self {
            budgets,
            fallback: FALLBACK_CHUNK_BUDGET,
        }
    }
}

impl ChunkSizeTable {
    /// Table with no per-family entries; every lookup yields `fallback`
    pub fn uniform(fallback: usize) -> Self {
        Self {
            budgets: HashMap::new(),
            fallback,
        }
    }

    /// Get the chunk budget for a family, falling back when it has no entry
    pub fn budget_for(&self, family: ProviderFamily) -> usize {
        self.budgets.get(&family).copied().unwrap_or(self.fallback)
    }

    /// Override the budget for one family
    pub fn with_budget(mut self, family: ProviderFamily, budget: usize) -> Self {
        self.budgets.insert(family, budget);
        self
    }
}

/// Generation parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParameters {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

impl From<ProviderFamily> for GenerationParameters {
    fn from(family: ProviderFamily) -> Self {
        // All families currently share the same defaults
        match family {
            ProviderFamily::Anthropic
            | ProviderFamily::Titan
            | ProviderFamily::Llama
            | ProviderFamily::Cohere
            | ProviderFamily::Default => Self::default(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Region used to derive the runtime and catalog endpoints
    pub region: String,
    /// Explicit runtime endpoint, overriding the region-derived one
    pub endpoint: Option<String>,
    /// Timeout for a single inference call
    pub request_timeout_secs: u64,
    /// Maximum number of chunk calls in flight (1 = sequential)
    pub max_concurrency: usize,
    pub continuation_marker: String,
    pub chunk_sizes: ChunkSizeTable,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            request_timeout_secs: 60,
            max_concurrency: 1,
            continuation_marker: CONTINUATION_MARKER.to_string(),
            chunk_sizes: ChunkSizeTable::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from the default location (if present) and apply environment overrides
    pub fn load_or_default() -> Self {
        let mut config = match Self::default_config_path() {
            Some(path) if path.exists() => Self::load(&path).unwrap_or_else(|e| {
                tracing::warn!(
                    "load_or_default: Ignoring config at {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }),
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Default config file path (`<config dir>/engine.json`)
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "SummaryEngine")
            .map(|dirs| dirs.config_dir().join("engine.json"))
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(region) = lookup("SUMMARY_ENGINE_REGION") {
            self.region = region;
        }
        if let Some(endpoint) = lookup("SUMMARY_ENGINE_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(secs) = lookup("SUMMARY_ENGINE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(n) = lookup("SUMMARY_ENGINE_MAX_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.max_concurrency = n;
        }
        if let Some(filter) = lookup("SUMMARY_ENGINE_LOG") {
            self.log_filter = filter;
        }
    }

    /// Runtime endpoint for inference calls
    pub fn runtime_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }

    /// Control-plane endpoint for the model catalog
    pub fn catalog_endpoint(&self) -> String {
        format!("https://bedrock.{}.amazonaws.com", self.region)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
