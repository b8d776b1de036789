// Summary Engine - Experiment result summaries from hosted language models
//
// This library turns statistical analysis of A/B test results into a
// structured summary (key metrics, recommendations, limitations) by
// prompting a hosted foundation model.

pub mod llm;
pub mod logging;

// Always available shared types and errors
pub mod llm_types;

pub use llm::{ModelInvoker, Summarizer, SummaryRequest};
pub use llm_types::{ModelTarget, ProviderFamily, StructuredResult};
