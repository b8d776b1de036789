// LLM Module - Chunked summary generation through hosted foundation models
//
// This module splits analysis prompts into provider-sized chunks, invokes a
// hosted model once per chunk, and interprets the combined reply into a
// structured summary. Provider families differ only in wire format; the
// network call sits behind the `InferenceTransport` trait.

pub mod chunker;
pub mod config;
pub mod engine;
pub mod interpreter;
pub mod prompts;
pub mod provider;
pub mod transport;

// Re-export commonly used types
pub use chunker::{plan_chunks, split, Chunk};
pub use config::{ChunkSizeTable, EngineConfig, GenerationParameters, CONTINUATION_MARKER};
pub use engine::{
    CancelPolicy, CancelToken, InvocationOutcome, ModelInvoker, Summarizer, SummaryRequest,
};
pub use interpreter::interpret;
pub use prompts::build_summary_prompt;
pub use provider::{build_request, extract_text};
pub use transport::InferenceTransport;
#[cfg(feature = "http")]
pub use transport::HttpTransport;
