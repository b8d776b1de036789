// LLM Engine - Chunked model invocation and summary pipeline
//
// Splits a prompt into chunks sized for the provider family, issues one
// inference call per chunk (sequentially by default, or through a bounded
// ordered pool), and reassembles the results in chunk order. A failing chunk
// only costs its own slot in the output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use sha2::{Digest, Sha256};
use tracing::Instrument;

use crate::llm::chunker::{plan_chunks, Chunk};
use crate::llm::config::{ChunkSizeTable, EngineConfig, GenerationParameters};
use crate::llm::interpreter::interpret;
use crate::llm::prompts::build_summary_prompt;
use crate::llm::provider::{build_request, extract_text};
use crate::llm::transport::InferenceTransport;
use crate::llm_types::{ChunkError, EngineError, ModelTarget, StructuredResult, TransportError};

/// Caller-held cancellation flag shared with an in-progress invocation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop issuing further chunk calls
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to do with completed chunk results when an invocation is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Return the results of the chunks that completed
    #[default]
    ReturnPartial,
    /// Return an empty text
    DiscardPartial,
}

/// Result of a cancellable invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub text: String,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub cancelled: bool,
}

/// Orchestrates chunking, request shaping and transport calls
pub struct ModelInvoker {
    transport: Arc<dyn InferenceTransport>,
    chunk_sizes: ChunkSizeTable,
    continuation_marker: String,
    call_timeout: Duration,
    max_concurrency: usize,
}

impl ModelInvoker {
    /// Create an invoker with default tables and sequential processing
    pub fn new(transport: Arc<dyn InferenceTransport>) -> Self {
        Self::from_config(transport, &EngineConfig::default())
    }

    pub fn from_config(transport: Arc<dyn InferenceTransport>, config: &EngineConfig) -> Self {
        Self {
            transport,
            chunk_sizes: config.chunk_sizes.clone(),
            continuation_marker: config.continuation_marker.clone(),
            call_timeout: config.request_timeout(),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn with_chunk_sizes(mut self, chunk_sizes: ChunkSizeTable) -> Self {
        self.chunk_sizes = chunk_sizes;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Allow up to `max_concurrency` chunk calls in flight (minimum 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Split `full_text` into the chunks that would be sent for `target`
    pub fn plan(&self, target: &ModelTarget, full_text: &str) -> Result<Vec<Chunk>, EngineError> {
        let budget = self.chunk_sizes.budget_for(target.family);
        if budget == 0 {
            return Err(EngineError::InvalidChunkBudget(target.family));
        }
        Ok(plan_chunks(full_text, budget))
    }

    /// Invoke the model over every chunk and join the results with a space
    ///
    /// Per-chunk failures appear inline as error markers. A failure outside
    /// the per-chunk boundary yields a single error string.
    pub async fn invoke(&self, target: &ModelTarget, full_text: &str) -> String {
        self.try_invoke(target, full_text)
            .await
            .unwrap_or_else(|e| format!("Error: {e}"))
    }

    /// Like [`invoke`](Self::invoke) but reports whole-invocation failures as errors
    pub async fn try_invoke(
        &self,
        target: &ModelTarget,
        full_text: &str,
    ) -> Result<String, EngineError> {
        let outcome = self
            .invoke_with_cancel(target, full_text, &CancelToken::new(), CancelPolicy::ReturnPartial)
            .await?;
        Ok(outcome.text)
    }

    /// Invoke with caller-initiated cancellation
    ///
    /// Once `cancel` fires no further chunk is issued; calls already in
    /// flight run to completion. `policy` decides whether completed results
    /// are returned.
    pub async fn invoke_with_cancel(
        &self,
        target: &ModelTarget,
        full_text: &str,
        cancel: &CancelToken,
        policy: CancelPolicy,
    ) -> Result<InvocationOutcome, EngineError> {
        let (span, planned) = self.begin(target, full_text);
        let chunks = planned?;
        let chunks_total = chunks.len();

        let results: Vec<String> = self
            .chunk_results(target, chunks, Some(cancel.clone()), span.clone())
            .collect()
            .await;

        let chunks_completed = results.len();
        let cancelled = chunks_completed < chunks_total;
        let text = match (cancelled, policy) {
            (true, CancelPolicy::DiscardPartial) => String::new(),
            _ => results.join(" "),
        };

        if cancelled {
            span.in_scope(|| {
                tracing::info!(
                    "invoke: Cancelled after {}/{} chunks (policy={:?})",
                    chunks_completed,
                    chunks_total,
                    policy
                )
            });
        }

        Ok(InvocationOutcome {
            text,
            chunks_total,
            chunks_completed,
            cancelled,
        })
    }

    /// Stream per-chunk results in chunk order as they become available
    ///
    /// The stream is finite and cannot be restarted. A failure outside the
    /// per-chunk boundary yields a single error item.
    pub fn invoke_streaming<'a>(
        &'a self,
        target: &'a ModelTarget,
        full_text: &str,
    ) -> BoxStream<'a, String> {
        self.stream_chunks(target, full_text, None)
    }

    /// Streaming variant that stops issuing chunks once `cancel` fires
    pub fn invoke_streaming_with_cancel<'a>(
        &'a self,
        target: &'a ModelTarget,
        full_text: &str,
        cancel: CancelToken,
    ) -> BoxStream<'a, String> {
        self.stream_chunks(target, full_text, Some(cancel))
    }

    fn stream_chunks<'a>(
        &'a self,
        target: &'a ModelTarget,
        full_text: &str,
        cancel: Option<CancelToken>,
    ) -> BoxStream<'a, String> {
        let (span, planned) = self.begin(target, full_text);
        match planned {
            Ok(chunks) => self.chunk_results(target, chunks, cancel, span).boxed(),
            Err(e) => stream::once(future::ready(format!("Error: {e}"))).boxed(),
        }
    }

    /// Open the invocation span and plan the chunks inside it
    ///
    /// Only metadata is logged: lengths, chunk count and a digest prefix.
    fn begin(
        &self,
        target: &ModelTarget,
        full_text: &str,
    ) -> (tracing::Span, Result<Vec<Chunk>, EngineError>) {
        let invocation_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("invoke", %invocation_id, model = %target.model_id);

        let planned = span.in_scope(|| {
            let planned = self.plan(target, full_text);
            match &planned {
                Ok(chunks) => tracing::info!(
                    "invoke: family={} prompt_len={} prompt_sha256={} chunks={} max_concurrency={}",
                    target.family,
                    full_text.len(),
                    digest_prefix(full_text),
                    chunks.len(),
                    self.max_concurrency
                ),
                Err(e) => tracing::warn!("invoke: {}", e),
            }
            planned
        });

        (span, planned)
    }

    /// Ordered, bounded pipeline of chunk calls
    ///
    /// `buffered` keeps at most `max_concurrency` calls in flight and yields
    /// results in input order, holding back completions whose predecessors
    /// are still running.
    fn chunk_results<'a>(
        &'a self,
        target: &'a ModelTarget,
        chunks: Vec<Chunk>,
        cancel: Option<CancelToken>,
        span: tracing::Span,
    ) -> impl Stream<Item = String> + Send + 'a {
        stream::iter(chunks)
            .take_while(move |chunk| {
                let stop = cancel.as_ref().is_some_and(CancelToken::is_cancelled);
                if stop {
                    tracing::debug!("invoke: Not issuing chunk {} after cancel", chunk.number());
                }
                future::ready(!stop)
            })
            .map(move |chunk| self.invoke_chunk(target, chunk).instrument(span.clone()))
            .buffered(self.max_concurrency)
    }

    /// Run one chunk; any failure becomes an inline marker
    async fn invoke_chunk(&self, target: &ModelTarget, chunk: Chunk) -> String {
        match self.call_chunk(target, &chunk).await {
            Ok(text) => {
                tracing::debug!(
                    "invoke_chunk: chunk={} text_len={}",
                    chunk.number(),
                    text.len()
                );
                text
            }
            Err(e) => {
                tracing::warn!("invoke_chunk: chunk={} failed: {}", chunk.number(), e);
                chunk_error_marker(chunk.number(), &e)
            }
        }
    }

    async fn call_chunk(&self, target: &ModelTarget, chunk: &Chunk) -> Result<String, ChunkError> {
        let prompt = chunk.prompt_text(&self.continuation_marker);
        let params = GenerationParameters::from(target.family);
        let payload = build_request(target.family, &prompt, &params);

        let body = tokio::time::timeout(
            self.call_timeout,
            self.transport.call(&target.model_id, &payload),
        )
        .await
        .unwrap_or_else(|_| {
            Err(TransportError::Timeout(self.call_timeout.as_millis() as u64))
        })?;

        Ok(extract_text(target.family, &body)?)
    }
}

/// Inline marker substituted for a failed chunk
pub fn chunk_error_marker(chunk_number: usize, error: &ChunkError) -> String {
    format!("[Error in chunk {chunk_number}: {error}]")
}

fn digest_prefix(text: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
    digest[..12].to_string()
}

/// Input for a summary request
#[derive(Debug, Clone, Default)]
pub struct SummaryRequest {
    /// Formatted statistics of the uploaded results
    pub analysis_data: String,
    pub instructions: String,
    /// Few-shot example blocks supplied by the example retriever
    pub examples: Vec<String>,
}

/// Prompt → invocation → interpretation
pub struct Summarizer {
    invoker: ModelInvoker,
}

impl Summarizer {
    pub fn new(invoker: ModelInvoker) -> Self {
        Self { invoker }
    }

    /// Produce a structured summary; never fails
    pub async fn summarize(&self, target: &ModelTarget, request: &SummaryRequest) -> StructuredResult {
        let prompt = match build_summary_prompt(
            &request.analysis_data,
            &request.instructions,
            &request.examples,
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!("summarize: Invalid request: {}", e);
                return StructuredResult::from_error(String::new(), &EngineError::from(e).to_string());
            }
        };

        match self.invoker.try_invoke(target, &prompt).await {
            Ok(text) => interpret(&text),
            Err(e) => {
                tracing::warn!("summarize: Invocation failed: {}", e);
                StructuredResult::from_error(String::new(), &e.to_string())
            }
        }
    }
}
