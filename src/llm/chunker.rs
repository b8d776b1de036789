// Chunk Splitter - Splits oversized prompts into model-safe chunks
//
// Sentences are never cut: text is broken at sentence boundaries and
// sentences are packed greedily into chunks up to a character budget.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Terminal punctuation run followed by whitespace
    static ref SENTENCE_BOUNDARY: Regex = Regex::new(r"([.!?]+)\s+").unwrap();
}

/// An ordered segment of a larger prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the split text
    pub index: usize,
    pub text: String,
}

impl Chunk {
    /// Every chunk after the first continues earlier context
    pub fn is_continuation(&self) -> bool {
        self.index > 0
    }

    /// 1-based position, as reported in logs and error markers
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Text to send to the model, prefixed with `marker` for continuations
    pub fn prompt_text(&self, marker: &str) -> String {
        if self.is_continuation() {
            format!("{marker}{}", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Split text into sentences
///
/// A sentence ends at one or more of `.`, `!`, `?` followed by whitespace.
/// The punctuation stays with its sentence; the separating whitespace is
/// dropped. Whitespace-only fragments are skipped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for caps in SENTENCE_BOUNDARY.captures_iter(text) {
        let (Some(punct), Some(whole)) = (caps.get(1), caps.get(0)) else {
            continue;
        };
        push_trimmed(&mut sentences, &text[start..punct.end()]);
        start = whole.end();
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(sentences: &mut Vec<&'a str>, fragment: &'a str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
}

/// Split text into chunks of at most `max_chunk_size` characters
///
/// Sentences are accumulated while `len(current) + len(next) <= max_chunk_size`.
/// The budget is soft: a sentence longer than the budget becomes a chunk of
/// its own rather than being truncated.
pub fn split(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len > max_chunk_size {
            flush(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }

        current.push_str(sentence);
        current.push(' ');
        current_len += sentence_len + 1;
    }
    flush(&mut chunks, &current);

    chunks
}

fn flush(chunks: &mut Vec<String>, current: &str) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split text into indexed chunks
pub fn plan_chunks(text: &str, max_chunk_size: usize) -> Vec<Chunk> {
    split(text, max_chunk_size)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { index, text })
        .collect()
}
