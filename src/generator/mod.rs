//! Generator Client — turns (source, trace, error) into one candidate program.
//!
//! Picks a mode from the error text, builds a single prompt, makes a single
//! backend call, and pulls the program text out of the response. No retries:
//! one failed call fails the repair cycle.

pub mod prompts;
pub mod stubs;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use crate::llm::{CompletionBackend, LlmError};
use crate::tracer::StepRecord;
use prompts::PromptInput;
use stubs::STUB_MARKER;

/// Why a request produced no candidate.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generation service unavailable: {0}")]
    Unavailable(#[source] LlmError),

    #[error("generation response malformed: {0}")]
    Malformed(String),
}

impl From<LlmError> for GenerateError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidResponse(msg) => GenerateError::Malformed(msg),
            other => GenerateError::Unavailable(other),
        }
    }
}

/// Prompt mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMode {
    /// Implement a stubbed function.
    Completion,
    /// Fix a fault.
    Repair,
}

impl RepairMode {
    /// The only dispatch on error text: does it carry the stub marker?
    pub fn for_error(error_text: &str) -> Self {
        if error_text.contains(STUB_MARKER) {
            RepairMode::Completion
        } else {
            RepairMode::Repair
        }
    }
}

impl std::fmt::Display for RepairMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairMode::Completion => write!(f, "completion"),
            RepairMode::Repair => write!(f, "repair"),
        }
    }
}

/// Builds repair requests against one backend.
pub struct GeneratorClient {
    backend: Arc<dyn CompletionBackend>,
    language: String,
    trace_tail: usize,
}

impl GeneratorClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, language: impl Into<String>) -> Self {
        Self {
            backend,
            language: language.into(),
            trace_tail: 20,
        }
    }

    /// How many trailing steps to include in the prompt (0 = none).
    pub fn with_trace_tail(mut self, steps: usize) -> Self {
        self.trace_tail = steps;
        self
    }

    /// Build the prompt for one request without sending it.
    pub fn prompt_for(
        &self,
        source_text: &str,
        trace_history: &[StepRecord],
        error_text: &str,
    ) -> String {
        let mode = RepairMode::for_error(error_text);
        let stubs = match mode {
            RepairMode::Completion => stubs::find_stubs(&self.language, source_text),
            RepairMode::Repair => Vec::new(),
        };
        let tail_start = trace_history.len().saturating_sub(self.trace_tail);

        prompts::build_prompt(&PromptInput {
            language: &self.language,
            mode,
            source: source_text,
            error_text,
            trace_tail: &trace_history[tail_start..],
            stubs: &stubs,
        })
    }

    /// One request, one candidate.
    pub async fn request_fix(
        &self,
        source_text: &str,
        trace_history: &[StepRecord],
        error_text: &str,
    ) -> Result<String, GenerateError> {
        let mode = RepairMode::for_error(error_text);
        let prompt = self.prompt_for(source_text, trace_history, error_text);

        info!(%mode, backend = %self.backend.describe(), "requesting candidate");
        debug!(prompt_bytes = prompt.len(), "prompt built");

        let raw = self.backend.complete(&prompt).await?;
        let candidate = extract_code(&raw);
        if candidate.is_empty() {
            return Err(GenerateError::Malformed(
                "response contained no program text".into(),
            ));
        }

        debug!(candidate_bytes = candidate.len(), "candidate extracted");
        Ok(candidate)
    }
}

/// Fenced block with an optional language tag on its own line.
static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)```").expect("valid regex")
});

/// Fence on a single line: ```code```.
static INLINE_FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid regex"));

/// Pull program text out of a completion: the first fenced block, else the
/// whole response. Always trimmed; may be empty.
pub fn extract_code(text: &str) -> String {
    if let Some(caps) = FENCED.captures(text) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = INLINE_FENCED.captures(text) {
        return caps[1].trim().to_string();
    }
    text.trim().to_string()
}
