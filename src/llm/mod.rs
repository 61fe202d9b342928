//! Generation backends — the text-in, text-out service the repair loop asks
//! for candidate programs.
//!
//! One trait, two HTTP clients (Ollama for local models, Anthropic for the
//! hosted API), and a constructor that picks one from configuration.

pub mod client;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use client::{AnthropicClient, LlmError, OllamaClient};

use crate::config::{GeneratorConfig, Provider};

/// One synchronous request/response call: prompt in, completion text out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Short label for logs, e.g. `ollama/llama3`.
    fn describe(&self) -> String;
}

/// Build the configured backend.
pub fn backend_from_config(
    config: &GeneratorConfig,
) -> Result<Arc<dyn CompletionBackend>, LlmError> {
    let backend: Arc<dyn CompletionBackend> = match config.provider {
        Provider::Ollama => Arc::new(
            OllamaClient::with_base_url(
                &config.model,
                config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| OllamaClient::DEFAULT_BASE_URL.into()),
            )
            .with_sampling(config.temperature, None)
            .with_timeout(config.request_timeout()),
        ),
        Provider::Anthropic => Arc::new(
            AnthropicClient::from_env(&config.model, config.endpoint.clone())?
                .with_sampling(config.max_tokens, Some(config.temperature))
                .with_timeout(config.request_timeout()),
        ),
    };
    Ok(backend)
}
