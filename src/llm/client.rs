//! Raw HTTP clients for the generation services.
//!
//! No repair awareness — just makes API calls via reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};

use super::types::{
    GenerateOptions, GenerateRequest, GenerateResponse, Message, MessagesRequest,
    MessagesResponse,
};
use super::CompletionBackend;

/// Errors from LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),
}

fn build_http(timeout: Option<Duration>) -> Client {
    let mut builder = Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    // Only fails if the TLS backend cannot initialize; the plain client
    // hits the same condition lazily on first request.
    builder.build().unwrap_or_else(|_| Client::new())
}

/// Map 429 / 4xx / 5xx to errors; pass successful responses through.
async fn check_status(response: Response) -> Result<Response, LlmError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(LlmError::RateLimited { retry_after });
    }

    if status >= 400 {
        let body = response.text().await.unwrap_or_else(|_| "(no body)".into());
        return Err(LlmError::ApiError {
            status,
            message: body,
        });
    }

    Ok(response)
}

/// Raw HTTP client for the Anthropic Messages API.
#[derive(Debug)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    api_version: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

    /// Create a client with default base URL (https://api.anthropic.com).
    pub fn new(api_key: String, model: &str) -> Self {
        Self::with_base_url(api_key, model, Self::DEFAULT_BASE_URL.into())
    }

    /// Create a client with a custom base URL (for testing with mock servers).
    pub fn with_base_url(api_key: String, model: &str, base_url: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url,
            api_version: "2023-06-01".into(),
            model: super::types::resolve_model(model).to_string(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    /// Read ANTHROPIC_API_KEY from the environment.
    pub fn from_env(model: &str, base_url: Option<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::MissingApiKey("ANTHROPIC_API_KEY environment variable not set".into())
        })?;
        Ok(Self::with_base_url(
            api_key,
            model,
            base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.into()),
        ))
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http = build_http(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a messages request to the Anthropic API.
    pub async fn messages(&self, request: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let resp: MessagesResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        Ok(resp)
    }
}

#[async_trait]
impl CompletionBackend for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message::user(prompt)],
            system: None,
            temperature: self.temperature,
        };
        let resp = self.messages(&request).await?;
        resp.text()
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("no text block in response".into()))
    }

    fn describe(&self) -> String {
        format!("anthropic/{}", self.model)
    }
}

/// Raw HTTP client for a local Ollama server.
#[derive(Debug)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
    num_predict: Option<u32>,
}

impl OllamaClient {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    pub fn new(model: &str) -> Self {
        Self::with_base_url(model, Self::DEFAULT_BASE_URL.into())
    }

    pub fn with_base_url(model: &str, base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.2,
            num_predict: None,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, num_predict: Option<u32>) -> Self {
        self.temperature = temperature;
        self.num_predict = num_predict;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http = build_http(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One non-streaming `/api/generate` call.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self.http.post(&url).json(request).send().await?;

        let resp: GenerateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        Ok(resp)
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
        };
        Ok(self.generate(&request).await?.response)
    }

    fn describe(&self) -> String {
        format!("ollama/{}", self.model)
    }
}
