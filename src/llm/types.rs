//! Wire types for the two generation services.
//!
//! Serde-serializable to JSON for HTTP calls. Internal types stay Rust-native.

use serde::{Deserialize, Serialize};

/// Resolve model aliases to full Anthropic model IDs.
pub fn resolve_model(alias: &str) -> &str {
    match alias {
        "opus" => "claude-opus-4-20250514",
        "sonnet" => "claude-sonnet-4-5-20250514",
        "haiku" => "claude-haiku-4-5-20251001",
        _ => alias, // pass through full model IDs
    }
}

// ── Anthropic Messages API ──

/// Request body for the Anthropic Messages API.
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Response from the Anthropic Messages API.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub model: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// A content block in the response.
#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: Option<String>,
}

/// Token usage from the API response.
#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl MessagesResponse {
    /// Extract the text content from the first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.content_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

// ── Ollama generate API ──

/// Request body for Ollama's `/api/generate`.
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Non-streaming response from `/api/generate`. Only the fields we read.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_aliases() {
        assert_eq!(resolve_model("opus"), "claude-opus-4-20250514");
        assert_eq!(resolve_model("sonnet"), "claude-sonnet-4-5-20250514");
        assert_eq!(resolve_model("haiku"), "claude-haiku-4-5-20251001");
        assert_eq!(resolve_model("llama3"), "llama3");
    }

    #[test]
    fn messages_request_skips_empty_fields() {
        let req = MessagesRequest {
            model: "claude-opus-4-20250514".into(),
            max_tokens: 4096,
            messages: vec![Message::user("Fix this")],
            system: None,
            temperature: None,
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"model\":\"claude-opus-4-20250514\""));
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("system"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn messages_response_text() {
        let json = r#"{
            "id": "msg_123",
            "model": "claude-opus-4-20250514",
            "content": [
                {"type": "text", "text": "```python\nprint(1)\n```"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;

        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text(), Some("```python\nprint(1)\n```"));
        assert_eq!(resp.usage.output_tokens, 5);
    }

    #[test]
    fn generate_request_shape() {
        let req = GenerateRequest {
            model: "llama3".into(),
            prompt: "hi".into(),
            stream: false,
            options: GenerateOptions {
                temperature: 0.2,
                num_predict: None,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["stream"], false);
        assert!(json["options"].get("num_predict").is_none());
        let temp = json["options"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.2).abs() < 0.001);
    }

    #[test]
    fn generate_response_tolerates_missing_fields() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"response": "x = 1"}"#).unwrap();
        assert_eq!(resp.response, "x = 1");
        assert!(!resp.done);
    }
}
