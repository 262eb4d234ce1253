// Anthropic Messages API client (HTTP direct, no SDK)

use crate::traits::{CompletionClient, CompletionRequest};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use huddle_types::ChatRole;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Appended to the system prompt when the caller wants strict JSON. The
/// Messages API has no response_format knob, so the instruction is the
/// contract and the caller re-validates with `json::parse_object`.
const JSON_ONLY_SUFFIX: &str = "\n\nIMPORTANT: Output MUST be valid JSON only.\n\
- Do NOT wrap in ``` fences.\n\
- Do NOT include any commentary, headers, markdown, or trailing text.\n\
- The first character of your response must be \"{\" and the last must be \"}\".";

pub struct AnthropicClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: ANTHROPIC_API_BASE.to_string(),
            model: model.into(),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_payload(&self, request: &CompletionRequest) -> Value {
        // System turns ride in the top-level `system` field; the messages
        // array only carries user/assistant roles.
        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let mut system = request.system.clone();
        if request.wants_json {
            system.push_str(JSON_ONLY_SUFFIX);
        }

        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "system": system,
            "messages": messages,
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let payload = self.build_payload(&request);

        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Completion request failed")?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("Completion response was not JSON")?;

        if !status.is_success() {
            let detail = body
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or("no detail");
            bail!("Completion provider error {status}: {detail}");
        }

        let parsed: MessagesResponse =
            serde_json::from_value(body).context("Unexpected completion response shape")?;

        let text = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::ChatMessage;

    #[test]
    fn payload_moves_system_turns_out_of_messages() {
        let client = AnthropicClient::new("key", "claude-test").unwrap();
        let request = CompletionRequest::new(
            "persona",
            vec![
                ChatMessage::system("ignored inline"),
                ChatMessage::user("hello"),
                ChatMessage::assistant("hi"),
            ],
        );
        let payload = client.build_payload(&request);

        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(payload["system"], "persona");
    }

    #[test]
    fn wants_json_appends_strict_instruction() {
        let client = AnthropicClient::new("key", "claude-test").unwrap();
        let request = CompletionRequest::new("router", vec![ChatMessage::user("route me")]).json();
        let payload = client.build_payload(&request);
        let system = payload["system"].as_str().unwrap();
        assert!(system.starts_with("router"));
        assert!(system.contains("valid JSON only"));
    }

    // Assembled turns carry grounding blocks as assistant messages; every
    // one of them must land in the wire payload.
    #[test]
    fn assistant_context_blocks_survive_the_payload() {
        let client = AnthropicClient::new("key", "claude-test").unwrap();
        let request = CompletionRequest::new(
            "persona",
            vec![
                ChatMessage::user("Toronto General Hospital"),
                ChatMessage::assistant("[Knowledge Base]\nnotes"),
                ChatMessage::assistant("[Account Memory]\nAccount: TGH"),
                ChatMessage::assistant("[External Research]\nfindings"),
                ChatMessage::user("Write the final reply."),
            ],
        );
        let payload = client.build_payload(&request);

        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);
        let joined: String = messages
            .iter()
            .filter_map(|m| m["content"].as_str())
            .collect();
        assert!(joined.contains("[Knowledge Base]"));
        assert!(joined.contains("[Account Memory]"));
        assert!(joined.contains("[External Research]"));
        assert_eq!(messages.last().unwrap()["role"], "user");
    }

    #[test]
    fn response_shape_parses_text_blocks() {
        let raw = r#"{"content":[{"type":"text","text":"a"},{"type":"tool_use"},{"type":"text","text":"b"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text: Vec<&str> = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(text, vec!["a", "b"]);
    }

    #[test]
    fn base_url_is_overridable_for_tests() {
        let client = AnthropicClient::new("key", "claude-test")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        assert_eq!(client.base_url, "http://127.0.0.1:9");
    }
}
