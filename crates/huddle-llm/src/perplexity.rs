// Perplexity client. OpenAI-compatible chat completions; citations arrive
// in a provider-specific top-level array with unstable field types.

use crate::traits::{ResearchClient, ResearchRequest, ResearchResponse};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use huddle_types::Citation;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

const PERPLEXITY_API_BASE: &str = "https://api.perplexity.ai";

pub struct PerplexityClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl PerplexityClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: PERPLEXITY_API_BASE.to_string(),
            model: model.into(),
        })
    }

    fn build_payload(&self, request: &ResearchRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": messages,
            "temperature": 0.2,
        })
    }
}

#[async_trait]
impl ResearchClient for PerplexityClient {
    async fn research(&self, request: ResearchRequest) -> Result<ResearchResponse> {
        let payload = self.build_payload(&request);

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Research request failed")?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("Research response was not JSON")?;

        if !status.is_success() {
            let detail = body
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or("no detail");
            bail!("Research provider error {status}: {detail}");
        }

        let answer = body
            .pointer("/choices/0/message/content")
            .or_else(|| body.pointer("/choices/0/delta/content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let citations = body
            .get("citations")
            .and_then(|v| v.as_array())
            .map(|list| Citation::normalize_list(list))
            .unwrap_or_default();

        Ok(ResearchResponse { answer, citations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::ChatMessage;

    #[test]
    fn payload_carries_all_roles() {
        let client = PerplexityClient::new("key", "sonar").unwrap();
        let request = ResearchRequest::new(vec![
            ChatMessage::system("facts only"),
            ChatMessage::user("report schema"),
        ]);
        let payload = client.build_payload(&request);
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(payload["model"], "sonar");
        assert_eq!(payload["max_tokens"], 2200);
    }
}
