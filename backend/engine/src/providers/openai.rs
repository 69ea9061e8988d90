use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use ponder_core::{ChatTransport, Completion, SamplingParams, Transcript};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions transport for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleTransport {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatibleTransport {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound each request; an in-flight call cannot be cancelled otherwise.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Value,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn non_zero(value: f32) -> Option<f32> {
    (value != 0.0).then_some(value)
}

fn build_request<'a>(
    model: &'a str,
    system_prompt: &'a str,
    transcript: &'a Transcript,
    params: &SamplingParams,
) -> ChatRequest<'a> {
    let messages = std::iter::once(ChatMessage {
        role: "system",
        content: system_prompt,
    })
    .chain(transcript.turns().iter().map(|turn| ChatMessage {
        role: turn.role.as_str(),
        content: &turn.content,
    }))
    .collect();

    ChatRequest {
        model,
        messages,
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        top_p: params.top_p,
        frequency_penalty: non_zero(params.frequency_penalty),
        presence_penalty: non_zero(params.presence_penalty),
        response_format: params
            .enforce_json_response
            .then_some(ResponseFormat { kind: "json_object" }),
    }
}

#[async_trait]
impl ChatTransport for OpenAiCompatibleTransport {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        params: &SamplingParams,
    ) -> Result<Completion> {
        let body = build_request(&self.model, system_prompt, transcript, params);

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            json_mode = params.enforce_json_response,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Chat completion HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("endpoint returned {}: {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let Some(choice) = chat_response.choices.into_iter().next() else {
            bail!("chat completion response contained no choices");
        };
        let Some(content) = choice.message.content else {
            bail!("chat completion response had no message content");
        };

        Ok(Completion {
            content,
            usage: chat_response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transcript() -> Transcript {
        let mut t = Transcript::new();
        t.push_user("TASK: ```X```\n").unwrap();
        t
    }

    #[test]
    fn request_requests_json_mode_when_enforced() {
        let t = transcript();
        let body = serde_json::to_value(build_request("gpt-4o", "SYS", &t, &SamplingParams::default()))
            .unwrap();
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "SYS"}));
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 2000);
        assert!(body.get("frequency_penalty").is_none());
    }

    #[test]
    fn request_omits_json_mode_when_disabled() {
        let t = transcript();
        let params = SamplingParams {
            enforce_json_response: false,
            presence_penalty: 0.5,
            ..Default::default()
        };
        let body = serde_json::to_value(build_request("deepseek-chat", "SYS", &t, &params)).unwrap();
        assert!(body.get("response_format").is_none());
        assert_eq!(body["presence_penalty"], 0.5);
    }

    #[test]
    fn response_envelope_keeps_usage_verbatim() {
        let parsed: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{}"}}],
            "usage": {"prompt_tokens": 1, "prompt_cache_hit_tokens": 1}
        }))
        .unwrap();
        assert_eq!(parsed.usage["prompt_cache_hit_tokens"], 1);
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{}"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = OpenAiCompatibleTransport::new("k", "m").with_base_url("https://api.deepseek.com/");
        assert_eq!(transport.endpoint(), "https://api.deepseek.com/chat/completions");
    }
}
