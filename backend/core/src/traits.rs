use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debug::DebugRecord;
use crate::types::Transcript;

/// Sampling parameters forwarded to the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    /// Request a JSON-object response format when the endpoint supports it.
    pub enforce_json_response: bool,
    #[serde(default)]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            top_p: 1.0,
            enforce_json_response: true,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Raw result of one chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Assistant text exactly as returned.
    pub content: String,
    /// Provider usage object, left in its provider-specific shape.
    pub usage: Value,
}

/// Abstraction over a remote chat-completion endpoint.
///
/// Implementations prepend the system prompt to the transcript for each call
/// and never mutate the transcript.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Provider name used in errors and logs (e.g., "openai-compatible").
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    async fn complete(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        params: &SamplingParams,
    ) -> Result<Completion>;
}

/// Receives one record per transport call for offline inspection.
///
/// Failures are logged by the caller and never affect the session.
#[async_trait]
pub trait DebugSink: Send + Sync {
    async fn record(&self, record: &DebugRecord) -> Result<()>;
}
