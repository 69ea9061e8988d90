use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use ponder_core::{ChatTransport, Completion, SamplingParams, Transcript};

/// A request as seen by the mock transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub transcript: Transcript,
    pub params: SamplingParams,
}

/// A transport that replays scripted replies in order and records every request.
pub struct MockTransport {
    name: String,
    replies: Mutex<VecDeque<Result<Completion, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_reply(self, content: impl Into<String>, usage: Value) -> Self {
        self.push(Ok(Completion {
            content: content.into(),
            usage,
        }))
    }

    /// Script a failed call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, reply: Result<Completion, String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Scripted replies not consumed yet.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or_default()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        params: &SamplingParams,
    ) -> Result<Completion> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("mock request log poisoned"))?
            .push(RecordedRequest {
                system_prompt: system_prompt.to_string(),
                transcript: transcript.clone(),
                params: params.clone(),
            });

        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow!("mock reply queue poisoned"))?
            .pop_front();
        match next {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => bail!(message),
            None => bail!("mock transport has no scripted reply left"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replays_in_order_then_runs_dry() {
        let mock = MockTransport::new()
            .with_reply("first", json!({}))
            .with_failure("boom");
        let transcript = Transcript::new();
        let params = SamplingParams::default();

        let first = mock.complete("sys", &transcript, &params).await.unwrap();
        assert_eq!(first.content, "first");
        let err = mock.complete("sys", &transcript, &params).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(mock.complete("sys", &transcript, &params).await.is_err());
        assert_eq!(mock.requests().len(), 3);
        assert_eq!(mock.remaining(), 0);
    }
}
