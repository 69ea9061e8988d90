use thiserror::Error;

/// Top-level error type for a reasoning session.
#[derive(Debug, Error)]
pub enum PonderError {
    /// The chat-completion call itself failed (network, auth, rate limit,
    /// malformed response envelope).
    #[error("transport error ({provider}): {message}")]
    Transport { provider: String, message: String },

    /// Every parse stage failed. `raw` is the assistant text exactly as received.
    #[error("response format error: {source}")]
    ResponseFormat {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// Data-integrity problem upstream: bad pricing, negative token counts,
    /// invalid provider configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transcript is not in a state that allows the requested exchange.
    #[error("transcript error: {0}")]
    Transcript(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PonderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Raw assistant text attached to a format error, if any.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::ResponseFormat { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type Result<T, E = PonderError> = std::result::Result<T, E>;
