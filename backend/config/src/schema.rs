//! Provider configuration schema.
//!
//! One YAML file per provider, e.g. `providers/gpt-4o.yml`:
//!
//! ```yaml
//! provider_type: openai-compatible
//! name: GPT-4o
//! description: OpenAI flagship model
//! api_key: ${OPENAI_API_KEY}
//! model: gpt-4o
//! pricing:
//!   input_tokens: 2.5
//!   cached_tokens: 1.25
//!   output_tokens: 10.0
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ponder_core::{PricingTable, SamplingParams};

use crate::defaults;

/// The only provider type the chat transport speaks.
pub const OPENAI_COMPATIBLE: &str = "openai-compatible";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: String,

    /// Display name; defaults to the file stem.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Endpoint root, e.g. `https://api.deepseek.com`. Defaults to OpenAI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: String,

    pub model: String,

    #[serde(default = "defaults::temperature")]
    pub temperature: f32,

    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "defaults::top_p")]
    pub top_p: f32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,

    /// Some endpoints reject the JSON response-format flag.
    #[serde(default = "defaults::enforce_json_response")]
    pub enforce_json_response: bool,

    /// HTTP request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Replaces the built-in system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<PathBuf>,

    /// Prices per 1M tokens.
    #[serde(default)]
    pub pricing: PricingTable,
}

impl ProviderConfig {
    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            enforce_json_response: self.enforce_json_response,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        }
    }

    /// Everything safe to persist in a trace. Never includes the API key.
    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            pricing: self.pricing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub name: String,
    pub description: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub pricing: PricingTable,
}
