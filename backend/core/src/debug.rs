use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::SamplingParams;
use crate::types::Turn;
use crate::usage::UsageRecord;

/// Snapshot of one transport call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugRecord {
    /// 1-based sequence number within the session engine.
    pub call_number: u64,
    pub timestamp: DateTime<Utc>,
    pub request: DebugRequest,
    pub response: DebugResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugRequest {
    pub provider: String,
    pub model: String,
    /// Full outbound message list, system prompt first.
    pub messages: Vec<Turn>,
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugResponse {
    pub content: String,
    pub usage: UsageRecord,
    /// Usage object as the provider sent it.
    pub provider_usage: Value,
    pub elapsed_secs: f64,
}
