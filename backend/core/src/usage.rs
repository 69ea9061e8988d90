//! Token-usage normalization.
//!
//! Providers report usage in OpenAI-compatible shapes that disagree on where
//! cache hits live. The normalizer reads the common counters directly and
//! resolves cached tokens through an ordered list of [`CacheHitStrategy`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::PonderError;

/// Prompt share used to split wall-clock time when the provider reports no tokens.
pub const FALLBACK_PROMPT_RATIO: f64 = 0.5;

/// Canonical token accounting for one transport call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// As reported by the provider, not recomputed.
    pub total_tokens: u64,
    /// Subset of `prompt_tokens` served from the provider's prompt cache.
    pub cached_tokens: u64,
    pub reasoning_tokens: u64,
    pub accepted_prediction_tokens: u64,
    pub rejected_prediction_tokens: u64,
    /// Seconds attributed to the prompt, proportional to its token share.
    pub prompt_time: f64,
    pub completion_time: f64,
}

impl UsageRecord {
    /// Wall-clock duration of the call.
    pub fn total_time(&self) -> f64 {
        self.prompt_time + self.completion_time
    }

    /// Prompt tokens billed at the full input rate.
    pub fn effective_prompt_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_sub(self.cached_tokens)
    }

    /// Percentage of prompt tokens that were cache hits.
    pub fn cache_ratio(&self) -> f64 {
        if self.prompt_tokens == 0 {
            0.0
        } else {
            self.cached_tokens as f64 / self.prompt_tokens as f64 * 100.0
        }
    }
}

/// One known schema shape for cache-hit accounting.
#[derive(Debug, Clone, Copy)]
pub struct CacheHitStrategy {
    pub name: &'static str,
    /// Key path into the provider usage object.
    pub path: &'static [&'static str],
}

impl CacheHitStrategy {
    pub fn extract(&self, usage: &Value) -> Result<Option<u64>, PonderError> {
        read_count(usage, self.path)
    }
}

/// Cache-hit schemas in priority order.
pub const CACHE_HIT_STRATEGIES: &[CacheHitStrategy] = &[
    // OpenAI: usage.prompt_tokens_details.cached_tokens
    CacheHitStrategy {
        name: "prompt_tokens_details",
        path: &["prompt_tokens_details", "cached_tokens"],
    },
    // Deepseek: usage.prompt_cache_hit_tokens
    CacheHitStrategy {
        name: "prompt_cache_hit_tokens",
        path: &["prompt_cache_hit_tokens"],
    },
];

/// Normalize a provider usage payload using the built-in cache strategies.
pub fn normalize(usage: &Value, wall_clock_secs: f64) -> Result<UsageRecord, PonderError> {
    normalize_with(usage, wall_clock_secs, CACHE_HIT_STRATEGIES)
}

/// Normalize with an explicit strategy list, tried in order.
pub fn normalize_with(
    usage: &Value,
    wall_clock_secs: f64,
    strategies: &[CacheHitStrategy],
) -> Result<UsageRecord, PonderError> {
    let prompt_tokens = read_count(usage, &["prompt_tokens"])?.unwrap_or(0);
    let completion_tokens = read_count(usage, &["completion_tokens"])?.unwrap_or(0);
    let total_tokens = read_count(usage, &["total_tokens"])?.unwrap_or(0);

    let prompt_ratio = if total_tokens == 0 {
        FALLBACK_PROMPT_RATIO
    } else {
        (prompt_tokens as f64 / total_tokens as f64).clamp(0.0, 1.0)
    };
    let wall_clock = wall_clock_secs.max(0.0);
    let prompt_time = wall_clock * prompt_ratio;
    let completion_time = wall_clock - prompt_time;

    let mut cached_tokens = 0;
    for strategy in strategies {
        if let Some(found) = strategy.extract(usage)? {
            debug!(strategy = strategy.name, cached_tokens = found, "Resolved cached tokens");
            cached_tokens = found;
            break;
        }
    }

    let detail = |field: &str| -> Result<u64, PonderError> {
        Ok(read_count(usage, &["completion_tokens_details", field])?.unwrap_or(0))
    };

    Ok(UsageRecord {
        prompt_tokens,
        completion_tokens,
        total_tokens,
        cached_tokens,
        reasoning_tokens: detail("reasoning_tokens")?,
        accepted_prediction_tokens: detail("accepted_prediction_tokens")?,
        rejected_prediction_tokens: detail("rejected_prediction_tokens")?,
        prompt_time,
        completion_time,
    })
}

/// Read a non-negative integer at `path`. Missing or null reads as `None`.
fn read_count(usage: &Value, path: &[&str]) -> Result<Option<u64>, PonderError> {
    let mut current = usage;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    let field = path.join(".");
    match current {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(Some(v))
            } else if let Some(v) = n.as_f64().filter(|v| *v >= 0.0 && v.fract() == 0.0) {
                Ok(Some(v as u64))
            } else {
                Err(PonderError::configuration(format!(
                    "usage field '{field}' must be a non-negative integer, got {n}"
                )))
            }
        }
        other => Err(PonderError::configuration(format!(
            "usage field '{field}' must be a number, got {other}"
        ))),
    }
}
