//! Reasoning traces: one JSON file per session run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::fs;
use tracing::info;

use ponder_config::ProviderMetadata;
use ponder_core::{Command, CostBreakdown, Mode, Step, UsageRecord};

/// Per-step token usage as persisted. Without `--debug` only the summary is kept.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TraceUsage {
    Detailed {
        #[serde(flatten)]
        usage: UsageRecord,
        total_time: f64,
    },
    Summary {
        total_tokens: u64,
        cached_tokens: u64,
        total_time: f64,
    },
}

impl TraceUsage {
    pub fn from_usage(usage: &UsageRecord, detailed: bool) -> Self {
        if detailed {
            TraceUsage::Detailed {
                usage: *usage,
                total_time: usage.total_time(),
            }
        } else {
            TraceUsage::Summary {
                total_tokens: usage.total_tokens,
                cached_tokens: usage.cached_tokens,
                total_time: usage.total_time(),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub step: Step,
    pub token_usage: TraceUsage,
    pub costs: CostBreakdown,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StepData {
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningTrace {
    pub timestamp: DateTime<Local>,
    pub session_id: String,
    pub task: String,
    pub mode: Mode,
    pub language: String,
    pub max_steps: u32,
    pub step_data: StepData,
    pub commands: Vec<Command>,
    pub total_costs: CostBreakdown,
    pub provider: ProviderMetadata,
}

/// `trace_YYYYMMDD_HHMMSS.json`
pub fn trace_file_name(timestamp: &DateTime<Local>) -> String {
    format!("trace_{}.json", timestamp.format("%Y%m%d_%H%M%S"))
}

/// Write the trace into `output_dir`, creating it if needed.
pub async fn save_trace(trace: &ReasoningTrace, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let path = output_dir.join(trace_file_name(&trace.timestamp));
    let json = serde_json::to_string_pretty(trace).context("Failed to serialize trace")?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write trace: {}", path.display()))?;

    info!(path = %path.display(), steps = trace.step_data.steps.len(), "Saved reasoning trace");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ponder_core::{PricingTable, SolutionType};
    use serde_json::{json, Value};

    fn usage() -> UsageRecord {
        UsageRecord {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
            cached_tokens: 20,
            prompt_time: 1.5,
            completion_time: 0.5,
            ..Default::default()
        }
    }

    fn step() -> Step {
        Step::from_value(json!({
            "step_title": "Setup",
            "step_text": "Let n = 2k.",
            "reasoning_language": "English",
            "confidence_level": 3,
            "solution": {"type": "PARTIAL", "content": "n is even", "completeness": 40},
            "is_final_result": false,
            "scratchpad": "kept"
        }))
        .unwrap()
    }

    fn trace(detailed: bool) -> ReasoningTrace {
        let costs = CostBreakdown {
            input_cost: 0.1,
            cached_cost: 0.0,
            output_cost: 0.2,
            total_cost: 0.3,
        };
        ReasoningTrace {
            timestamp: Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            session_id: "s-1".into(),
            task: "Prove it".into(),
            mode: Mode::GoSlightlyWrong,
            language: "English".into(),
            max_steps: 10,
            step_data: StepData {
                steps: vec![TraceStep {
                    step: step(),
                    token_usage: TraceUsage::from_usage(&usage(), detailed),
                    costs,
                }],
            },
            commands: vec![Command::Continue, Command::ReasoningLanguage("French".into())],
            total_costs: costs,
            provider: ProviderMetadata {
                name: "Mock".into(),
                description: "".into(),
                model: "mock-1".into(),
                base_url: None,
                temperature: 0.7,
                max_tokens: 2000,
                top_p: 1.0,
                frequency_penalty: 0.0,
                presence_penalty: 0.0,
                pricing: PricingTable::new(1.0, 0.5, 2.0),
            },
        }
    }

    #[test]
    fn file_name_uses_local_timestamp() {
        let ts = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(trace_file_name(&ts), "trace_20260314_092653.json");
    }

    #[tokio::test]
    async fn summary_trace_keeps_three_usage_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_trace(&trace(false), &dir.path().join("traces")).await.unwrap();
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        let usage = &saved["step_data"]["steps"][0]["token_usage"];
        assert_eq!(usage, &json!({"total_tokens": 150, "cached_tokens": 20, "total_time": 2.0}));
        assert_eq!(saved["mode"], "GO_SLIGHTLY_WRONG");
        assert_eq!(saved["commands"], json!(["CONTINUE", "REASONING_LANGUAGE French"]));
        assert_eq!(saved["step_data"]["steps"][0]["step"]["scratchpad"], "kept");
        assert_eq!(
            saved["step_data"]["steps"][0]["step"]["solution"]["type"],
            SolutionType::Partial.as_str()
        );
        assert!(saved["provider"].get("api_key").is_none());
    }

    #[tokio::test]
    async fn detailed_trace_keeps_full_usage() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_trace(&trace(true), dir.path()).await.unwrap();
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        let usage = &saved["step_data"]["steps"][0]["token_usage"];
        assert_eq!(usage["prompt_tokens"], 100);
        assert_eq!(usage["completion_tokens"], 50);
        assert_eq!(usage["prompt_time"], 1.5);
        assert_eq!(usage["total_time"], 2.0);
        assert_eq!(saved["total_costs"]["total_cost"], 0.3);
    }
}
