//! Tolerant response parsing.
//!
//! Models reliably produce near-JSON even when told not to, so parsing runs
//! a three-stage cascade and stops at the first success:
//! strict parse, fenced-block extraction, heuristic repair.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use ponder_core::{PonderError, Step};

use crate::repair::{HeuristicRepair, JsonRepair};

/// First fenced code block, optionally tagged `json`, matched non-greedily.
static FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?i:json)?[ \t]*\r?\n?(.*?)```").unwrap());

/// Which stage of the cascade produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Direct,
    Fenced,
    Repaired,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseStage::Direct => "direct",
            ParseStage::Fenced => "fenced",
            ParseStage::Repaired => "repaired",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub value: Value,
    pub stage: ParseStage,
}

/// Content of the first fenced code block, if any.
pub fn extract_fenced(raw: &str) -> Option<&str> {
    FENCE_PATTERN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Clone)]
pub struct ResponseParser {
    repair: Arc<dyn JsonRepair>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::with_repair(HeuristicRepair)
    }

    pub fn with_repair(repair: impl JsonRepair + 'static) -> Self {
        Self {
            repair: Arc::new(repair),
        }
    }

    /// Parse raw model output into a JSON value.
    pub fn parse(&self, raw: &str) -> Result<ParsedResponse, PonderError> {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return Ok(ParsedResponse {
                value,
                stage: ParseStage::Direct,
            });
        }

        let fenced = extract_fenced(raw);
        if let Some(inner) = fenced {
            if let Ok(value) = serde_json::from_str::<Value>(inner) {
                debug!("Parsed fenced response block");
                return Ok(ParsedResponse {
                    value,
                    stage: ParseStage::Fenced,
                });
            }
        }

        let candidate = fenced.unwrap_or(raw);
        let repaired = self.repair.repair(candidate);
        match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => {
                debug!(fenced = fenced.is_some(), "Parsed response after repair");
                Ok(ParsedResponse {
                    value,
                    stage: ParseStage::Repaired,
                })
            }
            Err(source) => Err(PonderError::ResponseFormat {
                raw: raw.to_string(),
                source,
            }),
        }
    }

    /// Parse raw model output and shape it into a [`Step`].
    pub fn parse_step(&self, raw: &str) -> Result<(Step, ParseStage), PonderError> {
        let parsed = self.parse(raw)?;
        let step = Step::from_value(parsed.value).map_err(|source| PonderError::ResponseFormat {
            raw: raw.to_string(),
            source,
        })?;
        Ok((step, parsed.stage))
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResponseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseParser").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STEP: &str = r#"{"step_title":"a","step_text":"b","reasoning_language":"English","confidence_level":3}"#;

    /// Counts invocations and otherwise delegates to the heuristic fixer.
    #[derive(Default)]
    struct CountingRepair(Arc<AtomicUsize>);

    impl JsonRepair for CountingRepair {
        fn repair(&self, text: &str) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            HeuristicRepair.repair(text)
        }
    }

    fn counting_parser() -> (ResponseParser, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            ResponseParser::with_repair(CountingRepair(Arc::clone(&calls))),
            calls,
        )
    }

    #[test]
    fn strict_json_parses_directly() {
        let (parser, repairs) = counting_parser();
        let parsed = parser.parse(STEP).unwrap();
        assert_eq!(parsed.stage, ParseStage::Direct);
        assert_eq!(parsed.value["step_title"], "a");
        assert_eq!(repairs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fenced_block_is_extracted() {
        let (parser, repairs) = counting_parser();
        let raw = format!("Here:\n```json\n{STEP}\n```\n");
        let parsed = parser.parse(&raw).unwrap();
        assert_eq!(parsed.stage, ParseStage::Fenced);
        assert_eq!(parsed.value["confidence_level"], 3);
        assert_eq!(repairs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn untagged_fence_and_first_block_only() {
        let raw = "```\n{\"a\": 1}\n```\nand later\n```json\n{\"a\": 2}\n```";
        assert_eq!(extract_fenced(raw).map(str::trim), Some("{\"a\": 1}"));
        let parsed = ResponseParser::new().parse(raw).unwrap();
        assert_eq!(parsed.value, json!({"a": 1}));
    }

    #[test]
    fn trailing_comma_goes_through_repair() {
        let (parser, repairs) = counting_parser();
        let parsed = parser.parse(r#"{"a":1,}"#).unwrap();
        assert_eq!(parsed.stage, ParseStage::Repaired);
        assert_eq!(parsed.value, json!({"a": 1}));
        assert_eq!(repairs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn broken_fenced_content_is_repaired() {
        let raw = "```json\n{step_title: 'a', step_text: 'b', reasoning_language: 'English', confidence_level: 3,}\n```";
        let (step, stage) = ResponseParser::new().parse_step(raw).unwrap();
        assert_eq!(stage, ParseStage::Repaired);
        assert_eq!(step.step_title, "a");
    }

    #[test]
    fn prose_with_brackets_before_the_step_is_skipped() {
        let raw = "Step [1] of the plan:\n{\"step_title\":\"a\",\"step_text\":\"b\",\"reasoning_language\":\"English\",\"confidence_level\":3,}";
        let (step, stage) = ResponseParser::new().parse_step(raw).unwrap();
        assert_eq!(stage, ParseStage::Repaired);
        assert_eq!(step.step_title, "a");
    }

    #[test]
    fn bare_language_value_is_repaired() {
        let raw = "{step_title: 'a', step_text: 'b', reasoning_language: English, confidence_level: 3}";
        let (step, _) = ResponseParser::new().parse_step(raw).unwrap();
        assert_eq!(step.reasoning_language, "English");
        assert_eq!(step.confidence_level, 3);
    }

    #[test]
    fn unstructured_text_fails_with_raw_attached() {
        let (parser, repairs) = counting_parser();
        let raw = "I'm sorry, I can't continue with that.";
        let err = parser.parse(raw).unwrap_err();
        assert_eq!(repairs.load(Ordering::SeqCst), 1);
        match err {
            PonderError::ResponseFormat { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_json_with_wrong_shape_is_format_error() {
        let err = ResponseParser::new().parse_step(r#"{"answer": 42}"#).unwrap_err();
        assert!(matches!(err, PonderError::ResponseFormat { .. }));
    }

    #[test]
    fn parse_step_reads_solution() {
        let raw = r#"{"step_title":"done","step_text":"x","reasoning_language":"English","confidence_level":5,
            "solution":{"type":"FINAL","content":"42","completeness":100},"is_final_result":true}"#;
        let (step, stage) = ResponseParser::new().parse_step(raw).unwrap();
        assert_eq!(stage, ParseStage::Direct);
        assert!(step.is_terminal());
    }
}
