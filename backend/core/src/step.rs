use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Progress marker attached to a step's solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolutionType {
    #[default]
    None,
    Partial,
    Final,
}

impl SolutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionType::None => "NONE",
            SolutionType::Partial => "PARTIAL",
            SolutionType::Final => "FINAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    #[serde(rename = "type", default)]
    pub kind: SolutionType,
    #[serde(default)]
    pub content: String,
    /// Percentage 0-100 as reported by the model. Not validated.
    #[serde(default)]
    pub completeness: i64,
}

/// One parsed reasoning increment produced by the model.
///
/// Fields the model adds beyond the known ones are kept in `extra` so that
/// persisted traces contain the full response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_title: String,
    pub step_text: String,
    pub reasoning_language: String,
    /// Expected 1-5; not validated.
    pub confidence_level: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_final_result: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Step {
    pub fn solution_type(&self) -> SolutionType {
        self.solution
            .as_ref()
            .map(|solution| solution.kind)
            .unwrap_or_default()
    }

    /// A session ends when either completion signal is set.
    pub fn is_terminal(&self) -> bool {
        self.is_final_result || self.solution_type() == SolutionType::Final
    }

    /// Convert a parsed response object into a step.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step_with(solution: Value, is_final: Value) -> Step {
        Step::from_value(json!({
            "step_title": "t",
            "step_text": "x",
            "reasoning_language": "English",
            "confidence_level": 3,
            "solution": solution,
            "is_final_result": is_final,
        }))
        .unwrap()
    }

    #[test]
    fn final_solution_terminates() {
        let step = step_with(json!({"type": "FINAL", "content": "42", "completeness": 40}), json!(false));
        assert!(step.is_terminal());
    }

    #[test]
    fn partial_and_none_continue() {
        let partial = step_with(json!({"type": "PARTIAL", "content": "", "completeness": 90}), json!(null));
        let none = step_with(json!({"type": "NONE", "content": "", "completeness": 0}), json!(false));
        assert!(!partial.is_terminal());
        assert!(!none.is_terminal());
    }

    #[test]
    fn final_flag_alone_terminates() {
        let step = step_with(json!(null), json!(true));
        assert_eq!(step.solution_type(), SolutionType::None);
        assert!(step.is_terminal());
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let step = Step::from_value(json!({
            "step_title": "t",
            "step_text": "x",
            "reasoning_language": "English",
            "confidence_level": 2,
            "next_step_hint": "try induction"
        }))
        .unwrap();
        assert!(step.solution.is_none());
        assert!(!step.is_final_result);
        assert_eq!(step.extra["next_step_hint"], "try induction");
        let round = serde_json::to_value(&step).unwrap();
        assert_eq!(round["next_step_hint"], "try induction");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let result = Step::from_value(json!({"step_title": "t"}));
        assert!(result.is_err());
    }
}
