//! Session Event Logger
//!
//! Structured session milestones emitted on the `session_events` target, so a
//! JSON file layer captures them as NDJSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        provider: String,
        model: String,
        task: String,
    },
    CommandIssued {
        step_number: u32,
        command: String,
    },
    StepCompleted {
        step_number: u32,
        title: String,
        solution: String,
        total_tokens: u64,
        cost: f64,
    },
    SessionFinished {
        steps: u32,
        total_cost: f64,
        terminal: bool,
    },
    Error {
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct SessionEventEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}

pub struct SessionEventLogger;

impl SessionEventLogger {
    /// Redacts free-text fields and emits the event through tracing.
    pub fn log_event(session_id: &str, event: SessionEvent) -> SessionEventEntry {
        let entry = SessionEventEntry {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event: redact_event(event),
        };
        let payload = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "session_events", session_id = %entry.session_id, event = %payload, "Session event");
        entry
    }
}

fn redact_event(mut event: SessionEvent) -> SessionEvent {
    match &mut event {
        SessionEvent::SessionStarted { task, .. } => *task = redact_sensitive_data(task),
        SessionEvent::CommandIssued { command, .. } => *command = redact_sensitive_data(command),
        SessionEvent::StepCompleted { title, .. } => *title = redact_sensitive_data(title),
        SessionEvent::Error { error_msg } => *error_msg = redact_sensitive_data(error_msg),
        SessionEvent::SessionFinished { .. } => {}
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_redacted() {
        let entry = SessionEventLogger::log_event(
            "s-1",
            SessionEvent::Error {
                error_msg: "401 for key sk-abcdefghijklmnopqrstuvwx".into(),
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "error");
        assert!(!json["event"]["error_msg"]
            .as_str()
            .unwrap()
            .contains("sk-abcdefghijklmnopqrstuvwx"));
    }

    #[test]
    fn step_events_serialize_with_tag() {
        let entry = SessionEventLogger::log_event(
            "s-2",
            SessionEvent::StepCompleted {
                step_number: 3,
                title: "Check parity".into(),
                solution: "PARTIAL".into(),
                total_tokens: 150,
                cost: 0.001,
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["session_id"], "s-2");
        assert_eq!(json["event"]["type"], "step_completed");
        assert_eq!(json["event"]["step_number"], 3);
    }
}
