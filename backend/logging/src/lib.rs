//! Structured logging for ponder.
//!
//! Handles subscriber setup (console plus optional rolling NDJSON file),
//! secret redaction, and structured session events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{SessionEvent, SessionEventEntry, SessionEventLogger};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
