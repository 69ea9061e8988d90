pub mod debug_sink;
pub mod parser;
pub mod prompt;
pub mod providers;
pub mod repair;
pub mod session;

pub use debug_sink::FileDebugSink;
pub use parser::{extract_fenced, ParseStage, ParsedResponse, ResponseParser};
pub use prompt::{load_system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use repair::{HeuristicRepair, JsonRepair};
pub use session::{format_task_message, ReasoningSession, StepOutcome};
