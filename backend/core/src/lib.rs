pub mod cost;
pub mod debug;
pub mod error;
pub mod step;
pub mod traits;
pub mod types;
pub mod usage;

pub use cost::{cost, CostBreakdown, PricingTable};
pub use debug::{DebugRecord, DebugRequest, DebugResponse};
pub use error::{PonderError, Result};
pub use step::{Solution, SolutionType, Step};
pub use traits::{ChatTransport, Completion, DebugSink, SamplingParams};
pub use types::{
    Command, Mode, Role, SessionOptions, Transcript, Turn, DEFAULT_LANGUAGE, DEFAULT_MAX_STEPS,
    DEFAULT_MODE,
};
pub use usage::{normalize, normalize_with, CacheHitStrategy, UsageRecord, CACHE_HIT_STRATEGIES};
