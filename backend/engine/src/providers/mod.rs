pub mod mock;
pub mod openai;

pub use mock::{MockTransport, RecordedRequest};
pub use openai::OpenAiCompatibleTransport;
