pub mod chat;
pub mod completion;
pub mod record;

pub use chat::{ChatMessage, CompletionRequest, Role};
pub use completion::{CompletionResult, Metrics};
pub use record::{ExperimentRecord, PhaseTally, RecordContext, ResultsAggregate};
