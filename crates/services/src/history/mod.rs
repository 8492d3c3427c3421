mod recorder;
mod stats;

pub use recorder::{CompletionSink, HistoryRecorder};
pub use stats::{HistoryService, QuizStats};
