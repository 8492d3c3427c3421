#![forbid(unsafe_code)]

pub mod catalog_service;
pub mod countdown;
pub mod error;
pub mod history;
pub mod sessions;

pub use study_core::Clock;

pub use catalog_service::{CatalogFilter, CatalogService};
pub use countdown::{
    COUNTDOWN_PERIOD, CountdownHandle, CountdownTimer, ManualCountdown, Tick, TokioCountdown,
};
pub use error::{CatalogError, HistoryError, SessionError};
pub use history::{CompletionSink, HistoryRecorder, HistoryService, QuizStats};
pub use sessions::{QuizSessionController, SessionState, StepOutcome, TickOutcome};
