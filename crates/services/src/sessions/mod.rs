mod controller;
mod state;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::QuizSessionController;
pub use state::{SessionState, StepOutcome, TickOutcome};
