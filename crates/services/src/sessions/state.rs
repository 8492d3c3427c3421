use study_core::model::{AttemptId, QuizId, QuizResult};

/// Where the controller is in the quiz lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A quiz card is open, waiting for the user to confirm.
    Selecting(QuizId),
    /// An attempt is running.
    Confirmed(AttemptId),
    /// The attempt was submitted and its result is on screen.
    Completed(AttemptId),
}

/// Result of a forward step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// No attempt is running.
    Inactive,
    /// The current question is unanswered.
    Blocked,
    Moved(usize),
    /// Stepping past the last question submitted the attempt.
    Submitted(QuizResult),
}

/// What a countdown tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belongs to no running attempt.
    Ignored,
    Running { remaining_secs: u32 },
    /// Time ran out and the attempt was submitted.
    Expired(QuizResult),
}
