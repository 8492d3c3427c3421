use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use study_core::model::{
    AdvanceOutcome, AttemptId, AttemptProgress, QuestionId, QuizAttempt, QuizDefinition,
    QuizResult,
};

use super::state::{SessionState, StepOutcome, TickOutcome};
use crate::Clock;
use crate::countdown::{COUNTDOWN_PERIOD, CountdownHandle, CountdownTimer};
use crate::error::SessionError;
use crate::history::CompletionSink;

enum Phase {
    Idle,
    Selecting(Arc<QuizDefinition>),
    Active(QuizAttempt),
    Completed(QuizAttempt),
}

/// Drives one quiz attempt at a time from quiz selection to scored result.
///
/// ```text
/// Idle -> Selecting -> Confirmed -> Completed -> Idle
/// ```
///
/// The controller owns at most one countdown. It is cancelled on submit and
/// before a new attempt starts, and ticks for any attempt other than the
/// running one are dropped, so an attempt is scored and recorded exactly once.
pub struct QuizSessionController {
    clock: Clock,
    timer: Box<dyn CountdownTimer>,
    sink: Arc<dyn CompletionSink>,
    period: Duration,
    phase: Phase,
    countdown: Option<Box<dyn CountdownHandle>>,
}

impl QuizSessionController {
    #[must_use]
    pub fn new(
        clock: Clock,
        timer: Box<dyn CountdownTimer>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            clock,
            timer,
            sink,
            period: COUNTDOWN_PERIOD,
            phase: Phase::Idle,
            countdown: None,
        }
    }

    /// Override the countdown period (one second by default).
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Selecting(quiz) => SessionState::Selecting(quiz.id()),
            Phase::Active(attempt) => SessionState::Confirmed(attempt.id()),
            Phase::Completed(attempt) => SessionState::Completed(attempt.id()),
        }
    }

    /// The quiz card currently open for confirmation.
    #[must_use]
    pub fn selected(&self) -> Option<&QuizDefinition> {
        match &self.phase {
            Phase::Selecting(quiz) => Some(quiz),
            _ => None,
        }
    }

    /// The running or just-completed attempt.
    #[must_use]
    pub fn attempt(&self) -> Option<&QuizAttempt> {
        match &self.phase {
            Phase::Active(attempt) | Phase::Completed(attempt) => Some(attempt),
            _ => None,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        match &self.phase {
            Phase::Completed(attempt) => attempt.result(),
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Option<AttemptProgress> {
        self.attempt().map(QuizAttempt::progress)
    }

    /// Open a quiz card. Only possible while no attempt is running or shown.
    pub fn select(&mut self, quiz: impl Into<Arc<QuizDefinition>>) -> bool {
        match self.phase {
            Phase::Idle | Phase::Selecting(_) => {
                let quiz = quiz.into();
                tracing::debug!(quiz_id = %quiz.id(), "quiz selected");
                self.phase = Phase::Selecting(quiz);
                true
            }
            Phase::Active(_) | Phase::Completed(_) => false,
        }
    }

    /// Close the open quiz card without starting it.
    pub fn cancel_selection(&mut self) -> bool {
        if matches!(self.phase, Phase::Selecting(_)) {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }

    /// Start the selected quiz.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NothingSelected` outside the selecting state and
    /// `SessionError::QuizUnavailable` if the quiz has no questions; in the
    /// latter case the controller falls back to idle.
    pub fn confirm(&mut self) -> Result<AttemptId, SessionError> {
        let Phase::Selecting(quiz) = &self.phase else {
            return Err(SessionError::NothingSelected);
        };
        let quiz = Arc::clone(quiz);
        self.start_attempt(quiz)
    }

    /// Start a fresh attempt, replacing whatever the controller held.
    ///
    /// A running attempt is discarded without being recorded, but only once
    /// the new one has started.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ResultsPending` while a result is on screen and
    /// `SessionError::QuizUnavailable` if the quiz cannot be started. On
    /// failure the controller keeps its state, except that an open quiz card
    /// is closed.
    pub fn start_attempt(
        &mut self,
        quiz: impl Into<Arc<QuizDefinition>>,
    ) -> Result<AttemptId, SessionError> {
        if matches!(self.phase, Phase::Completed(_)) {
            return Err(SessionError::ResultsPending);
        }

        let quiz = quiz.into();
        let quiz_id = quiz.id();
        let attempt = match QuizAttempt::start(quiz, self.clock.now()) {
            Ok(attempt) => attempt,
            Err(err) => {
                tracing::warn!(%quiz_id, error = %err, "cannot start attempt");
                if matches!(self.phase, Phase::Selecting(_)) {
                    self.phase = Phase::Idle;
                }
                return Err(SessionError::QuizUnavailable { quiz_id });
            }
        };

        self.cancel_countdown();
        if let Phase::Active(previous) = &self.phase {
            tracing::warn!(attempt = %previous.id(), "discarding unfinished attempt");
        }

        let id = attempt.id();
        tracing::info!(
            attempt = %id,
            %quiz_id,
            questions = attempt.definition().question_count(),
            time_limit_secs = attempt.remaining_secs(),
            "attempt started"
        );
        self.countdown = Some(self.timer.start(id, self.period));
        self.phase = Phase::Active(attempt);
        Ok(id)
    }

    /// Record an answer for a question of the running attempt.
    ///
    /// The option is stored as given, without checking it against the
    /// question's list.
    pub fn select_answer(&mut self, question_id: QuestionId, option: impl Into<String>) -> bool {
        match &mut self.phase {
            Phase::Active(attempt) => attempt.select_answer(question_id, option),
            _ => false,
        }
    }

    /// Move to the next question, or submit from the last one.
    ///
    /// Refuses to leave an unanswered question.
    pub fn advance(&mut self) -> StepOutcome {
        let Phase::Active(attempt) = &mut self.phase else {
            return StepOutcome::Inactive;
        };
        match attempt.advance() {
            AdvanceOutcome::Moved(index) => StepOutcome::Moved(index),
            AdvanceOutcome::Blocked => StepOutcome::Blocked,
            AdvanceOutcome::AtEnd => self
                .submit()
                .map_or(StepOutcome::Inactive, StepOutcome::Submitted),
            AdvanceOutcome::Completed => StepOutcome::Inactive,
        }
    }

    pub fn retreat(&mut self) -> bool {
        match &mut self.phase {
            Phase::Active(attempt) => attempt.retreat(),
            _ => false,
        }
    }

    /// Jump to any question, answered or not.
    pub fn jump_to(&mut self, index: usize) -> bool {
        match &mut self.phase {
            Phase::Active(attempt) => attempt.jump_to(index),
            _ => false,
        }
    }

    /// Score the running attempt and notify the completion sink.
    ///
    /// Once completed, further calls return the cached result and notify
    /// nobody. Returns `None` when there is no attempt.
    pub fn submit(&mut self) -> Option<QuizResult> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Active(mut attempt) => {
                self.cancel_countdown();
                let result = attempt.submit(self.clock.now()).clone();
                tracing::info!(
                    attempt = %attempt.id(),
                    quiz_id = %result.quiz_id,
                    score = result.score,
                    correct = result.correct,
                    total = result.total,
                    xp = result.xp,
                    "attempt completed"
                );
                self.sink.record(&result.record());
                self.phase = Phase::Completed(attempt);
                Some(result)
            }
            Phase::Completed(attempt) => {
                let cached = attempt.result().cloned();
                self.phase = Phase::Completed(attempt);
                cached
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Apply one countdown tick; submits when time runs out.
    pub fn tick(&mut self, attempt_id: AttemptId) -> TickOutcome {
        let Phase::Active(attempt) = &mut self.phase else {
            tracing::trace!(attempt = %attempt_id, "tick without running attempt");
            return TickOutcome::Ignored;
        };
        if attempt.id() != attempt_id {
            tracing::debug!(attempt = %attempt_id, "stale tick ignored");
            return TickOutcome::Ignored;
        }

        let remaining_secs = attempt.tick();
        if remaining_secs > 0 {
            return TickOutcome::Running { remaining_secs };
        }

        tracing::info!(attempt = %attempt_id, "time is up");
        self.submit()
            .map_or(TickOutcome::Ignored, TickOutcome::Expired)
    }

    /// Leave the results screen.
    pub fn dismiss(&mut self) -> bool {
        if matches!(self.phase, Phase::Completed(_)) {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }

    fn cancel_countdown(&mut self) {
        if let Some(mut countdown) = self.countdown.take() {
            countdown.cancel();
        }
    }
}

impl Drop for QuizSessionController {
    fn drop(&mut self) {
        self.cancel_countdown();
    }
}

impl fmt::Debug for QuizSessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSessionController")
            .field("state", &self.state())
            .field("period", &self.period)
            .field("countdown_running", &self.countdown.is_some())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::ManualCountdown;
    use std::sync::Mutex;
    use study_core::model::{AttemptRecord, Difficulty, Question, QuizId};
    use study_core::time::{fixed_clock, fixed_now};

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<AttemptRecord>>);

    impl RecordingSink {
        fn records(&self) -> Vec<AttemptRecord> {
            self.0.lock().unwrap().clone()
        }
    }

    impl CompletionSink for RecordingSink {
        fn record(&self, record: &AttemptRecord) {
            self.0.lock().unwrap().push(record.clone());
        }
    }

    fn quiz(id: u64, questions: u64, difficulty: Difficulty, minutes: u32) -> QuizDefinition {
        let questions = (1..=questions)
            .map(|q| {
                Question::new(
                    QuestionId::new(q),
                    format!("Question {q}"),
                    vec!["right".into(), "wrong".into()],
                    "right",
                )
                .unwrap()
            })
            .collect();
        QuizDefinition::new(
            QuizId::new(id),
            "Network Fundamentals",
            "Networking",
            difficulty,
            questions,
            minutes,
            Some("Networking Novice".into()),
        )
        .unwrap()
    }

    fn controller() -> (QuizSessionController, ManualCountdown, Arc<RecordingSink>) {
        let timer = ManualCountdown::new();
        let sink = Arc::new(RecordingSink::default());
        let controller =
            QuizSessionController::new(fixed_clock(), Box::new(timer.clone()), sink.clone());
        (controller, timer, sink)
    }

    #[test]
    fn select_confirm_submit_dismiss() {
        let (mut c, timer, sink) = controller();
        assert_eq!(c.state(), SessionState::Idle);

        assert!(c.select(quiz(1, 2, Difficulty::Easy, 5)));
        assert_eq!(c.state(), SessionState::Selecting(QuizId::new(1)));

        let attempt = c.confirm().unwrap();
        assert_eq!(c.state(), SessionState::Confirmed(attempt));
        assert_eq!(timer.running(), vec![attempt]);

        c.select_answer(QuestionId::new(1), "right");
        c.select_answer(QuestionId::new(2), "right");
        let result = c.submit().unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(c.state(), SessionState::Completed(attempt));
        assert!(timer.running().is_empty());
        assert_eq!(sink.records(), vec![result.record()]);

        assert!(c.dismiss());
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.result().is_none());
    }

    #[test]
    fn cancel_selection_returns_to_idle() {
        let (mut c, timer, _) = controller();
        c.select(quiz(1, 1, Difficulty::Easy, 5));
        assert!(c.cancel_selection());
        assert_eq!(c.state(), SessionState::Idle);
        assert!(timer.started().is_empty());
    }

    #[test]
    fn confirm_without_selection_fails() {
        let (mut c, _, _) = controller();
        assert_eq!(c.confirm(), Err(SessionError::NothingSelected));
    }

    #[test]
    fn empty_quiz_is_unavailable_and_controller_stays_usable() {
        let (mut c, timer, _) = controller();
        c.select(quiz(7, 0, Difficulty::Easy, 5));

        let err = c.confirm().unwrap_err();
        assert_eq!(
            err,
            SessionError::QuizUnavailable {
                quiz_id: QuizId::new(7)
            }
        );
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.attempt().is_none());
        assert!(timer.started().is_empty());

        assert!(c.start_attempt(quiz(8, 1, Difficulty::Easy, 5)).is_ok());
    }

    #[test]
    fn unavailable_quiz_leaves_running_attempt_alone() {
        let (mut c, timer, sink) = controller();
        let running = c.start_attempt(quiz(1, 2, Difficulty::Easy, 5)).unwrap();
        c.select_answer(QuestionId::new(1), "right");

        let err = c.start_attempt(quiz(2, 0, Difficulty::Easy, 5)).unwrap_err();
        assert_eq!(
            err,
            SessionError::QuizUnavailable {
                quiz_id: QuizId::new(2)
            }
        );
        assert_eq!(c.state(), SessionState::Confirmed(running));
        assert_eq!(timer.running(), vec![running]);
        assert_eq!(c.progress().unwrap().answered, 1);
        assert_eq!(
            c.tick(running),
            TickOutcome::Running {
                remaining_secs: 299
            }
        );
        assert!(sink.records().is_empty());
    }

    #[test]
    fn start_is_refused_until_results_are_dismissed() {
        let (mut c, timer, _) = controller();
        let finished = c.start_attempt(quiz(1, 1, Difficulty::Easy, 5)).unwrap();
        let result = c.submit().unwrap();

        assert_eq!(
            c.start_attempt(quiz(2, 1, Difficulty::Easy, 5)),
            Err(SessionError::ResultsPending)
        );
        assert_eq!(c.state(), SessionState::Completed(finished));
        assert_eq!(c.result(), Some(&result));
        assert_eq!(timer.started(), vec![finished]);

        assert!(c.dismiss());
        assert!(c.start_attempt(quiz(2, 1, Difficulty::Easy, 5)).is_ok());
    }

    #[test]
    fn submit_twice_returns_cached_result_and_records_once() {
        let (mut c, _, sink) = controller();
        c.start_attempt(quiz(1, 3, Difficulty::Medium, 5)).unwrap();
        c.select_answer(QuestionId::new(1), "right");

        let first = c.submit().unwrap();
        let second = c.submit().unwrap();
        assert_eq!(first, second);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn submit_without_attempt_is_none() {
        let (mut c, _, sink) = controller();
        assert!(c.submit().is_none());
        c.select(quiz(1, 1, Difficulty::Easy, 5));
        assert!(c.submit().is_none());
        assert_eq!(c.state(), SessionState::Selecting(QuizId::new(1)));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn timer_expiry_submits_with_zero_score() {
        let (mut c, timer, sink) = controller();
        let attempt = c.start_attempt(quiz(1, 4, Difficulty::Easy, 1)).unwrap();

        for second in 1..60 {
            assert_eq!(
                c.tick(attempt),
                TickOutcome::Running {
                    remaining_secs: 60 - second
                }
            );
        }
        let TickOutcome::Expired(result) = c.tick(attempt) else {
            panic!("expected expiry on the 60th tick");
        };
        assert_eq!(result.correct, 0);
        assert_eq!(result.score, 0);
        assert_eq!(result.elapsed_secs, 60);
        assert_eq!(c.state(), SessionState::Completed(attempt));
        assert!(timer.running().is_empty());

        assert_eq!(c.tick(attempt), TickOutcome::Ignored);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn expiry_scores_answers_given_so_far() {
        let (mut c, _, _) = controller();
        let attempt = c.start_attempt(quiz(1, 2, Difficulty::Easy, 1)).unwrap();
        c.select_answer(QuestionId::new(1), "right");
        for _ in 0..59 {
            c.tick(attempt);
        }
        let TickOutcome::Expired(result) = c.tick(attempt) else {
            panic!("expected expiry");
        };
        assert_eq!(result.correct, 1);
        assert_eq!(result.score, 50);
    }

    #[test]
    fn new_attempt_cancels_previous_countdown() {
        let (mut c, timer, sink) = controller();
        let first = c.start_attempt(quiz(1, 1, Difficulty::Easy, 5)).unwrap();
        let second = c.start_attempt(quiz(2, 1, Difficulty::Easy, 5)).unwrap();

        assert_eq!(timer.started(), vec![first, second]);
        assert_eq!(timer.running(), vec![second]);
        assert_eq!(c.tick(first), TickOutcome::Ignored);
        assert_eq!(
            c.tick(second),
            TickOutcome::Running {
                remaining_secs: 299
            }
        );
        assert!(sink.records().is_empty());
    }

    #[test]
    fn advance_blocks_on_unanswered_and_submits_from_last() {
        let (mut c, _, sink) = controller();
        c.start_attempt(quiz(1, 2, Difficulty::Hard, 5)).unwrap();

        assert_eq!(c.advance(), StepOutcome::Blocked);
        c.select_answer(QuestionId::new(1), "right");
        assert_eq!(c.advance(), StepOutcome::Moved(1));
        assert_eq!(c.advance(), StepOutcome::Blocked);
        c.select_answer(QuestionId::new(2), "right");

        let StepOutcome::Submitted(result) = c.advance() else {
            panic!("expected submission from the last question");
        };
        assert_eq!(result.score, 100);
        assert_eq!(result.xp, 300);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(c.advance(), StepOutcome::Inactive);
    }

    #[test]
    fn retreat_and_jump_move_freely() {
        let (mut c, _, _) = controller();
        c.start_attempt(quiz(1, 3, Difficulty::Easy, 5)).unwrap();

        assert!(!c.retreat());
        assert!(c.jump_to(2));
        assert_eq!(c.progress().unwrap().current_index, 2);
        assert!(c.retreat());
        assert_eq!(c.progress().unwrap().current_index, 1);
        assert!(!c.jump_to(3));
    }

    #[test]
    fn jumped_over_question_counts_incorrect() {
        let (mut c, _, _) = controller();
        c.start_attempt(quiz(1, 2, Difficulty::Easy, 5)).unwrap();
        c.jump_to(1);
        c.select_answer(QuestionId::new(2), "right");

        let result = c.submit().unwrap();
        assert_eq!(result.correct, 1);
        assert_eq!(result.score, 50);
        assert_eq!(result.review[0].selected, None);
    }

    #[test]
    fn badge_threshold() {
        let (mut c, _, _) = controller();
        c.start_attempt(quiz(1, 5, Difficulty::Easy, 5)).unwrap();
        for q in 1..=4 {
            c.select_answer(QuestionId::new(q), "right");
        }
        let result = c.submit().unwrap();
        assert_eq!(result.score, 80);
        assert_eq!(result.badge.as_deref(), Some("Networking Novice"));
    }

    #[test]
    fn operations_are_noops_when_idle() {
        let (mut c, _, _) = controller();
        assert!(!c.select_answer(QuestionId::new(1), "right"));
        assert_eq!(c.advance(), StepOutcome::Inactive);
        assert!(!c.retreat());
        assert!(!c.jump_to(0));
        assert!(!c.dismiss());
        assert_eq!(c.tick(AttemptId::random()), TickOutcome::Ignored);
    }

    #[test]
    fn select_is_refused_while_results_are_shown() {
        let (mut c, _, _) = controller();
        c.start_attempt(quiz(1, 1, Difficulty::Easy, 5)).unwrap();
        c.submit();
        assert!(!c.select(quiz(2, 1, Difficulty::Easy, 5)));
        assert!(c.result().is_some());
    }

    #[test]
    fn completion_uses_controller_clock() {
        let (mut c, _, sink) = controller();
        c.start_attempt(quiz(1, 1, Difficulty::Easy, 5)).unwrap();
        let result = c.submit().unwrap();
        assert_eq!(result.completed_at, fixed_now());
        assert_eq!(sink.records()[0].completed_at, fixed_now());
    }

    #[test]
    fn dropping_controller_cancels_countdown() {
        let (mut c, timer, _) = controller();
        c.start_attempt(quiz(1, 1, Difficulty::Easy, 5)).unwrap();
        drop(c);
        assert!(timer.running().is_empty());
    }
}
