use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId, QuizId};
use crate::model::quiz::{Question, QuizDefinition};
use crate::model::result::{QuestionReview, QuizResult};
use crate::scoring;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("quiz {quiz_id} has no questions")]
    NoQuestions { quiz_id: QuizId },
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// What a forward step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the question at this index.
    Moved(usize),
    /// The current question has no answer yet.
    Blocked,
    /// Already on the last (answered) question; the caller should submit.
    AtEnd,
    /// The attempt is already submitted.
    Completed,
}

/// Snapshot of attempt progress for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptProgress {
    pub total: usize,
    pub answered: usize,
    pub current_index: usize,
    pub remaining_secs: u32,
    pub is_complete: bool,
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// One run through a quiz's questions.
///
/// The attempt never touches a timer itself: time only passes through
/// [`QuizAttempt::tick`], which whoever owns the countdown calls once per
/// second. The result is computed on the first [`QuizAttempt::submit`] and
/// cached; later calls return the same value.
pub struct QuizAttempt {
    id: AttemptId,
    definition: Arc<QuizDefinition>,
    current: usize,
    answers: HashMap<QuestionId, String>,
    remaining_secs: u32,
    started_at: DateTime<Utc>,
    result: Option<QuizResult>,
}

impl QuizAttempt {
    /// Starts an attempt on the first question with the full time budget.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NoQuestions` if the definition is empty.
    pub fn start(
        definition: Arc<QuizDefinition>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if definition.questions().is_empty() {
            return Err(AttemptError::NoQuestions {
                quiz_id: definition.id(),
            });
        }

        Ok(Self {
            id: AttemptId::random(),
            remaining_secs: definition.time_limit_secs(),
            definition,
            current: 0,
            answers: HashMap::new(),
            started_at,
            result: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn definition(&self) -> &QuizDefinition {
        &self.definition
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.definition.questions()[self.current]
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current + 1 == self.definition.question_count()
    }

    #[must_use]
    pub fn answer_for(&self, question_id: QuestionId) -> Option<&str> {
        self.answers.get(&question_id).map(String::as_str)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Seconds used so far out of the time limit.
    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.definition
            .time_limit_secs()
            .saturating_sub(self.remaining_secs)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        AttemptProgress {
            total: self.definition.question_count(),
            answered: self.answered_count(),
            current_index: self.current,
            remaining_secs: self.remaining_secs,
            is_complete: self.is_complete(),
        }
    }

    /// Records `option` as the answer to `question_id`, replacing any earlier one.
    ///
    /// The option is not checked against the question's list. Returns `false`
    /// when the attempt is complete or the question is not part of this quiz.
    pub fn select_answer(&mut self, question_id: QuestionId, option: impl Into<String>) -> bool {
        if self.is_complete() || self.definition.question_by_id(question_id).is_none() {
            return false;
        }
        self.answers.insert(question_id, option.into());
        true
    }

    /// Steps forward, refusing to leave an unanswered question.
    pub fn advance(&mut self) -> AdvanceOutcome {
        if self.is_complete() {
            return AdvanceOutcome::Completed;
        }
        if self.answer_for(self.current_question().id()).is_none() {
            return AdvanceOutcome::Blocked;
        }
        if self.is_last_question() {
            return AdvanceOutcome::AtEnd;
        }
        self.current += 1;
        AdvanceOutcome::Moved(self.current)
    }

    /// Steps back one question. Returns `false` at the first question.
    pub fn retreat(&mut self) -> bool {
        if self.is_complete() || self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Jumps straight to `index`, answered or not.
    ///
    /// Out-of-range indices are ignored and return `false`.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if self.is_complete() || index >= self.definition.question_count() {
            return false;
        }
        self.current = index;
        true
    }

    /// Consumes one second of the time budget and returns what is left.
    ///
    /// Once the budget reaches zero it stays there.
    pub fn tick(&mut self) -> u32 {
        if !self.is_complete() {
            self.remaining_secs = self.remaining_secs.saturating_sub(1);
        }
        self.remaining_secs
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }

    /// Scores the attempt and freezes it.
    ///
    /// Unanswered questions count as incorrect. A second call returns the
    /// result computed by the first and ignores `completed_at`.
    pub fn submit(&mut self, completed_at: DateTime<Utc>) -> &QuizResult {
        let result = match self.result.take() {
            Some(cached) => cached,
            None => self.score(completed_at),
        };
        self.result.insert(result)
    }

    fn score(&self, completed_at: DateTime<Utc>) -> QuizResult {
        let definition = &self.definition;
        let review: Vec<QuestionReview> = definition
            .questions()
            .iter()
            .map(|q| {
                let selected = self.answers.get(&q.id()).cloned();
                let is_correct = selected.as_deref().is_some_and(|s| q.is_correct(s));
                QuestionReview {
                    question_id: q.id(),
                    selected,
                    correct_answer: q.correct_answer().to_owned(),
                    is_correct,
                }
            })
            .collect();

        let correct = review.iter().filter(|r| r.is_correct).count();
        let total = review.len();
        let score = scoring::score_percent(correct, total);

        QuizResult {
            quiz_id: definition.id(),
            correct,
            total,
            score,
            elapsed_secs: self.elapsed_secs(),
            xp: scoring::xp_for(definition.difficulty(), score),
            badge: scoring::badge_for(definition.badge_reward(), score),
            completed_at,
            review,
        }
    }
}

impl fmt::Debug for QuizAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizAttempt")
            .field("id", &self.id)
            .field("quiz_id", &self.definition.id())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("remaining_secs", &self.remaining_secs)
            .field("completed", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, QuizId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn question(id: u64, correct: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct,
        )
        .unwrap()
    }

    fn definition(count: u64, difficulty: Difficulty) -> Arc<QuizDefinition> {
        let questions = (1..=count).map(|id| question(id, "B")).collect();
        Arc::new(
            QuizDefinition::new(
                QuizId::new(1),
                "Network Fundamentals",
                "Networking",
                difficulty,
                questions,
                1,
                Some("Networking Novice".into()),
            )
            .unwrap(),
        )
    }

    #[test]
    fn start_rejects_empty_quiz() {
        let empty = Arc::new(
            QuizDefinition::new(
                QuizId::new(9),
                "Empty",
                "Cloud",
                Difficulty::Easy,
                Vec::new(),
                5,
                None,
            )
            .unwrap(),
        );
        let err = QuizAttempt::start(empty, fixed_now()).unwrap_err();
        assert_eq!(
            err,
            AttemptError::NoQuestions {
                quiz_id: QuizId::new(9)
            }
        );
    }

    #[test]
    fn start_initializes_state() {
        let attempt = QuizAttempt::start(definition(3, Difficulty::Easy), fixed_now()).unwrap();
        assert_eq!(attempt.current_index(), 0);
        assert_eq!(attempt.answered_count(), 0);
        assert_eq!(attempt.remaining_secs(), 60);
        assert!(!attempt.is_complete());
    }

    #[test]
    fn advance_is_blocked_until_answered() {
        let mut attempt = QuizAttempt::start(definition(2, Difficulty::Easy), fixed_now()).unwrap();
        assert_eq!(attempt.advance(), AdvanceOutcome::Blocked);
        assert!(attempt.select_answer(QuestionId::new(1), "A"));
        assert_eq!(attempt.advance(), AdvanceOutcome::Moved(1));
        attempt.select_answer(QuestionId::new(2), "B");
        assert_eq!(attempt.advance(), AdvanceOutcome::AtEnd);
        assert_eq!(attempt.current_index(), 1);
    }

    #[test]
    fn retreat_stops_at_first_question() {
        let mut attempt = QuizAttempt::start(definition(2, Difficulty::Easy), fixed_now()).unwrap();
        assert!(!attempt.retreat());
        attempt.jump_to(1);
        assert!(attempt.retreat());
        assert_eq!(attempt.current_index(), 0);
    }

    #[test]
    fn jump_ignores_out_of_range() {
        let mut attempt = QuizAttempt::start(definition(2, Difficulty::Easy), fixed_now()).unwrap();
        assert!(!attempt.jump_to(2));
        assert_eq!(attempt.current_index(), 0);
        assert!(attempt.jump_to(1));
        assert_eq!(attempt.current_index(), 1);
    }

    #[test]
    fn later_answer_overwrites_earlier() {
        let mut attempt = QuizAttempt::start(definition(1, Difficulty::Easy), fixed_now()).unwrap();
        attempt.select_answer(QuestionId::new(1), "A");
        attempt.select_answer(QuestionId::new(1), "B");
        assert_eq!(attempt.answer_for(QuestionId::new(1)), Some("B"));
        assert_eq!(attempt.answered_count(), 1);
    }

    #[test]
    fn unknown_question_is_ignored() {
        let mut attempt = QuizAttempt::start(definition(1, Difficulty::Easy), fixed_now()).unwrap();
        assert!(!attempt.select_answer(QuestionId::new(99), "A"));
        assert_eq!(attempt.answered_count(), 0);
    }

    #[test]
    fn option_membership_is_not_checked() {
        let mut attempt = QuizAttempt::start(definition(1, Difficulty::Easy), fixed_now()).unwrap();
        assert!(attempt.select_answer(QuestionId::new(1), "not an option"));
        let result = attempt.submit(fixed_now());
        assert_eq!(result.correct, 0);
    }

    #[test]
    fn submit_scores_and_caches() {
        let mut attempt = QuizAttempt::start(definition(4, Difficulty::Hard), fixed_now()).unwrap();
        for id in 1..=3 {
            attempt.select_answer(QuestionId::new(id), "B");
        }
        attempt.select_answer(QuestionId::new(4), "C");
        for _ in 0..25 {
            attempt.tick();
        }

        let first = attempt.submit(fixed_now()).clone();
        assert_eq!(first.correct, 3);
        assert_eq!(first.total, 4);
        assert_eq!(first.score, 75);
        assert_eq!(first.elapsed_secs, 25);
        assert_eq!(first.xp, 220);
        assert_eq!(first.badge, None);

        let second = attempt.submit(fixed_now() + Duration::minutes(5)).clone();
        assert_eq!(first, second);
    }

    #[test]
    fn jumped_unanswered_question_counts_incorrect() {
        let mut attempt = QuizAttempt::start(definition(3, Difficulty::Easy), fixed_now()).unwrap();
        attempt.select_answer(QuestionId::new(1), "B");
        attempt.jump_to(2);
        attempt.select_answer(QuestionId::new(3), "B");

        let result = attempt.submit(fixed_now());
        assert_eq!(result.correct, 2);
        assert_eq!(result.score, 67);
        assert_eq!(result.unanswered(), 1);
        assert!(!result.review[1].is_correct);
    }

    #[test]
    fn badge_awarded_at_eighty() {
        let mut attempt = QuizAttempt::start(definition(5, Difficulty::Easy), fixed_now()).unwrap();
        for id in 1..=4 {
            attempt.select_answer(QuestionId::new(id), "B");
        }
        let result = attempt.submit(fixed_now());
        assert_eq!(result.score, 80);
        assert_eq!(result.badge.as_deref(), Some("Networking Novice"));
        assert_eq!(result.xp, 130);
    }

    #[test]
    fn tick_saturates_at_zero() {
        let mut attempt = QuizAttempt::start(definition(1, Difficulty::Easy), fixed_now()).unwrap();
        for _ in 0..61 {
            attempt.tick();
        }
        assert!(attempt.is_expired());
        assert_eq!(attempt.remaining_secs(), 0);
        assert_eq!(attempt.elapsed_secs(), 60);
    }

    #[test]
    fn completed_attempt_is_frozen() {
        let mut attempt = QuizAttempt::start(definition(2, Difficulty::Easy), fixed_now()).unwrap();
        attempt.submit(fixed_now());
        assert!(!attempt.select_answer(QuestionId::new(1), "B"));
        assert!(!attempt.jump_to(1));
        assert_eq!(attempt.advance(), AdvanceOutcome::Completed);
        assert_eq!(attempt.tick(), 60);
    }
}
