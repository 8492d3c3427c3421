use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

/// Upper bound on a quiz time limit (one day).
pub const MAX_TIME_LIMIT_MINUTES: u32 = 24 * 60;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question {id} needs at least two options, got {count}")]
    TooFewOptions { id: QuestionId, count: usize },

    #[error("question {id} lists option {option:?} more than once")]
    DuplicateOption { id: QuestionId, option: String },

    #[error("correct answer {answer:?} is not one of the options of question {id}")]
    AnswerNotAnOption { id: QuestionId, answer: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("time limit must be between 1 and {MAX_TIME_LIMIT_MINUTES} minutes, got {0}")]
    InvalidTimeLimit(u32),

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error(transparent)]
    Question(#[from] QuestionError),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty label of a quiz, which picks the base XP reward.
///
/// Labels outside `easy | medium | hard` are kept as `Unrated` rather than
/// rejected, so catalogs with new labels still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Unrated,
}

impl Difficulty {
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "medium" => Self::Medium,
            "hard" => Self::Hard,
            _ => Self::Unrated,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Unrated => "unrated",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Difficulty {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Difficulty> for String {
    fn from(value: Difficulty) -> Self {
        value.as_str().to_owned()
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
///
/// Option order is meaningful and never reshuffled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", rename_all = "camelCase")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_answer: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDraft {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_answer: String,
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        Self::new(draft.id, draft.prompt, draft.options, draft.correct_answer)
    }
}

impl Question {
    /// Builds a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, fewer than two options are
    /// given, an option repeats, or the correct answer is not one of the options.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                id,
                count: options.len(),
            });
        }
        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if !seen.insert(option.as_str()) {
                return Err(QuestionError::DuplicateOption {
                    id,
                    option: option.clone(),
                });
            }
        }
        let correct_answer = correct_answer.into();
        if !options.contains(&correct_answer) {
            return Err(QuestionError::AnswerNotAnOption {
                id,
                answer: correct_answer,
            });
        }

        Ok(Self {
            id,
            prompt: prompt.trim().to_owned(),
            options,
            correct_answer,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    /// Exact string comparison against the correct answer.
    #[must_use]
    pub fn is_correct(&self, selected: &str) -> bool {
        self.correct_answer == selected
    }
}

//
// ─── QUIZ DEFINITION ───────────────────────────────────────────────────────────
//

/// Immutable description of a quiz as supplied by the catalog.
///
/// A definition without questions is representable; the session controller
/// refuses to start it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuizDraft", rename_all = "camelCase")]
pub struct QuizDefinition {
    id: QuizId,
    title: String,
    subject: String,
    difficulty: Difficulty,
    questions: Vec<Question>,
    #[serde(rename = "timeLimit")]
    time_limit_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge_reward: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizDraft {
    id: QuizId,
    title: String,
    subject: String,
    difficulty: Difficulty,
    #[serde(default)]
    questions: Vec<Question>,
    time_limit: u32,
    #[serde(default)]
    badge_reward: Option<String>,
}

impl TryFrom<QuizDraft> for QuizDefinition {
    type Error = QuizError;

    fn try_from(draft: QuizDraft) -> Result<Self, Self::Error> {
        Self::new(
            draft.id,
            draft.title,
            draft.subject,
            draft.difficulty,
            draft.questions,
            draft.time_limit,
            draft.badge_reward,
        )
    }
}

impl QuizDefinition {
    /// Builds a validated quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle` for a blank title,
    /// `QuizError::InvalidTimeLimit` for a zero or oversized limit, and
    /// `QuizError::DuplicateQuestion` if two questions share an id.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        subject: impl Into<String>,
        difficulty: Difficulty,
        questions: Vec<Question>,
        time_limit_minutes: u32,
        badge_reward: Option<String>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if time_limit_minutes == 0 || time_limit_minutes > MAX_TIME_LIMIT_MINUTES {
            return Err(QuizError::InvalidTimeLimit(time_limit_minutes));
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestion(question.id()));
            }
        }
        let badge_reward = badge_reward
            .map(|b| b.trim().to_owned())
            .filter(|b| !b.is_empty());

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            subject: subject.into().trim().to_owned(),
            difficulty,
            questions,
            time_limit_minutes,
            badge_reward,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn question_by_id(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    /// Countdown budget in seconds.
    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_minutes * 60
    }

    #[must_use]
    pub fn badge_reward(&self) -> Option<&str> {
        self.badge_reward.as_deref()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
