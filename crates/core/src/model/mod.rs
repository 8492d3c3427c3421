mod attempt;
mod ids;
mod quiz;
mod result;

pub use attempt::{AdvanceOutcome, AttemptError, AttemptProgress, QuizAttempt};
pub use ids::{AttemptId, ParseIdError, QuestionId, QuizId};
pub use quiz::{
    Difficulty, MAX_TIME_LIMIT_MINUTES, Question, QuestionError, QuizDefinition, QuizError,
};
pub use result::{AttemptRecord, QuestionReview, QuizResult};
