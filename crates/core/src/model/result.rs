use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, QuizId};

/// How a single question was answered, for the results screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub selected: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
}

/// Scored outcome of a completed attempt.
///
/// Computed once at submission and cached on the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub quiz_id: QuizId,
    pub correct: usize,
    pub total: usize,
    pub score: u8,
    pub elapsed_secs: u32,
    pub xp: u32,
    pub badge: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub review: Vec<QuestionReview>,
}

impl QuizResult {
    #[must_use]
    pub fn incorrect(&self) -> usize {
        self.total.saturating_sub(self.correct)
    }

    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.review.iter().filter(|r| r.selected.is_none()).count()
    }

    /// The history entry emitted for this result.
    #[must_use]
    pub fn record(&self) -> AttemptRecord {
        AttemptRecord {
            quiz_id: self.quiz_id,
            score: self.score,
            completed_at: self.completed_at,
        }
    }
}

/// Append-only history entry written when an attempt completes.
///
/// Serializes as `{"quizId": "7", "score": 85, "completedAt": "<RFC 3339>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    #[serde(with = "quiz_id_string")]
    pub quiz_id: QuizId,
    pub score: u8,
    pub completed_at: DateTime<Utc>,
}

mod quiz_id_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use crate::model::ids::QuizId;

    pub(super) fn serialize<S: Serializer>(id: &QuizId, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(id)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<QuizId, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn result() -> QuizResult {
        QuizResult {
            quiz_id: QuizId::new(7),
            correct: 1,
            total: 2,
            score: 50,
            elapsed_secs: 42,
            xp: 100,
            badge: None,
            completed_at: fixed_now(),
            review: vec![
                QuestionReview {
                    question_id: QuestionId::new(1),
                    selected: Some("443".into()),
                    correct_answer: "443".into(),
                    is_correct: true,
                },
                QuestionReview {
                    question_id: QuestionId::new(2),
                    selected: None,
                    correct_answer: "22".into(),
                    is_correct: false,
                },
            ],
        }
    }

    #[test]
    fn counts_incorrect_and_unanswered() {
        let r = result();
        assert_eq!(r.incorrect(), 1);
        assert_eq!(r.unanswered(), 1);
    }

    #[test]
    fn record_serializes_with_string_id_and_iso_timestamp() {
        let record = result().record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["quizId"], "7");
        assert_eq!(json["score"], 50);
        assert_eq!(json["completedAt"], "2023-11-14T22:13:20Z");

        let back: AttemptRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
