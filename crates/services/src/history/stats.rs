use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use storage::repository::{AttemptHistoryRepository, AttemptRow};
use study_core::model::{AttemptRecord, QuizId};

use crate::error::HistoryError;

/// Aggregate of every recorded attempt at one quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStats {
    pub quiz_id: QuizId,
    pub attempts: usize,
    pub best_score: u8,
    pub latest_score: u8,
    /// Mean score, rounded half up.
    pub average_score: u8,
    pub last_completed_at: DateTime<Utc>,
}

impl QuizStats {
    /// Summarise records of a single quiz. Returns `None` for an empty slice.
    #[must_use]
    pub fn from_records(quiz_id: QuizId, records: &[AttemptRecord]) -> Option<Self> {
        let latest = records.iter().max_by_key(|r| r.completed_at)?;
        let best_score = records.iter().map(|r| r.score).max()?;
        let n = records.len() as u64;
        let sum: u64 = records.iter().map(|r| u64::from(r.score)).sum();
        let average_score = u8::try_from((2 * sum + n) / (2 * n)).unwrap_or(100);

        Some(Self {
            quiz_id,
            attempts: records.len(),
            best_score,
            latest_score: latest.score,
            average_score,
            last_completed_at: latest.completed_at,
        })
    }
}

/// Read-side facade over the attempt history log.
#[derive(Clone)]
pub struct HistoryService {
    history: Arc<dyn AttemptHistoryRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn AttemptHistoryRepository>) -> Self {
        Self { history }
    }

    /// Latest attempts across all quizzes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` on repository failures.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AttemptRow>, HistoryError> {
        Ok(self.history.list_attempts(None, limit).await?)
    }

    /// Statistics for one quiz, or `None` if it was never completed.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` on repository failures.
    pub async fn quiz_stats(&self, quiz_id: QuizId) -> Result<Option<QuizStats>, HistoryError> {
        let records: Vec<AttemptRecord> = self
            .history
            .list_attempts(Some(quiz_id), u32::MAX)
            .await?
            .into_iter()
            .map(|row| row.record)
            .collect();
        Ok(QuizStats::from_records(quiz_id, &records))
    }

    /// Statistics for every quiz with at least one attempt, ordered by quiz id.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` on repository failures.
    pub async fn overview(&self) -> Result<Vec<QuizStats>, HistoryError> {
        let mut by_quiz: BTreeMap<QuizId, Vec<AttemptRecord>> = BTreeMap::new();
        for row in self.history.list_attempts(None, u32::MAX).await? {
            by_quiz.entry(row.record.quiz_id).or_default().push(row.record);
        }
        Ok(by_quiz
            .iter()
            .filter_map(|(quiz_id, records)| QuizStats::from_records(*quiz_id, records))
            .collect())
    }
}
