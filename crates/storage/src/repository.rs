use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use study_core::model::{AttemptRecord, QuizDefinition, QuizId};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage row id of a history entry.
pub type AttemptRowId = i64;

/// A history entry together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: AttemptRowId,
    pub record: AttemptRecord,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: AttemptRowId, record: AttemptRecord) -> Self {
        Self { id, record }
    }
}

/// Source of quiz definitions.
#[async_trait]
pub trait QuizCatalogRepository: Send + Sync {
    /// Persist or replace a quiz definition, questions included.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &QuizDefinition) -> Result<(), StorageError>;

    /// Fetch a quiz by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_quiz(&self, id: QuizId) -> Result<QuizDefinition, StorageError>;

    /// All quizzes ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_quizzes(&self) -> Result<Vec<QuizDefinition>, StorageError>;
}

/// Append-only log of completed attempts.
#[async_trait]
pub trait AttemptHistoryRepository: Send + Sync {
    /// Append a history entry. Duplicates are stored as separate rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<AttemptRowId, StorageError>;

    /// Fetch a history entry by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: AttemptRowId) -> Result<AttemptRecord, StorageError>;

    /// Most recent entries first, optionally restricted to one quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_attempts(
        &self,
        quiz_id: Option<QuizId>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    quizzes: Arc<Mutex<BTreeMap<QuizId, QuizDefinition>>>,
    attempts: Arc<Mutex<Vec<AttemptRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuizCatalogRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &QuizDefinition) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        guard.insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<QuizDefinition, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizDefinition>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard.values().cloned().collect())
    }
}

#[async_trait]
impl AttemptHistoryRepository for InMemoryRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<AttemptRowId, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        guard.push(record.clone());
        AttemptRowId::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("attempt id overflow".into()))
    }

    async fn get_attempt(&self, id: AttemptRowId) -> Result<AttemptRecord, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| guard.get(i))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts(
        &self,
        quiz_id: Option<QuizId>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .zip(1..)
            .filter(|(record, _)| quiz_id.is_none_or(|q| record.quiz_id == q))
            .map(|(record, id)| AttemptRow::new(id, record.clone()))
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .completed_at
                .cmp(&a.record.completed_at)
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Aggregates catalog and history repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizCatalogRepository>,
    pub history: Arc<dyn AttemptHistoryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let quizzes: Arc<dyn QuizCatalogRepository> = Arc::new(repo.clone());
        let history: Arc<dyn AttemptHistoryRepository> = Arc::new(repo);
        Self { quizzes, history }
    }
}
