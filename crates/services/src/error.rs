//! Shared error types for the services crate.

use thiserror::Error;

use study_core::model::QuizId;
use storage::repository::StorageError;

/// Errors emitted by the quiz session controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("quiz {quiz_id} is unavailable: it has no questions")]
    QuizUnavailable { quiz_id: QuizId },
    #[error("no quiz is selected")]
    NothingSelected,
    #[error("the previous result has not been dismissed")]
    ResultsPending,
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("quiz {0} not found")]
    NotFound(QuizId),
    #[error("invalid catalog: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `HistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
