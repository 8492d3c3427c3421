use std::sync::Arc;

use storage::repository::{QuizCatalogRepository, StorageError};
use study_core::model::{Difficulty, QuizDefinition, QuizId};

use crate::error::CatalogError;

/// Narrowing applied when browsing the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    subject: Option<String>,
    difficulty: Option<Difficulty>,
}

impl CatalogFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep quizzes whose subject matches, ignoring case.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    #[must_use]
    pub fn matches(&self, quiz: &QuizDefinition) -> bool {
        let subject_ok = self
            .subject
            .as_deref()
            .is_none_or(|s| quiz.subject().eq_ignore_ascii_case(s.trim()));
        let difficulty_ok = self.difficulty.is_none_or(|d| quiz.difficulty() == d);
        subject_ok && difficulty_ok
    }
}

/// Loads quiz definitions for the controller and the quiz picker.
#[derive(Clone)]
pub struct CatalogService {
    quizzes: Arc<dyn QuizCatalogRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(quizzes: Arc<dyn QuizCatalogRepository>) -> Self {
        Self { quizzes }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Quizzes matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` on repository failures.
    pub async fn list(&self, filter: &CatalogFilter) -> Result<Vec<QuizDefinition>, CatalogError> {
        let mut quizzes = self.quizzes.list_quizzes().await?;
        quizzes.retain(|quiz| filter.matches(quiz));
        Ok(quizzes)
    }

    /// Fetch one quiz, shared so the controller can hold it for an attempt.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    pub async fn get(&self, id: QuizId) -> Result<Arc<QuizDefinition>, CatalogError> {
        match self.quizzes.get_quiz(id).await {
            Ok(quiz) => Ok(Arc::new(quiz)),
            Err(StorageError::NotFound) => Err(CatalogError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Import a JSON array of quiz definitions, replacing quizzes with the same id.
    ///
    /// Every record is validated before anything is stored.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Decode` if the JSON is malformed or a definition
    /// is invalid, `CatalogError::Storage` if writing fails.
    pub async fn import_json(&self, json: &str) -> Result<usize, CatalogError> {
        let quizzes: Vec<QuizDefinition> = serde_json::from_str(json)?;
        for quiz in &quizzes {
            self.quizzes.upsert_quiz(quiz).await?;
        }
        tracing::info!(count = quizzes.len(), "imported quiz catalog");
        Ok(quizzes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "id": 1, "title": "Network Fundamentals", "subject": "Networking",
            "difficulty": "easy", "timeLimit": 10, "badgeReward": "Networking Novice",
            "questions": [
                {"id": 1, "prompt": "Default HTTPS port?", "options": ["80", "443"], "correctAnswer": "443"}
            ]
        },
        {
            "id": 2, "title": "Cloud Security", "subject": "Security",
            "difficulty": "hard", "timeLimit": 20,
            "questions": [
                {"id": 1, "prompt": "Least privilege means?", "options": ["Minimal access", "Admin for all"], "correctAnswer": "Minimal access"}
            ]
        },
        {
            "id": 3, "title": "Subnetting Drills", "subject": "networking",
            "difficulty": "hard", "timeLimit": 5, "questions": []
        }
    ]"#;

    async fn seeded() -> CatalogService {
        let service = CatalogService::in_memory();
        assert_eq!(service.import_json(CATALOG).await.unwrap(), 3);
        service
    }

    #[tokio::test]
    async fn filters_by_subject_ignoring_case() {
        let service = seeded().await;
        let quizzes = service
            .list(&CatalogFilter::new().with_subject("NETWORKING"))
            .await
            .unwrap();
        let ids: Vec<_> = quizzes.iter().map(QuizDefinition::id).collect();
        assert_eq!(ids, vec![QuizId::new(1), QuizId::new(3)]);
    }

    #[tokio::test]
    async fn filters_by_subject_and_difficulty() {
        let service = seeded().await;
        let filter = CatalogFilter::new()
            .with_subject("networking")
            .with_difficulty(Difficulty::Hard);
        let quizzes = service.list(&filter).await.unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].title(), "Subnetting Drills");
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found() {
        let service = seeded().await;
        let err = service.get(QuizId::new(42)).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(id) if id == QuizId::new(42)));
    }

    #[tokio::test]
    async fn invalid_catalog_stores_nothing() {
        let service = CatalogService::in_memory();
        let broken = r#"[
            {"id": 1, "title": "Ok", "subject": "x", "difficulty": "easy", "timeLimit": 5, "questions": []},
            {"id": 2, "title": "", "subject": "x", "difficulty": "easy", "timeLimit": 5, "questions": []}
        ]"#;
        let err = service.import_json(broken).await.unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)));
        assert!(service.list(&CatalogFilter::new()).await.unwrap().is_empty());
    }
}
