use std::collections::HashMap;

use sqlx::Row;
use study_core::model::{Difficulty, Question, QuestionId, QuizDefinition, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, question_id_from_i64, quiz_id_from_i64, ser, u32_from_i64};
use crate::repository::{QuizCatalogRepository, StorageError};

impl SqliteRepository {
    async fn load_questions(&self, quiz_id: i64) -> Result<Vec<Question>, StorageError> {
        let option_rows = sqlx::query(
            r"
                SELECT question_id, value
                FROM question_options
                WHERE quiz_id = ?1
                ORDER BY question_id, position
            ",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut options: HashMap<QuestionId, Vec<String>> = HashMap::new();
        for row in option_rows {
            let question_id = question_id_from_i64(row.try_get("question_id").map_err(ser)?)?;
            let value: String = row.try_get("value").map_err(ser)?;
            options.entry(question_id).or_default().push(value);
        }

        let question_rows = sqlx::query(
            r"
                SELECT id, prompt, correct_answer
                FROM questions
                WHERE quiz_id = ?1
                ORDER BY position
            ",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in question_rows {
            let id = question_id_from_i64(row.try_get("id").map_err(ser)?)?;
            let prompt: String = row.try_get("prompt").map_err(ser)?;
            let correct_answer: String = row.try_get("correct_answer").map_err(ser)?;
            let question = Question::new(
                id,
                prompt,
                options.remove(&id).unwrap_or_default(),
                correct_answer,
            )
            .map_err(ser)?;
            questions.push(question);
        }
        Ok(questions)
    }

    fn map_quiz_row(
        row: &sqlx::sqlite::SqliteRow,
        questions: Vec<Question>,
    ) -> Result<QuizDefinition, StorageError> {
        let id = quiz_id_from_i64(row.try_get("id").map_err(ser)?)?;
        let title: String = row.try_get("title").map_err(ser)?;
        let subject: String = row.try_get("subject").map_err(ser)?;
        let difficulty: String = row.try_get("difficulty").map_err(ser)?;
        let time_limit = u32_from_i64(
            "time_limit_minutes",
            row.try_get::<i64, _>("time_limit_minutes").map_err(ser)?,
        )?;
        let badge_reward: Option<String> = row.try_get("badge_reward").map_err(ser)?;

        QuizDefinition::new(
            id,
            title,
            subject,
            Difficulty::parse(&difficulty),
            questions,
            time_limit,
            badge_reward,
        )
        .map_err(ser)
    }
}

#[async_trait::async_trait]
impl QuizCatalogRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &QuizDefinition) -> Result<(), StorageError> {
        let quiz_id = id_i64("quiz_id", quiz.id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO quizzes (id, title, subject, difficulty, time_limit_minutes, badge_reward)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    subject = excluded.subject,
                    difficulty = excluded.difficulty,
                    time_limit_minutes = excluded.time_limit_minutes,
                    badge_reward = excluded.badge_reward
            ",
        )
        .bind(quiz_id)
        .bind(quiz.title())
        .bind(quiz.subject())
        .bind(quiz.difficulty().as_str())
        .bind(i64::from(quiz.time_limit_minutes()))
        .bind(quiz.badge_reward())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM question_options WHERE quiz_id = ?1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM questions WHERE quiz_id = ?1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in quiz.questions().iter().enumerate() {
            let question_id = id_i64("question_id", question.id().value())?;
            sqlx::query(
                r"
                    INSERT INTO questions (quiz_id, id, position, prompt, correct_answer)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(quiz_id)
            .bind(question_id)
            .bind(id_i64("position", position as u64)?)
            .bind(question.prompt())
            .bind(question.correct_answer())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (option_pos, option) in question.options().iter().enumerate() {
                sqlx::query(
                    r"
                        INSERT INTO question_options (quiz_id, question_id, position, value)
                        VALUES (?1, ?2, ?3, ?4)
                    ",
                )
                .bind(quiz_id)
                .bind(question_id)
                .bind(id_i64("position", option_pos as u64)?)
                .bind(option.as_str())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(quiz_id = %quiz.id(), questions = quiz.question_count(), "stored quiz");
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<QuizDefinition, StorageError> {
        let quiz_id = id_i64("quiz_id", id.value())?;
        let row = sqlx::query(
            r"
                SELECT id, title, subject, difficulty, time_limit_minutes, badge_reward
                FROM quizzes
                WHERE id = ?1
            ",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let questions = self.load_questions(quiz_id).await?;
        Self::map_quiz_row(&row, questions)
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizDefinition>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, title, subject, difficulty, time_limit_minutes, badge_reward
                FROM quizzes
                ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let quiz_id: i64 = row.try_get("id").map_err(ser)?;
            let questions = self.load_questions(quiz_id).await?;
            out.push(Self::map_quiz_row(&row, questions)?);
        }
        Ok(out)
    }
}
