use sqlx::Row;
use study_core::model::{AttemptRecord, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, quiz_id_from_i64, score_from_i64, ser};
use crate::repository::{AttemptHistoryRepository, AttemptRow, AttemptRowId, StorageError};

fn map_record(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptRecord, StorageError> {
    Ok(AttemptRecord {
        quiz_id: quiz_id_from_i64(row.try_get("quiz_id").map_err(ser)?)?,
        score: score_from_i64(row.try_get("score").map_err(ser)?)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl AttemptHistoryRepository for SqliteRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<AttemptRowId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO attempt_history (quiz_id, score, completed_at)
                VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("quiz_id", record.quiz_id.value())?)
        .bind(i64::from(record.score))
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: AttemptRowId) -> Result<AttemptRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT quiz_id, score, completed_at
                FROM attempt_history
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_record(&row)
    }

    async fn list_attempts(
        &self,
        quiz_id: Option<QuizId>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let mut sql = String::from(
            r"
                SELECT id, quiz_id, score, completed_at
                FROM attempt_history
            ",
        );
        if quiz_id.is_some() {
            sql.push_str(" WHERE quiz_id = ?1");
            sql.push_str(" ORDER BY completed_at DESC, id DESC LIMIT ?2");
        } else {
            sql.push_str(" ORDER BY completed_at DESC, id DESC LIMIT ?1");
        }

        let mut query = sqlx::query(&sql);
        if let Some(quiz_id) = quiz_id {
            query = query.bind(id_i64("quiz_id", quiz_id.value())?);
        }
        query = query.bind(i64::from(limit));

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(ser)?;
            out.push(AttemptRow::new(id, map_record(&row)?));
        }
        Ok(out)
    }
}
