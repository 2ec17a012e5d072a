use tutor_core::model::{AttemptId, QuizAttempt, StoredAttempt, UserId};

use super::SqliteRepository;
use super::mapping::{conn, entries_to_json, id_i64, map_attempt_row};
use crate::repository::{QuizAttemptRepository, StorageError};

#[async_trait::async_trait]
impl QuizAttemptRepository for SqliteRepository {
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO quiz_attempts (
                user_id, subject, score, total_questions, time_spent_secs, entries, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(attempt.user_id.to_string())
        .bind(&attempt.subject)
        .bind(attempt.score)
        .bind(i64::from(attempt.total_questions))
        .bind(id_i64("time_spent_secs", attempt.time_spent_secs)?)
        .bind(entries_to_json(&attempt.entries)?)
        .bind(attempt.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("attempt id sign overflow".into()))?;
        Ok(AttemptId::new(id))
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, subject, score, total_questions, time_spent_secs, entries, completed_at
            FROM quiz_attempts
            WHERE user_id = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }
}
