use sqlx::Row;
use tutor_core::model::{SubjectProgress, UserId, UserProgress};

use super::SqliteRepository;
use super::mapping::{conn, map_subject_row, ser, topics_to_json};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_user_progress(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT total_quizzes, average_score, last_active
            FROM user_progress
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let total: i64 = row.try_get("total_quizzes").map_err(ser)?;
        let total = u32::try_from(total)
            .map_err(|_| StorageError::Serialization(format!("invalid total_quizzes: {total}")))?;
        let subjects = self.list_subject_progress(user_id).await?;

        UserProgress::from_persisted(
            user_id,
            total,
            row.try_get("average_score").map_err(ser)?,
            row.try_get("last_active").map_err(ser)?,
            subjects,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn upsert_user_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (user_id, total_quizzes, average_score, last_active)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                total_quizzes = excluded.total_quizzes,
                average_score = excluded.average_score,
                last_active = excluded.last_active
            ",
        )
        .bind(progress.user_id().to_string())
        .bind(i64::from(progress.total_quizzes()))
        .bind(progress.average_score())
        .bind(progress.last_active())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_subject_progress(
        &self,
        user_id: UserId,
        subject: &str,
    ) -> Result<Option<SubjectProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT subject, total_attempts, average_score, last_attempt, weak_topics, strong_topics
            FROM subject_progress
            WHERE user_id = ?1 AND subject = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_subject_row).transpose()
    }

    async fn upsert_subject_progress(
        &self,
        user_id: UserId,
        progress: &SubjectProgress,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO subject_progress (
                user_id, subject, total_attempts, average_score, last_attempt,
                weak_topics, strong_topics
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id, subject) DO UPDATE SET
                total_attempts = excluded.total_attempts,
                average_score = excluded.average_score,
                last_attempt = excluded.last_attempt,
                weak_topics = excluded.weak_topics,
                strong_topics = excluded.strong_topics
            ",
        )
        .bind(user_id.to_string())
        .bind(progress.subject())
        .bind(i64::from(progress.total_attempts()))
        .bind(progress.average_score())
        .bind(progress.last_attempt())
        .bind(topics_to_json(progress.weak_topics())?)
        .bind(topics_to_json(progress.strong_topics())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_subject_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SubjectProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT subject, total_attempts, average_score, last_attempt, weak_topics, strong_topics
            FROM subject_progress
            WHERE user_id = ?1
            ORDER BY subject ASC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_subject_row(&row)?);
        }
        Ok(out)
    }
}
