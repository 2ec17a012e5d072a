use std::sync::Arc;

use tracing::{error, info};
use tutor_core::model::{AttemptId, StoredAttempt, UserId, UserProgress};

use super::dashboard::ProgressDashboard;
use crate::error::PersistenceError;
use crate::quiz::CompletedQuiz;
use storage::repository::{ProgressRepository, QuizAttemptRepository};

/// What was stored for a finished quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuiz {
    pub attempt_id: AttemptId,
    pub score: f64,
    pub progress: UserProgress,
}

/// Folds finished quizzes into the stored aggregates and reads them back.
#[derive(Clone)]
pub struct ProgressService {
    attempts: Arc<dyn QuizAttemptRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        attempts: Arc<dyn QuizAttemptRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self { attempts, progress }
    }

    /// Store the attempt, then fold it into user and subject progress.
    ///
    /// Writes happen in that order with no rollback: when a progress write
    /// fails the attempt stays stored and the aggregates keep their old values.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` for the first failing read or write.
    pub async fn record(
        &self,
        user_id: UserId,
        quiz: &CompletedQuiz,
    ) -> Result<RecordedQuiz, PersistenceError> {
        let attempt = quiz.attempt(user_id);
        let attempt_id = self.attempts.insert_attempt(&attempt).await?;

        let outcome = quiz.outcome();
        let mut progress = self
            .progress
            .get_user_progress(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::new(user_id, quiz.completed_at));
        progress.fold(&outcome)?;

        self.progress
            .upsert_user_progress(&progress)
            .await
            .inspect_err(|err| {
                error!(%attempt_id, error = %err, "attempt stored but user progress was not updated");
            })?;

        if let Some(subject) = progress.subject(&outcome.subject) {
            self.progress
                .upsert_subject_progress(user_id, subject)
                .await
                .inspect_err(|err| {
                    error!(%attempt_id, subject = %outcome.subject, error = %err,
                        "attempt stored but subject progress was not updated");
                })?;
        }

        info!(%attempt_id, subject = %outcome.subject, score = outcome.score, "quiz recorded");
        Ok(RecordedQuiz {
            attempt_id,
            score: outcome.score,
            progress,
        })
    }

    /// Current aggregates, or `None` before the first finished quiz.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the read fails.
    pub async fn snapshot(&self, user_id: UserId) -> Result<Option<UserProgress>, PersistenceError> {
        Ok(self.progress.get_user_progress(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `PersistenceError` if the read fails.
    pub async fn dashboard(&self, user_id: UserId) -> Result<ProgressDashboard, PersistenceError> {
        Ok(self
            .snapshot(user_id)
            .await?
            .as_ref()
            .map_or_else(ProgressDashboard::empty, ProgressDashboard::from_progress))
    }

    /// # Errors
    ///
    /// Returns `PersistenceError` if the read fails.
    pub async fn recent_attempts(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, PersistenceError> {
        Ok(self.attempts.list_attempts(user_id, limit).await?)
    }
}
