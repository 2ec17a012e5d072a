use std::sync::Arc;

use tracing::{info, warn};
use tutor_core::model::{AnswerRecord, QuestionId, UserId};
use tutor_core::subjects::canonical_subject;

use super::session::{Advance, QuizSession, TickOutcome};
use crate::Clock;
use crate::error::QuizError;
use crate::progress::{ProgressService, RecordedQuiz};
use crate::questions::QuestionGenerator;

/// Result of moving forward through the loop service.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizStep {
    Moved { index: usize },
    Finished(RecordedQuiz),
}

/// Result of a timer tick through the loop service.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizTick {
    Running { remaining_secs: u32 },
    Expired { skipped: QuestionId, step: QuizStep },
    Inactive,
}

/// Orchestrates quiz start, answering and the fold on completion.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    generator: Arc<QuestionGenerator>,
    progress: Arc<ProgressService>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        generator: Arc<QuestionGenerator>,
        progress: Arc<ProgressService>,
    ) -> Self {
        Self {
            clock,
            generator,
            progress,
        }
    }

    /// Generate a batch for `subject` and open a session on its first question.
    ///
    /// Nothing is created when generation fails, so the caller stays in its
    /// pre-start state and may simply try again.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UnknownSubject` for subjects outside the catalogue and
    /// `QuizError::Generation` when the model is unreachable or its batch is rejected.
    pub async fn start(&self, subject: &str) -> Result<QuizSession, QuizError> {
        let subject = canonical_subject(subject)
            .ok_or_else(|| QuizError::UnknownSubject(subject.trim().to_string()))?;
        let batch = self.generator.generate(subject).await?;
        info!(subject, "quiz started");
        Ok(QuizSession::new(subject, batch, self.clock.now()))
    }

    /// Open a session on the subject's last fresh batch, generating one only
    /// when the generator holds none.
    ///
    /// # Errors
    ///
    /// Same as [`QuizLoopService::start`].
    pub async fn retake(&self, subject: &str) -> Result<QuizSession, QuizError> {
        let subject = canonical_subject(subject)
            .ok_or_else(|| QuizError::UnknownSubject(subject.trim().to_string()))?;
        let batch = self.generator.cached_or_generate(subject).await?;
        info!(subject, "quiz retaken");
        Ok(QuizSession::new(subject, batch, self.clock.now()))
    }

    /// Record an answer for the given question.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::select_answer`].
    pub fn select_answer(
        &self,
        session: &mut QuizSession,
        question_id: &QuestionId,
        option: u8,
    ) -> Result<AnswerRecord, QuizError> {
        session.select_answer(question_id, option).cloned()
    }

    /// Move forward; on the last question the result is persisted.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` for a finished session and
    /// `QuizError::Persistence` when the fold cannot be stored.
    pub async fn advance(
        &self,
        user_id: UserId,
        session: &mut QuizSession,
    ) -> Result<QuizStep, QuizError> {
        let advance = session.advance(self.clock.now())?;
        self.settle(user_id, advance).await
    }

    /// Step back one question.
    pub fn retreat(&self, session: &mut QuizSession) -> bool {
        session.retreat()
    }

    /// Apply one second of countdown; expiry on the last question persists the quiz.
    ///
    /// # Errors
    ///
    /// Same as [`QuizLoopService::advance`].
    pub async fn tick(
        &self,
        user_id: UserId,
        session: &mut QuizSession,
    ) -> Result<QuizTick, QuizError> {
        match session.tick(self.clock.now())? {
            TickOutcome::Running { remaining_secs } => Ok(QuizTick::Running { remaining_secs }),
            TickOutcome::Inactive => Ok(QuizTick::Inactive),
            TickOutcome::Expired { skipped, advance } => {
                info!(question = %skipped, "question timed out");
                let step = self.settle(user_id, advance).await?;
                Ok(QuizTick::Expired { skipped, step })
            }
        }
    }

    /// Leave the quiz; nothing is folded.
    pub fn abandon(&self, session: QuizSession) {
        info!(
            subject = session.subject(),
            answered = session.answers().len(),
            "quiz abandoned"
        );
        session.abandon();
    }

    async fn settle(&self, user_id: UserId, advance: Advance) -> Result<QuizStep, QuizError> {
        match advance {
            Advance::Moved { index } => Ok(QuizStep::Moved { index }),
            Advance::Completed(done) => {
                let recorded = self
                    .progress
                    .record(user_id, &done)
                    .await
                    .inspect_err(|err| warn!(error = %err, "quiz result was not saved"))?;
                Ok(QuizStep::Finished(recorded))
            }
        }
    }
}
