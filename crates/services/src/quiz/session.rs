use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tutor_core::model::{
    AnswerLog, AnswerRecord, OPTION_COUNT, Question, QuestionBatch, QuestionId, QuizAttempt,
    QuizOutcome, UserId,
};
use tutor_core::scoring;
use tutor_core::timer::{QuestionTimer, Tick, TimerState};

use super::progress::QuizProgress;
use crate::error::QuizError;

//
// ─── COMPLETED QUIZ ────────────────────────────────────────────────────────────
//

/// A finished quiz, ready to be folded into progress.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedQuiz {
    pub subject: String,
    pub batch: QuestionBatch,
    pub answers: AnswerLog,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedQuiz {
    /// Percentage of correct answers over the whole batch.
    #[must_use]
    pub fn score(&self) -> f64 {
        scoring::session_score(self.answers.records(), self.batch.len())
    }

    #[must_use]
    pub fn outcome(&self) -> QuizOutcome {
        scoring::quiz_outcome(&self.subject, &self.batch, &self.answers, self.completed_at)
    }

    #[must_use]
    pub fn attempt(&self, user_id: UserId) -> QuizAttempt {
        QuizAttempt::from_answers(
            user_id,
            self.subject.clone(),
            &self.batch,
            &self.answers,
            self.started_at,
            self.completed_at,
        )
    }
}

/// Result of moving forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Moved { index: usize },
    Completed(CompletedQuiz),
}

/// Result of one timer tick applied to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Running { remaining_secs: u32 },
    /// The current question ran out of time, was recorded as skipped and the
    /// session moved on.
    Expired {
        skipped: QuestionId,
        advance: Advance,
    },
    Inactive,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State of one quiz in progress.
///
/// Owned by a single screen; nothing here is shared or persisted until the
/// quiz completes.
pub struct QuizSession {
    subject: String,
    batch: QuestionBatch,
    current: usize,
    answers: AnswerLog,
    timer: QuestionTimer,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// Begin a quiz on the first question with its timer running.
    #[must_use]
    pub fn new(subject: impl Into<String>, batch: QuestionBatch, started_at: DateTime<Utc>) -> Self {
        let mut session = Self {
            subject: subject.into(),
            batch,
            current: 0,
            answers: AnswerLog::new(),
            timer: QuestionTimer::new(),
            started_at,
            completed_at: None,
        };
        session.enter_current();
        session
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn batch(&self) -> &QuestionBatch {
        &self.batch
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerLog {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.is_complete() {
            return None;
        }
        self.batch.get(self.current)
    }

    #[must_use]
    pub fn selected_answer(&self, question_id: &QuestionId) -> Option<u8> {
        self.answers.get(question_id).and_then(AnswerRecord::selected)
    }

    /// Seconds left on the current question.
    #[must_use]
    pub fn time_left(&self) -> u32 {
        self.timer.remaining_secs()
    }

    #[must_use]
    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        let total = self.batch.len();
        let answered = self.answers.len();
        QuizProgress {
            total,
            current: self.current,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.is_complete(),
        }
    }

    /// Record or change the answer to a question. Never moves the session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after completion, `QuizError::OptionOutOfRange`
    /// for an option past the fourth, and `QuizError::UnknownQuestion` for ids
    /// outside the batch.
    pub fn select_answer(
        &mut self,
        question_id: &QuestionId,
        option: u8,
    ) -> Result<&AnswerRecord, QuizError> {
        if self.is_complete() {
            return Err(QuizError::Completed);
        }
        if usize::from(option) >= OPTION_COUNT {
            return Err(QuizError::OptionOutOfRange(option));
        }
        let index = self
            .batch
            .questions()
            .iter()
            .position(|q| q.id() == question_id)
            .ok_or_else(|| QuizError::UnknownQuestion(question_id.to_string()))?;

        // Revisited questions keep the time first spent on them, skips included.
        let elapsed = match self.answers.get(question_id).map(AnswerRecord::elapsed) {
            Some(elapsed) => elapsed,
            None if index == self.current => self.elapsed_on_current(),
            None => Duration::ZERO,
        };
        if index == self.current {
            self.timer.mark_answered();
        }

        let question = &self.batch.questions()[index];
        Ok(self.answers.upsert_selection(question, option, elapsed))
    }

    /// Move to the next question, or complete the quiz from the last one.
    ///
    /// `now` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` if the quiz already finished.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Advance, QuizError> {
        if self.is_complete() {
            return Err(QuizError::Completed);
        }
        if self.current + 1 < self.batch.len() {
            self.current += 1;
            self.enter_current();
            return Ok(Advance::Moved {
                index: self.current,
            });
        }

        self.timer.cancel();
        self.completed_at = Some(now);
        Ok(Advance::Completed(CompletedQuiz {
            subject: self.subject.clone(),
            batch: self.batch.clone(),
            answers: self.answers.clone(),
            started_at: self.started_at,
            completed_at: now,
        }))
    }

    /// Step back one question. Returns false when already on the first one.
    pub fn retreat(&mut self) -> bool {
        if self.is_complete() || self.current == 0 {
            return false;
        }
        self.current -= 1;
        self.enter_current();
        true
    }

    /// Apply one second of countdown.
    ///
    /// # Errors
    ///
    /// Propagates the `advance` error when expiry cannot move the session.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, QuizError> {
        match self.timer.tick() {
            Tick::Running { remaining_secs } => Ok(TickOutcome::Running { remaining_secs }),
            Tick::Inactive => Ok(TickOutcome::Inactive),
            Tick::Expired => {
                let Some(question) = self.batch.get(self.current) else {
                    return Ok(TickOutcome::Inactive);
                };
                let skipped = question.id().clone();
                let budget = question.difficulty().time_limit();
                self.answers.record_skip(skipped.clone(), budget);
                let advance = self.advance(now)?;
                Ok(TickOutcome::Expired { skipped, advance })
            }
        }
    }

    /// Stop the countdown and drop the session without folding anything.
    pub fn abandon(mut self) {
        self.timer.cancel();
    }

    fn enter_current(&mut self) {
        let Some(question) = self.batch.get(self.current) else {
            return;
        };
        self.timer.start(question.difficulty());
        if self.answers.get(question.id()).is_some() {
            self.timer.mark_answered();
        }
    }

    fn elapsed_on_current(&self) -> Duration {
        let Some(question) = self.batch.get(self.current) else {
            return Duration::ZERO;
        };
        let budget = question.difficulty().time_limit_secs();
        Duration::from_secs(u64::from(
            budget.saturating_sub(self.timer.remaining_secs()),
        ))
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("subject", &self.subject)
            .field("questions_len", &self.batch.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("timer", &self.timer.state())
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tutor_core::model::Difficulty;
    use tutor_core::time::fixed_now;
    use tutor_core::validation::validate_questions;

    pub(crate) fn build_batch() -> QuestionBatch {
        let mix = [
            Difficulty::Easy,
            Difficulty::Easy,
            Difficulty::Medium,
            Difficulty::Medium,
            Difficulty::Hard,
        ];
        let questions = mix
            .iter()
            .enumerate()
            .map(|(i, difficulty)| {
                Question::new(
                    QuestionId::new((i + 1).to_string()),
                    format!("Question {}", i + 1),
                    ["a".into(), "b".into(), "c".into(), "d".into()],
                    u8::try_from(i % 4).unwrap(),
                    "Because.",
                    *difficulty,
                )
                .unwrap()
                .with_topic(format!("Topic {}", i + 1))
            })
            .collect();
        validate_questions(questions).unwrap()
    }

    fn session() -> QuizSession {
        QuizSession::new("Mathematics", build_batch(), fixed_now())
    }

    fn answer_all_correctly(session: &mut QuizSession) -> CompletedQuiz {
        loop {
            let question = session.current_question().unwrap().clone();
            session
                .select_answer(question.id(), question.correct_option())
                .unwrap();
            if let Advance::Completed(done) = session.advance(fixed_now()).unwrap() {
                return done;
            }
        }
    }

    #[test]
    fn answering_after_expiry_keeps_the_full_budget() {
        let mut session = session();
        for _ in 0..20 {
            session.tick(fixed_now()).unwrap();
        }
        assert_eq!(session.current_index(), 1);
        assert!(session.retreat());

        let id = QuestionId::new("1");
        let record = session.select_answer(&id, 0).unwrap();
        assert!(!record.is_skipped());
        assert!(record.is_correct());
        assert_eq!(record.elapsed(), Duration::from_secs(20));
    }

    #[test]
    fn changing_an_answer_keeps_its_elapsed_time() {
        let mut session = session();
        for _ in 0..5 {
            session.tick(fixed_now()).unwrap();
        }
        let id = QuestionId::new("1");
        session.select_answer(&id, 1).unwrap();
        session.advance(fixed_now()).unwrap();
        session.retreat();

        let record = session.select_answer(&id, 0).unwrap();
        assert_eq!(record.selected(), Some(0));
        assert_eq!(record.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn attempt_time_spent_is_wall_time() {
        let mut session = session();
        let done = loop {
            let question = session.current_question().unwrap().clone();
            session
                .select_answer(question.id(), question.correct_option())
                .unwrap();
            let finished_at = fixed_now() + chrono::Duration::seconds(95);
            if let Advance::Completed(done) = session.advance(finished_at).unwrap() {
                break done;
            }
        };
        let attempt = done.attempt(UserId::random());
        assert_eq!(attempt.time_spent_secs, 95);
        assert!((attempt.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn starts_on_first_question_with_running_timer() {
        let session = session();
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.timer_state(), TimerState::Running { remaining_secs: 20 });
        assert_eq!(session.progress().remaining, 5);
    }

    #[test]
    fn all_correct_scores_one_hundred() {
        let mut session = session();
        let done = answer_all_correctly(&mut session);
        assert!((done.score() - 100.0).abs() < f64::EPSILON);
        assert!(session.is_complete());
        assert_eq!(session.timer_state(), TimerState::Idle);
    }

    #[test]
    fn changing_an_answer_updates_in_place() {
        let mut session = session();
        let id = session.current_question().unwrap().id().clone();
        session.tick(fixed_now()).unwrap();
        session.select_answer(&id, 1).unwrap();
        let record = session.select_answer(&id, 0).unwrap();
        assert!(record.is_correct());
        assert_eq!(record.elapsed(), Duration::from_secs(1));
        assert_eq!(session.answers().len(), 1);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn selection_rejects_bad_input() {
        let mut session = session();
        let id = session.current_question().unwrap().id().clone();
        assert!(matches!(
            session.select_answer(&id, 4),
            Err(QuizError::OptionOutOfRange(4))
        ));
        assert!(matches!(
            session.select_answer(&QuestionId::new("nope"), 0),
            Err(QuizError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn expiry_records_skip_and_advances_once() {
        let mut session = session();
        let first = session.current_question().unwrap().id().clone();
        for _ in 0..19 {
            assert!(matches!(
                session.tick(fixed_now()).unwrap(),
                TickOutcome::Running { .. }
            ));
        }
        let outcome = session.tick(fixed_now()).unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Expired {
                skipped: first.clone(),
                advance: Advance::Moved { index: 1 },
            }
        );

        let record = session.answers().get(&first).unwrap();
        assert_eq!(record.selected(), None);
        assert!(record.is_skipped());
        assert!(!record.is_correct());
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.time_left(), 20);
    }

    #[test]
    fn expiry_on_last_question_completes() {
        let mut session = session();
        for _ in 0..4 {
            session.advance(fixed_now()).unwrap();
        }
        assert_eq!(session.time_left(), 120);
        let mut last = TickOutcome::Inactive;
        for _ in 0..120 {
            last = session.tick(fixed_now()).unwrap();
        }
        let TickOutcome::Expired {
            advance: Advance::Completed(done),
            ..
        } = last
        else {
            panic!("expected completion, got {last:?}");
        };
        assert!(done.score().abs() < f64::EPSILON);
        assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Inactive);
    }

    #[test]
    fn answered_question_stops_the_countdown() {
        let mut session = session();
        let id = session.current_question().unwrap().id().clone();
        session.select_answer(&id, 0).unwrap();
        assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Inactive);
    }

    #[test]
    fn retreat_is_a_no_op_on_first_question() {
        let mut session = session();
        assert!(!session.retreat());
        session.advance(fixed_now()).unwrap();
        assert!(session.retreat());
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn revisiting_an_answered_question_keeps_its_timer_stopped() {
        let mut session = session();
        let id = session.current_question().unwrap().id().clone();
        session.select_answer(&id, 2).unwrap();
        session.advance(fixed_now()).unwrap();
        session.retreat();
        assert!(matches!(session.timer_state(), TimerState::Answered { .. }));
        assert_eq!(session.selected_answer(&id), Some(2));
    }

    #[test]
    fn completed_session_rejects_further_moves() {
        let mut session = session();
        answer_all_correctly(&mut session);
        assert!(matches!(
            session.advance(fixed_now()),
            Err(QuizError::Completed)
        ));
        assert!(!session.retreat());
        assert!(session.current_question().is_none());
    }

    #[test]
    fn unreached_questions_are_weak_topics() {
        let mut session = session();
        let id = session.current_question().unwrap().id().clone();
        session.select_answer(&id, 0).unwrap();
        let done = loop {
            if let Advance::Completed(done) = session.advance(fixed_now()).unwrap() {
                break done;
            }
        };
        let outcome = done.outcome();
        assert!((outcome.score - 20.0).abs() < f64::EPSILON);
        assert_eq!(outcome.topics.iter().filter(|t| !t.correct).count(), 4);
        assert_eq!(done.attempt(UserId::random()).entries.len(), 5);
    }
}
