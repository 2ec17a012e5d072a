use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::answer::AnswerLog;
use crate::model::ids::UserId;
use crate::model::question::QuestionBatch;
use crate::scoring;
use crate::time::elapsed_between;

/// One question as it was presented and answered, kept with the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptEntry {
    pub question: String,
    pub options: Vec<String>,
    pub selected_answer: Option<u8>,
    pub correct_answer: u8,
    pub is_correct: bool,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl AttemptEntry {
    #[must_use]
    pub fn selected_text(&self) -> Option<&str> {
        self.selected_answer
            .and_then(|i| self.options.get(usize::from(i)))
            .map(String::as_str)
    }

    #[must_use]
    pub fn correct_text(&self) -> Option<&str> {
        self.options
            .get(usize::from(self.correct_answer))
            .map(String::as_str)
    }
}

/// A finished quiz as written to the attempt history.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizAttempt {
    pub user_id: UserId,
    pub subject: String,
    pub score: f64,
    pub total_questions: u32,
    pub time_spent_secs: u64,
    pub entries: Vec<AttemptEntry>,
    pub completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Build the attempt record for a batch and its answers.
    ///
    /// Every question of the batch gets an entry; questions the learner never
    /// reached are stored unanswered and incorrect. Time spent is wall time
    /// from `started_at` to `completed_at`.
    #[must_use]
    pub fn from_answers(
        user_id: UserId,
        subject: impl Into<String>,
        batch: &QuestionBatch,
        answers: &AnswerLog,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let entries = batch
            .questions()
            .iter()
            .map(|question| {
                let record = answers.get(question.id());
                AttemptEntry {
                    question: question.prompt().to_string(),
                    options: question.options().to_vec(),
                    selected_answer: record.and_then(|r| r.selected()),
                    correct_answer: question.correct_option(),
                    is_correct: record.is_some_and(|r| r.is_correct()),
                    explanation: question.explanation().to_string(),
                    topic: question.topic().map(str::to_string),
                }
            })
            .collect();

        Self {
            user_id,
            subject: subject.into(),
            score: scoring::session_score(answers.records(), batch.len()),
            total_questions: u32::try_from(batch.len()).unwrap_or(u32::MAX),
            time_spent_secs: elapsed_between(started_at, completed_at).as_secs(),
            entries,
            completed_at,
        }
    }
}

/// A persisted attempt together with its storage id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttempt {
    pub id: crate::model::AttemptId,
    pub attempt: QuizAttempt,
}
