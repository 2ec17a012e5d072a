//! Topics a learner keeps getting wrong, rebuilt from their attempt history.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use tutor_core::model::{StoredAttempt, UserId};

use crate::error::PersistenceError;
use crate::inference::TextGenerator;
use storage::repository::QuizAttemptRepository;

/// Shown in place of an explanation the model could not produce.
pub const EXPLANATION_FALLBACK: &str = "Failed to generate explanation. Please try again.";

/// Attempts scanned when building the review list.
pub const DEFAULT_HISTORY_LIMIT: u32 = 200;

/// One wrongly answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncorrectQuestion {
    pub question: String,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub explanation: String,
}

impl IncorrectQuestion {
    /// The learner's answer, or a placeholder for skipped questions.
    #[must_use]
    pub fn user_answer_text(&self) -> &str {
        self.user_answer.as_deref().unwrap_or("No answer")
    }
}

/// Incorrect answers grouped by topic and subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicReview {
    pub topic: String,
    pub subject: String,
    pub incorrect_count: u32,
    pub last_attempted: DateTime<Utc>,
    pub incorrect_questions: Vec<IncorrectQuestion>,
}

/// Group incorrect answers by `(topic, subject)`, most frequently missed first.
///
/// Untagged questions are filed under their subject. Ties keep the order in
/// which topics were first met.
#[must_use]
pub fn aggregate(attempts: &[StoredAttempt]) -> Vec<TopicReview> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut reviews: Vec<TopicReview> = Vec::new();

    for stored in attempts {
        let attempt = &stored.attempt;
        for entry in attempt.entries.iter().filter(|e| !e.is_correct) {
            let topic = entry.topic.clone().unwrap_or_else(|| attempt.subject.clone());
            let key = (topic.clone(), attempt.subject.clone());
            let slot = *index.entry(key).or_insert_with(|| {
                reviews.push(TopicReview {
                    topic,
                    subject: attempt.subject.clone(),
                    incorrect_count: 0,
                    last_attempted: attempt.completed_at,
                    incorrect_questions: Vec::new(),
                });
                reviews.len() - 1
            });

            let review = &mut reviews[slot];
            review.incorrect_count += 1;
            review.last_attempted = review.last_attempted.max(attempt.completed_at);
            review.incorrect_questions.push(IncorrectQuestion {
                question: entry.question.clone(),
                user_answer: entry.selected_text().map(str::to_string),
                correct_answer: entry.correct_text().unwrap_or_default().to_string(),
                explanation: entry.explanation.clone(),
            });
        }
    }

    reviews.sort_by(|a, b| b.incorrect_count.cmp(&a.incorrect_count));
    reviews
}

/// Prompt asking the model why an answer was wrong.
#[must_use]
pub fn explanation_prompt(question: &IncorrectQuestion) -> String {
    format!(
        "Please explain why the answer \"{}\" is incorrect and why \"{}\" is correct for the following question: \"{}\". Provide a clear and concise explanation.",
        question.user_answer_text(),
        question.correct_answer,
        question.question
    )
}

#[derive(Clone)]
pub struct TopicsService {
    attempts: Arc<dyn QuizAttemptRepository>,
    model: Arc<dyn TextGenerator>,
    history_limit: u32,
}

impl TopicsService {
    #[must_use]
    pub fn new(attempts: Arc<dyn QuizAttemptRepository>, model: Arc<dyn TextGenerator>) -> Self {
        Self {
            attempts,
            model,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    /// Review list for a user, optionally limited to one subject.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the attempt history cannot be read.
    pub async fn topics_to_review(
        &self,
        user_id: UserId,
        subject: Option<&str>,
    ) -> Result<Vec<TopicReview>, PersistenceError> {
        let attempts = self
            .attempts
            .list_attempts(user_id, self.history_limit)
            .await?;
        let mut reviews = aggregate(&attempts);
        if let Some(subject) = subject {
            reviews.retain(|r| r.subject == subject);
        }
        Ok(reviews)
    }

    /// Ask the model to explain a mistake. Never fails; model errors yield
    /// [`EXPLANATION_FALLBACK`].
    pub async fn explain(&self, question: &IncorrectQuestion) -> String {
        match self.model.generate(&explanation_prompt(question)).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "explanation request failed");
                EXPLANATION_FALLBACK.to_string()
            }
        }
    }
}
