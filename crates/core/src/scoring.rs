//! Answer correctness and session scores.

use chrono::{DateTime, Utc};

use crate::model::{AnswerLog, AnswerRecord, Question, QuestionBatch, QuizOutcome, TopicResult};

/// A selection is correct exactly when it matches the question's answer index.
#[must_use]
pub fn is_correct(question: &Question, selected: u8) -> bool {
    selected == question.correct_option()
}

/// Percentage of correct records over all questions of the session.
///
/// Skipped and unanswered questions earn nothing.
#[must_use]
pub fn session_score(records: &[AnswerRecord], total_questions: usize) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    let correct = records.iter().filter(|r| r.is_correct()).count();
    // Counts are bounded by the batch size, far below f64 precision limits.
    #[allow(clippy::cast_precision_loss)]
    let score = correct as f64 / total_questions as f64 * 100.0;
    score
}

/// Summarise a finished quiz for the progress fold.
///
/// Each question tags its topic (or the subject) as correct or not.
#[must_use]
pub fn quiz_outcome(
    subject: &str,
    batch: &QuestionBatch,
    answers: &AnswerLog,
    completed_at: DateTime<Utc>,
) -> QuizOutcome {
    let topics = batch
        .questions()
        .iter()
        .map(|question| TopicResult {
            topic: question.topic_or(subject).to_string(),
            correct: answers
                .get(question.id())
                .is_some_and(AnswerRecord::is_correct),
        })
        .collect();

    QuizOutcome {
        subject: subject.to_string(),
        score: session_score(answers.records(), batch.len()),
        topics,
        completed_at,
    }
}
