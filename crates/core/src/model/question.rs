use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question explanation cannot be empty")]
    EmptyExplanation,

    #[error("correct option {0} is out of range 0-3")]
    CorrectOptionOutOfRange(u8),

    #[error("option {0:?} appears more than once")]
    DuplicateOption(String),

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty tag attached to each generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Countdown budget a learner gets for a question of this difficulty.
    #[must_use]
    pub fn time_limit(self) -> Duration {
        Duration::from_secs(u64::from(self.time_limit_secs()))
    }

    #[must_use]
    pub fn time_limit_secs(self) -> u32 {
        match self {
            Difficulty::Easy => 20,
            Difficulty::Medium => 60,
            Difficulty::Hard => 120,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuestionError::UnknownDifficulty(other.to_string())),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// A single multiple-choice question.
///
/// Invariants: non-empty id/prompt/explanation, four pairwise distinct options,
/// and `correct_option` indexes one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: [String; OPTION_COUNT],
    correct_option: u8,
    explanation: String,
    difficulty: Difficulty,
    topic: Option<String>,
}

impl Question {
    /// Creates a new question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if any of the invariants above does not hold.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: [String; OPTION_COUNT],
        correct_option: u8,
        explanation: impl Into<String>,
        difficulty: Difficulty,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        let explanation = explanation.into();

        if id.as_str().trim().is_empty() {
            return Err(QuestionError::EmptyId);
        }
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if explanation.trim().is_empty() {
            return Err(QuestionError::EmptyExplanation);
        }
        if usize::from(correct_option) >= OPTION_COUNT {
            return Err(QuestionError::CorrectOptionOutOfRange(correct_option));
        }
        if let Some(dup) = first_duplicate(&options) {
            return Err(QuestionError::DuplicateOption(dup.to_string()));
        }

        Ok(Self {
            id,
            prompt,
            options,
            correct_option,
            explanation,
            difficulty,
            topic: None,
        })
    }

    /// Attach a topic label; blank labels are ignored.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        self.topic = if topic.trim().is_empty() {
            None
        } else {
            Some(topic.trim().to_string())
        };
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, index: u8) -> Option<&str> {
        self.options.get(usize::from(index)).map(String::as_str)
    }

    #[must_use]
    pub fn correct_option(&self) -> u8 {
        self.correct_option
    }

    #[must_use]
    pub fn correct_text(&self) -> &str {
        &self.options[usize::from(self.correct_option)]
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Topic used for strength/weakness tracking, falling back to the subject.
    #[must_use]
    pub fn topic_or<'a>(&'a self, subject: &'a str) -> &'a str {
        self.topic.as_deref().unwrap_or(subject)
    }
}

/// Returns the first option that repeats an earlier one.
pub(crate) fn first_duplicate<S: AsRef<str>>(options: &[S]) -> Option<&str> {
    options.iter().enumerate().find_map(|(i, option)| {
        options[..i]
            .iter()
            .any(|earlier| earlier.as_ref() == option.as_ref())
            .then(|| option.as_ref())
    })
}

//
// ─── BATCH ─────────────────────────────────────────────────────────────────────
//

/// Number of questions in one quiz.
pub const BATCH_SIZE: usize = 5;

/// Required difficulty mix of a batch as `(easy, medium, hard)`.
pub const DIFFICULTY_MIX: (usize, usize, usize) = (2, 2, 1);

/// The five questions of one quiz session.
///
/// Only built through [`crate::validation`], which enforces the size and the
/// difficulty mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBatch {
    questions: Vec<Question>,
}

impl QuestionBatch {
    pub(crate) fn from_validated(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn find(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Counts questions per difficulty as `(easy, medium, hard)`.
    #[must_use]
    pub fn difficulty_counts(&self) -> (usize, usize, usize) {
        difficulty_counts(self.questions.iter().map(Question::difficulty))
    }
}

pub(crate) fn difficulty_counts(
    difficulties: impl IntoIterator<Item = Difficulty>,
) -> (usize, usize, usize) {
    difficulties
        .into_iter()
        .fold((0, 0, 0), |(easy, medium, hard), d| match d {
            Difficulty::Easy => (easy + 1, medium, hard),
            Difficulty::Medium => (easy, medium + 1, hard),
            Difficulty::Hard => (easy, medium, hard + 1),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(a: &str, b: &str, c: &str, d: &str) -> [String; 4] {
        [a.into(), b.into(), c.into(), d.into()]
    }

    #[test]
    fn time_limits_follow_difficulty() {
        assert_eq!(Difficulty::Easy.time_limit(), Duration::from_secs(20));
        assert_eq!(Difficulty::Medium.time_limit(), Duration::from_secs(60));
        assert_eq!(Difficulty::Hard.time_limit(), Duration::from_secs(120));
    }

    #[test]
    fn difficulty_parses_lowercase_only() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("Hard".parse::<Difficulty>().is_err());
    }

    #[test]
    fn question_rejects_duplicate_options() {
        let err = Question::new(
            QuestionId::new("1"),
            "2 + 2?",
            options("4", "3", "4", "5"),
            0,
            "Basic addition",
            Difficulty::Easy,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::DuplicateOption("4".into()));
    }

    #[test]
    fn question_rejects_out_of_range_answer() {
        let err = Question::new(
            QuestionId::new("1"),
            "2 + 2?",
            options("4", "3", "6", "5"),
            4,
            "Basic addition",
            Difficulty::Easy,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::CorrectOptionOutOfRange(4));
    }

    #[test]
    fn topic_falls_back_to_subject() {
        let q = Question::new(
            QuestionId::new("1"),
            "2 + 2?",
            options("4", "3", "6", "5"),
            0,
            "Basic addition",
            Difficulty::Easy,
        )
        .unwrap();
        assert_eq!(q.topic_or("Mathematics"), "Mathematics");
        assert_eq!(q.correct_text(), "4");

        let q = q.with_topic("Arithmetic");
        assert_eq!(q.topic_or("Mathematics"), "Arithmetic");
    }

    #[test]
    fn first_duplicate_reports_repeated_value() {
        assert_eq!(first_duplicate(&["a", "b", "a"]), Some("a"));
        assert_eq!(first_duplicate(&["a", "b", "c"]), None);
    }
}
