use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("subject name cannot be empty")]
    EmptySubject,

    #[error("score must be within 0-100, got {0}")]
    ScoreOutOfRange(f64),

    #[error("average score must be within 0-100, got {0}")]
    AverageOutOfRange(f64),
}

/// Folds one more sample into a running mean over `count` prior samples.
#[must_use]
pub fn incremental_mean(average: f64, count: u32, sample: f64) -> f64 {
    let n = f64::from(count);
    (average * n + sample) / (n + 1.0)
}

fn check_score(score: f64) -> Result<f64, ProgressError> {
    if score.is_finite() && (0.0..=100.0).contains(&score) {
        Ok(score)
    } else {
        Err(ProgressError::ScoreOutOfRange(score))
    }
}

//
// ─── TOPIC SETS ────────────────────────────────────────────────────────────────
//

/// Insertion-ordered, deduplicated set of topic labels.
///
/// Topics are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicSet(Vec<String>);

impl TopicSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the topic was newly added.
    pub fn insert(&mut self, topic: impl Into<String>) -> bool {
        let topic = topic.into();
        if self.contains(&topic) {
            return false;
        }
        self.0.push(topic);
        true
    }

    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.0.iter().any(|t| t == topic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TopicSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TopicSet::new();
        for topic in iter {
            set.insert(topic);
        }
        set
    }
}

//
// ─── QUIZ OUTCOME ──────────────────────────────────────────────────────────────
//

/// Per-question contribution to topic tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicResult {
    pub topic: String,
    pub correct: bool,
}

/// What a finished quiz contributes to the running aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizOutcome {
    pub subject: String,
    pub score: f64,
    pub topics: Vec<TopicResult>,
    pub completed_at: DateTime<Utc>,
}

//
// ─── SUBJECT PROGRESS ──────────────────────────────────────────────────────────
//

/// Running statistics for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectProgress {
    subject: String,
    total_attempts: u32,
    average_score: f64,
    last_attempt: Option<DateTime<Utc>>,
    weak_topics: TopicSet,
    strong_topics: TopicSet,
}

impl SubjectProgress {
    /// Empty progress for a subject that has never been attempted.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::EmptySubject` for a blank subject name.
    pub fn new(subject: impl Into<String>) -> Result<Self, ProgressError> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(ProgressError::EmptySubject);
        }
        Ok(Self {
            subject,
            total_attempts: 0,
            average_score: 0.0,
            last_attempt: None,
            weak_topics: TopicSet::new(),
            strong_topics: TopicSet::new(),
        })
    }

    /// Rehydrate subject progress from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the subject is blank or the average is out of range.
    pub fn from_persisted(
        subject: impl Into<String>,
        total_attempts: u32,
        average_score: f64,
        last_attempt: Option<DateTime<Utc>>,
        weak_topics: TopicSet,
        strong_topics: TopicSet,
    ) -> Result<Self, ProgressError> {
        let mut progress = Self::new(subject)?;
        if !(average_score.is_finite() && (0.0..=100.0).contains(&average_score)) {
            return Err(ProgressError::AverageOutOfRange(average_score));
        }
        progress.total_attempts = total_attempts;
        progress.average_score = average_score;
        progress.last_attempt = last_attempt;
        progress.weak_topics = weak_topics;
        progress.strong_topics = strong_topics;
        Ok(progress)
    }

    /// Fold a completed quiz into this subject.
    ///
    /// Correct questions tag their topic as strong, everything else as weak.
    /// A topic may end up in both sets.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ScoreOutOfRange` if the score is not a percentage.
    pub fn fold(&mut self, outcome: &QuizOutcome) -> Result<(), ProgressError> {
        let score = check_score(outcome.score)?;
        self.average_score = incremental_mean(self.average_score, self.total_attempts, score);
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.last_attempt = Some(outcome.completed_at);

        for result in &outcome.topics {
            if result.correct {
                self.strong_topics.insert(result.topic.clone());
            } else {
                self.weak_topics.insert(result.topic.clone());
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    #[must_use]
    pub fn average_score(&self) -> f64 {
        self.average_score
    }

    #[must_use]
    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_attempt
    }

    #[must_use]
    pub fn weak_topics(&self) -> &TopicSet {
        &self.weak_topics
    }

    #[must_use]
    pub fn strong_topics(&self) -> &TopicSet {
        &self.strong_topics
    }
}

//
// ─── USER PROGRESS ─────────────────────────────────────────────────────────────
//

/// Overall statistics for a user plus one entry per attempted subject.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProgress {
    user_id: UserId,
    total_quizzes: u32,
    average_score: f64,
    last_active: DateTime<Utc>,
    subjects: BTreeMap<String, SubjectProgress>,
}

impl UserProgress {
    #[must_use]
    pub fn new(user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            total_quizzes: 0,
            average_score: 0.0,
            last_active: created_at,
            subjects: BTreeMap::new(),
        }
    }

    /// Rehydrate user totals from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::AverageOutOfRange` if the stored average is invalid.
    pub fn from_persisted(
        user_id: UserId,
        total_quizzes: u32,
        average_score: f64,
        last_active: DateTime<Utc>,
        subjects: impl IntoIterator<Item = SubjectProgress>,
    ) -> Result<Self, ProgressError> {
        if !(average_score.is_finite() && (0.0..=100.0).contains(&average_score)) {
            return Err(ProgressError::AverageOutOfRange(average_score));
        }
        Ok(Self {
            user_id,
            total_quizzes,
            average_score,
            last_active,
            subjects: subjects
                .into_iter()
                .map(|s| (s.subject().to_string(), s))
                .collect(),
        })
    }

    /// Fold the quiz into the overall totals only.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ScoreOutOfRange` if the score is not a percentage.
    pub fn fold_totals(&mut self, outcome: &QuizOutcome) -> Result<(), ProgressError> {
        let score = check_score(outcome.score)?;
        self.average_score = incremental_mean(self.average_score, self.total_quizzes, score);
        self.total_quizzes = self.total_quizzes.saturating_add(1);
        self.last_active = outcome.completed_at;
        Ok(())
    }

    /// Fold the quiz into the totals and into the matching subject entry.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the score or subject is invalid; nothing is
    /// changed in that case.
    pub fn fold(&mut self, outcome: &QuizOutcome) -> Result<(), ProgressError> {
        check_score(outcome.score)?;
        let mut subject = match self.subjects.get(&outcome.subject) {
            Some(existing) => existing.clone(),
            None => SubjectProgress::new(outcome.subject.clone())?,
        };
        subject.fold(outcome)?;
        self.fold_totals(outcome)?;
        self.subjects.insert(outcome.subject.clone(), subject);
        Ok(())
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn total_quizzes(&self) -> u32 {
        self.total_quizzes
    }

    #[must_use]
    pub fn average_score(&self) -> f64 {
        self.average_score
    }

    #[must_use]
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    #[must_use]
    pub fn subject(&self, name: &str) -> Option<&SubjectProgress> {
        self.subjects.get(name)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &SubjectProgress> {
        self.subjects.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn outcome(subject: &str, score: f64, topics: &[(&str, bool)]) -> QuizOutcome {
        QuizOutcome {
            subject: subject.into(),
            score,
            topics: topics
                .iter()
                .map(|(topic, correct)| TopicResult {
                    topic: (*topic).into(),
                    correct: *correct,
                })
                .collect(),
            completed_at: fixed_now(),
        }
    }

    #[test]
    fn incremental_mean_matches_full_recompute() {
        let samples = [100.0, 40.0, 60.0, 80.0, 20.0];
        let mut avg = 0.0;
        for (n, s) in samples.iter().enumerate() {
            avg = incremental_mean(avg, u32::try_from(n).unwrap(), *s);
        }
        let full: f64 = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((avg - full).abs() < 1e-9);
    }

    #[test]
    fn first_fold_sets_average_to_score() {
        let mut progress = UserProgress::new(UserId::random(), fixed_now());
        progress.fold(&outcome("Mathematics", 80.0, &[])).unwrap();
        assert_eq!(progress.total_quizzes(), 1);
        assert!((progress.average_score() - 80.0).abs() < f64::EPSILON);

        let math = progress.subject("Mathematics").unwrap();
        assert_eq!(math.total_attempts(), 1);
        assert!((math.average_score() - 80.0).abs() < f64::EPSILON);
        assert_eq!(math.last_attempt(), Some(fixed_now()));
    }

    #[test]
    fn topics_accumulate_and_may_overlap() {
        let mut subject = SubjectProgress::new("Physics").unwrap();
        subject
            .fold(&outcome("Physics", 50.0, &[("Optics", false), ("Optics", false)]))
            .unwrap();
        subject
            .fold(&outcome("Physics", 100.0, &[("Optics", true)]))
            .unwrap();

        assert_eq!(subject.weak_topics().iter().collect::<Vec<_>>(), ["Optics"]);
        assert!(subject.strong_topics().contains("Optics"));
        assert_eq!(subject.total_attempts(), 2);
        assert!((subject.average_score() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_score_leaves_progress_unchanged() {
        let mut progress = UserProgress::new(UserId::random(), fixed_now());
        let before = progress.clone();
        let err = progress.fold(&outcome("Biology", 120.0, &[])).unwrap_err();
        assert_eq!(err, ProgressError::ScoreOutOfRange(120.0));
        assert_eq!(progress, before);
    }

    #[test]
    fn subjects_are_unique_per_name() {
        let mut progress = UserProgress::new(UserId::random(), fixed_now());
        progress.fold(&outcome("History", 40.0, &[])).unwrap();
        progress.fold(&outcome("History", 60.0, &[])).unwrap();
        assert_eq!(progress.subjects().count(), 1);
        assert_eq!(progress.subject("History").unwrap().total_attempts(), 2);
    }
}
