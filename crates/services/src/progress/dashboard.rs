use chrono::{DateTime, Utc};
use tutor_core::model::UserProgress;

/// How many strengths and weaknesses the dashboard shows.
pub const INSIGHT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub subject: String,
    pub attempts: u32,
    pub average_score: f64,
    pub last_attempt: Option<DateTime<Utc>>,
}

/// A topic together with the average of the subject it was seen in.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicInsight {
    pub topic: String,
    pub subject: String,
    pub subject_average: f64,
}

/// Read-only snapshot behind the progress screen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressDashboard {
    pub total_quizzes: u32,
    pub average_score: f64,
    pub last_active: Option<DateTime<Utc>>,
    pub subjects: Vec<SubjectSummary>,
    pub strengths: Vec<TopicInsight>,
    pub weaknesses: Vec<TopicInsight>,
}

impl ProgressDashboard {
    /// Dashboard for a user who has not finished any quiz yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_progress(progress: &UserProgress) -> Self {
        let subjects = progress
            .subjects()
            .map(|s| SubjectSummary {
                subject: s.subject().to_string(),
                attempts: s.total_attempts(),
                average_score: s.average_score(),
                last_attempt: s.last_attempt(),
            })
            .collect();

        let strengths = progress
            .subjects()
            .flat_map(|s| {
                s.strong_topics().iter().map(move |topic| TopicInsight {
                    topic: topic.to_string(),
                    subject: s.subject().to_string(),
                    subject_average: s.average_score(),
                })
            })
            .take(INSIGHT_LIMIT)
            .collect();

        let weaknesses = progress
            .subjects()
            .flat_map(|s| {
                s.weak_topics().iter().map(move |topic| TopicInsight {
                    topic: topic.to_string(),
                    subject: s.subject().to_string(),
                    subject_average: s.average_score(),
                })
            })
            .take(INSIGHT_LIMIT)
            .collect();

        Self {
            total_quizzes: progress.total_quizzes(),
            average_score: progress.average_score(),
            last_active: Some(progress.last_active()),
            subjects,
            strengths,
            weaknesses,
        }
    }

    /// Attempts per subject, for a distribution chart.
    #[must_use]
    pub fn subject_distribution(&self) -> Vec<(&str, u32)> {
        self.subjects
            .iter()
            .map(|s| (s.subject.as_str(), s.attempts))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_quizzes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::{QuizOutcome, TopicResult, UserId};
    use tutor_core::time::fixed_now;

    #[test]
    fn caps_insights_at_five() {
        let mut progress = UserProgress::new(UserId::random(), fixed_now());
        let topics = (0..7)
            .map(|i| TopicResult {
                topic: format!("Weak {i}"),
                correct: false,
            })
            .chain(std::iter::once(TopicResult {
                topic: "Strong".into(),
                correct: true,
            }))
            .collect();
        progress
            .fold(&QuizOutcome {
                subject: "Economics".into(),
                score: 12.5,
                topics,
                completed_at: fixed_now(),
            })
            .unwrap();

        let dashboard = ProgressDashboard::from_progress(&progress);
        assert_eq!(dashboard.weaknesses.len(), INSIGHT_LIMIT);
        assert_eq!(dashboard.weaknesses[0].topic, "Weak 0");
        assert_eq!(dashboard.strengths.len(), 1);
        assert_eq!(dashboard.subject_distribution(), [("Economics", 1)]);
        assert!(!dashboard.is_empty());
    }

    #[test]
    fn empty_dashboard_has_no_activity() {
        let dashboard = ProgressDashboard::empty();
        assert!(dashboard.is_empty());
        assert!(dashboard.last_active.is_none());
    }
}
