mod dashboard;
mod service;

pub use dashboard::{INSIGHT_LIMIT, ProgressDashboard, SubjectSummary, TopicInsight};
pub use service::{ProgressService, RecordedQuiz};
