#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod chat_service;
pub mod error;
pub mod inference;
pub mod progress;
pub mod questions;
pub mod quiz;
pub mod routes;
pub mod topics_service;

pub use tutor_core::Clock;

pub use app_services::AppServices;
pub use auth::{AuthClient, AuthConfig, AuthSession, SignUpOutcome};
pub use chat_service::{ChatExchange, ChatLimits, ChatService, ReviewMode};
pub use error::{
    AppError, AppServicesError, AuthError, ChatServiceError, GenerationError, InferenceError,
    PersistenceError, QuizError,
};
pub use inference::{InferenceClient, InferenceConfig, TextGenerator};
pub use progress::{ProgressDashboard, ProgressService, RecordedQuiz};
pub use questions::{CachePolicy, QuestionCache, QuestionGenerator};
pub use quiz::{QuizLoopService, QuizSession, QuizStep, QuizTick, TimerDriver};
pub use routes::{Access, Route};
pub use topics_service::{IncorrectQuestion, TopicReview, TopicsService};
