//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use tutor_core::model::{ChatError, ProgressError};
use tutor_core::validation::ValidationError;

/// Failures talking to the text-generation endpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InferenceError {
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("model request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Why a question batch could not be produced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("question generation failed: {0}")]
    Network(#[from] InferenceError),
    #[error("model returned an invalid question batch: {0}")]
    Validation(#[from] ValidationError),
}

/// Reading or writing the datastore failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Errors emitted by the quiz session and its loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(String),
    #[error("option {0} is out of range")]
    OptionOutOfRange(u8),
    #[error("quiz already completed")]
    Completed,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors emitted by `ChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatServiceError {
    #[error(transparent)]
    Invalid(#[from] ChatError),
    #[error("conversation belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures reported by the auth collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("authentication is not configured")]
    Disabled,
    #[error("{0}")]
    Rejected(String),
    #[error("auth response did not contain a session")]
    MissingSession,
    #[error("auth request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

/// The four kinds of failure a user action can end in.
///
/// Every variant is shown as a transient notification; none is retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error(transparent)]
    Network(InferenceError),
    #[error(transparent)]
    Validation(ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Persistence(PersistenceError),
    #[error(transparent)]
    Input(ChatError),
    #[error("{0}")]
    Rejected(String),
}

impl AppError {
    /// Short text for a notification toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => {
                "Could not reach the AI tutor. Check that the model server is running and try again."
                    .to_string()
            }
            AppError::Validation(_) => {
                "The AI tutor returned questions we could not use. Please try again.".to_string()
            }
            AppError::Auth(err) => format!("Authentication failed: {err}"),
            AppError::Persistence(_) => "Your progress could not be saved.".to_string(),
            AppError::Input(err) => err.to_string(),
            AppError::Rejected(reason) => reason.clone(),
        }
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        AppError::Network(err)
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Network(err) => AppError::Network(err),
            GenerationError::Validation(err) => AppError::Validation(err),
        }
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        AppError::Persistence(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Persistence(PersistenceError::Storage(err))
    }
}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::Generation(err) => err.into(),
            QuizError::Persistence(err) => err.into(),
            other => AppError::Rejected(other.to_string()),
        }
    }
}

impl From<ChatServiceError> for AppError {
    fn from(err: ChatServiceError) -> Self {
        match err {
            ChatServiceError::Invalid(err) => AppError::Input(err),
            ChatServiceError::Inference(err) => AppError::Network(err),
            ChatServiceError::Storage(err) => err.into(),
            other => AppError::Rejected(other.to_string()),
        }
    }
}
