use thiserror::Error;

use crate::model::{ChatError, ProgressError, QuestionError};
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Chat(#[from] ChatError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_errors_convert_transparently() {
        let err: Error = ChatError::EmptyTitle.into();
        assert!(matches!(err, Error::Chat(ChatError::EmptyTitle)));
        assert_eq!(err.to_string(), ChatError::EmptyTitle.to_string());

        let err: Error = ValidationError::Count { found: Some(3) }.into();
        assert!(err.to_string().contains("got 3"));
    }
}
