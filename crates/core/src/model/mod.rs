mod answer;
mod attempt;
mod chat;
mod ids;
mod progress;
mod question;

pub use ids::{AttemptId, ConversationId, MessageId, ParseIdError, QuestionId, UserId};

pub use answer::{AnswerLog, AnswerRecord};
pub use attempt::{AttemptEntry, QuizAttempt, StoredAttempt};
pub use chat::{ChatError, ChatMessage, Conversation, Role, normalize_message, normalize_title};
pub use progress::{
    ProgressError, QuizOutcome, SubjectProgress, TopicResult, TopicSet, UserProgress,
    incremental_mean,
};
pub use question::{
    BATCH_SIZE, DIFFICULTY_MIX, Difficulty, OPTION_COUNT, Question, QuestionBatch, QuestionError,
};

pub(crate) use question::{difficulty_counts, first_duplicate};
