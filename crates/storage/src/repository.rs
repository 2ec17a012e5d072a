use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tutor_core::model::{
    AttemptId, ChatMessage, Conversation, ConversationId, MessageId, QuizAttempt, Role,
    StoredAttempt, SubjectProgress, UserId, UserProgress,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Message to be appended to a conversation; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Repository contract for user-level and subject-level progress aggregates.
///
/// Writes are upserts keyed by user (totals) or by (user, subject).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch a user's totals together with every subject entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures. A user without totals yields `Ok(None)`.
    async fn get_user_progress(&self, user_id: UserId)
    -> Result<Option<UserProgress>, StorageError>;

    /// Insert or replace the user-level totals (subjects are not written).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_user_progress(&self, progress: &UserProgress) -> Result<(), StorageError>;

    /// Fetch one subject entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_subject_progress(
        &self,
        user_id: UserId,
        subject: &str,
    ) -> Result<Option<SubjectProgress>, StorageError>;

    /// Insert or replace one subject entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_subject_progress(
        &self,
        user_id: UserId,
        progress: &SubjectProgress,
    ) -> Result<(), StorageError>;

    /// List all subject entries for a user, ordered by subject name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_subject_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SubjectProgress>, StorageError>;
}

/// Repository contract for the quiz attempt history.
#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Append an attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError>;

    /// List a user's attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_attempts(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError>;
}

/// Repository contract for tutor conversations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Create a conversation; `created_at` also seeds `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the conversation cannot be stored.
    async fn create_conversation(
        &self,
        user_id: UserId,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Conversation, StorageError>;

    /// Fetch a conversation by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, StorageError>;

    /// List a user's conversations, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_conversations(&self, user_id: UserId)
    -> Result<Vec<Conversation>, StorageError>;

    /// Bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn touch_conversation(
        &self,
        id: ConversationId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Delete a conversation and its messages.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete_conversation(&self, id: ConversationId) -> Result<(), StorageError>;
}

/// Repository contract for chat messages.
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// Append a message and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the conversation is missing, or other storage errors.
    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage, StorageError>;

    /// List a conversation's messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, UserProgress>,
    subjects: HashMap<(UserId, String), SubjectProgress>,
    attempts: Vec<StoredAttempt>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: Vec<ChatMessage>,
    next_attempt_id: u64,
    next_conversation_id: u64,
    next_message_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_user_progress(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProgress>, StorageError> {
        let guard = self.lock()?;
        let Some(totals) = guard.users.get(&user_id) else {
            return Ok(None);
        };
        let subjects = guard
            .subjects
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, progress)| progress.clone());
        UserProgress::from_persisted(
            user_id,
            totals.total_quizzes(),
            totals.average_score(),
            totals.last_active(),
            subjects,
        )
        .map(Some)
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn upsert_user_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.users.insert(progress.user_id(), progress.clone());
        Ok(())
    }

    async fn get_subject_progress(
        &self,
        user_id: UserId,
        subject: &str,
    ) -> Result<Option<SubjectProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.subjects.get(&(user_id, subject.to_string())).cloned())
    }

    async fn upsert_subject_progress(
        &self,
        user_id: UserId,
        progress: &SubjectProgress,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .subjects
            .insert((user_id, progress.subject().to_string()), progress.clone());
        Ok(())
    }

    async fn list_subject_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SubjectProgress>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<_> = guard
            .subjects
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, progress)| progress.clone())
            .collect();
        out.sort_by(|a, b| a.subject().cmp(b.subject()));
        Ok(out)
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryRepository {
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
        let mut guard = self.lock()?;
        guard.next_attempt_id += 1;
        let id = AttemptId::new(guard.next_attempt_id);
        guard.attempts.push(StoredAttempt {
            id,
            attempt: attempt.clone(),
        });
        Ok(id)
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<_> = guard
            .attempts
            .iter()
            .filter(|stored| stored.attempt.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.attempt
                .completed_at
                .cmp(&a.attempt.completed_at)
                .then(b.id.cmp(&a.id))
        });
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }
}

#[async_trait]
impl ConversationRepository for InMemoryRepository {
    async fn create_conversation(
        &self,
        user_id: UserId,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Conversation, StorageError> {
        let mut guard = self.lock()?;
        guard.next_conversation_id += 1;
        let conversation = Conversation {
            id: ConversationId::new(guard.next_conversation_id),
            user_id,
            title: title.to_string(),
            created_at,
            updated_at: created_at,
        };
        guard
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, StorageError> {
        let guard = self.lock()?;
        guard
            .conversations
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Conversation>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<_> = guard
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn touch_conversation(
        &self,
        id: ConversationId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let conversation = guard
            .conversations
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        conversation.updated_at = updated_at;
        Ok(())
    }

    async fn delete_conversation(&self, id: ConversationId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .conversations
            .remove(&id)
            .ok_or(StorageError::NotFound)?;
        guard.messages.retain(|m| m.conversation_id != id);
        Ok(())
    }
}

#[async_trait]
impl ChatMessageRepository for InMemoryRepository {
    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage, StorageError> {
        let mut guard = self.lock()?;
        if !guard.conversations.contains_key(&message.conversation_id) {
            return Err(StorageError::NotFound);
        }
        guard.next_message_id += 1;
        let stored = ChatMessage {
            id: MessageId::new(guard.next_message_id),
            conversation_id: message.conversation_id,
            user_id: message.user_id,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
        };
        guard.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<_> = guard
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub attempts: Arc<dyn QuizAttemptRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn ChatMessageRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            progress: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            conversations: Arc::new(repo.clone()),
            messages: Arc::new(repo),
        }
    }
}
