//! Tutor conversations: plain chat and "explain in chat" reviews.

use std::sync::Arc;

use tracing::{info, warn};
use tutor_core::model::{
    ChatMessage, Conversation, ConversationId, Role, UserId, normalize_message, normalize_title,
};

use crate::Clock;
use crate::error::ChatServiceError;
use crate::inference::TextGenerator;
use crate::topics_service::{IncorrectQuestion, TopicReview};
use storage::repository::{ChatMessageRepository, ConversationRepository, NewChatMessage};

/// Limits applied to user input and to the history sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLimits {
    pub max_message_chars: usize,
    pub history_window: usize,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_message_chars: 1000,
            history_window: 50,
        }
    }
}

/// Which opening message starts a review conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    Explain,
    CheckUnderstanding,
}

/// A user message and the tutor's reply, both stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatExchange {
    pub user_message: ChatMessage,
    pub reply: ChatMessage,
}

#[must_use]
pub fn review_title(review: &TopicReview) -> String {
    format!("Review: {} - {}", review.topic, review.subject)
}

/// First user message of a review conversation.
#[must_use]
pub fn review_opening(question: &IncorrectQuestion, mode: ReviewMode) -> String {
    match mode {
        ReviewMode::Explain => format!(
            "Please explain this question in detail: \"{}\"\nMy answer was: \"{}\"\nThe correct answer is: \"{}\"",
            question.question,
            question.user_answer_text(),
            question.correct_answer
        ),
        ReviewMode::CheckUnderstanding => format!(
            "Please check if I understand this question correctly: \"{}\"\nMy answer was: \"{}\"\nThe correct answer is: \"{}\"\n\nPlease ask me questions to verify my understanding.",
            question.question,
            question.user_answer_text(),
            question.correct_answer
        ),
    }
}

/// Prompt for a regular chat turn. `history` already contains `current`.
#[must_use]
pub fn chat_prompt(history: &[ChatMessage], current: &str) -> String {
    let transcript = history
        .iter()
        .map(|m| format!("{}: {}", m.role.speaker(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a helpful AI tutor. The user is reviewing questions they got wrong in a quiz.\n\
         Provide clear, detailed explanations and help them understand the concepts better.\n\
         Only ask questions to verify understanding if the conversation was started from the \"Explain in Chat\" button.\n\
         For regular chat messages, respond naturally without asking questions.\n\n\
         Previous conversation:\n{transcript}\n\n\
         Current message: {current}"
    )
}

/// Prompt for the tutor's reply to a review conversation's opening message.
#[must_use]
pub fn opening_prompt(opening: &str) -> String {
    format!(
        "You are a helpful AI tutor. The user is reviewing questions they got wrong in a quiz.\n\
         This conversation was started from the \"Explain in Chat\" button.\n\
         Provide a detailed explanation of the concept and then ask 2-3 questions to verify their understanding.\n\n\
         User's question: {opening}"
    )
}

#[derive(Clone)]
pub struct ChatService {
    clock: Clock,
    model: Arc<dyn TextGenerator>,
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn ChatMessageRepository>,
    limits: ChatLimits,
}

impl ChatService {
    #[must_use]
    pub fn new(
        clock: Clock,
        model: Arc<dyn TextGenerator>,
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn ChatMessageRepository>,
    ) -> Self {
        Self {
            clock,
            model,
            conversations,
            messages,
            limits: ChatLimits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ChatLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn limits(&self) -> ChatLimits {
        self.limits
    }

    /// # Errors
    ///
    /// Returns `ChatServiceError::Invalid` for a blank title, or storage errors.
    pub async fn create_conversation(
        &self,
        user_id: UserId,
        title: &str,
    ) -> Result<Conversation, ChatServiceError> {
        let title = normalize_title(title)?;
        let conversation = self
            .conversations
            .create_conversation(user_id, &title, self.clock.now())
            .await?;
        info!(conversation = %conversation.id, "conversation created");
        Ok(conversation)
    }

    /// Most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn list_conversations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Conversation>, ChatServiceError> {
        Ok(self.conversations.list_conversations(user_id).await?)
    }

    /// Oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Forbidden` for another user's conversation, or storage errors.
    pub async fn list_messages(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, ChatServiceError> {
        self.owned(user_id, conversation_id).await?;
        Ok(self.messages.list_messages(conversation_id).await?)
    }

    /// Remove a conversation together with its messages.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Forbidden` for another user's conversation, or storage errors.
    pub async fn delete_conversation(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<(), ChatServiceError> {
        self.owned(user_id, conversation_id).await?;
        self.conversations
            .delete_conversation(conversation_id)
            .await?;
        info!(conversation = %conversation_id, "conversation deleted");
        Ok(())
    }

    /// Store the user's message, ask the model with the recent history and
    /// store its reply.
    ///
    /// Steps run in order without rollback: if the model fails, the user's
    /// message stays stored without a reply.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Invalid` for empty or oversized input,
    /// `ChatServiceError::Inference` when the model fails, or storage errors.
    pub async fn send_message(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<ChatExchange, ChatServiceError> {
        let content = normalize_message(text, self.limits.max_message_chars)?;
        self.owned(user_id, conversation_id).await?;

        let user_message = self
            .append(user_id, conversation_id, Role::User, content.clone())
            .await?;

        let history = self.messages.list_messages(conversation_id).await?;
        let start = history.len().saturating_sub(self.limits.history_window);
        let prompt = chat_prompt(&history[start..], &content);

        let reply_text = self
            .model
            .generate(&prompt)
            .await
            .inspect_err(|err| warn!(conversation = %conversation_id, error = %err, "tutor reply failed"))?;
        let reply = self
            .append(user_id, conversation_id, Role::Assistant, reply_text)
            .await?;

        self.conversations
            .touch_conversation(conversation_id, self.clock.now())
            .await?;

        Ok(ChatExchange {
            user_message,
            reply,
        })
    }

    /// Open a review conversation for a missed question.
    ///
    /// Only the opening user message is stored; call
    /// [`ChatService::respond_to_opening`] to get the tutor's first reply.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn start_review(
        &self,
        user_id: UserId,
        review: &TopicReview,
        question: &IncorrectQuestion,
        mode: ReviewMode,
    ) -> Result<Conversation, ChatServiceError> {
        let conversation = self
            .create_conversation(user_id, &review_title(review))
            .await?;
        self.append(
            user_id,
            conversation.id,
            Role::User,
            review_opening(question, mode),
        )
        .await?;
        Ok(conversation)
    }

    /// Generate the tutor's reply when the conversation holds only its opening
    /// message. Returns `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Inference` when the model fails, or storage errors.
    pub async fn respond_to_opening(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Option<ChatMessage>, ChatServiceError> {
        self.owned(user_id, conversation_id).await?;
        let history = self.messages.list_messages(conversation_id).await?;
        let [opening] = history.as_slice() else {
            return Ok(None);
        };
        if opening.role != Role::User {
            return Ok(None);
        }

        let reply_text = self.model.generate(&opening_prompt(&opening.content)).await?;
        let reply = self
            .append(user_id, conversation_id, Role::Assistant, reply_text)
            .await?;
        self.conversations
            .touch_conversation(conversation_id, self.clock.now())
            .await?;
        Ok(Some(reply))
    }

    async fn owned(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ChatServiceError> {
        let conversation = self.conversations.get_conversation(conversation_id).await?;
        if conversation.user_id != user_id {
            return Err(ChatServiceError::Forbidden);
        }
        Ok(conversation)
    }

    async fn append(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        role: Role,
        content: String,
    ) -> Result<ChatMessage, ChatServiceError> {
        Ok(self
            .messages
            .append_message(NewChatMessage {
                conversation_id,
                user_id,
                role,
                content,
                created_at: self.clock.now(),
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use storage::repository::InMemoryRepository;
    use tutor_core::model::ChatError;
    use tutor_core::time::fixed_now;

    /// Echoes a fixed reply and remembers every prompt.
    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(InferenceError::EmptyResponse)
            } else {
                Ok("Tutor says hi".into())
            }
        }
    }

    fn service(model: Arc<Recorder>) -> (ChatService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let service = ChatService::new(
            Clock::fixed(fixed_now()),
            model,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        (service, repo)
    }

    #[tokio::test]
    async fn send_message_stores_both_sides_and_replays_history() {
        let model = Arc::new(Recorder::default());
        let (chat, _repo) = service(Arc::clone(&model));
        let user = UserId::random();
        let conv = chat.create_conversation(user, "  Algebra  ").await.unwrap();
        assert_eq!(conv.title, "Algebra");

        chat.send_message(user, conv.id, "What is x?").await.unwrap();
        let exchange = chat.send_message(user, conv.id, "And y?").await.unwrap();
        assert_eq!(exchange.reply.role, Role::Assistant);

        let messages = chat.list_messages(user, conv.id).await.unwrap();
        assert_eq!(messages.len(), 4);

        let prompts = model.prompts.lock().unwrap();
        let last = prompts.last().unwrap();
        assert!(last.contains("User: What is x?\nAssistant: Tutor says hi\nUser: And y?"));
        assert!(last.ends_with("Current message: And y?"));
    }

    #[tokio::test]
    async fn history_window_limits_the_prompt() {
        let model = Arc::new(Recorder::default());
        let (chat, _repo) = service(Arc::clone(&model));
        let chat = chat.with_limits(ChatLimits {
            max_message_chars: 1000,
            history_window: 2,
        });
        let user = UserId::random();
        let conv = chat.create_conversation(user, "Window").await.unwrap();
        chat.send_message(user, conv.id, "first").await.unwrap();
        chat.send_message(user, conv.id, "second").await.unwrap();

        let prompts = model.prompts.lock().unwrap();
        let last = prompts.last().unwrap();
        assert!(!last.contains("User: first"));
        assert!(last.contains("Assistant: Tutor says hi\nUser: second"));
    }

    #[tokio::test]
    async fn oversized_and_empty_messages_are_rejected() {
        let (chat, _repo) = service(Arc::new(Recorder::default()));
        let user = UserId::random();
        let conv = chat.create_conversation(user, "Limits").await.unwrap();

        let err = chat
            .send_message(user, conv.id, &"a".repeat(1001))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatServiceError::Invalid(ChatError::MessageTooLong { len: 1001, max: 1000 })
        ));
        assert!(matches!(
            chat.send_message(user, conv.id, "   ").await,
            Err(ChatServiceError::Invalid(ChatError::EmptyMessage))
        ));
        assert!(chat.list_messages(user, conv.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_failure_keeps_the_user_message() {
        let model = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let (chat, _repo) = service(model);
        let user = UserId::random();
        let conv = chat.create_conversation(user, "Offline").await.unwrap();

        let err = chat.send_message(user, conv.id, "hello").await.unwrap_err();
        assert!(matches!(err, ChatServiceError::Inference(_)));
        let messages = chat.list_messages(user, conv.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn other_users_cannot_read_or_delete() {
        let (chat, _repo) = service(Arc::new(Recorder::default()));
        let owner = UserId::random();
        let conv = chat.create_conversation(owner, "Mine").await.unwrap();
        let stranger = UserId::random();
        assert!(matches!(
            chat.list_messages(stranger, conv.id).await,
            Err(ChatServiceError::Forbidden)
        ));
        assert!(matches!(
            chat.delete_conversation(stranger, conv.id).await,
            Err(ChatServiceError::Forbidden)
        ));
        chat.delete_conversation(owner, conv.id).await.unwrap();
        assert!(chat.list_conversations(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn review_conversation_gets_one_opening_reply() {
        let model = Arc::new(Recorder::default());
        let (chat, _repo) = service(Arc::clone(&model));
        let user = UserId::random();
        let question = IncorrectQuestion {
            question: "Why is the sky blue?".into(),
            user_answer: Some("Paint".into()),
            correct_answer: "Rayleigh scattering".into(),
            explanation: String::new(),
        };
        let review = TopicReview {
            topic: "Optics".into(),
            subject: "Physics".into(),
            incorrect_count: 1,
            last_attempted: fixed_now(),
            incorrect_questions: vec![question.clone()],
        };

        let conv = chat
            .start_review(user, &review, &question, ReviewMode::CheckUnderstanding)
            .await
            .unwrap();
        assert_eq!(conv.title, "Review: Optics - Physics");

        let reply = chat.respond_to_opening(user, conv.id).await.unwrap();
        assert!(reply.is_some());
        assert!(model.prompts.lock().unwrap()[0].contains("Please ask me questions to verify"));

        assert!(chat.respond_to_opening(user, conv.id).await.unwrap().is_none());
        assert_eq!(chat.list_messages(user, conv.id).await.unwrap().len(), 2);
    }
}
