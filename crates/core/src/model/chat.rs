use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ConversationId, MessageId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChatError {
    #[error("conversation title cannot be empty")]
    EmptyTitle,

    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("unknown message role: {0}")]
    UnknownRole(String),
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Speaker label used when replaying history into a prompt.
    #[must_use]
    pub fn speaker(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ChatError::UnknownRole(other.to_string())),
        }
    }
}

/// A titled thread of tutor messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Validate and trim a conversation title.
///
/// # Errors
///
/// Returns `ChatError::EmptyTitle` for blank titles.
pub fn normalize_title(raw: &str) -> Result<String, ChatError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ChatError::EmptyTitle);
    }
    Ok(title.to_string())
}

/// Validate and trim user-entered message text against a character limit.
///
/// # Errors
///
/// Returns `ChatError::EmptyMessage` or `ChatError::MessageTooLong`.
pub fn normalize_message(raw: &str, max_chars: usize) -> Result<String, ChatError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    let len = content.chars().count();
    if len > max_chars {
        return Err(ChatError::MessageTooLong { len, max: max_chars });
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips() {
        for role in [Role::User, Role::Assistant] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn message_limits_count_characters() {
        assert_eq!(normalize_message("  hi  ", 10).unwrap(), "hi");
        assert_eq!(normalize_message("   ", 10), Err(ChatError::EmptyMessage));
        assert_eq!(
            normalize_message("ééé", 2),
            Err(ChatError::MessageTooLong { len: 3, max: 2 })
        );
    }
}
