use chrono::{DateTime, Utc};
use tutor_core::model::{ChatMessage, Conversation, ConversationId, MessageId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_conversation_row, map_message_row};
use crate::repository::{
    ChatMessageRepository, ConversationRepository, NewChatMessage, StorageError,
};

fn rowid(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

#[async_trait::async_trait]
impl ConversationRepository for SqliteRepository {
    async fn create_conversation(
        &self,
        user_id: UserId,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Conversation, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO conversations (user_id, title, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ",
        )
        .bind(user_id.to_string())
        .bind(title)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(Conversation {
            id: ConversationId::new(rowid("conversation_id", res.last_insert_rowid())?),
            user_id,
            title: title.to_string(),
            created_at,
            updated_at: created_at,
        })
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, created_at, updated_at
            FROM conversations
            WHERE id = ?1
            ",
        )
        .bind(id_i64("conversation_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_conversation_row(&row)
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Conversation>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, created_at, updated_at
            FROM conversations
            WHERE user_id = ?1
            ORDER BY updated_at DESC, id DESC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_conversation_row(&row)?);
        }
        Ok(out)
    }

    async fn touch_conversation(
        &self,
        id: ConversationId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(updated_at)
            .bind(id_i64("conversation_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: ConversationId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id_i64("conversation_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChatMessageRepository for SqliteRepository {
    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage, StorageError> {
        let conversation = id_i64("conversation_id", message.conversation_id.value())?;
        let res = sqlx::query(
            r"
            INSERT INTO chat_messages (conversation_id, user_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(conversation)
        .bind(message.user_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        Ok(ChatMessage {
            id: MessageId::new(rowid("message_id", res.last_insert_rowid())?),
            conversation_id: message.conversation_id,
            user_id: message.user_id,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
        })
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, user_id, role, content, created_at
            FROM chat_messages
            WHERE conversation_id = ?1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(id_i64("conversation_id", conversation_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_message_row(&row)?);
        }
        Ok(out)
    }
}
