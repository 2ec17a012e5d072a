use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tutor_core::model::{
    AttemptEntry, AttemptId, ChatMessage, Conversation, ConversationId, MessageId, QuizAttempt,
    Role, StoredAttempt, SubjectProgress, TopicSet, UserId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_id_from_str(s: &str) -> Result<UserId, StorageError> {
    s.parse::<UserId>().map_err(ser)
}

pub(crate) fn topics_to_json(topics: &TopicSet) -> Result<String, StorageError> {
    serde_json::to_string(topics).map_err(ser)
}

fn topics_from_json(raw: &str) -> Result<TopicSet, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn entries_to_json(entries: &[AttemptEntry]) -> Result<String, StorageError> {
    serde_json::to_string(entries).map_err(ser)
}

pub(crate) fn map_subject_row(row: &SqliteRow) -> Result<SubjectProgress, StorageError> {
    let weak: String = row.try_get("weak_topics").map_err(ser)?;
    let strong: String = row.try_get("strong_topics").map_err(ser)?;
    SubjectProgress::from_persisted(
        row.try_get::<String, _>("subject").map_err(ser)?,
        i64_to_u32(
            "total_attempts",
            row.try_get::<i64, _>("total_attempts").map_err(ser)?,
        )?,
        row.try_get("average_score").map_err(ser)?,
        row.try_get("last_attempt").map_err(ser)?,
        topics_from_json(&weak)?,
        topics_from_json(&strong)?,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<StoredAttempt, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let entries: String = row.try_get("entries").map_err(ser)?;
    let entries: Vec<AttemptEntry> = serde_json::from_str(&entries).map_err(ser)?;

    Ok(StoredAttempt {
        id: AttemptId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        attempt: QuizAttempt {
            user_id: user_id_from_str(&user_id)?,
            subject: row.try_get("subject").map_err(ser)?,
            score: row.try_get("score").map_err(ser)?,
            total_questions: i64_to_u32(
                "total_questions",
                row.try_get::<i64, _>("total_questions").map_err(ser)?,
            )?,
            time_spent_secs: i64_to_u64(
                "time_spent_secs",
                row.try_get::<i64, _>("time_spent_secs").map_err(ser)?,
            )?,
            entries,
            completed_at: row.try_get("completed_at").map_err(ser)?,
        },
    })
}

pub(crate) fn map_conversation_row(row: &SqliteRow) -> Result<Conversation, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    Ok(Conversation {
        id: ConversationId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        user_id: user_id_from_str(&user_id)?,
        title: row.try_get("title").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_message_row(row: &SqliteRow) -> Result<ChatMessage, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let role: String = row.try_get("role").map_err(ser)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
    Ok(ChatMessage {
        id: MessageId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        conversation_id: ConversationId::new(i64_to_u64(
            "conversation_id",
            row.try_get("conversation_id").map_err(ser)?,
        )?),
        user_id: user_id_from_str(&user_id)?,
        role: role.parse::<Role>().map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        created_at,
    })
}
