use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{
    ChatMessageRepository, ConversationRepository, ProgressRepository, QuizAttemptRepository,
    Storage,
};

mod attempt_repo;
mod conversation_repo;
mod mapping;
mod migrate;
mod progress_repo;

/// Pragmas applied to every pooled connection. Chat messages rely on
/// `foreign_keys` for their cascade and orphan checks.
const CONNECTION_PRAGMAS: [&str; 3] = [
    "PRAGMA foreign_keys = ON;",
    "PRAGMA journal_mode = WAL;",
    "PRAGMA busy_timeout = 5000;",
];

/// One pool serving the progress, attempt and chat repositories.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool on `database_url` without touching the schema.
    ///
    /// # Errors
    ///
    /// Fails when the database cannot be opened or a pragma is rejected.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    for pragma in CONNECTION_PRAGMAS {
                        sqlx::query(pragma).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Bring the tutor schema up to the latest version.
    ///
    /// # Errors
    ///
    /// Fails when a migration statement errors; that version is rolled back.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Connect, migrate, and hand out the four repositories over one pool.
    ///
    /// # Errors
    ///
    /// See [`SqliteRepository::connect`] and [`SqliteRepository::migrate`].
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn QuizAttemptRepository> = Arc::new(repo.clone());
        let conversations: Arc<dyn ConversationRepository> = Arc::new(repo.clone());
        let messages: Arc<dyn ChatMessageRepository> = Arc::new(repo);
        Ok(Self {
            progress,
            attempts,
            conversations,
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[tokio::test]
    async fn connections_enforce_foreign_keys() {
        let repo = SqliteRepository::connect("sqlite:file:memdb_pragmas?mode=memory&cache=shared")
            .await
            .unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys;")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
