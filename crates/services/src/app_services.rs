use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::auth::{AuthClient, AuthConfig};
use crate::chat_service::ChatService;
use crate::error::AppServicesError;
use crate::inference::{InferenceClient, InferenceConfig, TextGenerator};
use crate::progress::ProgressService;
use crate::questions::{CachePolicy, QuestionGenerator};
use crate::quiz::QuizLoopService;
use crate::topics_service::TopicsService;

/// Assembles app-facing services over one storage backend and one model.
#[derive(Clone)]
pub struct AppServices {
    quiz: Arc<QuizLoopService>,
    progress: Arc<ProgressService>,
    chat: Arc<ChatService>,
    topics: Arc<TopicsService>,
    auth: Arc<AuthClient>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP model client.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        inference: InferenceConfig,
        auth: Option<AuthConfig>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let model: Arc<dyn TextGenerator> = Arc::new(InferenceClient::new(inference));
        Ok(Self::assemble(&storage, clock, model, AuthClient::new(auth)))
    }

    /// Wire services over existing storage and any text generator.
    #[must_use]
    pub fn assemble(
        storage: &Storage,
        clock: Clock,
        model: Arc<dyn TextGenerator>,
        auth: AuthClient,
    ) -> Self {
        let generator = Arc::new(
            QuestionGenerator::new(clock, Arc::clone(&model)).with_cache(CachePolicy::default()),
        );
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.progress),
        ));
        let quiz = Arc::new(QuizLoopService::new(
            clock,
            generator,
            Arc::clone(&progress),
        ));
        let chat = Arc::new(ChatService::new(
            clock,
            Arc::clone(&model),
            Arc::clone(&storage.conversations),
            Arc::clone(&storage.messages),
        ));
        let topics = Arc::new(TopicsService::new(Arc::clone(&storage.attempts), model));

        Self {
            quiz,
            progress,
            chat,
            topics,
            auth: Arc::new(auth),
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn topics(&self) -> Arc<TopicsService> {
        Arc::clone(&self.topics)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthClient> {
        Arc::clone(&self.auth)
    }
}
