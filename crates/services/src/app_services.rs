use std::sync::Arc;

use storage::repository::Storage;
use study_core::scheduler::Scheduler;

use crate::Clock;
use crate::config::StudyConfig;
use crate::due_service::DueCardService;
use crate::error::AppServicesError;
use crate::flashcard_set_service::FlashcardSetService;
use crate::review_service::ReviewService;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    reviews: Arc<ReviewService>,
    due_cards: Arc<DueCardService>,
    sets: Arc<FlashcardSetService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.db_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &StudyConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        log::debug!("opened study database at {}", config.db_url);
        Ok(Self::from_storage(&storage, config, clock))
    }

    /// Build services over an in-memory backend.
    #[must_use]
    pub fn in_memory(config: &StudyConfig, clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), config, clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, config: &StudyConfig, clock: Clock) -> Self {
        let reviews = ReviewService::new(
            clock,
            Arc::clone(&storage.cards),
            Arc::clone(&storage.reviews),
            Arc::clone(&storage.review_logs),
        )
        .with_scheduler(Scheduler::with_policy(config.quality_policy));
        let due_cards = DueCardService::new(clock, Arc::clone(&storage.cards))
            .with_default_limit(config.due_limit);
        let sets = FlashcardSetService::new(
            clock,
            Arc::clone(&storage.sets),
            Arc::clone(&storage.cards),
        );

        Self {
            reviews: Arc::new(reviews),
            due_cards: Arc::new(due_cards),
            sets: Arc::new(sets),
        }
    }

    #[must_use]
    pub fn reviews(&self) -> Arc<ReviewService> {
        Arc::clone(&self.reviews)
    }

    #[must_use]
    pub fn due_cards(&self) -> Arc<DueCardService> {
        Arc::clone(&self.due_cards)
    }

    #[must_use]
    pub fn sets(&self) -> Arc<FlashcardSetService> {
        Arc::clone(&self.sets)
    }
}
