use std::sync::Arc;

use storage::repository::FlashcardRepository;
use study_core::{DEFAULT_DUE_LIMIT, DueCard, model::UserId, time::Clock};

use crate::error::DueCardServiceError;

/// Hands out the cards a user should study next.
#[derive(Clone)]
pub struct DueCardService {
    clock: Clock,
    cards: Arc<dyn FlashcardRepository>,
    default_limit: u32,
}

impl DueCardService {
    #[must_use]
    pub fn new(clock: Clock, cards: Arc<dyn FlashcardRepository>) -> Self {
        Self {
            clock,
            cards,
            default_limit: DEFAULT_DUE_LIMIT,
        }
    }

    /// Limit used when the caller does not pass one.
    #[must_use]
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    /// Cards across all of the user's sets whose review date has arrived, most
    /// overdue first.
    ///
    /// # Errors
    ///
    /// Returns `DueCardServiceError::Storage` if repository access fails.
    pub async fn select_due_cards(
        &self,
        user_id: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<DueCard>, DueCardServiceError> {
        let limit = limit.unwrap_or(self.default_limit);
        let now = self.clock.now();
        let due = self.cards.due_cards(user_id, now, limit).await?;
        log::debug!("user {user_id}: {} due cards (limit {limit})", due.len());
        Ok(due)
    }
}
