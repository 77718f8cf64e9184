use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::repository::{
    FlashcardRepository, FlashcardSetRepository, NewFlashcardRecord, NewFlashcardSetRecord,
    StorageError,
};
use study_core::model::{Flashcard, FlashcardDraft, FlashcardSet, FlashcardSetId, UserId};

use crate::Clock;
use crate::error::FlashcardSetServiceError;

/// Card counts for one set at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SetStats {
    pub total: u32,
    pub due: u32,
    pub new: u32,
}

impl SetStats {
    fn tally(cards: &[Flashcard], now: DateTime<Utc>) -> Self {
        cards.iter().fold(Self::default(), |mut acc, card| {
            acc.total += 1;
            if card.is_due(now) {
                acc.due += 1;
            }
            if card.is_new() {
                acc.new += 1;
            }
            acc
        })
    }
}

/// Orchestrates set creation, lookup, and deletion.
#[derive(Clone)]
pub struct FlashcardSetService {
    clock: Clock,
    sets: Arc<dyn FlashcardSetRepository>,
    cards: Arc<dyn FlashcardRepository>,
}

impl FlashcardSetService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sets: Arc<dyn FlashcardSetRepository>,
        cards: Arc<dyn FlashcardRepository>,
    ) -> Self {
        Self { clock, sets, cards }
    }

    /// Create a set with its cards. Cards keep the supplied order and are due
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardSetServiceError::Set` for a blank title and
    /// `FlashcardSetServiceError::Card` for the first card with a blank side;
    /// nothing is stored in either case.
    /// Returns `FlashcardSetServiceError::Storage` if persistence fails.
    pub async fn create_set(
        &self,
        user_id: UserId,
        title: String,
        description: Option<String>,
        cards: Vec<FlashcardDraft>,
    ) -> Result<FlashcardSetId, FlashcardSetServiceError> {
        let now = self.clock.now();
        let set = FlashcardSet::new(FlashcardSetId::new(1), user_id, title, description, now)?;

        let mut records = Vec::with_capacity(cards.len());
        for (index, draft) in cards.into_iter().enumerate() {
            let draft = draft
                .validate()
                .map_err(|source| FlashcardSetServiceError::Card { index, source })?;
            records.push(NewFlashcardRecord::from_draft(draft, now));
        }

        let card_count = records.len();
        let set_id = self
            .sets
            .insert_set(NewFlashcardSetRecord::from_set(&set), records)
            .await?;
        log::info!("created set {set_id} for user {user_id} with {card_count} cards");
        Ok(set_id)
    }

    /// Fetch a set with its cards in position order.
    ///
    /// Returns `Ok(None)` when the set does not exist.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardSetServiceError::Storage` if repository access fails.
    pub async fn get_set(
        &self,
        set_id: FlashcardSetId,
    ) -> Result<Option<(FlashcardSet, Vec<Flashcard>)>, FlashcardSetServiceError> {
        let Some(set) = self.sets.get_set(set_id).await? else {
            return Ok(None);
        };
        let cards = self.cards.cards_in_set(set_id).await?;
        Ok(Some((set, cards)))
    }

    /// List a user's sets ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardSetServiceError::Storage` if repository access fails.
    pub async fn list_sets(
        &self,
        user_id: UserId,
    ) -> Result<Vec<FlashcardSet>, FlashcardSetServiceError> {
        Ok(self.sets.list_sets(user_id).await?)
    }

    /// Delete a set together with its cards and their review history.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardSetServiceError::Storage` if repository access fails.
    pub async fn delete_set(
        &self,
        set_id: FlashcardSetId,
    ) -> Result<bool, FlashcardSetServiceError> {
        let deleted = self.sets.delete_set(set_id).await?;
        if deleted {
            log::info!("deleted set {set_id}");
        } else {
            log::debug!("delete of missing set {set_id}");
        }
        Ok(deleted)
    }

    /// Total, due, and never-reviewed card counts at the service clock.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist, or other
    /// storage errors.
    pub async fn set_stats(
        &self,
        set_id: FlashcardSetId,
    ) -> Result<SetStats, FlashcardSetServiceError> {
        if self.sets.get_set(set_id).await?.is_none() {
            return Err(StorageError::NotFound.into());
        }
        let cards = self.cards.cards_in_set(set_id).await?;
        Ok(SetStats::tally(&cards, self.clock.now()))
    }
}
