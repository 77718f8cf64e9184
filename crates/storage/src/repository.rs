use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use study_core::due::{DueCard, select_due};
use study_core::model::{
    Difficulty, Flashcard, FlashcardDraft, FlashcardId, FlashcardSet, FlashcardSetId, Quality,
    ReviewLog, UserId,
};
use study_core::scheduler::ReviewOutcome;
use thiserror::Error;

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

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A set row that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewFlashcardSetRecord {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewFlashcardSetRecord {
    #[must_use]
    pub fn from_set(set: &FlashcardSet) -> Self {
        Self {
            user_id: set.user_id(),
            title: set.title().to_owned(),
            description: set.description().map(str::to_owned),
            created_at: set.created_at(),
        }
    }
}

/// A card row that has not been assigned an id yet.
///
/// Its position is the index in the list handed to
/// [`FlashcardSetRepository::insert_set`]; the card starts unreviewed with
/// `next_review = created_at`.
#[derive(Debug, Clone)]
pub struct NewFlashcardRecord {
    pub front: String,
    pub back: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

impl NewFlashcardRecord {
    #[must_use]
    pub fn from_draft(draft: FlashcardDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            front: draft.front,
            back: draft.back,
            difficulty: draft.difficulty,
            created_at,
        }
    }

    fn draft(&self) -> FlashcardDraft {
        FlashcardDraft::new(self.front.clone(), self.back.clone()).with_difficulty(self.difficulty)
    }
}

/// Persisted shape of a review log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewLogRecord {
    pub id: Option<i64>,
    pub card_id: FlashcardId,
    pub quality: Quality,
    pub reviewed_at: DateTime<Utc>,
    pub ease_factor: f64,
    pub interval: u32,
    pub next_review: DateTime<Utc>,
}

impl ReviewLogRecord {
    #[must_use]
    pub fn from_outcome(card_id: FlashcardId, quality: Quality, outcome: &ReviewOutcome) -> Self {
        Self {
            id: None,
            card_id,
            quality,
            reviewed_at: outcome.reviewed_at,
            ease_factor: outcome.ease_factor,
            interval: outcome.interval,
            next_review: outcome.next_review,
        }
    }

    #[must_use]
    pub fn to_log(&self) -> ReviewLog {
        ReviewLog {
            card_id: self.card_id,
            quality: self.quality,
            reviewed_at: self.reviewed_at,
            ease_factor: self.ease_factor,
            interval: self.interval,
            next_review: self.next_review,
        }
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for flashcard sets.
#[async_trait]
pub trait FlashcardSetRepository: Send + Sync {
    /// Insert a set together with its cards, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either the set or any card cannot be stored;
    /// nothing is persisted in that case.
    async fn insert_set(
        &self,
        set: NewFlashcardSetRecord,
        cards: Vec<NewFlashcardRecord>,
    ) -> Result<FlashcardSetId, StorageError>;

    /// Fetch a set by ID; `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_set(&self, id: FlashcardSetId) -> Result<Option<FlashcardSet>, StorageError>;

    /// All sets owned by a user, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_sets(&self, user_id: UserId) -> Result<Vec<FlashcardSet>, StorageError>;

    /// Delete a set with its cards and their review logs.
    ///
    /// Returns whether the set existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn delete_set(&self, id: FlashcardSetId) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait FlashcardRepository: Send + Sync {
    /// Fetch one card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_card(&self, id: FlashcardId) -> Result<Flashcard, StorageError>;

    /// Cards of a set in position order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn cards_in_set(&self, set_id: FlashcardSetId) -> Result<Vec<Flashcard>, StorageError>;

    /// Cards across all of a user's sets with `next_review <= now`, ascending by
    /// `next_review` then card id, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn due_cards(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DueCard>, StorageError>;
}

#[async_trait]
pub trait ReviewLogRepository: Send + Sync {
    /// Append a review log entry and return its ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the card does not exist.
    async fn append_log(&self, log: ReviewLogRecord) -> Result<i64, StorageError>;

    /// Review logs for a card, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn logs_for_card(&self, card_id: FlashcardId)
    -> Result<Vec<ReviewLogRecord>, StorageError>;
}

/// Atomic write of a reviewed card and its log entry.
#[async_trait]
pub trait ReviewPersistence: Send + Sync {
    /// Persist the card's new schedule and append `log` in one transaction.
    ///
    /// The write only applies if the stored review count is exactly one less
    /// than the card's, so two overlapping reviews of the same card cannot both
    /// land.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the card does not exist
    /// - `Conflict` if the log belongs to another card or the stored card moved on
    async fn apply_review(&self, card: &Flashcard, log: ReviewLogRecord)
    -> Result<i64, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    sets: BTreeMap<FlashcardSetId, FlashcardSet>,
    cards: BTreeMap<FlashcardId, Flashcard>,
    logs: Vec<ReviewLogRecord>,
    next_set_id: u64,
    next_card_id: u64,
    next_log_id: i64,
}

impl MemoryState {
    fn alloc_set_id(&mut self) -> FlashcardSetId {
        self.next_set_id += 1;
        FlashcardSetId::new(self.next_set_id)
    }

    fn alloc_card_id(&mut self) -> FlashcardId {
        self.next_card_id += 1;
        FlashcardId::new(self.next_card_id)
    }

    fn alloc_log_id(&mut self) -> i64 {
        self.next_log_id += 1;
        self.next_log_id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// One mutex guards everything, so every call is atomic.
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
impl FlashcardSetRepository for InMemoryRepository {
    async fn insert_set(
        &self,
        set: NewFlashcardSetRecord,
        cards: Vec<NewFlashcardRecord>,
    ) -> Result<FlashcardSetId, StorageError> {
        let mut guard = self.lock()?;

        // Build everything before touching the maps so a bad card leaves no trace.
        let set_id = FlashcardSetId::new(guard.next_set_id + 1);
        let set = FlashcardSet::new(
            set_id,
            set.user_id,
            set.title,
            set.description,
            set.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut built = Vec::with_capacity(cards.len());
        for (offset, record) in cards.iter().enumerate() {
            let position = u32::try_from(offset)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            let id = FlashcardId::new(guard.next_card_id + u64::from(position) + 1);
            let card = Flashcard::new(id, set_id, position, record.draft(), record.created_at)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            built.push(card);
        }

        let allocated = guard.alloc_set_id();
        debug_assert_eq!(allocated, set_id);
        guard.sets.insert(set_id, set);
        for card in built {
            let id = guard.alloc_card_id();
            debug_assert_eq!(id, card.id());
            guard.cards.insert(id, card);
        }
        Ok(set_id)
    }

    async fn get_set(&self, id: FlashcardSetId) -> Result<Option<FlashcardSet>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sets.get(&id).cloned())
    }

    async fn list_sets(&self, user_id: UserId) -> Result<Vec<FlashcardSet>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .sets
            .values()
            .filter(|s| s.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn delete_set(&self, id: FlashcardSetId) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        if guard.sets.remove(&id).is_none() {
            return Ok(false);
        }

        let removed: Vec<FlashcardId> = guard
            .cards
            .values()
            .filter(|c| c.set_id() == id)
            .map(Flashcard::id)
            .collect();
        for card_id in &removed {
            guard.cards.remove(card_id);
        }
        guard.logs.retain(|log| !removed.contains(&log.card_id));
        Ok(true)
    }
}

#[async_trait]
impl FlashcardRepository for InMemoryRepository {
    async fn get_card(&self, id: FlashcardId) -> Result<Flashcard, StorageError> {
        let guard = self.lock()?;
        guard.cards.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn cards_in_set(&self, set_id: FlashcardSetId) -> Result<Vec<Flashcard>, StorageError> {
        let guard = self.lock()?;
        let mut cards: Vec<Flashcard> = guard
            .cards
            .values()
            .filter(|c| c.set_id() == set_id)
            .cloned()
            .collect();
        cards.sort_by_key(Flashcard::position);
        Ok(cards)
    }

    async fn due_cards(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DueCard>, StorageError> {
        let guard = self.lock()?;
        let titles: BTreeMap<FlashcardSetId, &str> = guard
            .sets
            .values()
            .filter(|s| s.user_id() == user_id)
            .map(|s| (s.id(), s.title()))
            .collect();

        let candidates = guard.cards.values().filter_map(|card| {
            titles.get(&card.set_id()).map(|title| DueCard {
                card: card.clone(),
                set_title: (*title).to_owned(),
            })
        });

        Ok(select_due(candidates, now, limit))
    }
}

#[async_trait]
impl ReviewLogRepository for InMemoryRepository {
    async fn append_log(&self, mut log: ReviewLogRecord) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        if !guard.cards.contains_key(&log.card_id) {
            return Err(StorageError::NotFound);
        }
        let id = guard.alloc_log_id();
        log.id = Some(id);
        guard.logs.push(log);
        Ok(id)
    }

    async fn logs_for_card(
        &self,
        card_id: FlashcardId,
    ) -> Result<Vec<ReviewLogRecord>, StorageError> {
        let guard = self.lock()?;
        let mut logs: Vec<ReviewLogRecord> = guard
            .logs
            .iter()
            .filter(|l| l.card_id == card_id)
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.reviewed_at, l.id));
        Ok(logs)
    }
}

#[async_trait]
impl ReviewPersistence for InMemoryRepository {
    async fn apply_review(
        &self,
        card: &Flashcard,
        mut log: ReviewLogRecord,
    ) -> Result<i64, StorageError> {
        if log.card_id != card.id() {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;
        let stored = guard.cards.get(&card.id()).ok_or(StorageError::NotFound)?;
        if stored.review_count().checked_add(1) != Some(card.review_count()) {
            return Err(StorageError::Conflict);
        }

        guard.cards.insert(card.id(), card.clone());
        let id = guard.alloc_log_id();
        log.id = Some(id);
        guard.logs.push(log);
        Ok(id)
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sets: Arc<dyn FlashcardSetRepository>,
    pub cards: Arc<dyn FlashcardRepository>,
    pub review_logs: Arc<dyn ReviewLogRepository>,
    pub reviews: Arc<dyn ReviewPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            sets: Arc::new(repo.clone()),
            cards: Arc::new(repo.clone()),
            review_logs: Arc::new(repo.clone()),
            reviews: Arc::new(repo),
        }
    }
}
