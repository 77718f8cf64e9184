use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use storage::repository::{
    FlashcardRepository, ReviewLogRecord, ReviewLogRepository, ReviewPersistence,
};
use study_core::{
    model::{Flashcard, FlashcardId, Quality, ReviewLog},
    scheduler::{ReviewOutcome, Scheduler},
    time::Clock,
};

use crate::error::ReviewServiceError;

/// Result of a persisted review: updated card, applied outcome, and log ID.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedReview {
    pub card: Flashcard,
    pub log_id: i64,
    pub outcome: ReviewOutcome,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Coordinates applying a user's rating to a card and persisting the result.
#[derive(Clone)]
pub struct ReviewService {
    clock: Clock,
    scheduler: Scheduler,
    cards: Arc<dyn FlashcardRepository>,
    reviews: Arc<dyn ReviewPersistence>,
    review_logs: Arc<dyn ReviewLogRepository>,
}

impl ReviewService {
    #[must_use]
    pub fn new(
        clock: Clock,
        cards: Arc<dyn FlashcardRepository>,
        reviews: Arc<dyn ReviewPersistence>,
        review_logs: Arc<dyn ReviewLogRepository>,
    ) -> Self {
        Self {
            clock,
            scheduler: Scheduler::new(),
            cards,
            reviews,
            review_logs,
        }
    }

    /// Replace the default permissive scheduler.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Apply a rating to an in-memory card without touching storage.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Scheduler` if the quality policy refuses the
    /// rating or the next review date is out of range; the card is unchanged then.
    pub fn review_card(
        &self,
        card: &mut Flashcard,
        quality: Quality,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ReviewOutcome, ReviewServiceError> {
        let outcome = self
            .scheduler
            .apply_review(&card.review_state(), quality, reviewed_at)?;
        card.apply_review(&outcome);
        Ok(outcome)
    }

    /// Apply a rating to an in-memory card and persist the update + log atomically.
    ///
    /// If persistence fails, the card is rolled back to its original state.
    ///
    /// # Errors
    ///
    /// Returns scheduler errors for refused ratings or unrepresentable dates.
    /// Returns storage errors if persistence fails.
    pub async fn review_card_persisted(
        &self,
        card: &mut Flashcard,
        quality: Quality,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(ReviewOutcome, i64), ReviewServiceError> {
        let original = card.clone();

        let outcome = self.review_card(card, quality, reviewed_at)?;
        let record = ReviewLogRecord::from_outcome(card.id(), quality, &outcome);

        match self.reviews.apply_review(card, record).await {
            Ok(id) => Ok((outcome, id)),
            Err(err) => {
                *card = original;
                Err(err.into())
            }
        }
    }

    /// Load a card, rate it at the service clock, and persist card and log atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (see [`ReviewServiceError::is_not_found`])
    /// if the card is missing; nothing is written in that case.
    /// Returns scheduler errors for refused ratings or unrepresentable dates.
    /// Returns storage errors if persistence fails.
    pub async fn record_review(
        &self,
        card_id: FlashcardId,
        quality: Quality,
    ) -> Result<PersistedReview, ReviewServiceError> {
        let mut card = self.cards.get_card(card_id).await.inspect_err(|err| {
            log::warn!("review of card {card_id} failed to load: {err}");
        })?;

        let reviewed_at = self.now();
        let (outcome, log_id) = self
            .review_card_persisted(&mut card, quality, reviewed_at)
            .await?;

        log::info!(
            "recorded review card={card_id} quality={} interval={} next_review={}",
            quality.value(),
            outcome.interval,
            outcome.next_review
        );

        Ok(PersistedReview {
            card,
            log_id,
            outcome,
        })
    }

    /// Review log of a card, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` if repository access fails.
    pub async fn history(
        &self,
        card_id: FlashcardId,
    ) -> Result<Vec<ReviewLog>, ReviewServiceError> {
        let logs = self.review_logs.logs_for_card(card_id).await?;
        Ok(logs.iter().map(ReviewLogRecord::to_log).collect())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use storage::repository::{
        FlashcardSetRepository, InMemoryRepository, NewFlashcardRecord, NewFlashcardSetRecord,
        StorageError,
    };
    use study_core::model::{FlashcardDraft, UserId};
    use study_core::scheduler::{QualityPolicy, SchedulerError};
    use study_core::time::fixed_now;

    async fn seeded_repo() -> (InMemoryRepository, FlashcardId) {
        let repo = InMemoryRepository::new();
        let set_id = repo
            .insert_set(
                NewFlashcardSetRecord {
                    user_id: UserId::new(1),
                    title: "Math".into(),
                    description: None,
                    created_at: fixed_now(),
                },
                vec![NewFlashcardRecord::from_draft(
                    FlashcardDraft::new("What is 2+2?", "4"),
                    fixed_now(),
                )],
            )
            .await
            .unwrap();
        let card_id = repo.cards_in_set(set_id).await.unwrap()[0].id();
        (repo, card_id)
    }

    fn service(repo: &InMemoryRepository, clock: Clock) -> ReviewService {
        ReviewService::new(
            clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn record_review_follows_the_worked_example() {
        let (repo, card_id) = seeded_repo().await;
        let mut clock = Clock::fixed(fixed_now());

        let first = service(&repo, clock)
            .record_review(card_id, Quality::new(5))
            .await
            .unwrap();
        assert!((first.card.ease_factor() - 2.6).abs() < 1e-9);
        assert_eq!(first.card.interval(), 1);
        assert_eq!(first.card.review_count(), 1);

        clock.advance(Duration::days(1));
        let second = service(&repo, clock)
            .record_review(card_id, Quality::new(4))
            .await
            .unwrap();
        assert!((second.card.ease_factor() - 2.6).abs() < 1e-9);
        assert_eq!(second.card.interval(), 6);

        clock.advance(Duration::days(6));
        let third = service(&repo, clock)
            .record_review(card_id, Quality::new(5))
            .await
            .unwrap();
        assert!((third.card.ease_factor() - 2.7).abs() < 1e-9);
        assert_eq!(third.card.interval(), 16);
        assert_eq!(third.card.next_review(), clock.now() + Duration::days(16));

        clock.advance(Duration::days(16));
        let lapse = service(&repo, clock)
            .record_review(card_id, Quality::new(1))
            .await
            .unwrap();
        assert!((lapse.card.ease_factor() - 2.16).abs() < 1e-9);
        assert_eq!(lapse.card.interval(), 1);
        assert_eq!(lapse.card.review_count(), 4);

        let history = service(&repo, clock).history(card_id).await.unwrap();
        let qualities: Vec<i32> = history.iter().map(|l| l.quality.value()).collect();
        assert_eq!(qualities, vec![5, 4, 5, 1]);
        assert_eq!(history[3].next_review, lapse.card.next_review());
    }

    #[tokio::test]
    async fn record_review_unknown_card_is_not_found() {
        let (repo, card_id) = seeded_repo().await;
        let err = service(&repo, Clock::fixed(fixed_now()))
            .record_review(FlashcardId::new(999), Quality::new(4))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let untouched = repo.get_card(card_id).await.unwrap();
        assert!(untouched.is_new());
        assert!(repo.logs_for_card(card_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reject_policy_refuses_out_of_range_without_writing() {
        let (repo, card_id) = seeded_repo().await;
        let svc = service(&repo, Clock::fixed(fixed_now()))
            .with_scheduler(Scheduler::with_policy(QualityPolicy::Reject));

        let err = svc.record_review(card_id, Quality::new(9)).await.unwrap_err();
        assert!(matches!(
            err,
            ReviewServiceError::Scheduler(SchedulerError::InvalidQuality { provided: 9 })
        ));
        assert!(!err.is_not_found());
        assert!(repo.get_card(card_id).await.unwrap().is_new());
    }

    struct FailingPersistence;

    #[async_trait]
    impl ReviewPersistence for FailingPersistence {
        async fn apply_review(
            &self,
            _card: &Flashcard,
            _log: ReviewLogRecord,
        ) -> Result<i64, StorageError> {
            Err(StorageError::Connection("disk unplugged".into()))
        }
    }

    #[tokio::test]
    async fn failed_persist_rolls_back_in_memory_card() {
        let (repo, card_id) = seeded_repo().await;
        let svc = ReviewService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(FailingPersistence),
            Arc::new(repo.clone()),
        );

        let mut card = repo.get_card(card_id).await.unwrap();
        let before = card.clone();
        let err = svc
            .review_card_persisted(&mut card, Quality::new(5), fixed_now())
            .await
            .unwrap_err();

        assert!(matches!(err, ReviewServiceError::Storage(StorageError::Connection(_))));
        assert_eq!(card, before);
    }

    #[test]
    fn review_card_is_pure_over_the_card() {
        let mut card = Flashcard::new(
            FlashcardId::new(1),
            study_core::model::FlashcardSetId::new(1),
            0,
            FlashcardDraft::new("Q", "A"),
            fixed_now(),
        )
        .unwrap();
        let repo = InMemoryRepository::new();
        let svc = service(&repo, Clock::fixed(fixed_now()));

        let outcome = svc
            .review_card(&mut card, Quality::new(3), svc.now())
            .unwrap();
        assert_eq!(outcome.review_count, 1);
        assert_eq!(card.last_reviewed(), Some(fixed_now()));
        assert_eq!(card.next_review(), fixed_now() + Duration::days(1));
    }
}
