use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{FlashcardId, FlashcardSetId};
use crate::scheduler::{MIN_EASE_FACTOR, ReviewOutcome, ReviewState};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum FlashcardError {
    #[error("card front cannot be empty")]
    EmptyFront,

    #[error("card back cannot be empty")]
    EmptyBack,

    #[error("invalid persisted card state: {0}")]
    InvalidPersistedState(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown difficulty label: {0}")]
pub struct DifficultyError(String);

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Author-assigned difficulty label. Informational only; scheduling ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = DifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(DifficultyError(other.to_owned())),
        }
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Card content as supplied when a set is created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl FlashcardDraft {
    #[must_use]
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            difficulty: Difficulty::default(),
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Ensure both sides carry text.
    ///
    /// # Errors
    ///
    /// Returns `EmptyFront` / `EmptyBack` for blank sides.
    pub fn validate(self) -> Result<Self, FlashcardError> {
        if self.front.trim().is_empty() {
            return Err(FlashcardError::EmptyFront);
        }
        if self.back.trim().is_empty() {
            return Err(FlashcardError::EmptyBack);
        }
        Ok(self)
    }
}

//
// ─── FLASHCARD ─────────────────────────────────────────────────────────────────
//

/// A single flashcard with its spaced-repetition state.
///
/// Only [`Flashcard::apply_review`] mutates the schedule, so the invariants
/// established by the scheduler (ease floor, `next_review == last_reviewed +
/// interval days`) hold for every card that came out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flashcard {
    id: FlashcardId,
    set_id: FlashcardSetId,
    position: u32,
    front: String,
    back: String,
    difficulty: Difficulty,
    ease_factor: f64,
    interval: u32,
    review_count: u32,
    last_reviewed: Option<DateTime<Utc>>,
    next_review: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Flashcard {
    /// A never-reviewed card, due immediately at `created_at`.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError` if the draft has a blank side.
    pub fn new(
        id: FlashcardId,
        set_id: FlashcardSetId,
        position: u32,
        draft: FlashcardDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Self, FlashcardError> {
        let draft = draft.validate()?;
        let state = ReviewState::initial();
        Ok(Self {
            id,
            set_id,
            position,
            front: draft.front,
            back: draft.back,
            difficulty: draft.difficulty,
            ease_factor: state.ease_factor,
            interval: state.interval,
            review_count: state.review_count,
            last_reviewed: None,
            next_review: created_at,
            created_at,
        })
    }

    /// Rehydrate a card from storage.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError` if the content is blank, the ease factor is below
    /// the floor or not finite, or a reviewed card has no `last_reviewed`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: FlashcardId,
        set_id: FlashcardSetId,
        position: u32,
        draft: FlashcardDraft,
        state: ReviewState,
        last_reviewed: Option<DateTime<Utc>>,
        next_review: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, FlashcardError> {
        let draft = draft.validate()?;

        if !state.ease_factor.is_finite() || state.ease_factor < MIN_EASE_FACTOR {
            return Err(FlashcardError::InvalidPersistedState(format!(
                "ease factor {} below floor {MIN_EASE_FACTOR}",
                state.ease_factor
            )));
        }
        if state.review_count > 0 && last_reviewed.is_none() {
            return Err(FlashcardError::InvalidPersistedState(
                "reviewed card without last_reviewed".into(),
            ));
        }

        Ok(Self {
            id,
            set_id,
            position,
            front: draft.front,
            back: draft.back,
            difficulty: draft.difficulty,
            ease_factor: state.ease_factor,
            interval: state.interval,
            review_count: state.review_count,
            last_reviewed,
            next_review,
            created_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> FlashcardId {
        self.id
    }

    #[must_use]
    pub fn set_id(&self) -> FlashcardSetId {
        self.set_id
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn front(&self) -> &str {
        &self.front
    }

    #[must_use]
    pub fn back(&self) -> &str {
        &self.back
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn ease_factor(&self) -> f64 {
        self.ease_factor
    }

    #[must_use]
    pub fn interval(&self) -> u32 {
        self.interval
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    #[must_use]
    pub fn last_reviewed(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed
    }

    #[must_use]
    pub fn next_review(&self) -> DateTime<Utc> {
        self.next_review
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The scheduler-facing slice of this card.
    #[must_use]
    pub fn review_state(&self) -> ReviewState {
        ReviewState {
            ease_factor: self.ease_factor,
            interval: self.interval,
            review_count: self.review_count,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.review_count == 0
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }

    /// Overwrite the schedule with a scheduler outcome.
    pub fn apply_review(&mut self, outcome: &ReviewOutcome) {
        self.ease_factor = outcome.ease_factor;
        self.interval = outcome.interval;
        self.review_count = outcome.review_count;
        self.last_reviewed = Some(outcome.reviewed_at);
        self.next_review = outcome.next_review;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Quality;
    use crate::scheduler::{INITIAL_EASE_FACTOR, Scheduler};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn build_card() -> Flashcard {
        Flashcard::new(
            FlashcardId::new(1),
            FlashcardSetId::new(1),
            0,
            FlashcardDraft::new("mitochondria", "powerhouse of the cell"),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn new_card_defaults() {
        let card = build_card();
        assert_eq!(card.ease_factor(), INITIAL_EASE_FACTOR);
        assert_eq!(card.interval(), 0);
        assert_eq!(card.review_count(), 0);
        assert_eq!(card.last_reviewed(), None);
        assert_eq!(card.next_review(), fixed_now());
        assert_eq!(card.difficulty(), Difficulty::Medium);
        assert!(card.is_new());
        assert!(card.is_due(fixed_now()));
    }

    #[test]
    fn draft_rejects_blank_sides() {
        assert_eq!(
            FlashcardDraft::new(" ", "b").validate().unwrap_err(),
            FlashcardError::EmptyFront
        );
        assert_eq!(
            FlashcardDraft::new("a", "\n").validate().unwrap_err(),
            FlashcardError::EmptyBack
        );
    }

    #[test]
    fn difficulty_parses_labels() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!("brutal".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Medium.to_string(), "medium");
    }

    #[test]
    fn apply_review_moves_schedule() {
        let mut card = build_card();
        let outcome = Scheduler::new()
            .apply_review(&card.review_state(), Quality::new(5), fixed_now())
            .unwrap();
        card.apply_review(&outcome);

        assert_eq!(card.review_count(), 1);
        assert_eq!(card.interval(), 1);
        assert_eq!(card.last_reviewed(), Some(fixed_now()));
        assert_eq!(card.next_review(), fixed_now() + Duration::days(1));
        assert!(!card.is_due(fixed_now()));
        assert!(card.is_due(fixed_now() + Duration::days(1)));
    }

    #[test]
    fn from_persisted_rejects_ease_below_floor() {
        let err = Flashcard::from_persisted(
            FlashcardId::new(1),
            FlashcardSetId::new(1),
            0,
            FlashcardDraft::new("q", "a"),
            ReviewState {
                ease_factor: 1.0,
                interval: 3,
                review_count: 2,
            },
            Some(fixed_now()),
            fixed_now(),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidPersistedState(_)));
    }

    #[test]
    fn from_persisted_requires_last_reviewed_for_reviewed_cards() {
        let err = Flashcard::from_persisted(
            FlashcardId::new(1),
            FlashcardSetId::new(1),
            0,
            FlashcardDraft::new("q", "a"),
            ReviewState {
                ease_factor: 2.5,
                interval: 1,
                review_count: 1,
            },
            None,
            fixed_now(),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidPersistedState(_)));
    }
}
