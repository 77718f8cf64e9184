use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::FlashcardId;

//
// ─── QUALITY ──────────────────────────────────────────────────────────────────
//

/// Caller-supplied recall rating for a review.
///
/// The nominal scale is 0..=5:
/// - 0: total failure, no recall
/// - 1: wrong, but the answer was recognised
/// - 2: wrong, but the answer felt familiar
/// - 3: correct with serious difficulty
/// - 4: correct after hesitation
/// - 5: perfect, effortless recall
///
/// Construction never rejects a value. Whether out-of-range ratings are
/// accepted, clamped or refused is decided by the scheduler's
/// [`QualityPolicy`](crate::scheduler::QualityPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(i32);

impl Quality {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 5;

    /// Ratings below this value are lapses.
    pub const PASSING: i32 = 3;

    #[must_use]
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> i32 {
        self.0
    }

    #[must_use]
    pub fn is_in_range(self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }

    #[must_use]
    pub fn clamped(self) -> Self {
        Self(self.0.clamp(Self::MIN, Self::MAX))
    }

    #[must_use]
    pub fn is_lapse(self) -> bool {
        self.0 < Self::PASSING
    }
}

impl From<i32> for Quality {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

//
// ─── REVIEW LOG ───────────────────────────────────────────────────────────────
//

/// Record of a single review and the schedule it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub card_id: FlashcardId,
    pub quality: Quality,
    pub reviewed_at: DateTime<Utc>,
    pub ease_factor: f64,
    pub interval: u32,
    pub next_review: DateTime<Utc>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
