use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Quality;

/// Ease factor every card starts with.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Lower bound on the ease factor, enforced on every update.
pub const MIN_EASE_FACTOR: f64 = 1.3;

const LAPSE_INTERVAL_DAYS: u32 = 1;
const FIRST_INTERVAL_DAYS: u32 = 1;
const SECOND_INTERVAL_DAYS: u32 = 6;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("quality must be between 0 and 5, got {provided}")]
    InvalidQuality { provided: i32 },
    #[error("next review is not representable for an interval of {interval_days} days")]
    NextReviewOutOfRange { interval_days: f64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown quality policy: {0} (expected permissive, reject or clamp)")]
pub struct QualityPolicyError(String);

//
// ─── QUALITY POLICY ────────────────────────────────────────────────────────────
//

/// What the scheduler does with a rating outside 0..=5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPolicy {
    /// Feed the raw value into the formula, however odd the result.
    #[default]
    Permissive,
    /// Refuse with `SchedulerError::InvalidQuality`.
    Reject,
    /// Clamp into 0..=5 first.
    Clamp,
}

impl QualityPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Reject => "reject",
            Self::Clamp => "clamp",
        }
    }
}

impl fmt::Display for QualityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPolicy {
    type Err = QualityPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "reject" => Ok(Self::Reject),
            "clamp" => Ok(Self::Clamp),
            other => Err(QualityPolicyError(other.to_owned())),
        }
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// The part of a card the scheduler reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub ease_factor: f64,
    /// Days between the previous two reviews; 0 before the first one.
    pub interval: u32,
    pub review_count: u32,
}

impl ReviewState {
    /// State of a card that has never been reviewed.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            ease_factor: INITIAL_EASE_FACTOR,
            interval: 0,
            review_count: 0,
        }
    }
}

impl Default for ReviewState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Result of one review: the values to write back onto the card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewOutcome {
    pub ease_factor: f64,
    pub interval: u32,
    pub review_count: u32,
    pub reviewed_at: DateTime<Utc>,
    pub next_review: DateTime<Utc>,
}

impl ReviewOutcome {
    #[must_use]
    pub fn state(&self) -> ReviewState {
        ReviewState {
            ease_factor: self.ease_factor,
            interval: self.interval,
            review_count: self.review_count,
        }
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Simplified SM-2 scheduler.
///
/// Each review is one deterministic transition:
///
/// 1. `ef' = max(1.3, ef + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)))`
/// 2. interval: a lapse (`q < 3`) resets to 1 day; otherwise the first
///    successful review gives 1 day, the second 6 days, and later ones
///    `round(interval * ef')`
/// 3. `review_count' = review_count + 1`
/// 4. `next_review = reviewed_at + interval' days`
///
/// Unlike full SM-2 there is no per-repetition matrix and a lapse does not
/// reset the review count.
///
/// # Examples
///
/// ```
/// # use study_core::scheduler::{ReviewState, Scheduler};
/// # use study_core::model::Quality;
/// let scheduler = Scheduler::new();
/// let now = study_core::time::fixed_now();
///
/// let outcome = scheduler.apply_review(&ReviewState::initial(), Quality::new(5), now)?;
/// assert_eq!(outcome.interval, 1);
/// assert_eq!(outcome.review_count, 1);
/// assert!((outcome.ease_factor - 2.6).abs() < 1e-9);
/// # Ok::<(), study_core::scheduler::SchedulerError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    policy: QualityPolicy,
}

impl Scheduler {
    /// Scheduler that accepts any quality value.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(QualityPolicy::Permissive)
    }

    #[must_use]
    pub fn with_policy(policy: QualityPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> QualityPolicy {
        self.policy
    }

    /// Apply the quality policy to a caller-supplied rating.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidQuality` under `QualityPolicy::Reject`
    /// when the value is outside 0..=5.
    pub fn resolve_quality(&self, quality: Quality) -> Result<Quality, SchedulerError> {
        match self.policy {
            QualityPolicy::Permissive => Ok(quality),
            QualityPolicy::Clamp => Ok(quality.clamped()),
            QualityPolicy::Reject if quality.is_in_range() => Ok(quality),
            QualityPolicy::Reject => Err(SchedulerError::InvalidQuality {
                provided: quality.value(),
            }),
        }
    }

    /// Compute the next state of a card reviewed at `reviewed_at`.
    ///
    /// # Errors
    ///
    /// - `InvalidQuality` if the policy refuses the rating
    /// - `NextReviewOutOfRange` if the grown interval does not fit in `u32` days
    ///   or pushes the next review past the representable calendar
    pub fn apply_review(
        &self,
        state: &ReviewState,
        quality: Quality,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ReviewOutcome, SchedulerError> {
        let quality = self.resolve_quality(quality)?;

        let ease_factor = next_ease_factor(state.ease_factor, quality);
        let interval = next_interval(state, quality, ease_factor)?;
        let next_review = reviewed_at
            .checked_add_signed(Duration::days(i64::from(interval)))
            .ok_or(SchedulerError::NextReviewOutOfRange {
                interval_days: f64::from(interval),
            })?;

        Ok(ReviewOutcome {
            ease_factor,
            interval,
            review_count: state.review_count.saturating_add(1),
            reviewed_at,
            next_review,
        })
    }
}

/// SM-2 ease update, floored at [`MIN_EASE_FACTOR`].
#[must_use]
pub fn next_ease_factor(ease_factor: f64, quality: Quality) -> f64 {
    // f64 so that extreme ratings cannot overflow the subtraction.
    let miss = f64::from(Quality::MAX) - f64::from(quality.value());
    let updated = ease_factor + (0.1 - miss * (0.08 + miss * 0.02));
    updated.max(MIN_EASE_FACTOR)
}

/// Interval in days after a review, given the already-updated ease factor.
///
/// # Errors
///
/// Returns `SchedulerError::NextReviewOutOfRange` if the compounded interval
/// exceeds `u32::MAX` days.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn next_interval(
    state: &ReviewState,
    quality: Quality,
    new_ease_factor: f64,
) -> Result<u32, SchedulerError> {
    if quality.is_lapse() {
        return Ok(LAPSE_INTERVAL_DAYS);
    }

    match state.review_count {
        0 => Ok(FIRST_INTERVAL_DAYS),
        1 => Ok(SECOND_INTERVAL_DAYS),
        _ => {
            let grown = (f64::from(state.interval) * new_ease_factor).round();
            if grown > f64::from(u32::MAX) {
                return Err(SchedulerError::NextReviewOutOfRange {
                    interval_days: grown,
                });
            }
            // in range and non-negative: interval >= 0 and ease >= 1.3
            Ok(grown as u32)
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    const EPS: f64 = 1e-9;

    fn state(ease_factor: f64, interval: u32, review_count: u32) -> ReviewState {
        ReviewState {
            ease_factor,
            interval,
            review_count,
        }
    }

    fn review(s: &ReviewState, q: i32) -> ReviewOutcome {
        Scheduler::new()
            .apply_review(s, Quality::new(q), fixed_now())
            .unwrap()
    }

    #[test]
    fn new_card_perfect_recall() {
        let out = review(&ReviewState::initial(), 5);
        assert!((out.ease_factor - 2.6).abs() < EPS);
        assert_eq!(out.interval, 1);
        assert_eq!(out.review_count, 1);
    }

    #[test]
    fn second_review_quality_four_keeps_ease() {
        let out = review(&state(2.6, 1, 1), 4);
        assert!((out.ease_factor - 2.6).abs() < EPS);
        assert_eq!(out.interval, 6);
        assert_eq!(out.review_count, 2);
    }

    #[test]
    fn third_review_compounds_with_new_ease() {
        let out = review(&state(2.6, 6, 2), 5);
        assert!((out.ease_factor - 2.7).abs() < EPS);
        assert_eq!(out.interval, 16);
        assert_eq!(out.review_count, 3);
    }

    #[test]
    fn lapse_after_long_interval_resets_to_one_day() {
        let out = review(&state(2.7, 16, 3), 1);
        assert_eq!(out.interval, 1);
        assert!((out.ease_factor - 2.16).abs() < EPS);
        assert_eq!(out.review_count, 4);
    }

    #[test]
    fn full_history_matches_worked_example() {
        let s0 = ReviewState::initial();
        let o1 = review(&s0, 5);
        let o2 = review(&o1.state(), 4);
        let o3 = review(&o2.state(), 5);
        let o4 = review(&o3.state(), 1);

        assert_eq!(
            [o1.interval, o2.interval, o3.interval, o4.interval],
            [1, 6, 16, 1]
        );
        assert!((o4.ease_factor - 2.16).abs() < EPS);
        assert_eq!(o4.review_count, 4);
    }

    #[test]
    fn ease_never_drops_below_floor() {
        for q in -10..=15 {
            for ef in [1.3, 1.31, 1.5, 2.5, 4.0] {
                for n in 0..4 {
                    let out = review(&state(ef, 10, n), q);
                    assert!(
                        out.ease_factor >= MIN_EASE_FACTOR,
                        "q={q} ef={ef} n={n} -> {}",
                        out.ease_factor
                    );
                }
            }
        }
    }

    #[test]
    fn repeated_failures_pin_ease_at_floor() {
        let mut s = ReviewState::initial();
        for _ in 0..20 {
            s = review(&s, 0).state();
        }
        assert!((s.ease_factor - MIN_EASE_FACTOR).abs() < EPS);
        assert_eq!(s.interval, 1);
        assert_eq!(s.review_count, 20);
    }

    #[test]
    fn lapse_always_resets_interval() {
        for q in [-3, 0, 1, 2] {
            for n in [0, 1, 2, 7, 40] {
                for interval in [0, 1, 6, 16, 300] {
                    let out = review(&state(2.5, interval, n), q);
                    assert_eq!(out.interval, 1, "q={q} n={n} interval={interval}");
                }
            }
        }
    }

    #[test]
    fn bootstrap_intervals_for_first_two_successes() {
        for q in 3..=5 {
            assert_eq!(review(&state(2.5, 0, 0), q).interval, 1);
            assert_eq!(review(&state(2.5, 40, 0), q).interval, 1);
            assert_eq!(review(&state(2.5, 1, 1), q).interval, 6);
            assert_eq!(review(&state(1.3, 90, 1), q).interval, 6);
        }
    }

    #[test]
    fn later_successes_multiply_by_updated_ease() {
        for q in 3..=5 {
            for n in [2, 3, 10] {
                for interval in [1, 6, 15, 100] {
                    for ef in [1.3, 2.0, 2.5, 3.1] {
                        let s = state(ef, interval, n);
                        let out = review(&s, q);
                        let expected_ef = next_ease_factor(ef, Quality::new(q));
                        let expected = (f64::from(interval) * expected_ef).round();
                        assert!((out.ease_factor - expected_ef).abs() < EPS);
                        assert_eq!(f64::from(out.interval), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn review_count_and_next_review_are_consistent() {
        for q in -1..=6 {
            for n in 0..5 {
                let s = state(2.5, 4, n);
                let out = review(&s, q);
                assert_eq!(out.review_count, n + 1);
                assert_eq!(out.reviewed_at, fixed_now());
                assert_eq!(
                    out.next_review,
                    out.reviewed_at + Duration::days(i64::from(out.interval))
                );
            }
        }
    }

    #[test]
    fn permissive_policy_extrapolates_out_of_range() {
        let out = review(&state(2.5, 0, 0), 6);
        // miss = -1: 0.1 - (-1)(0.08 - 0.02) = 0.16
        assert!((out.ease_factor - 2.66).abs() < EPS);
        assert_eq!(out.interval, 1);
    }

    #[test]
    fn permissive_policy_survives_extreme_ratings() {
        let low = review(&state(2.5, 30, 5), i32::MIN);
        assert!((low.ease_factor - MIN_EASE_FACTOR).abs() < EPS);
        assert_eq!(low.interval, 1);

        // far above 5 the quadratic term dominates and the ease collapses too
        let high = review(&state(2.5, 0, 0), i32::MAX);
        assert!((high.ease_factor - MIN_EASE_FACTOR).abs() < EPS);
        assert_eq!(high.interval, 1);

        // 7 is the most generous rating the formula allows: +0.18
        let peak = review(&state(2.5, 0, 0), 7);
        assert!((peak.ease_factor - 2.68).abs() < EPS);
    }

    #[test]
    fn huge_compounded_interval_is_reported() {
        let err = Scheduler::new()
            .apply_review(&state(2.5, u32::MAX / 2, 5), Quality::new(5), fixed_now())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NextReviewOutOfRange { .. }));
    }

    #[test]
    fn reject_policy_refuses_out_of_range() {
        let s = Scheduler::with_policy(QualityPolicy::Reject);
        let err = s
            .apply_review(&ReviewState::initial(), Quality::new(7), fixed_now())
            .unwrap_err();
        assert_eq!(err, SchedulerError::InvalidQuality { provided: 7 });

        let err = s
            .apply_review(&ReviewState::initial(), Quality::new(-1), fixed_now())
            .unwrap_err();
        assert_eq!(err, SchedulerError::InvalidQuality { provided: -1 });

        assert!(
            s.apply_review(&ReviewState::initial(), Quality::new(0), fixed_now())
                .is_ok()
        );
    }

    #[test]
    fn clamp_policy_matches_boundary_ratings() {
        let clamp = Scheduler::with_policy(QualityPolicy::Clamp);
        let st = state(2.5, 6, 2);

        let high = clamp
            .apply_review(&st, Quality::new(11), fixed_now())
            .unwrap();
        assert_eq!(high, review(&st, 5));

        let low = clamp
            .apply_review(&st, Quality::new(-8), fixed_now())
            .unwrap();
        assert_eq!(low, review(&st, 0));
    }

    #[test]
    fn quality_policy_parses() {
        assert_eq!(
            "Reject".parse::<QualityPolicy>().unwrap(),
            QualityPolicy::Reject
        );
        assert_eq!(
            "clamp".parse::<QualityPolicy>().unwrap(),
            QualityPolicy::Clamp
        );
        assert!("strict".parse::<QualityPolicy>().is_err());
        assert_eq!(QualityPolicy::default(), QualityPolicy::Permissive);
        assert_eq!(QualityPolicy::Permissive.to_string(), "permissive");
    }
}
