//! Selection of cards whose review date has arrived.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::Flashcard;

/// Number of due cards handed out when the caller does not ask for a size.
pub const DEFAULT_DUE_LIMIT: u32 = 10;

/// A due card annotated with its set's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueCard {
    #[serde(flatten)]
    pub card: Flashcard,
    pub set_title: String,
}

/// Keep the candidates with `next_review <= now`, most overdue first, at most `limit`.
///
/// Equal `next_review` timestamps fall back to ascending card id so the order
/// is reproducible across storage backends.
#[must_use]
pub fn select_due<I>(candidates: I, now: DateTime<Utc>, limit: u32) -> Vec<DueCard>
where
    I: IntoIterator<Item = DueCard>,
{
    let mut due: Vec<DueCard> = candidates
        .into_iter()
        .filter(|c| c.card.is_due(now))
        .collect();

    due.sort_by(|a, b| {
        a.card
            .next_review()
            .cmp(&b.card.next_review())
            .then_with(|| a.card.id().cmp(&b.card.id()))
    });
    due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FlashcardDraft, FlashcardId, FlashcardSetId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn due_card(id: u64, set: u64, next_review: DateTime<Utc>) -> DueCard {
        let card = Flashcard::new(
            FlashcardId::new(id),
            FlashcardSetId::new(set),
            0,
            FlashcardDraft::new(format!("Q{id}"), format!("A{id}")),
            next_review,
        )
        .unwrap();
        DueCard {
            card,
            set_title: format!("Set {set}"),
        }
    }

    #[test]
    fn excludes_future_cards() {
        let now = fixed_now();
        let picked = select_due(
            vec![
                due_card(1, 1, now + Duration::seconds(1)),
                due_card(2, 1, now),
                due_card(3, 1, now - Duration::days(2)),
            ],
            now,
            DEFAULT_DUE_LIMIT,
        );

        let ids: Vec<u64> = picked.iter().map(|d| d.card.id().value()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(picked.iter().all(|d| d.card.next_review() <= now));
    }

    #[test]
    fn orders_across_sets_and_truncates() {
        let now = fixed_now();
        let mut candidates = Vec::new();
        for i in 0..15_u64 {
            let set = if i % 2 == 0 { 1 } else { 2 };
            candidates.push(due_card(i + 1, set, now - Duration::hours(i64::try_from(i).unwrap())));
        }

        let picked = select_due(candidates, now, 10);
        assert_eq!(picked.len(), 10);
        for pair in picked.windows(2) {
            assert!(pair[0].card.next_review() <= pair[1].card.next_review());
        }
        assert_eq!(picked[0].card.id(), FlashcardId::new(15));
        assert_eq!(picked[0].set_title, "Set 1");
    }

    #[test]
    fn truncation_keeps_most_overdue_cards_of_any_set() {
        let now = fixed_now();
        let mut candidates: Vec<DueCard> = (1..=3)
            .map(|id| due_card(id, 1, now - Duration::hours(1)))
            .collect();
        candidates.extend((4..=6).map(|id| due_card(id, 2, now - Duration::days(3))));

        let picked = select_due(candidates, now, 3);
        let ids: Vec<u64> = picked.iter().map(|d| d.card.id().value()).collect();
        assert_eq!(ids, vec![4, 5, 6]);
        assert!(picked.iter().all(|d| d.set_title == "Set 2"));
    }

    #[test]
    fn ties_break_by_card_id() {
        let now = fixed_now();
        let at = now - Duration::minutes(5);
        let picked = select_due(
            vec![due_card(9, 2, at), due_card(4, 1, at), due_card(6, 1, at)],
            now,
            10,
        );
        let ids: Vec<u64> = picked.iter().map(|d| d.card.id().value()).collect();
        assert_eq!(ids, vec![4, 6, 9]);
    }

    #[test]
    fn zero_limit_and_empty_input() {
        let now = fixed_now();
        assert!(select_due(vec![due_card(1, 1, now)], now, 0).is_empty());
        assert!(select_due(Vec::new(), now, 10).is_empty());
    }
}
