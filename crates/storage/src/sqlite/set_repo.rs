use study_core::model::{FlashcardDraft, FlashcardSet, FlashcardSetId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_set_row, micros, ser, set_id_from_i64};
use crate::repository::{
    FlashcardSetRepository, NewFlashcardRecord, NewFlashcardSetRecord, StorageError,
};

#[async_trait::async_trait]
impl FlashcardSetRepository for SqliteRepository {
    async fn insert_set(
        &self,
        set: NewFlashcardSetRecord,
        cards: Vec<NewFlashcardRecord>,
    ) -> Result<FlashcardSetId, StorageError> {
        // Validate with the placeholder id before opening the transaction.
        let set = FlashcardSet::new(
            FlashcardSetId::new(0),
            set.user_id,
            set.title,
            set.description,
            set.created_at,
        )
        .map_err(ser)?;
        let mut drafts = Vec::with_capacity(cards.len());
        for card in cards {
            let created_at = card.created_at;
            let draft = FlashcardDraft::new(card.front, card.back)
                .with_difficulty(card.difficulty)
                .validate()
                .map_err(ser)?;
            drafts.push((draft, created_at));
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO flashcard_sets (user_id, title, description, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("user_id", set.user_id().value())?)
        .bind(set.title())
        .bind(set.description())
        .bind(micros(set.created_at()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let set_id = res.last_insert_rowid();

        for (position, (draft, created_at)) in drafts.into_iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO flashcards (
                    set_id, position, front, back, difficulty,
                    ease_factor, interval_days, review_count,
                    last_reviewed, next_review, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, NULL, ?7, ?7)
                ",
            )
            .bind(set_id)
            .bind(position)
            .bind(draft.front)
            .bind(draft.back)
            .bind(draft.difficulty.as_str())
            .bind(study_core::scheduler::INITIAL_EASE_FACTOR)
            .bind(micros(created_at))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        set_id_from_i64(set_id)
    }

    async fn get_set(&self, id: FlashcardSetId) -> Result<Option<FlashcardSet>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, description, created_at
            FROM flashcard_sets WHERE id = ?1
            ",
        )
        .bind(id_i64("set_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_set_row).transpose()
    }

    async fn list_sets(&self, user_id: UserId) -> Result<Vec<FlashcardSet>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, description, created_at
            FROM flashcard_sets
            WHERE user_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_set_row).collect()
    }

    async fn delete_set(&self, id: FlashcardSetId) -> Result<bool, StorageError> {
        // Cards and their logs go with the set via ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM flashcard_sets WHERE id = ?1")
            .bind(id_i64("set_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        Ok(res.rows_affected() > 0)
    }
}
