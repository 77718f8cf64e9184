use chrono::{DateTime, Utc};
use study_core::due::DueCard;
use study_core::model::{Flashcard, FlashcardId, FlashcardSetId, UserId};

use super::SqliteRepository;
use super::mapping::{CARD_COLUMNS, conn, id_i64, map_card_row, map_due_row, micros};
use crate::repository::{FlashcardRepository, StorageError};

#[async_trait::async_trait]
impl FlashcardRepository for SqliteRepository {
    async fn get_card(&self, id: FlashcardId) -> Result<Flashcard, StorageError> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM flashcards c WHERE c.id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("card_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_card_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn cards_in_set(&self, set_id: FlashcardSetId) -> Result<Vec<Flashcard>, StorageError> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM flashcards c WHERE c.set_id = ?1 ORDER BY c.position ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("set_id", set_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_card_row).collect()
    }

    async fn due_cards(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DueCard>, StorageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            r"
            SELECT {CARD_COLUMNS}, s.title AS set_title
            FROM flashcards c
            JOIN flashcard_sets s ON s.id = c.set_id
            WHERE s.user_id = ?1
              AND c.next_review <= ?2
            ORDER BY c.next_review ASC, c.id ASC
            LIMIT ?3
            "
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(micros(now))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_due_row).collect()
    }
}
