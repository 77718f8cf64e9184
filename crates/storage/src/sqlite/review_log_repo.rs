use study_core::model::{Flashcard, FlashcardId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_review_log_row, micros};
use crate::repository::{ReviewLogRecord, ReviewLogRepository, ReviewPersistence, StorageError};

const INSERT_LOG: &str = r"
    INSERT INTO review_logs (
        card_id, quality, reviewed_at, ease_factor, interval_days, next_review
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";

async fn card_exists<'e, E>(executor: E, card_id: i64) -> Result<bool, StorageError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row = sqlx::query("SELECT 1 FROM flashcards WHERE id = ?1")
        .bind(card_id)
        .fetch_optional(executor)
        .await
        .map_err(conn)?;
    Ok(row.is_some())
}

#[async_trait::async_trait]
impl ReviewLogRepository for SqliteRepository {
    async fn append_log(&self, log: ReviewLogRecord) -> Result<i64, StorageError> {
        let card_id = id_i64("card_id", log.card_id.value())?;
        if !card_exists(&self.pool, card_id).await? {
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(INSERT_LOG)
            .bind(card_id)
            .bind(i64::from(log.quality.value()))
            .bind(micros(log.reviewed_at))
            .bind(log.ease_factor)
            .bind(i64::from(log.interval))
            .bind(micros(log.next_review))
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn logs_for_card(
        &self,
        card_id: FlashcardId,
    ) -> Result<Vec<ReviewLogRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, card_id, quality, reviewed_at, ease_factor, interval_days, next_review
                FROM review_logs
                WHERE card_id = ?1
                ORDER BY reviewed_at ASC, id ASC
            ",
        )
        .bind(id_i64("card_id", card_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_review_log_row).collect()
    }
}

#[async_trait::async_trait]
impl ReviewPersistence for SqliteRepository {
    async fn apply_review(
        &self,
        card: &Flashcard,
        log: ReviewLogRecord,
    ) -> Result<i64, StorageError> {
        if log.card_id != card.id() {
            return Err(StorageError::Conflict);
        }
        let Some(previous_count) = card.review_count().checked_sub(1) else {
            return Err(StorageError::Conflict);
        };

        let card_id = id_i64("card_id", card.id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let updated = sqlx::query(
            r"
            UPDATE flashcards SET
                ease_factor = ?1,
                interval_days = ?2,
                review_count = ?3,
                last_reviewed = ?4,
                next_review = ?5
            WHERE id = ?6 AND review_count = ?7
            ",
        )
        .bind(card.ease_factor())
        .bind(i64::from(card.interval()))
        .bind(i64::from(card.review_count()))
        .bind(card.last_reviewed().map(micros))
        .bind(micros(card.next_review()))
        .bind(card_id)
        .bind(i64::from(previous_count))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if updated.rows_affected() == 0 {
            let exists = card_exists(&mut *tx, card_id).await?;
            tx.rollback().await.map_err(conn)?;
            return Err(if exists {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        let res = sqlx::query(INSERT_LOG)
            .bind(card_id)
            .bind(i64::from(log.quality.value()))
            .bind(micros(log.reviewed_at))
            .bind(log.ease_factor)
            .bind(i64::from(log.interval))
            .bind(micros(log.next_review))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        Ok(res.last_insert_rowid())
    }
}
