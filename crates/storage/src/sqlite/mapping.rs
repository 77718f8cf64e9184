use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use study_core::due::DueCard;
use study_core::model::{
    Difficulty, Flashcard, FlashcardDraft, FlashcardId, FlashcardSet, FlashcardSetId, Quality,
    UserId,
};
use study_core::scheduler::ReviewState;

use crate::repository::{ReviewLogRecord, StorageError};

pub(crate) const CARD_COLUMNS: &str = "c.id, c.set_id, c.position, c.front, c.back, c.difficulty, \
     c.ease_factor, c.interval_days, c.review_count, c.last_reviewed, c.next_review, c.created_at";

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Timestamps are stored as Unix microseconds so SQL compares them numerically.
pub(crate) fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(field: &'static str, v: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(v)
        .ok_or_else(|| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn time_from_row(row: &SqliteRow, field: &'static str) -> Result<DateTime<Utc>, StorageError> {
    from_micros(field, row.try_get(field).map_err(ser)?)
}

fn opt_time_from_row(
    row: &SqliteRow,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    row.try_get::<Option<i64>, _>(field)
        .map_err(ser)?
        .map(|v| from_micros(field, v))
        .transpose()
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn set_id_from_i64(v: i64) -> Result<FlashcardSetId, StorageError> {
    Ok(FlashcardSetId::new(i64_to_u64("set_id", v)?))
}

pub(crate) fn card_id_from_i64(v: i64) -> Result<FlashcardId, StorageError> {
    Ok(FlashcardId::new(i64_to_u64("card_id", v)?))
}

pub(crate) fn map_set_row(row: &SqliteRow) -> Result<FlashcardSet, StorageError> {
    FlashcardSet::new(
        set_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        UserId::new(i64_to_u64(
            "user_id",
            row.try_get::<i64, _>("user_id").map_err(ser)?,
        )?),
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        time_from_row(row, "created_at")?,
    )
    .map_err(ser)
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<Flashcard, StorageError> {
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let draft = FlashcardDraft::new(
        row.try_get::<String, _>("front").map_err(ser)?,
        row.try_get::<String, _>("back").map_err(ser)?,
    )
    .with_difficulty(difficulty);

    let state = ReviewState {
        ease_factor: row.try_get("ease_factor").map_err(ser)?,
        interval: i64_to_u32(
            "interval_days",
            row.try_get::<i64, _>("interval_days").map_err(ser)?,
        )?,
        review_count: i64_to_u32(
            "review_count",
            row.try_get::<i64, _>("review_count").map_err(ser)?,
        )?,
    };

    Flashcard::from_persisted(
        card_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        set_id_from_i64(row.try_get::<i64, _>("set_id").map_err(ser)?)?,
        i64_to_u32("position", row.try_get::<i64, _>("position").map_err(ser)?)?,
        draft,
        state,
        opt_time_from_row(row, "last_reviewed")?,
        time_from_row(row, "next_review")?,
        time_from_row(row, "created_at")?,
    )
    .map_err(ser)
}

/// Card columns plus the owning set's `set_title`.
pub(crate) fn map_due_row(row: &SqliteRow) -> Result<DueCard, StorageError> {
    Ok(DueCard {
        card: map_card_row(row)?,
        set_title: row.try_get("set_title").map_err(ser)?,
    })
}

pub(crate) fn map_review_log_row(row: &SqliteRow) -> Result<ReviewLogRecord, StorageError> {
    let quality: i64 = row.try_get("quality").map_err(ser)?;
    let quality = i32::try_from(quality)
        .map_err(|_| StorageError::Serialization(format!("invalid quality: {quality}")))?;

    Ok(ReviewLogRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        card_id: card_id_from_i64(row.try_get::<i64, _>("card_id").map_err(ser)?)?,
        quality: Quality::new(quality),
        reviewed_at: time_from_row(row, "reviewed_at")?,
        ease_factor: row.try_get("ease_factor").map_err(ser)?,
        interval: i64_to_u32(
            "interval_days",
            row.try_get::<i64, _>("interval_days").map_err(ser)?,
        )?,
        next_review: time_from_row(row, "next_review")?,
    })
}
