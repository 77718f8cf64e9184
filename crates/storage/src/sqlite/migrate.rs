use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies the versioned schema migrations that have not run yet.
///
/// Version 1 creates sets, cards, review logs, and their indexes. Timestamp
/// columns hold Unix microseconds.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS flashcard_sets (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                    description TEXT,
                    created_at INTEGER NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS flashcards (
                    id INTEGER PRIMARY KEY,
                    set_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    front TEXT NOT NULL,
                    back TEXT NOT NULL,
                    difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
                    ease_factor REAL NOT NULL CHECK (ease_factor >= 1.3),
                    interval_days INTEGER NOT NULL CHECK (interval_days >= 0),
                    review_count INTEGER NOT NULL CHECK (review_count >= 0),
                    last_reviewed INTEGER,
                    next_review INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    UNIQUE (set_id, position),
                    FOREIGN KEY (set_id) REFERENCES flashcard_sets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS review_logs (
                    id INTEGER PRIMARY KEY,
                    card_id INTEGER NOT NULL,
                    quality INTEGER NOT NULL,
                    reviewed_at INTEGER NOT NULL,
                    ease_factor REAL NOT NULL,
                    interval_days INTEGER NOT NULL CHECK (interval_days >= 0),
                    next_review INTEGER NOT NULL,
                    FOREIGN KEY (card_id) REFERENCES flashcards(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_flashcard_sets_user
                    ON flashcard_sets(user_id, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_flashcards_set_next_review
                    ON flashcards(set_id, next_review);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_review_logs_card_reviewed_at
                    ON review_logs(card_id, reviewed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        log::info!("applied schema migration v1");
    }

    Ok(())
}
