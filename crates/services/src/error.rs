//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::model::{FlashcardError, FlashcardSetError};
use study_core::scheduler::{QualityPolicyError, SchedulerError};

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReviewServiceError {
    /// True when the reviewed card does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound))
    }
}

/// Errors emitted by `DueCardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DueCardServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FlashcardSetService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlashcardSetServiceError {
    #[error(transparent)]
    Set(#[from] FlashcardSetError),
    #[error("card {index}: {source}")]
    Card {
        index: usize,
        #[source]
        source: FlashcardError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FlashcardSetServiceError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound))
    }
}

/// Invalid values in the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("STUDY_DB_URL cannot be empty")]
    EmptyDbUrl,
    #[error("STUDY_DUE_LIMIT must be a positive integer, got {raw:?}")]
    InvalidDueLimit { raw: String },
    #[error(transparent)]
    QualityPolicy(#[from] QualityPolicyError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
