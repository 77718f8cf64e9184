//! Application services for flashcard study: reviewing, due selection, and
//! set management over a pluggable storage backend.

#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod due_service;
pub mod error;
pub mod flashcard_set_service;
pub mod review_service;

pub use study_core::Clock;

pub use app_services::AppServices;
pub use config::{StudyConfig, normalize_sqlite_url};
pub use due_service::DueCardService;
pub use error::{
    AppServicesError, ConfigError, DueCardServiceError, FlashcardSetServiceError,
    ReviewServiceError,
};
pub use flashcard_set_service::{FlashcardSetService, SetStats};
pub use review_service::{PersistedReview, ReviewService};
