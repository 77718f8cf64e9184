use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{FlashcardSetId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlashcardSetError {
    #[error("set title cannot be empty")]
    EmptyTitle,
}

/// A user-owned, titled collection of flashcards.
///
/// The title doubles as the display name attached to due cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardSet {
    id: FlashcardSetId,
    user_id: UserId,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl FlashcardSet {
    /// Creates a set, trimming the title and dropping a blank description.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardSetError::EmptyTitle` if the title is empty or whitespace-only.
    pub fn new(
        id: FlashcardSetId,
        user_id: UserId,
        title: impl Into<String>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, FlashcardSetError> {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return Err(FlashcardSetError::EmptyTitle);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            user_id,
            title: title.to_owned(),
            description,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> FlashcardSetId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Same set under a storage-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: FlashcardSetId) -> Self {
        self.id = id;
        self
    }
}
