mod flashcard;
mod flashcard_set;
mod ids;
mod review;

pub use ids::{FlashcardId, FlashcardSetId, ParseIdError, UserId};

pub use flashcard::{Difficulty, DifficultyError, Flashcard, FlashcardDraft, FlashcardError};
pub use flashcard_set::{FlashcardSet, FlashcardSetError};
pub use review::{Quality, ReviewLog};
