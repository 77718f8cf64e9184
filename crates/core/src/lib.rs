//! Domain model and spaced-repetition scheduling for flashcard study.
//!
//! Nothing in this crate performs I/O: the scheduler is a pure transition over
//! a card's review state, and due selection works over whatever candidates the
//! caller hands it.

#![forbid(unsafe_code)]

pub mod due;
pub mod model;
pub mod scheduler;
pub mod time;

pub use due::{DEFAULT_DUE_LIMIT, DueCard, select_due};
pub use time::Clock;
