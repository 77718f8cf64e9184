//! Persistence for flashcard sets, cards, and review logs.
//!
//! [`repository`] defines the contracts and an in-memory backend; [`sqlite`]
//! provides the durable one.

#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;
