//! Core types and error handling for the Mentora knowledge retrieval core
//!
//! Everything the storage and plugin crates share lives here: the
//! [`MentoraError`] enum with its `Result` alias, the domain types (concepts,
//! paths, ranked documents, request context), query bounds, and logging
//! setup.

#![warn(clippy::all)]

pub mod error;
pub mod telemetry;
pub mod types;

pub use error::{MentoraError, Result};
