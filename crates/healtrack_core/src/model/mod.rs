//! Domain model for the 30-day tracker.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep day-index validation in one place.
//!
//! # Invariants
//! - Every tracker object is keyed by a validated [`day::DayIndex`].
//! - Journal text is bounded by [`day::MAX_JOURNAL_CHARS`].

pub mod day;
