//! Tracker use-case service.
//!
//! # Responsibility
//! - Validate raw day numbers at the presentation boundary.
//! - Translate store outcomes into human-readable status messages.
//!
//! # Invariants
//! - Success and error statuses are always distinguishable by category.
//! - The service never bypasses store validation or persistence contracts.

use crate::model::day::{DayIndex, DayProgress, ProgressSummary};
use crate::store::TrackerStore;
use std::fmt::Display;
use std::sync::Arc;

/// Status category for transient UI messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Success,
    Error,
}

/// Human-readable outcome of a tracker operation.
///
/// Exact wording is not load-bearing; the category is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub category: StatusCategory,
    pub text: String,
}

impl StatusMessage {
    fn success(text: impl Into<String>) -> Self {
        Self {
            category: StatusCategory::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Display) -> Self {
        Self {
            category: StatusCategory::Error,
            text: text.to_string(),
        }
    }
}

/// Snapshot of one day handed to the presentation layer on selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub day: u8,
    pub progress: DayProgress,
    /// `None` means no entry exists; renders as empty but is not persisted.
    pub journal_text: Option<String>,
}

/// Presentation-facing wrapper over the tracker store.
pub struct TrackerService {
    store: Arc<TrackerStore>,
}

impl TrackerService {
    pub fn new(store: Arc<TrackerStore>) -> Self {
        Self { store }
    }

    /// Selects a day and returns its current view.
    pub fn select_day(&self, day_number: u8) -> Result<DayView, StatusMessage> {
        let day = DayIndex::new(day_number).map_err(StatusMessage::error)?;
        self.store.select_day(day);
        Ok(DayView {
            day: day.get(),
            progress: self.store.progress(day),
            journal_text: self.store.journal_text(day),
        })
    }

    /// Toggles a day's completion flag.
    pub fn toggle_day(&self, day_number: u8) -> StatusMessage {
        let day = match DayIndex::new(day_number) {
            Ok(day) => day,
            Err(err) => return StatusMessage::error(err),
        };
        match self.store.toggle_completion(day) {
            Ok(progress) if progress.completed => {
                StatusMessage::success(format!("Day {day} marked complete"))
            }
            Ok(_) => StatusMessage::success(format!("Day {day} marked incomplete, keep going")),
            Err(err) => StatusMessage::error(err),
        }
    }

    /// Saves the journal entry for a day.
    pub fn save_journal_entry(&self, day_number: u8, text: &str) -> StatusMessage {
        let day = match DayIndex::new(day_number) {
            Ok(day) => day,
            Err(err) => return StatusMessage::error(err),
        };
        match self.store.save_journal(day, text) {
            Ok(()) => StatusMessage::success(format!("Journal for day {day} saved")),
            Err(err) => StatusMessage::error(err),
        }
    }

    /// Deletes a day's journal entry.
    pub fn delete_journal_entry(&self, day_number: u8) -> StatusMessage {
        let day = match DayIndex::new(day_number) {
            Ok(day) => day,
            Err(err) => return StatusMessage::error(err),
        };
        match self.store.delete_journal(day) {
            Ok(()) => StatusMessage::success(format!("Journal for day {day} deleted")),
            Err(err) => StatusMessage::error(err),
        }
    }

    /// Resets all progress and journal data. The caller confirms user intent
    /// before invoking; this service does not ask twice.
    pub fn reset_all(&self) -> StatusMessage {
        match self.store.reset_all() {
            Ok(()) => StatusMessage::success("Tracker reset, all 30 days cleared"),
            Err(err) => StatusMessage::error(err),
        }
    }

    /// Returns the derived completion summary.
    pub fn get_summary(&self) -> ProgressSummary {
        self.store.summary()
    }
}
