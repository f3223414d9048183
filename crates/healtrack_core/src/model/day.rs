//! Day-indexed tracker model.
//!
//! # Responsibility
//! - Define the fixed 1..=30 day domain and its validated index type.
//! - Define the per-day progress record and derived summary shape.
//!
//! # Invariants
//! - A `DayIndex` can only hold a value in `[1, NUM_DAYS]`.
//! - Journal text never exceeds `MAX_JOURNAL_CHARS` characters after trim.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed length of the tracker calendar.
pub const NUM_DAYS: u8 = 30;

/// Maximum journal entry length in characters, counted after trimming.
pub const MAX_JOURNAL_CHARS: usize = 1000;

/// Validation failures for tracker inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Day number outside `[1, NUM_DAYS]`.
    OutOfRange(u8),
    /// Journal text longer than `MAX_JOURNAL_CHARS` after trimming.
    TooLong { length: usize, max: usize },
    /// A journal operation was issued without a matching day selection.
    NoDaySelected,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange(value) => {
                write!(f, "day {value} is outside the tracker range 1..={NUM_DAYS}")
            }
            Self::TooLong { length, max } => {
                write!(f, "journal entry has {length} characters, limit is {max}")
            }
            Self::NoDaySelected => write!(f, "no day is selected for this journal operation"),
        }
    }
}

impl Error for ValidationError {}

/// Validated index into the fixed 30-day calendar.
///
/// Kept as a newtype so out-of-range values are unrepresentable past the
/// construction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayIndex(u8);

impl DayIndex {
    /// Creates a day index, rejecting values outside `[1, NUM_DAYS]`.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (1..=NUM_DAYS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::OutOfRange(value))
        }
    }

    /// Returns the underlying day number in `[1, NUM_DAYS]`.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Returns the durable storage key for this day (`day1`..`day30`).
    ///
    /// The `dayN` shape is the external wire format of both stored mappings
    /// and must stay stable across releases.
    pub fn storage_key(self) -> String {
        format!("day{}", self.0)
    }

    /// Parses a `dayN` storage key back into a day index.
    ///
    /// Returns `None` for any key that does not name a valid tracker day,
    /// which the load path treats as corrupt stored data.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        let number = key.strip_prefix("day")?.parse::<u8>().ok()?;
        Self::new(number).ok()
    }

    /// Iterates every day of the calendar in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=NUM_DAYS).map(Self)
    }
}

impl Display for DayIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-day completion record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayProgress {
    pub completed: bool,
}

/// Derived completion summary over the whole calendar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub completed_count: u32,
    pub total_count: u32,
    pub percentage: f64,
}
