//! Tracker store: progress/journal state and reconciliation rules.
//!
//! # Responsibility
//! - Materialize both durable mappings into memory at open time.
//! - Expose safe mutation operations that persist whole mappings.
//!
//! # Invariants
//! - Every day in `1..=NUM_DAYS` has a progress entry once the store is open.
//! - An absent journal entry is distinct from an empty-string entry.
//! - Corrupt stored blobs are recovered as absent, never propagated upward.
//! - A journal save never interleaves with another in-flight save.

use crate::model::day::{DayIndex, DayProgress, ProgressSummary, ValidationError, MAX_JOURNAL_CHARS, NUM_DAYS};
use crate::store::backend::StorageBackend;
use crate::store::{StoreError, StoreResult};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Durable key holding the serialized progress mapping.
pub const PROGRESS_KEY: &str = "progress";
/// Durable key holding the serialized journal mapping.
pub const JOURNAL_KEY: &str = "journal";

/// Outcome of decoding one stored blob.
///
/// `Corrupt` is handled identically to `Absent` by the load path; the tag
/// exists so the recovery is an explicit decision rather than a silent guess.
#[derive(Debug, PartialEq, Eq)]
pub enum LoadState<T> {
    Valid(T),
    Absent,
    Corrupt,
}

struct TrackerState {
    progress: BTreeMap<DayIndex, DayProgress>,
    journal: BTreeMap<DayIndex, String>,
    selected: Option<DayIndex>,
}

/// Persistence store for the 30-day tracker.
///
/// Owns both mappings exclusively; callers observe copies and issue mutation
/// requests. Methods take `&self` so one store instance can sit behind an
/// `Arc` shared with the presentation layer.
pub struct TrackerStore {
    backend: Arc<dyn StorageBackend>,
    state: Mutex<TrackerState>,
    save_in_flight: AtomicBool,
}

impl TrackerStore {
    /// Opens the store over a backend, applying the initialization rules.
    ///
    /// # Contract
    /// - Progress absent or corrupt: all days initialized to incomplete and
    ///   persisted immediately.
    /// - Journal absent or corrupt: empty mapping, not eagerly persisted.
    pub fn open(backend: Arc<dyn StorageBackend>) -> StoreResult<Self> {
        let progress = match decode_progress(backend.read(PROGRESS_KEY)?) {
            LoadState::Valid(map) => map,
            LoadState::Absent => {
                let fresh = fresh_progress();
                backend.write(PROGRESS_KEY, &encode_progress(&fresh)?)?;
                info!("event=store_open module=store status=ok progress=initialized");
                fresh
            }
            LoadState::Corrupt => {
                warn!("event=store_load module=store status=recovered key={PROGRESS_KEY} reason=corrupt");
                let fresh = fresh_progress();
                backend.write(PROGRESS_KEY, &encode_progress(&fresh)?)?;
                fresh
            }
        };

        let journal = match decode_journal(backend.read(JOURNAL_KEY)?) {
            LoadState::Valid(map) => map,
            LoadState::Absent => BTreeMap::new(),
            LoadState::Corrupt => {
                warn!("event=store_load module=store status=recovered key={JOURNAL_KEY} reason=corrupt");
                BTreeMap::new()
            }
        };

        info!(
            "event=store_open module=store status=ok progress_entries={} journal_entries={}",
            progress.len(),
            journal.len()
        );

        Ok(Self {
            backend,
            state: Mutex::new(TrackerState {
                progress,
                journal,
                selected: None,
            }),
            save_in_flight: AtomicBool::new(false),
        })
    }

    /// Selects a day for journaling. Selection is transient and never
    /// persisted.
    pub fn select_day(&self, day: DayIndex) {
        self.lock_state().selected = Some(day);
    }

    /// Returns the currently selected day, if any.
    pub fn selected_day(&self) -> Option<DayIndex> {
        self.lock_state().selected
    }

    /// Flips the completion flag for a day and persists the full mapping.
    ///
    /// Not idempotent by design: two toggles cancel out.
    pub fn toggle_completion(&self, day: DayIndex) -> StoreResult<DayProgress> {
        let blob;
        let updated;
        {
            let mut state = self.lock_state();
            let entry = state.progress.entry(day).or_default();
            entry.completed = !entry.completed;
            updated = *entry;
            blob = encode_progress(&state.progress)?;
        }
        self.backend.write(PROGRESS_KEY, &blob)?;
        info!(
            "event=toggle module=store status=ok day={day} completed={}",
            updated.completed
        );
        Ok(updated)
    }

    /// Saves the journal entry for the selected day.
    ///
    /// # Contract
    /// - `day` must equal the current selection, else `NoDaySelected`.
    /// - Text is trimmed, then rejected as `TooLong` past the limit.
    /// - An empty trimmed string is written as-is; it is a real entry, not a
    ///   delete.
    /// - A save invoked while another is in flight fails with `SaveInFlight`.
    pub fn save_journal(&self, day: DayIndex, text: &str) -> StoreResult<()> {
        let _flight = SaveFlight::acquire(&self.save_in_flight)?;

        let blob;
        {
            let mut state = self.lock_state();
            if state.selected != Some(day) {
                return Err(ValidationError::NoDaySelected.into());
            }

            let trimmed = text.trim();
            let length = trimmed.chars().count();
            if length > MAX_JOURNAL_CHARS {
                return Err(ValidationError::TooLong {
                    length,
                    max: MAX_JOURNAL_CHARS,
                }
                .into());
            }

            state.journal.insert(day, trimmed.to_string());
            blob = encode_journal(&state.journal)?;
        }
        self.backend.write(JOURNAL_KEY, &blob)?;
        info!("event=journal_save module=store status=ok day={day}");
        Ok(())
    }

    /// Removes a day's journal entry entirely and persists.
    ///
    /// Distinct from saving an empty string: after delete no key exists for
    /// the day.
    pub fn delete_journal(&self, day: DayIndex) -> StoreResult<()> {
        let blob;
        {
            let mut state = self.lock_state();
            state.journal.remove(&day);
            blob = encode_journal(&state.journal)?;
        }
        self.backend.write(JOURNAL_KEY, &blob)?;
        info!("event=journal_delete module=store status=ok day={day}");
        Ok(())
    }

    /// Replaces both mappings with freshly initialized state and persists.
    ///
    /// Destructive and irreversible; the caller confirms user intent before
    /// invoking. Also clears the day selection.
    pub fn reset_all(&self) -> StoreResult<()> {
        let progress_blob;
        let journal_blob;
        {
            let mut state = self.lock_state();
            state.progress = fresh_progress();
            state.journal.clear();
            state.selected = None;
            progress_blob = encode_progress(&state.progress)?;
            journal_blob = encode_journal(&state.journal)?;
        }
        self.backend.write(PROGRESS_KEY, &progress_blob)?;
        self.backend.write(JOURNAL_KEY, &journal_blob)?;
        info!("event=reset module=store status=ok");
        Ok(())
    }

    /// Returns the progress record for a day.
    pub fn progress(&self, day: DayIndex) -> DayProgress {
        self.lock_state()
            .progress
            .get(&day)
            .copied()
            .unwrap_or_default()
    }

    /// Returns the journal text for a day, or `None` when no entry exists.
    pub fn journal_text(&self, day: DayIndex) -> Option<String> {
        self.lock_state().journal.get(&day).cloned()
    }

    /// Computes the derived completion summary. Pure read, no side effects.
    pub fn summary(&self) -> ProgressSummary {
        let state = self.lock_state();
        let completed_count = state
            .progress
            .values()
            .filter(|entry| entry.completed)
            .count() as u32;
        let total_count = u32::from(NUM_DAYS);
        ProgressSummary {
            completed_count,
            total_count,
            percentage: f64::from(completed_count) * 100.0 / f64::from(total_count),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        // The mutex only guards short in-memory sections that cannot panic
        // mid-update; recover the guard rather than poison-cascade.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// RAII flag for the single-flight journal save guard.
struct SaveFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SaveFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> StoreResult<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            warn!("event=journal_save module=store status=rejected reason=save_in_flight");
            return Err(StoreError::SaveInFlight);
        }
        Ok(Self { flag })
    }
}

impl Drop for SaveFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn fresh_progress() -> BTreeMap<DayIndex, DayProgress> {
    DayIndex::all()
        .map(|day| (day, DayProgress::default()))
        .collect()
}

/// Decodes the stored progress blob into the explicit load states.
///
/// Unknown or out-of-range `dayN` keys mark the whole blob corrupt. Valid
/// blobs missing some days are filled in-memory with incomplete entries;
/// the fill is persisted on the next write.
pub fn decode_progress(blob: Option<String>) -> LoadState<BTreeMap<DayIndex, DayProgress>> {
    let Some(raw) = blob else {
        return LoadState::Absent;
    };
    let parsed: BTreeMap<String, DayProgress> = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(_) => return LoadState::Corrupt,
    };

    let mut map = BTreeMap::new();
    for (key, entry) in parsed {
        let Some(day) = DayIndex::from_storage_key(&key) else {
            return LoadState::Corrupt;
        };
        map.insert(day, entry);
    }
    for day in DayIndex::all() {
        map.entry(day).or_default();
    }
    LoadState::Valid(map)
}

/// Decodes the stored journal blob into the explicit load states.
pub fn decode_journal(blob: Option<String>) -> LoadState<BTreeMap<DayIndex, String>> {
    let Some(raw) = blob else {
        return LoadState::Absent;
    };
    let parsed: BTreeMap<String, String> = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(_) => return LoadState::Corrupt,
    };

    let mut map = BTreeMap::new();
    for (key, text) in parsed {
        let Some(day) = DayIndex::from_storage_key(&key) else {
            return LoadState::Corrupt;
        };
        map.insert(day, text);
    }
    LoadState::Valid(map)
}

fn encode_progress(map: &BTreeMap<DayIndex, DayProgress>) -> StoreResult<String> {
    let wire: BTreeMap<String, &DayProgress> = map
        .iter()
        .map(|(day, entry)| (day.storage_key(), entry))
        .collect();
    serde_json::to_string(&wire)
        .map_err(|err| StoreError::Persistence(super::StorageError::Backend(err.to_string())))
}

fn encode_journal(map: &BTreeMap<DayIndex, String>) -> StoreResult<String> {
    let wire: BTreeMap<String, &str> = map
        .iter()
        .map(|(day, text)| (day.storage_key(), text.as_str()))
        .collect();
    serde_json::to_string(&wire)
        .map_err(|err| StoreError::Persistence(super::StorageError::Backend(err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::{decode_journal, decode_progress, LoadState};
    use crate::model::day::{DayIndex, NUM_DAYS};

    #[test]
    fn decode_progress_absent_and_corrupt() {
        assert_eq!(decode_progress(None), LoadState::Absent);
        assert_eq!(
            decode_progress(Some("not json".to_string())),
            LoadState::Corrupt
        );
        assert_eq!(
            decode_progress(Some("{\"day99\":{\"completed\":true}}".to_string())),
            LoadState::Corrupt
        );
    }

    #[test]
    fn decode_progress_fills_missing_days() {
        let decoded = decode_progress(Some("{\"day2\":{\"completed\":true}}".to_string()));
        let LoadState::Valid(map) = decoded else {
            panic!("expected valid progress");
        };
        assert_eq!(map.len(), usize::from(NUM_DAYS));
        assert!(map[&DayIndex::new(2).unwrap()].completed);
        assert!(!map[&DayIndex::new(1).unwrap()].completed);
    }

    #[test]
    fn decode_journal_rejects_bad_day_keys() {
        assert_eq!(
            decode_journal(Some("{\"banana\":\"text\"}".to_string())),
            LoadState::Corrupt
        );
        let decoded = decode_journal(Some("{\"day4\":\"slept well\"}".to_string()));
        let LoadState::Valid(map) = decoded else {
            panic!("expected valid journal");
        };
        assert_eq!(
            map.get(&DayIndex::new(4).unwrap()).map(String::as_str),
            Some("slept well")
        );
    }
}
