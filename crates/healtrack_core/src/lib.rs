//! Core domain logic for HealTrack, a 30-day habit and journal tracker.
//! This crate is the single source of truth for business invariants.

pub mod cache;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use cache::{
    ActivationError, AssetCacheProxy, CacheError, CacheManifest, CacheStorage, CachedResponse,
    DiskCacheStorage, FetchError, Fetcher, InstallError, LifecycleState, ProxyError, RouteOutcome,
    ServedVia, UreqFetcher,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::day::{
    DayIndex, DayProgress, ProgressSummary, ValidationError, MAX_JOURNAL_CHARS, NUM_DAYS,
};
pub use service::tracker_service::{DayView, StatusCategory, StatusMessage, TrackerService};
pub use store::{
    MemoryBackend, SqliteBackend, StorageBackend, StorageError, StoreError, TrackerStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
