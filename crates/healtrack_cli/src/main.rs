//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `healtrack_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use healtrack_core::{MemoryBackend, TrackerStore};
use std::sync::Arc;

fn main() {
    println!("healtrack_core version={}", healtrack_core::core_version());

    // Probe the store over a throwaway backend to validate core wiring.
    match TrackerStore::open(Arc::new(MemoryBackend::new())) {
        Ok(store) => {
            let summary = store.summary();
            println!(
                "healtrack_core store=ok days={} completed={}",
                summary.total_count, summary.completed_count
            );
        }
        Err(err) => {
            eprintln!("healtrack_core store=error {err}");
            std::process::exit(1);
        }
    }
}
