use healtrack_core::{
    MemoryBackend, StatusCategory, TrackerService, TrackerStore, NUM_DAYS,
};
use std::sync::Arc;

fn service() -> TrackerService {
    let store = TrackerStore::open(Arc::new(MemoryBackend::new())).unwrap();
    TrackerService::new(Arc::new(store))
}

#[test]
fn select_day_returns_current_view() {
    let service = service();

    let view = service.select_day(5).unwrap();
    assert_eq!(view.day, 5);
    assert!(!view.progress.completed);
    assert!(view.journal_text.is_none());

    service.toggle_day(5);
    service.save_journal_entry(5, "walked outside");
    let view = service.select_day(5).unwrap();
    assert!(view.progress.completed);
    assert_eq!(view.journal_text.as_deref(), Some("walked outside"));
}

#[test]
fn out_of_range_days_are_rejected_everywhere() {
    let service = service();

    for bad_day in [0, NUM_DAYS + 1] {
        let selected = service.select_day(bad_day);
        assert!(selected.is_err());

        let toggled = service.toggle_day(bad_day);
        assert_eq!(toggled.category, StatusCategory::Error);

        let saved = service.save_journal_entry(bad_day, "text");
        assert_eq!(saved.category, StatusCategory::Error);

        let deleted = service.delete_journal_entry(bad_day);
        assert_eq!(deleted.category, StatusCategory::Error);
    }
}

#[test]
fn toggle_statuses_distinguish_complete_and_incomplete() {
    let service = service();

    let marked = service.toggle_day(3);
    assert_eq!(marked.category, StatusCategory::Success);
    assert!(marked.text.contains("complete"));

    let unmarked = service.toggle_day(3);
    assert_eq!(unmarked.category, StatusCategory::Success);
    assert!(unmarked.text.contains("incomplete"));
}

#[test]
fn save_without_selection_reports_error_status() {
    let service = service();

    let status = service.save_journal_entry(2, "too eager");
    assert_eq!(status.category, StatusCategory::Error);

    service.select_day(2).unwrap();
    let status = service.save_journal_entry(2, "just right");
    assert_eq!(status.category, StatusCategory::Success);
}

#[test]
fn delete_and_reset_report_success() {
    let service = service();

    service.select_day(11).unwrap();
    service.save_journal_entry(11, "short note");
    service.toggle_day(11);

    let deleted = service.delete_journal_entry(11);
    assert_eq!(deleted.category, StatusCategory::Success);

    let reset = service.reset_all();
    assert_eq!(reset.category, StatusCategory::Success);
    assert_eq!(service.get_summary().completed_count, 0);
}

#[test]
fn summary_percentage_tracks_completions() {
    let service = service();

    for n in 1..=15 {
        service.toggle_day(n);
    }

    let summary = service.get_summary();
    assert_eq!(summary.completed_count, 15);
    assert_eq!(summary.total_count, 30);
    assert!((summary.percentage - 50.0).abs() < f64::EPSILON);
}
