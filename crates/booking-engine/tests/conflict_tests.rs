//! Tests for half-open overlap detection.

use booking_engine::conflict::{find_conflicts, first_conflict, overlaps, self_overlaps};
use booking_engine::TimeWindow;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

/// Helper to create a window from hour ranges on a given day.
fn window(day: u32, start_hour: u32, start_min: u32, end_hour: u32, end_min: u32) -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2026, 3, day, start_hour, start_min, 0)
            .unwrap(),
        Utc.with_ymd_and_hms(2026, 3, day, end_hour, end_min, 0)
            .unwrap(),
    )
    .unwrap()
}

fn keyed(windows: &[TimeWindow]) -> Vec<(Uuid, TimeWindow)> {
    windows.iter().map(|w| (Uuid::new_v4(), *w)).collect()
}

#[test]
fn two_overlapping_windows_detected() {
    // A: 09:00-10:00, B: 09:30-10:30 → 30-min overlap
    let a = vec![window(1, 9, 0, 10, 0)];
    let b = vec![window(1, 9, 30, 10, 30)];

    let conflicts = find_conflicts(&a, &b);

    assert_eq!(conflicts.len(), 1, "should detect exactly one conflict");
    assert_eq!(conflicts[0].overlap_minutes, 30);
}

#[test]
fn adjacent_windows_not_a_conflict() {
    // A ends exactly when B starts
    let existing = keyed(&[window(1, 9, 0, 9, 30)]);
    let candidate = window(1, 9, 30, 10, 0);

    assert!(
        !overlaps(&candidate, &existing, None),
        "adjacent windows (end == start) should not be conflicts"
    );
}

#[test]
fn candidate_ending_at_existing_start_is_free() {
    let existing = keyed(&[window(1, 10, 0, 11, 0)]);
    let candidate = window(1, 9, 0, 10, 0);
    assert!(!overlaps(&candidate, &existing, None));
}

#[test]
fn fully_contained_candidate_conflicts() {
    let existing = keyed(&[window(1, 9, 0, 12, 0)]);
    let candidate = window(1, 10, 0, 11, 0);
    assert!(overlaps(&candidate, &existing, None));
}

#[test]
fn enclosing_candidate_conflicts() {
    let existing = keyed(&[window(1, 10, 0, 11, 0)]);
    let candidate = window(1, 9, 0, 12, 0);
    assert!(overlaps(&candidate, &existing, None));
}

#[test]
fn excluded_entry_is_ignored() {
    let existing = keyed(&[window(1, 9, 0, 10, 0)]);
    let own_id = existing[0].0;
    let candidate = window(1, 9, 15, 10, 15);

    assert!(overlaps(&candidate, &existing, None));
    assert!(
        !overlaps(&candidate, &existing, Some(own_id)),
        "an entry must not conflict with itself"
    );
}

#[test]
fn first_conflict_returns_the_overlapping_entry() {
    let existing = keyed(&[
        window(1, 8, 0, 9, 0),
        window(1, 9, 30, 10, 30),
        window(1, 11, 0, 12, 0),
    ]);
    let candidate = window(1, 9, 0, 10, 0);

    let hit = first_conflict(&candidate, &existing, None).expect("should conflict");
    assert_eq!(hit.0, existing[1].0);
}

#[test]
fn multiple_conflicts_all_found() {
    let a = vec![window(1, 9, 0, 10, 0), window(1, 14, 0, 15, 0)];
    let b = vec![window(1, 9, 30, 10, 30), window(1, 14, 30, 15, 30)];

    let conflicts = find_conflicts(&a, &b);

    assert_eq!(conflicts.len(), 2, "should find both conflicts");
    assert_eq!(conflicts[0].overlap_minutes, 30);
    assert_eq!(conflicts[1].overlap_minutes, 30);
}

#[test]
fn empty_existing_set_never_conflicts() {
    let existing: Vec<(Uuid, TimeWindow)> = Vec::new();
    assert!(!overlaps(&window(1, 9, 0, 10, 0), &existing, None));
    assert!(find_conflicts(&[], &[]).is_empty());
}

#[test]
fn self_overlaps_reports_colliding_pairs() {
    let windows = vec![
        window(1, 9, 0, 10, 0),
        window(1, 10, 0, 11, 0),
        window(1, 10, 30, 11, 30),
    ];
    assert_eq!(self_overlaps(&windows), vec![(1, 2)]);
}

#[test]
fn window_rejects_empty_and_inverted_intervals() {
    let t = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    assert!(TimeWindow::new(t, t).is_err());
    assert!(TimeWindow::new(t, t - chrono::Duration::minutes(5)).is_err());
    assert!(TimeWindow::starting_at(t, 0).is_err());
}
