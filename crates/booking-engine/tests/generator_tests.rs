//! Tests for availability expansion.

use booking_engine::model::{ProfessionalId, Service, ServiceId};
use booking_engine::{RecurrenceKind, SchedulingError, SlotGenerator, TimeWindow};
use chrono::{TimeZone, Utc};

fn service(minutes: u32) -> Service {
    Service {
        id: ServiceId::new(),
        professional_id: ProfessionalId::new(),
        name: "Massage".to_string(),
        duration_minutes: minutes,
        price_cents: 8000,
        active: true,
    }
}

fn collect(
    kind: RecurrenceKind,
    start: chrono::DateTime<Utc>,
    until: Option<chrono::DateTime<Utc>>,
    minutes: u32,
) -> Vec<TimeWindow> {
    SlotGenerator::default()
        .generate(&service(minutes), start, kind, until)
        .expect("should expand")
        .collect()
}

#[test]
fn weekly_until_inclusive_boundary_yields_four() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 1, 22, 9, 0, 0).unwrap();

    let windows = collect(RecurrenceKind::Weekly, start, Some(until), 45);

    assert_eq!(windows.len(), 4);
    let days: Vec<u32> = windows
        .iter()
        .map(|w| chrono::Datelike::day(&w.start))
        .collect();
    assert_eq!(days, vec![1, 8, 15, 22]);
    for w in &windows {
        assert_eq!(w.duration_minutes(), 45, "each window has the service length");
    }
}

#[test]
fn weekly_until_at_midnight_stops_before_the_last_morning() {
    // The 22nd at 09:00 is after 2024-01-22T00:00, so it is not produced.
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 1, 22, 0, 0, 0).unwrap();

    let windows = collect(RecurrenceKind::Weekly, start, Some(until), 30);
    assert_eq!(windows.len(), 3);
}

#[test]
fn daily_covers_each_day() {
    let start = Utc.with_ymd_and_hms(2024, 2, 27, 14, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 3, 2, 14, 0, 0).unwrap();

    let windows = collect(RecurrenceKind::Daily, start, Some(until), 60);

    // Feb 27, 28, 29 (leap year), Mar 1, Mar 2
    assert_eq!(windows.len(), 5);
    assert_eq!(
        windows[2].start,
        Utc.with_ymd_and_hms(2024, 2, 29, 14, 0, 0).unwrap()
    );
}

#[test]
fn monthly_advances_from_the_clamped_occurrence() {
    let start = Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 4, 30, 23, 0, 0).unwrap();

    let windows = collect(RecurrenceKind::Monthly, start, Some(until), 30);

    let starts: Vec<_> = windows.iter().map(|w| w.start).collect();
    assert_eq!(
        starts,
        vec![
            Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 29, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 29, 10, 0, 0).unwrap(),
        ]
    );
}

#[test]
fn monthly_in_non_leap_february_clamps_to_28th() {
    let start = Utc.with_ymd_and_hms(2025, 1, 30, 8, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2025, 2, 28, 23, 0, 0).unwrap();

    let windows = collect(RecurrenceKind::Monthly, start, Some(until), 30);
    assert_eq!(windows.len(), 2);
    assert_eq!(
        windows[1].start,
        Utc.with_ymd_and_hms(2025, 2, 28, 8, 0, 0).unwrap()
    );
}

#[test]
fn repeating_kind_without_end_date_is_rejected() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    for kind in [
        RecurrenceKind::Daily,
        RecurrenceKind::Weekly,
        RecurrenceKind::Monthly,
    ] {
        let err = SlotGenerator::default()
            .generate(&service(30), start, kind, None)
            .unwrap_err();
        assert!(
            matches!(err, SchedulingError::Validation(_)),
            "{kind} without end date: {err:?}"
        );
    }
}

#[test]
fn end_date_before_start_is_rejected() {
    let start = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let err = SlotGenerator::default()
        .generate(&service(30), start, RecurrenceKind::Daily, Some(until))
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[test]
fn zero_length_service_is_rejected() {
    let start = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
    let err = SlotGenerator::default()
        .generate(&service(0), start, RecurrenceKind::None, None)
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[test]
fn series_longer_than_cap_is_rejected() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap();

    // 11 daily occurrences against a cap of 10.
    let err = SlotGenerator::new(10)
        .generate(&service(30), start, RecurrenceKind::Daily, Some(until))
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));

    let ok = SlotGenerator::new(11)
        .generate(&service(30), start, RecurrenceKind::Daily, Some(until))
        .unwrap();
    assert_eq!(ok.count(), 11);
}

#[test]
fn rule_expansion_with_byday() {
    // Tuesdays and Thursdays starting Tue 2026-03-03, for two weeks.
    let start = Utc.with_ymd_and_hms(2026, 3, 3, 15, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2026, 3, 13, 0, 0, 0).unwrap();

    let windows = SlotGenerator::default()
        .generate_rule(&service(60), start, "FREQ=WEEKLY;BYDAY=TU,TH", Some(until))
        .expect("should expand");

    let days: Vec<u32> = windows
        .iter()
        .map(|w| chrono::Datelike::day(&w.start))
        .collect();
    assert_eq!(days, vec![3, 5, 10, 12]);
    assert!(windows.iter().all(|w| w.duration_minutes() == 60));
}

#[test]
fn rule_with_count_needs_no_end_date() {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let windows = SlotGenerator::default()
        .generate_rule(&service(30), start, "FREQ=DAILY;COUNT=3", None)
        .expect("should expand");
    assert_eq!(windows.len(), 3);
}

#[test]
fn unbounded_rule_is_rejected() {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let err = SlotGenerator::default()
        .generate_rule(&service(30), start, "FREQ=DAILY", None)
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[test]
fn garbage_rule_is_rejected() {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let err = SlotGenerator::default()
        .generate_rule(&service(30), start, "NOT_A_RULE", None)
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));

    let err = SlotGenerator::default()
        .generate_rule(&service(30), start, "", None)
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}
