//! Compute the bookable gaps left in published availability.
//!
//! Availability windows and active bookings are each clipped to the query window and
//! merged into sorted, non-overlapping runs; the free windows are the availability runs
//! minus the busy runs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{AvailabilitySlot, Booking, TimeWindow};

/// A free, bookable time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl FreeSlot {
    fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        }
    }
}

/// Merge overlapping or adjacent windows, clipped to `bounds`.
///
/// Returns a sorted, non-overlapping list.
pub fn merge_windows(windows: &[TimeWindow], bounds: &TimeWindow) -> Vec<TimeWindow> {
    let mut clipped: Vec<TimeWindow> = windows
        .iter()
        .filter(|w| w.overlaps(bounds))
        .map(|w| TimeWindow {
            start: w.start.max(bounds.start),
            end: w.end.min(bounds.end),
        })
        .collect();

    if clipped.is_empty() {
        return Vec::new();
    }

    clipped.sort_by_key(|w| (w.start, w.end));

    let mut merged: Vec<TimeWindow> = Vec::new();
    for w in clipped {
        if let Some(last) = merged.last_mut() {
            if w.start <= last.end {
                last.end = last.end.max(w.end);
                continue;
            }
        }
        merged.push(w);
    }

    merged
}

/// Gaps inside `bounds` not covered by `busy`.
pub fn find_free_windows(busy: &[TimeWindow], bounds: &TimeWindow) -> Vec<FreeSlot> {
    let merged = merge_windows(busy, bounds);

    let mut free = Vec::new();
    let mut cursor = bounds.start;

    for w in &merged {
        if cursor < w.start {
            free.push(FreeSlot::between(cursor, w.start));
        }
        cursor = cursor.max(w.end);
    }

    if cursor < bounds.end {
        free.push(FreeSlot::between(cursor, bounds.end));
    }

    free
}

/// Parts of the published availability inside `bounds` that no active booking occupies.
///
/// Canceled bookings are ignored.
pub fn open_windows(
    slots: &[AvailabilitySlot],
    bookings: &[Booking],
    bounds: &TimeWindow,
) -> Vec<FreeSlot> {
    let published: Vec<TimeWindow> = slots.iter().map(AvailabilitySlot::window).collect();
    let busy: Vec<TimeWindow> = bookings
        .iter()
        .filter(|b| b.status.is_active())
        .map(Booking::window)
        .collect();

    merge_windows(&published, bounds)
        .iter()
        .flat_map(|run| find_free_windows(&busy, run))
        .collect()
}
