//! Detect overlapping intervals between a candidate and already-scheduled entries.
//!
//! Everything here is pure: callers pre-fetch the professional's availability or
//! active bookings and pass them in. Adjacent intervals (one ends exactly when the
//! other starts) are NOT conflicts.

use serde::Serialize;
use uuid::Uuid;

use crate::model::{AvailabilitySlot, Booking, TimeWindow};

/// Anything that occupies a time window and can be excluded by id.
pub trait Scheduled {
    fn key(&self) -> Uuid;
    fn window(&self) -> TimeWindow;
}

impl Scheduled for AvailabilitySlot {
    fn key(&self) -> Uuid {
        self.id.0
    }

    fn window(&self) -> TimeWindow {
        AvailabilitySlot::window(self)
    }
}

impl Scheduled for Booking {
    fn key(&self) -> Uuid {
        self.id.0
    }

    fn window(&self) -> TimeWindow {
        Booking::window(self)
    }
}

impl Scheduled for (Uuid, TimeWindow) {
    fn key(&self) -> Uuid {
        self.0
    }

    fn window(&self) -> TimeWindow {
        self.1
    }
}

/// Does `candidate` overlap any entry of `existing`, ignoring the entry keyed `exclude`?
///
/// Two intervals overlap iff `candidate.start < other.end && candidate.end > other.start`.
pub fn overlaps<T: Scheduled>(candidate: &TimeWindow, existing: &[T], exclude: Option<Uuid>) -> bool {
    first_conflict(candidate, existing, exclude).is_some()
}

/// The first entry of `existing` that overlaps `candidate`, if any.
pub fn first_conflict<'a, T: Scheduled>(
    candidate: &TimeWindow,
    existing: &'a [T],
    exclude: Option<Uuid>,
) -> Option<&'a T> {
    existing
        .iter()
        .filter(|entry| Some(entry.key()) != exclude)
        .find(|entry| candidate.overlaps(&entry.window()))
}

/// A detected overlap between two windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub window_a: TimeWindow,
    pub window_b: TimeWindow,
    pub overlap_minutes: i64,
}

/// Find all pairwise conflicts between two window lists.
///
/// The overlap duration is `min(a.end, b.end) - max(a.start, b.start)`.
pub fn find_conflicts(windows_a: &[TimeWindow], windows_b: &[TimeWindow]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for a in windows_a {
        for b in windows_b {
            if a.overlaps(b) {
                let overlap_start = a.start.max(b.start);
                let overlap_end = a.end.min(b.end);

                conflicts.push(Conflict {
                    window_a: *a,
                    window_b: *b,
                    overlap_minutes: (overlap_end - overlap_start).num_minutes(),
                });
            }
        }
    }

    conflicts
}

/// Pairs of indices within `windows` that overlap each other.
///
/// Used to reject a generated batch whose occurrences collide among themselves
/// (e.g. a daily series of a 25-hour service).
pub fn self_overlaps(windows: &[TimeWindow]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, a) in windows.iter().enumerate() {
        for (j, b) in windows.iter().enumerate().skip(i + 1) {
            if a.overlaps(b) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}
