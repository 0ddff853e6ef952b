//! Typed booking events passed from the lifecycle manager to the notification dispatcher.
//!
//! The lifecycle manager only ever calls [`EventPublisher::emit`], which never blocks
//! and never fails the caller. The dispatcher owns the receiving end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::model::{BookingId, BookingStatus, ProfessionalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    NewBooking,
    BookingUpdated,
}

/// Snapshot of everything the notification channels need about one booking.
///
/// Built at emission time so the dispatcher never reads the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingNotice {
    pub booking_id: BookingId,
    pub professional_id: ProfessionalId,
    pub professional_name: String,
    pub professional_email: String,
    #[serde(default)]
    pub location: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub service_name: String,
    pub price_cents: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingNotice {
    /// Real-time grouping key of the owning professional.
    pub fn group_key(&self) -> String {
        format!("user_{}", self.professional_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingEvent {
    pub kind: NotificationKind,
    pub notice: BookingNotice,
}

impl BookingEvent {
    pub fn new_booking(notice: BookingNotice) -> Self {
        Self {
            kind: NotificationKind::NewBooking,
            notice,
        }
    }

    pub fn updated(notice: BookingNotice) -> Self {
        Self {
            kind: NotificationKind::BookingUpdated,
            notice,
        }
    }

    /// Human-readable one-liner shown by real-time clients.
    pub fn message(&self) -> String {
        let n = &self.notice;
        match self.kind {
            NotificationKind::NewBooking => format!(
                "New booking from {} for {} on {}",
                n.client_name,
                n.service_name,
                n.start.format("%Y-%m-%d %H:%M UTC")
            ),
            NotificationKind::BookingUpdated => format!(
                "Booking of {} for {} is now {}",
                n.client_name, n.service_name, n.status
            ),
        }
    }
}

/// Create a bounded event queue.
pub fn event_channel(capacity: usize) -> (EventPublisher, mpsc::Receiver<BookingEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventPublisher { tx: Some(tx) }, rx)
}

/// Sending half of the booking event queue.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: Option<mpsc::Sender<BookingEvent>>,
}

impl EventPublisher {
    /// A publisher that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Enqueue without waiting. Returns `false` when the event was dropped
    /// (queue full, dispatcher gone, or publisher disabled).
    pub fn emit(&self, event: BookingEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    booking_id = %event.notice.booking_id,
                    kind = ?event.kind,
                    "notification queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    booking_id = %event.notice.booking_id,
                    kind = ?event.kind,
                    "notification dispatcher stopped, dropping event"
                );
                false
            }
        }
    }
}
