//! Domain entities: professionals, services, availability slots, clients and bookings.
//!
//! Entities reference each other only through id newtypes; navigation always goes
//! back through [`SchedulingStore`](crate::store::SchedulingStore) lookups.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifies a professional (the owner of services and availability).
    ProfessionalId
);
id_type!(ServiceId);
id_type!(AvailabilityId);
id_type!(ClientId);
id_type!(BookingId);

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted intervals.
    ///
    /// # Errors
    /// Returns `SchedulingError::Validation` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(SchedulingError::Validation(format!(
                "window start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `minutes` length beginning at `start`.
    ///
    /// # Errors
    /// Returns `SchedulingError::Validation` when `minutes` is zero.
    pub fn starting_at(start: DateTime<Utc>, minutes: u32) -> Result<Self> {
        Self::new(start, start + Duration::minutes(i64::from(minutes)))
    }

    /// Half-open overlap: windows sharing only a boundary instant do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// `true` when `other` lies entirely inside this window.
    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Repetition policy used to expand one availability request into many slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecurrenceKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        };
        f.write_str(name)
    }
}

impl FromStr for RecurrenceKind {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(SchedulingError::Validation(format!(
                "unknown recurrence kind '{other}'"
            ))),
        }
    }
}

/// Booking lifecycle status.
///
/// ```text
/// Pending ──► Confirmed ──► Completed
///    │            │
///    ├────────────┴──► Canceled
///    └────────────┴──► NoShow
/// ```
///
/// `Canceled`, `Completed` and `NoShow` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Canceled,
    NoShow,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::NoShow)
    }

    /// Non-canceled bookings occupy their interval.
    pub fn is_active(self) -> bool {
        self != Self::Canceled
    }

    /// Apply the state machine, returning the resulting status.
    ///
    /// Requesting the current status is accepted as a no-op.
    ///
    /// # Errors
    /// Returns `SchedulingError::InvalidTransition` for any edge not in the diagram.
    pub fn transition(self, to: BookingStatus) -> Result<BookingStatus> {
        use BookingStatus::*;

        if self == to {
            return Ok(self);
        }
        match (self, to) {
            (Pending, Confirmed)
            | (Confirmed, Completed)
            | (Pending | Confirmed, Canceled)
            | (Pending | Confirmed, NoShow) => Ok(to),
            (from, to) => Err(SchedulingError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Completed => "Completed",
            Self::Canceled => "Canceled",
            Self::NoShow => "NoShow",
        };
        f.write_str(name)
    }
}

impl FromStr for BookingStatus {
    type Err = SchedulingError;

    /// Case-insensitive; `no_show` and `no-show` are accepted for `NoShow`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "noshow" => Ok(Self::NoShow),
            _ => Err(SchedulingError::Validation(format!(
                "unknown booking status '{}'",
                s.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Professional {
    pub id: ProfessionalId,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub professional_id: ProfessionalId,
    pub name: String,
    pub duration_minutes: u32,
    /// Price in minor currency units.
    pub price_cents: i64,
    pub active: bool,
}

impl Service {
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// A professional-declared bookable window tied to one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: AvailabilityId,
    pub professional_id: ProfessionalId,
    pub service_id: ServiceId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The policy this slot was expanded from; the slot itself never repeats.
    pub recurrence: RecurrenceKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }

    pub fn touch_updated_at(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Client details supplied with a booking request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ClientInfo {
    /// Check the required fields and return the normalized email.
    ///
    /// # Errors
    /// Returns `SchedulingError::Validation` for a blank name, control characters in
    /// the name or email, or a malformed email.
    pub fn validate(&self) -> Result<String> {
        if self.full_name.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "client name is required".to_string(),
            ));
        }
        if self.full_name.chars().any(char::is_control) {
            return Err(SchedulingError::Validation(
                "client name contains control characters".to_string(),
            ));
        }
        let email = normalize_email(&self.email);
        if email.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(SchedulingError::Validation(format!(
                "invalid client email '{}'",
                self.email.escape_default()
            )));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
            _ => Err(SchedulingError::Validation(format!(
                "invalid client email '{}'",
                self.email
            ))),
        }
    }
}

/// Canonical form used for the one-client-per-email rule.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub client_id: ClientId,
    pub service_id: ServiceId,
    pub professional_id: ProfessionalId,
    /// The published slot covering this booking, if any.
    pub availability_id: Option<AvailabilityId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }

    pub fn touch_updated_at(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
