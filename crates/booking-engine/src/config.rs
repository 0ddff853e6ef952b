//! Engine configuration loaded from environment variables with defaults.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default cap on the number of occurrences a single recurring request may expand to.
pub const DEFAULT_MAX_OCCURRENCES: u32 = 500;

/// Default capacity of the booking event queue feeding the notification dispatcher.
pub const DEFAULT_NOTIFICATION_QUEUE: usize = 256;

/// Tunables shared by the managers and the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on occurrences per recurring availability request.
    pub max_occurrences: u32,
    /// Capacity of the booking event queue. Events beyond it are dropped.
    pub notification_queue: usize,
    /// Event name used for real-time messages.
    pub realtime_event: String,
    /// Sender address for transactional emails.
    pub mail_from: String,
    /// PRODID written into calendar artifacts.
    pub calendar_prodid: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
            notification_queue: DEFAULT_NOTIFICATION_QUEUE,
            realtime_event: "ReceiveNotification".to_string(),
            mail_from: "bookings@localhost".to_string(),
            calendar_prodid: "-//booking-engine//EN".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `BOOKING_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparseable numbers fall back to the
    /// default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_occurrences: parse_var("BOOKING_MAX_OCCURRENCES", defaults.max_occurrences),
            notification_queue: parse_var("BOOKING_NOTIFICATION_QUEUE", defaults.notification_queue)
                .max(1),
            realtime_event: env::var("BOOKING_REALTIME_EVENT").unwrap_or(defaults.realtime_event),
            mail_from: env::var("BOOKING_MAIL_FROM").unwrap_or(defaults.mail_from),
            calendar_prodid: env::var("BOOKING_CALENDAR_PRODID").unwrap_or(defaults.calendar_prodid),
        }
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, default = %default, "ignoring invalid configuration value");
            default
        }),
        Err(_) => default,
    }
}
