//! Error types for booking-engine operations.

use thiserror::Error;

use crate::model::BookingStatus;

/// Errors returned synchronously by the scheduling operations.
///
/// Every variant is recoverable by the caller and is meant to be surfaced to
/// the end user unchanged in meaning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    /// Malformed or missing input (past start time, missing recurrence end, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A status change the booking state machine does not allow.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// The requesting professional does not own the resource.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The candidate interval overlaps an existing one.
    #[error("Scheduling conflict: {0}")]
    Conflict(String),

    /// The operation would break a data invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The persistence collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl SchedulingError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// `true` for the validation family (plain validation and rejected transitions).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;

/// Delivery failure on a notification channel.
///
/// These never reach the booking caller; the dispatcher logs and drops them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Nobody is listening on the real-time group.
    #[error("No subscribers for group {0}")]
    NoSubscribers(String),

    /// The recipient or sender address could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The transport rejected or failed the delivery.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Failure while building a calendar artifact.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    #[error("Invalid calendar entry: {0}")]
    InvalidEntry(String),
}
