//! # booking-engine
//!
//! Scheduling core for appointment booking: professionals publish availability,
//! clients reserve it, and no two active bookings of one professional ever overlap.
//!
//! All intervals are half-open `[start, end)`, so back-to-back bookings that share a
//! boundary instant are allowed.
//!
//! ## Modules
//!
//! - [`generator`]: availability request → candidate windows (single, daily, weekly, monthly, RRULE)
//! - [`conflict`]: pure half-open overlap detection
//! - [`freebusy`]: bookable gaps left in published availability
//! - [`availability`]: create / move / delete availability with admission control
//! - [`booking`]: booking creation, status state machine, cancellation
//! - [`events`]: typed booking events and the bounded queue feeding notifications
//! - [`notify`]: calendar artifact + real-time + email fan-out
//! - [`calendar`]: RFC 5545 encoder
//! - [`channels`]: real-time and email ports with in-process adapters
//! - [`store`]: persistence port and in-memory adapter
//! - [`locks`]: per-professional serialization of read-check-write
//! - [`clock`], [`config`], [`context`], [`error`]

pub mod availability;
pub mod booking;
pub mod calendar;
pub mod channels;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod context;
pub mod error;
pub mod events;
pub mod freebusy;
pub mod generator;
pub mod locks;
pub mod model;
pub mod notify;
#[cfg(feature = "smtp")]
pub mod smtp;
pub mod store;

pub use availability::AvailabilityManager;
pub use booking::BookingLifecycleManager;
pub use calendar::{CalendarEncoder, IcsEncoder};
pub use channels::{BroadcastRealtime, EmailChannel, LogMailer, MemoryMailer, RealtimeChannel};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use conflict::{find_conflicts, overlaps};
pub use context::SchedulingContext;
pub use error::{ChannelError, SchedulingError};
pub use events::{event_channel, BookingEvent, BookingNotice, EventPublisher};
pub use freebusy::FreeSlot;
pub use generator::SlotGenerator;
pub use model::{BookingStatus, RecurrenceKind, TimeWindow};
pub use notify::{DispatchReport, NotificationDispatcher};
pub use store::{MemoryStore, SchedulingStore};
