//! Scenario replay for `booking simulate`.
//!
//! A scenario declares professionals and services under short keys, then a list of
//! steps run in order against an in-memory engine on a fixed clock. Notifications are
//! dispatched to a recording mailer and an in-process real-time hub; their totals are
//! reported after the last step.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use booking_engine::model::{
    AvailabilityId, BookingId, ClientInfo, Professional, ProfessionalId, Service, ServiceId,
};
use booking_engine::{
    event_channel, AvailabilityManager, BookingLifecycleManager, BroadcastRealtime, Clock, EngineConfig,
    FixedClock, IcsEncoder, MemoryMailer, MemoryStore, NotificationDispatcher, RecurrenceKind,
    SchedulingContext, SchedulingError, SchedulingStore,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Instant the clock starts at.
    pub now: DateTime<Utc>,
    #[serde(default)]
    pub professionals: Vec<ProfessionalDecl>,
    #[serde(default)]
    pub services: Vec<ServiceDecl>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct ProfessionalDecl {
    pub key: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceDecl {
    pub key: String,
    pub professional: String,
    pub name: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    AddAvailability {
        service: String,
        start: DateTime<Utc>,
        #[serde(default)]
        recurrence: Option<String>,
        #[serde(default)]
        until: Option<DateTime<Utc>>,
        #[serde(default)]
        rule: Option<String>,
        /// Label for the first created slot.
        #[serde(default, rename = "as")]
        label: Option<String>,
    },
    MoveAvailability {
        slot: String,
        start: DateTime<Utc>,
    },
    DeleteAvailability {
        slot: String,
    },
    Book {
        service: String,
        client: ClientInfo,
        start: DateTime<Utc>,
        #[serde(default)]
        notes: Option<String>,
        #[serde(default, rename = "as")]
        label: Option<String>,
    },
    SetStatus {
        booking: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
    Cancel {
        booking: String,
    },
    CheckAvailability {
        professional: String,
        start: DateTime<Utc>,
        duration_minutes: u32,
    },
    OpenWindows {
        professional: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    AdvanceClock {
        minutes: i64,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::AddAvailability { .. } => "add_availability",
            Self::MoveAvailability { .. } => "move_availability",
            Self::DeleteAvailability { .. } => "delete_availability",
            Self::Book { .. } => "book",
            Self::SetStatus { .. } => "set_status",
            Self::Cancel { .. } => "cancel",
            Self::CheckAvailability { .. } => "check_availability",
            Self::OpenWindows { .. } => "open_windows",
            Self::AdvanceClock { .. } => "advance_clock",
        }
    }
}

/// Keys declared by the scenario mapped to engine ids.
#[derive(Default)]
struct Registry {
    professionals: HashMap<String, ProfessionalId>,
    services: HashMap<String, Service>,
    /// Slot label -> (slot id, owning professional).
    slots: HashMap<String, (AvailabilityId, ProfessionalId)>,
    bookings: HashMap<String, BookingId>,
}

fn lookup<T: Clone>(map: &HashMap<String, T>, kind: &str, key: &str) -> Result<T> {
    map.get(key)
        .cloned()
        .ok_or_else(|| anyhow!("scenario references unknown {kind} '{key}'"))
}

struct Engine {
    clock: Arc<FixedClock>,
    availability: AvailabilityManager,
    bookings: BookingLifecycleManager,
    registry: Registry,
}

/// Replay `scenario` and return one JSON line per step plus a closing summary.
///
/// Engine errors are reported in the step's line; only malformed scenarios
/// (unknown keys, bad declarations) abort the replay.
pub async fn run(scenario: Scenario, config: EngineConfig) -> Result<Vec<Value>> {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(scenario.now));
    let ctx = SchedulingContext::new(store.clone(), clock.clone(), config.clone());
    let (publisher, events) = event_channel(config.notification_queue);

    let mut registry = Registry::default();
    for decl in &scenario.professionals {
        let professional = Professional {
            id: ProfessionalId::new(),
            display_name: decl.display_name.clone(),
            email: decl.email.clone(),
            location: decl.location.clone(),
        };
        store
            .save_professional(&professional)
            .with_context(|| format!("Failed to register professional '{}'", decl.key))?;
        registry.professionals.insert(decl.key.clone(), professional.id);
    }
    for decl in &scenario.services {
        let professional_id = lookup(&registry.professionals, "professional", &decl.professional)?;
        let service = Service {
            id: ServiceId::new(),
            professional_id,
            name: decl.name.clone(),
            duration_minutes: decl.duration_minutes,
            price_cents: decl.price_cents,
            active: decl.active,
        };
        store
            .save_service(&service)
            .with_context(|| format!("Failed to register service '{}'", decl.key))?;
        registry.services.insert(decl.key.clone(), service);
    }

    let realtime = BroadcastRealtime::new();
    let mut receivers = Vec::new();
    for id in registry.professionals.values() {
        receivers.push(realtime.subscribe(format!("user_{id}")).await);
    }
    let mailer = MemoryMailer::new();
    let dispatcher = NotificationDispatcher::new(
        realtime,
        mailer.clone(),
        IcsEncoder::new(config.calendar_prodid.clone()),
        config,
    )
    .spawn(events);

    let mut engine = Engine {
        clock,
        availability: AvailabilityManager::new(ctx.clone()),
        bookings: BookingLifecycleManager::new(ctx, publisher),
        registry,
    };

    let mut lines = Vec::with_capacity(scenario.steps.len() + 1);
    for (index, step) in scenario.steps.iter().enumerate() {
        let line = match engine.apply(step)? {
            Ok(result) => json!({ "step": index, "op": step.name(), "ok": true, "result": result }),
            Err(err) => {
                tracing::debug!(step = index, error = %err, "step rejected");
                json!({ "step": index, "op": step.name(), "ok": false, "error": err.to_string() })
            }
        };
        lines.push(line);
    }

    // Dropping the managers closes the event queue so the dispatcher can drain and stop.
    drop(engine);
    dispatcher.await.context("Notification dispatcher panicked")?;

    let mut realtime_messages = 0;
    for rx in &mut receivers {
        while rx.try_recv().is_ok() {
            realtime_messages += 1;
        }
    }
    let emails: Vec<Value> = mailer
        .sent()
        .iter()
        .map(|m| json!({ "to": m.to, "subject": m.subject, "attachments": m.attachments.len() }))
        .collect();
    lines.push(json!({
        "summary": {
            "realtime_messages": realtime_messages,
            "emails": emails,
        }
    }));

    Ok(lines)
}

impl Engine {
    /// Outer error: malformed scenario. Inner error: the engine rejected the step.
    fn apply(&mut self, step: &Step) -> Result<std::result::Result<Value, SchedulingError>> {
        Ok(match step {
            Step::AddAvailability {
                service,
                start,
                recurrence,
                until,
                rule,
                label,
            } => {
                let service = lookup(&self.registry.services, "service", service)?;
                let created = match rule {
                    Some(rule) => self.availability.create_from_rule(
                        service.professional_id,
                        service.id,
                        *start,
                        rule,
                        *until,
                    ),
                    None => recurrence
                        .as_deref()
                        .unwrap_or("none")
                        .parse::<RecurrenceKind>()
                        .and_then(|kind| {
                            self.availability.create_recurring(
                                service.professional_id,
                                service.id,
                                *start,
                                kind,
                                *until,
                            )
                        }),
                };
                if let (Ok(slots), Some(label)) = (&created, label) {
                    if let Some(first) = slots.first() {
                        self.registry
                            .slots
                            .insert(label.clone(), (first.id, first.professional_id));
                    }
                }
                created.map(|slots| json!(slots))
            }
            Step::MoveAvailability { slot, start } => {
                let (id, owner) = lookup(&self.registry.slots, "slot", slot)?;
                self.availability
                    .update(id, owner, Some(*start))
                    .map(|slot| json!(slot))
            }
            Step::DeleteAvailability { slot } => {
                let (id, owner) = lookup(&self.registry.slots, "slot", slot)?;
                self.availability
                    .delete(id, owner)
                    .map(|()| json!({ "deleted": id }))
            }
            Step::Book {
                service,
                client,
                start,
                notes,
                label,
            } => {
                let service_id = lookup(&self.registry.services, "service", service)?.id;
                let created = self
                    .bookings
                    .create(service_id, client, *start, notes.clone());
                if let (Ok(booking), Some(label)) = (&created, label) {
                    self.registry.bookings.insert(label.clone(), booking.id);
                }
                created.map(|booking| json!(booking))
            }
            Step::SetStatus {
                booking,
                status,
                notes,
            } => {
                let id = lookup(&self.registry.bookings, "booking", booking)?;
                self.bookings
                    .update_status(id, status.as_deref(), notes.clone())
                    .map(|booking| json!(booking))
            }
            Step::Cancel { booking } => {
                let id = lookup(&self.registry.bookings, "booking", booking)?;
                self.bookings.cancel(id).map(|booking| json!(booking))
            }
            Step::CheckAvailability {
                professional,
                start,
                duration_minutes,
            } => {
                let id = lookup(&self.registry.professionals, "professional", professional)?;
                self.bookings
                    .check_availability(id, *start, *duration_minutes)
                    .map(|free| json!({ "available": free }))
            }
            Step::OpenWindows {
                professional,
                from,
                to,
            } => {
                let id = lookup(&self.registry.professionals, "professional", professional)?;
                self.availability
                    .open_windows(id, *from, *to)
                    .map(|open| json!(open))
            }
            Step::AdvanceClock { minutes } => {
                self.clock.advance(Duration::minutes(*minutes));
                Ok(json!({ "now": self.clock.now() }))
            }
        })
    }
}
