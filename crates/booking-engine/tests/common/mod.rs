//! Shared fixture: one professional with a 30-minute service, a fixed clock set to
//! 2023-12-01T00:00Z, and managers wired to an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use booking_engine::events::event_channel;
use booking_engine::model::{ClientInfo, Professional, ProfessionalId, Service, ServiceId};
use booking_engine::{
    AvailabilityManager, BookingEvent, BookingLifecycleManager, EngineConfig, FixedClock,
    MemoryStore, SchedulingContext, SchedulingStore,
};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub ctx: SchedulingContext,
    pub availability: AvailabilityManager,
    pub bookings: BookingLifecycleManager,
    pub events: mpsc::Receiver<BookingEvent>,
    pub professional: Professional,
    pub service: Service,
}

impl Fixture {
    /// Register another professional with a service of `minutes` length.
    pub fn add_professional(&self, name: &str, minutes: u32) -> (Professional, Service) {
        let professional = Professional {
            id: ProfessionalId::new(),
            display_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            location: None,
        };
        let service = Service {
            id: ServiceId::new(),
            professional_id: professional.id,
            name: format!("{name} session"),
            duration_minutes: minutes,
            price_cents: 4000,
            active: true,
        };
        self.store.save_professional(&professional).unwrap();
        self.store.save_service(&service).unwrap();
        (professional, service)
    }

    /// Drain every event queued so far.
    pub fn drain_events(&mut self) -> Vec<BookingEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

pub fn fixture_with(config: EngineConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(at(2023, 12, 1, 0, 0)));
    let ctx = SchedulingContext::new(store.clone(), clock.clone(), config.clone());
    let (publisher, events) = event_channel(config.notification_queue);

    let professional = Professional {
        id: ProfessionalId::new(),
        display_name: "Dana Reyes".to_string(),
        email: "dana@example.com".to_string(),
        location: Some("12 Harbour St, Suite 4".to_string()),
    };
    let service = Service {
        id: ServiceId::new(),
        professional_id: professional.id,
        name: "Physiotherapy".to_string(),
        duration_minutes: 30,
        price_cents: 6500,
        active: true,
    };
    store.save_professional(&professional).unwrap();
    store.save_service(&service).unwrap();

    Fixture {
        availability: AvailabilityManager::new(ctx.clone()),
        bookings: BookingLifecycleManager::new(ctx.clone(), publisher),
        store,
        clock,
        ctx,
        events,
        professional,
        service,
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
}

pub fn client(name: &str, email: &str) -> ClientInfo {
    ClientInfo {
        full_name: name.to_string(),
        email: email.to_string(),
        phone: None,
    }
}
