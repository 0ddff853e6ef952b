//! Persistence port and the bundled in-memory adapter.
//!
//! The managers never assume a storage engine: they read through
//! [`SchedulingStore`] and write whole entities back. Every write is scoped to a
//! professional by the caller's ownership checks.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{Result, SchedulingError};
use crate::model::{
    normalize_email, AvailabilityId, AvailabilitySlot, Booking, BookingId, Client, ClientId,
    Professional, ProfessionalId, Service, ServiceId,
};

/// Storage collaborator used by the managers.
pub trait SchedulingStore: Send + Sync {
    fn professional(&self, id: ProfessionalId) -> Result<Option<Professional>>;
    fn service(&self, id: ServiceId) -> Result<Option<Service>>;
    fn availability(&self, id: AvailabilityId) -> Result<Option<AvailabilitySlot>>;
    fn booking(&self, id: BookingId) -> Result<Option<Booking>>;
    fn client(&self, id: ClientId) -> Result<Option<Client>>;
    /// Lookup by normalized email.
    fn client_by_email(&self, email: &str) -> Result<Option<Client>>;

    /// All availability slots of a professional, sorted by start.
    fn availability_for(&self, professional: ProfessionalId) -> Result<Vec<AvailabilitySlot>>;
    /// All bookings of a professional, sorted by start.
    fn bookings_for(&self, professional: ProfessionalId) -> Result<Vec<Booking>>;

    /// Non-canceled bookings of a professional.
    fn active_bookings_for(&self, professional: ProfessionalId) -> Result<Vec<Booking>> {
        Ok(self
            .bookings_for(professional)?
            .into_iter()
            .filter(|b| b.status.is_active())
            .collect())
    }

    fn save_professional(&self, professional: &Professional) -> Result<()>;
    fn save_service(&self, service: &Service) -> Result<()>;
    /// Insert or replace the given slots as one unit.
    fn save_availability(&self, slots: &[AvailabilitySlot]) -> Result<()>;
    fn delete_availability(&self, id: AvailabilityId) -> Result<()>;
    /// Persist a new booking and resolve its client, as one unit.
    ///
    /// The client is matched by normalized email inside the same write. A stored
    /// client is reused (its details are kept) and the booking is pointed at it;
    /// otherwise `client` is stored. Returns the stored client and booking.
    fn insert_booking(&self, client: &Client, booking: &Booking) -> Result<(Client, Booking)>;
    /// Replace an existing booking.
    fn save_booking(&self, booking: &Booking) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tables {
    professionals: HashMap<ProfessionalId, Professional>,
    services: HashMap<ServiceId, Service>,
    availability: HashMap<AvailabilityId, AvailabilitySlot>,
    bookings: HashMap<BookingId, Booking>,
    clients: HashMap<ClientId, Client>,
    /// normalized email -> client id
    client_emails: HashMap<String, ClientId>,
}

/// Thread-safe in-memory [`SchedulingStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn poisoned<T>(_: PoisonError<T>) -> SchedulingError {
    SchedulingError::Storage("store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored clients.
    pub fn client_count(&self) -> Result<usize> {
        Ok(self.tables.read().map_err(poisoned)?.clients.len())
    }
}

impl SchedulingStore for MemoryStore {
    fn professional(&self, id: ProfessionalId) -> Result<Option<Professional>> {
        Ok(self.tables.read().map_err(poisoned)?.professionals.get(&id).cloned())
    }

    fn service(&self, id: ServiceId) -> Result<Option<Service>> {
        Ok(self.tables.read().map_err(poisoned)?.services.get(&id).cloned())
    }

    fn availability(&self, id: AvailabilityId) -> Result<Option<AvailabilitySlot>> {
        Ok(self.tables.read().map_err(poisoned)?.availability.get(&id).cloned())
    }

    fn booking(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.tables.read().map_err(poisoned)?.bookings.get(&id).cloned())
    }

    fn client(&self, id: ClientId) -> Result<Option<Client>> {
        Ok(self.tables.read().map_err(poisoned)?.clients.get(&id).cloned())
    }

    fn client_by_email(&self, email: &str) -> Result<Option<Client>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .client_emails
            .get(&normalize_email(email))
            .and_then(|id| tables.clients.get(id))
            .cloned())
    }

    fn availability_for(&self, professional: ProfessionalId) -> Result<Vec<AvailabilitySlot>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut slots: Vec<AvailabilitySlot> = tables
            .availability
            .values()
            .filter(|s| s.professional_id == professional)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.start, s.end));
        Ok(slots)
    }

    fn bookings_for(&self, professional: ProfessionalId) -> Result<Vec<Booking>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.professional_id == professional)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.start, b.end));
        Ok(bookings)
    }

    fn save_professional(&self, professional: &Professional) -> Result<()> {
        self.tables
            .write()
            .map_err(poisoned)?
            .professionals
            .insert(professional.id, professional.clone());
        Ok(())
    }

    fn save_service(&self, service: &Service) -> Result<()> {
        self.tables
            .write()
            .map_err(poisoned)?
            .services
            .insert(service.id, service.clone());
        Ok(())
    }

    fn save_availability(&self, slots: &[AvailabilitySlot]) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        for slot in slots {
            tables.availability.insert(slot.id, slot.clone());
        }
        Ok(())
    }

    fn delete_availability(&self, id: AvailabilityId) -> Result<()> {
        self.tables
            .write()
            .map_err(poisoned)?
            .availability
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| SchedulingError::not_found("availability", id))
    }

    fn insert_booking(&self, client: &Client, booking: &Booking) -> Result<(Client, Booking)> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        if tables.bookings.contains_key(&booking.id) {
            return Err(SchedulingError::Storage(format!(
                "booking {} already exists",
                booking.id
            )));
        }

        let email = normalize_email(&client.email);
        let existing = tables
            .client_emails
            .get(&email)
            .and_then(|id| tables.clients.get(id))
            .cloned();
        let client = match existing {
            Some(existing) => existing,
            None => {
                tables.client_emails.insert(email, client.id);
                tables.clients.insert(client.id, client.clone());
                client.clone()
            }
        };

        let booking = Booking {
            client_id: client.id,
            ..booking.clone()
        };
        tables.bookings.insert(booking.id, booking.clone());
        Ok((client, booking))
    }

    fn save_booking(&self, booking: &Booking) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        match tables.bookings.get_mut(&booking.id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(SchedulingError::not_found("booking", booking.id)),
        }
    }
}
