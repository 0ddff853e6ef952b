//! Booking lifecycle: admission-controlled creation, status transitions and cancellation.
//!
//! Creation validates everything before writing: the conflict check and the booking
//! insert happen under the professional's lock. The client upsert is resolved by the
//! store inside the same write as the booking row, since clients are shared across
//! professionals. The notification event is emitted only
//! after that call succeeds and can never undo it.

use chrono::{DateTime, Utc};

use crate::conflict::{first_conflict, overlaps};
use crate::context::SchedulingContext;
use crate::error::{Result, SchedulingError};
use crate::events::{BookingEvent, BookingNotice, EventPublisher};
use crate::model::{
    Booking, BookingId, BookingStatus, Client, ClientId, ClientInfo, Professional,
    ProfessionalId, Service, ServiceId, TimeWindow,
};

pub struct BookingLifecycleManager {
    ctx: SchedulingContext,
    events: EventPublisher,
}

impl BookingLifecycleManager {
    pub fn new(ctx: SchedulingContext, events: EventPublisher) -> Self {
        Self { ctx, events }
    }

    /// Book `service_id` for the client at `start`.
    ///
    /// The client is looked up by email and reused when present (stored details are
    /// kept as they are); otherwise a new client is created together with the booking.
    /// The booking starts `Pending` and ends `start + service duration`.
    ///
    /// # Errors
    /// - `NotFound` if the service is missing or inactive, or its professional is unknown.
    /// - `Validation` for bad client details or a start not strictly in the future.
    /// - `Conflict` if the interval overlaps an active booking of the professional.
    pub fn create(
        &self,
        service_id: ServiceId,
        client_info: &ClientInfo,
        start: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Booking> {
        let service = self
            .ctx
            .store
            .service(service_id)?
            .filter(|s| s.active)
            .ok_or_else(|| SchedulingError::not_found("service", service_id))?;
        let professional = self
            .ctx
            .store
            .professional(service.professional_id)?
            .ok_or_else(|| SchedulingError::not_found("professional", service.professional_id))?;

        let email = client_info.validate()?;
        let window = TimeWindow::starting_at(start, service.duration_minutes)?;
        self.ctx.ensure_future(window.start)?;

        let (booking, client) = self.ctx.locks.with_lock(professional.id, || {
            let active = self.ctx.store.active_bookings_for(professional.id)?;
            if let Some(existing) = first_conflict(&window, &active, None) {
                return Err(SchedulingError::Conflict(format!(
                    "{} - {} overlaps booking {} ({} - {})",
                    window.start.to_rfc3339(),
                    window.end.to_rfc3339(),
                    existing.id,
                    existing.start.to_rfc3339(),
                    existing.end.to_rfc3339()
                )));
            }

            let availability_id = self
                .ctx
                .store
                .availability_for(professional.id)?
                .into_iter()
                .find(|slot| slot.service_id == service.id && slot.window().contains(&window))
                .map(|slot| slot.id);

            let now = self.ctx.now();
            let candidate = Client {
                id: ClientId::new(),
                full_name: client_info.full_name.trim().to_string(),
                email: email.clone(),
                phone: client_info.phone.clone(),
            };
            let booking = Booking {
                id: BookingId::new(),
                client_id: candidate.id,
                service_id: service.id,
                professional_id: professional.id,
                availability_id,
                start: window.start,
                end: window.end,
                status: BookingStatus::Pending,
                notes: notes.clone(),
                created_at: now,
                updated_at: now,
            };
            let (client, booking) = self.ctx.store.insert_booking(&candidate, &booking)?;
            Ok((booking, client))
        })?;

        tracing::info!(
            booking_id = %booking.id,
            professional_id = %booking.professional_id,
            client_id = %booking.client_id,
            start = %booking.start,
            "booking created"
        );

        let notice = build_notice(&booking, &client, &service, &professional);
        self.events.emit(BookingEvent::new_booking(notice));

        Ok(booking)
    }

    /// Apply a status given as text, plus optional notes.
    ///
    /// Notes are saved even when the status is rejected; the status error is still
    /// returned.
    ///
    /// # Errors
    /// `Validation` for an unknown status string, otherwise as [`transition`](Self::transition).
    pub fn update_status(
        &self,
        id: BookingId,
        new_status: Option<&str>,
        notes: Option<String>,
    ) -> Result<Booking> {
        match new_status.map(str::parse::<BookingStatus>).transpose() {
            Ok(status) => self.transition(id, status, notes),
            Err(err) => {
                if notes.is_some() {
                    self.transition(id, None, notes)?;
                }
                Err(err)
            }
        }
    }

    /// Move a booking along the state machine and/or replace its notes.
    ///
    /// Notes are applied whenever present, including when the requested edge is
    /// refused. Requesting the current status is a no-op.
    ///
    /// # Errors
    /// `NotFound` for an unknown booking; `InvalidTransition` for an edge the state
    /// machine does not allow (the status is left unchanged).
    pub fn transition(
        &self,
        id: BookingId,
        new_status: Option<BookingStatus>,
        notes: Option<String>,
    ) -> Result<Booking> {
        let professional = self.load(id)?.professional_id;

        let (outcome, changed) = self.ctx.locks.with_lock(professional, || {
            let mut booking = self.load(id)?;
            let previous = booking.status;

            let next = match new_status {
                Some(status) => previous.transition(status),
                None => Ok(previous),
            };
            let notes_given = notes.is_some();
            if let Some(notes) = notes {
                booking.notes = Some(notes);
            }

            match next {
                Ok(status) => {
                    booking.status = status;
                    booking.touch_updated_at(self.ctx.now());
                    self.ctx.store.save_booking(&booking)?;
                    Ok((Ok(booking), status != previous))
                }
                Err(err) => {
                    if notes_given {
                        booking.touch_updated_at(self.ctx.now());
                        self.ctx.store.save_booking(&booking)?;
                    }
                    Ok((Err(err), false))
                }
            }
        })?;

        let booking = outcome?;
        tracing::info!(booking_id = %id, status = %booking.status, changed, "booking updated");
        if changed {
            self.emit_update(&booking);
        }
        Ok(booking)
    }

    /// Force a booking to `Canceled`, whatever its current status.
    ///
    /// Canceling an already canceled booking succeeds without writing anything.
    ///
    /// # Errors
    /// `NotFound` for an unknown booking.
    pub fn cancel(&self, id: BookingId) -> Result<Booking> {
        let professional = self.load(id)?.professional_id;

        let (booking, changed) = self.ctx.locks.with_lock(professional, || {
            let mut booking = self.load(id)?;
            if booking.status == BookingStatus::Canceled {
                return Ok((booking, false));
            }
            booking.status = BookingStatus::Canceled;
            booking.touch_updated_at(self.ctx.now());
            self.ctx.store.save_booking(&booking)?;
            Ok((booking, true))
        })?;

        if changed {
            tracing::info!(booking_id = %id, "booking canceled");
            self.emit_update(&booking);
        } else {
            tracing::debug!(booking_id = %id, "booking already canceled");
        }
        Ok(booking)
    }

    /// `true` when `[start, start + duration_minutes)` is free of active bookings.
    ///
    /// Read-only; intended for pre-flight checks before [`create`](Self::create).
    ///
    /// # Errors
    /// `Validation` when `duration_minutes` is zero.
    pub fn check_availability(
        &self,
        professional: ProfessionalId,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<bool> {
        let window = TimeWindow::starting_at(start, duration_minutes)?;
        let active = self.ctx.store.active_bookings_for(professional)?;
        Ok(!overlaps(&window, &active, None))
    }

    pub fn get(&self, id: BookingId) -> Result<Booking> {
        self.load(id)
    }

    /// All bookings of a professional (any status), sorted by start.
    pub fn list_for_professional(&self, professional: ProfessionalId) -> Result<Vec<Booking>> {
        self.ctx.store.bookings_for(professional)
    }

    fn load(&self, id: BookingId) -> Result<Booking> {
        self.ctx
            .store
            .booking(id)?
            .ok_or_else(|| SchedulingError::not_found("booking", id))
    }

    fn emit_update(&self, booking: &Booking) {
        match self.notice_for(booking) {
            Ok(notice) => {
                self.events.emit(BookingEvent::updated(notice));
            }
            Err(err) => {
                tracing::warn!(booking_id = %booking.id, error = %err, "skipping update notification");
            }
        }
    }

    fn notice_for(&self, booking: &Booking) -> Result<BookingNotice> {
        let store = &self.ctx.store;
        let client = store
            .client(booking.client_id)?
            .ok_or_else(|| SchedulingError::not_found("client", booking.client_id))?;
        let service = store
            .service(booking.service_id)?
            .ok_or_else(|| SchedulingError::not_found("service", booking.service_id))?;
        let professional = store
            .professional(booking.professional_id)?
            .ok_or_else(|| SchedulingError::not_found("professional", booking.professional_id))?;
        Ok(build_notice(booking, &client, &service, &professional))
    }
}

fn build_notice(
    booking: &Booking,
    client: &Client,
    service: &Service,
    professional: &Professional,
) -> BookingNotice {
    BookingNotice {
        booking_id: booking.id,
        professional_id: professional.id,
        professional_name: professional.display_name.clone(),
        professional_email: professional.email.clone(),
        location: professional.location.clone(),
        client_name: client.full_name.clone(),
        client_email: client.email.clone(),
        service_name: service.name.clone(),
        price_cents: service.price_cents,
        start: booking.start,
        end: booking.end,
        status: booking.status,
        notes: booking.notes.clone(),
        created_at: booking.created_at,
    }
}
