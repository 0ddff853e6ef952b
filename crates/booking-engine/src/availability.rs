//! Availability management: publish, move and withdraw bookable windows.
//!
//! Every write for a professional runs under that professional's lock, so the
//! overlap check and the write see the same snapshot.

use chrono::{DateTime, Utc};

use crate::conflict::{first_conflict, self_overlaps};
use crate::context::SchedulingContext;
use crate::error::{Result, SchedulingError};
use crate::freebusy::{self, FreeSlot};
use crate::generator::SlotGenerator;
use crate::model::{
    AvailabilityId, AvailabilitySlot, ProfessionalId, RecurrenceKind, Service, ServiceId,
    TimeWindow,
};

pub struct AvailabilityManager {
    ctx: SchedulingContext,
    generator: SlotGenerator,
}

impl AvailabilityManager {
    pub fn new(ctx: SchedulingContext) -> Self {
        let generator = SlotGenerator::new(ctx.config.max_occurrences);
        Self { ctx, generator }
    }

    /// Publish one window `[start, start + duration)` for a service.
    ///
    /// # Errors
    /// - `NotFound` if the service does not exist.
    /// - `Authorization` if the professional does not own the service.
    /// - `Validation` if `start` is not strictly in the future.
    /// - `Conflict` if the window overlaps the professional's availability or active bookings.
    pub fn create_single(
        &self,
        professional: ProfessionalId,
        service_id: ServiceId,
        start: DateTime<Utc>,
    ) -> Result<AvailabilitySlot> {
        let service = self.owned_service(professional, service_id)?;
        let window = TimeWindow::starting_at(start, service.duration_minutes)?;
        let mut created =
            self.create_windows(professional, &service, vec![window], RecurrenceKind::None)?;
        created
            .pop()
            .ok_or_else(|| SchedulingError::Storage("no slot was created".to_string()))
    }

    /// Publish a recurring series.
    ///
    /// The batch is all-or-nothing: if any occurrence is in the past or conflicts
    /// (with existing rows or with another occurrence of the series), nothing is
    /// persisted and the first failure is returned.
    ///
    /// # Errors
    /// As [`create_single`](Self::create_single), plus `Validation` when `until` is
    /// missing for a repeating kind or the series exceeds the occurrence cap.
    pub fn create_recurring(
        &self,
        professional: ProfessionalId,
        service_id: ServiceId,
        start: DateTime<Utc>,
        kind: RecurrenceKind,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<AvailabilitySlot>> {
        let service = self.owned_service(professional, service_id)?;
        let windows: Vec<TimeWindow> = self.generator.generate(&service, start, kind, until)?.collect();
        self.create_windows(professional, &service, windows, kind)
    }

    /// Publish a series described by an RFC 5545 rule body, with the same
    /// all-or-nothing policy as [`create_recurring`](Self::create_recurring).
    ///
    /// # Errors
    /// As [`create_recurring`](Self::create_recurring), plus `Validation` for an
    /// unparseable or unbounded rule.
    pub fn create_from_rule(
        &self,
        professional: ProfessionalId,
        service_id: ServiceId,
        start: DateTime<Utc>,
        rule: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<AvailabilitySlot>> {
        let service = self.owned_service(professional, service_id)?;
        let windows = self.generator.generate_rule(&service, start, rule, until)?;
        self.create_windows(professional, &service, windows, RecurrenceKind::None)
    }

    /// Move a slot to `new_start`, keeping its service duration.
    ///
    /// Without `new_start` only the update timestamp changes.
    ///
    /// # Errors
    /// `NotFound`, `Authorization`, `Validation` (past start), `InvariantViolation`
    /// when a non-canceled booking references the slot, or `Conflict` (ignoring the
    /// slot itself).
    pub fn update(
        &self,
        id: AvailabilityId,
        professional: ProfessionalId,
        new_start: Option<DateTime<Utc>>,
    ) -> Result<AvailabilitySlot> {
        self.owned_slot(id, professional)?;

        self.ctx.locks.with_lock(professional, || {
            let mut slot = self.owned_slot(id, professional)?;

            if let Some(start) = new_start {
                let booked = self
                    .ctx
                    .store
                    .active_bookings_for(professional)?
                    .into_iter()
                    .find(|b| b.availability_id == Some(id));
                if let Some(booking) = booked {
                    return Err(SchedulingError::InvariantViolation(format!(
                        "availability {id} is held by active booking {}",
                        booking.id
                    )));
                }

                let service = self
                    .ctx
                    .store
                    .service(slot.service_id)?
                    .ok_or_else(|| SchedulingError::not_found("service", slot.service_id))?;
                let window = TimeWindow::starting_at(start, service.duration_minutes)?;
                self.ctx.ensure_future(window.start)?;
                self.check_conflicts(professional, &window, Some(id))?;
                slot.start = window.start;
                slot.end = window.end;
            }

            slot.touch_updated_at(self.ctx.now());
            self.ctx.store.save_availability(std::slice::from_ref(&slot))?;
            tracing::info!(
                availability_id = %slot.id,
                professional_id = %professional,
                start = %slot.start,
                "availability updated"
            );
            Ok(slot)
        })
    }

    /// Withdraw a slot.
    ///
    /// # Errors
    /// `NotFound`, `Authorization`, or `InvariantViolation` when a non-canceled
    /// booking references the slot or overlaps its window.
    pub fn delete(&self, id: AvailabilityId, professional: ProfessionalId) -> Result<()> {
        self.owned_slot(id, professional)?;

        self.ctx.locks.with_lock(professional, || {
            let slot = self.owned_slot(id, professional)?;
            let window = slot.window();
            let blocking = self
                .ctx
                .store
                .active_bookings_for(professional)?
                .into_iter()
                .find(|b| b.availability_id == Some(id) || b.window().overlaps(&window));

            if let Some(booking) = blocking {
                return Err(SchedulingError::InvariantViolation(format!(
                    "availability {id} has active booking {}",
                    booking.id
                )));
            }

            self.ctx.store.delete_availability(id)?;
            tracing::info!(availability_id = %id, professional_id = %professional, "availability deleted");
            Ok(())
        })
    }

    /// All slots of a professional, sorted by start.
    pub fn list(&self, professional: ProfessionalId) -> Result<Vec<AvailabilitySlot>> {
        self.ctx.store.availability_for(professional)
    }

    /// Published time between `from` and `to` that no active booking occupies.
    ///
    /// # Errors
    /// `Validation` if `from` is not before `to`.
    pub fn open_windows(
        &self,
        professional: ProfessionalId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FreeSlot>> {
        let bounds = TimeWindow::new(from, to)?;
        let slots = self.ctx.store.availability_for(professional)?;
        let bookings = self.ctx.store.active_bookings_for(professional)?;
        Ok(freebusy::open_windows(&slots, &bookings, &bounds))
    }

    fn owned_service(&self, professional: ProfessionalId, service_id: ServiceId) -> Result<Service> {
        let service = self
            .ctx
            .store
            .service(service_id)?
            .ok_or_else(|| SchedulingError::not_found("service", service_id))?;
        if service.professional_id != professional {
            return Err(SchedulingError::Authorization(format!(
                "professional {professional} does not own service {service_id}"
            )));
        }
        Ok(service)
    }

    fn owned_slot(&self, id: AvailabilityId, professional: ProfessionalId) -> Result<AvailabilitySlot> {
        let slot = self
            .ctx
            .store
            .availability(id)?
            .ok_or_else(|| SchedulingError::not_found("availability", id))?;
        if slot.professional_id != professional {
            return Err(SchedulingError::Authorization(format!(
                "professional {professional} does not own availability {id}"
            )));
        }
        Ok(slot)
    }

    fn check_conflicts(
        &self,
        professional: ProfessionalId,
        window: &TimeWindow,
        exclude: Option<AvailabilityId>,
    ) -> Result<()> {
        let slots = self.ctx.store.availability_for(professional)?;
        if let Some(existing) = first_conflict(window, &slots, exclude.map(|id| id.0)) {
            return Err(SchedulingError::Conflict(format!(
                "{} - {} overlaps availability {} ({} - {})",
                window.start.to_rfc3339(),
                window.end.to_rfc3339(),
                existing.id,
                existing.start.to_rfc3339(),
                existing.end.to_rfc3339()
            )));
        }

        let bookings = self.ctx.store.active_bookings_for(professional)?;
        if let Some(existing) = first_conflict(window, &bookings, None) {
            return Err(SchedulingError::Conflict(format!(
                "{} - {} overlaps booking {} ({} - {})",
                window.start.to_rfc3339(),
                window.end.to_rfc3339(),
                existing.id,
                existing.start.to_rfc3339(),
                existing.end.to_rfc3339()
            )));
        }

        tracing::debug!(professional_id = %professional, start = %window.start, "no conflicts");
        Ok(())
    }

    fn create_windows(
        &self,
        professional: ProfessionalId,
        service: &Service,
        windows: Vec<TimeWindow>,
        kind: RecurrenceKind,
    ) -> Result<Vec<AvailabilitySlot>> {
        if windows.is_empty() {
            return Err(SchedulingError::Validation(
                "request expands to no occurrences".to_string(),
            ));
        }
        for window in &windows {
            self.ctx.ensure_future(window.start)?;
        }
        if let Some((a, b)) = self_overlaps(&windows).first() {
            return Err(SchedulingError::Conflict(format!(
                "occurrences starting {} and {} overlap each other",
                windows[*a].start.to_rfc3339(),
                windows[*b].start.to_rfc3339()
            )));
        }

        self.ctx.locks.with_lock(professional, || {
            for window in &windows {
                self.check_conflicts(professional, window, None)?;
            }

            let now = self.ctx.now();
            let slots: Vec<AvailabilitySlot> = windows
                .iter()
                .map(|w| AvailabilitySlot {
                    id: AvailabilityId::new(),
                    professional_id: professional,
                    service_id: service.id,
                    start: w.start,
                    end: w.end,
                    recurrence: kind,
                    created_at: now,
                    updated_at: now,
                })
                .collect();

            self.ctx.store.save_availability(&slots)?;
            tracing::info!(
                professional_id = %professional,
                service_id = %service.id,
                recurrence = %kind,
                count = slots.len(),
                "availability created"
            );
            Ok(slots)
        })
    }
}
