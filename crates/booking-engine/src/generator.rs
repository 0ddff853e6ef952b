//! Availability expansion: turns one availability request into candidate windows.
//!
//! The built-in recurrence kinds are expanded lazily by [`Occurrences`]; custom
//! RFC 5545 rules go through the `rrule` crate and are expanded eagerly, both
//! under the same occurrence cap.

use chrono::{DateTime, Duration, Months, Utc};
use rrule::RRuleSet;

use crate::config::DEFAULT_MAX_OCCURRENCES;
use crate::error::{Result, SchedulingError};
use crate::model::{RecurrenceKind, Service, TimeWindow};

/// Expands availability requests for a service into candidate windows.
///
/// Does not check conflicts or persist anything.
#[derive(Debug, Clone, Copy)]
pub struct SlotGenerator {
    max_occurrences: u32,
}

impl Default for SlotGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OCCURRENCES)
    }
}

impl SlotGenerator {
    pub fn new(max_occurrences: u32) -> Self {
        Self {
            max_occurrences: max_occurrences.max(1),
        }
    }

    /// Expand `start` under `kind` into windows of the service's duration.
    ///
    /// - `None` yields the single window `[start, start + duration)`.
    /// - `Daily`/`Weekly`/`Monthly` yield one window per step while the occurrence
    ///   start does not exceed `until`. Each step advances the previous occurrence;
    ///   a monthly step landing past the end of a shorter month clamps to its last
    ///   day, and later steps continue from the clamped date.
    ///
    /// # Errors
    /// Returns `SchedulingError::Validation` if the service has no duration, if `until`
    /// is missing or earlier than `start` for a repeating kind, or if the series would
    /// exceed the configured occurrence cap.
    pub fn generate(
        &self,
        service: &Service,
        start: DateTime<Utc>,
        kind: RecurrenceKind,
        until: Option<DateTime<Utc>>,
    ) -> Result<Occurrences> {
        let duration = service_duration(service)?;

        let until = match (kind, until) {
            (RecurrenceKind::None, _) => None,
            (_, None) => {
                return Err(SchedulingError::Validation(format!(
                    "an end date is required for {kind} availability"
                )))
            }
            (_, Some(until)) if until < start => {
                return Err(SchedulingError::Validation(format!(
                    "recurrence end {} is before start {}",
                    until.to_rfc3339(),
                    start.to_rfc3339()
                )))
            }
            (_, Some(until)) => Some(until),
        };

        let occurrences = Occurrences {
            anchor: start,
            duration,
            kind,
            until,
            next: Some(start),
        };

        let cap = self.max_occurrences as usize;
        if occurrences.clone().take(cap + 1).count() > cap {
            return Err(SchedulingError::Validation(format!(
                "{kind} series expands to more than {cap} occurrences"
            )));
        }

        Ok(occurrences)
    }

    /// Expand an RFC 5545 RRULE body (e.g. `FREQ=WEEKLY;BYDAY=TU,TH`) anchored at `start` in UTC.
    ///
    /// `until` is injected into the rule when the rule has neither `UNTIL` nor `COUNT`;
    /// otherwise it is applied as a filter on occurrence starts.
    ///
    /// # Errors
    /// Returns `SchedulingError::Validation` for an empty or unparseable rule, for an
    /// unbounded rule without `until`, or when the expansion exceeds the occurrence cap.
    pub fn generate_rule(
        &self,
        service: &Service,
        start: DateTime<Utc>,
        rule: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeWindow>> {
        let duration = service_duration(service)?;

        let rule = rule.trim().trim_start_matches("RRULE:");
        if rule.is_empty() {
            return Err(SchedulingError::Validation("empty recurrence rule".to_string()));
        }

        let upper = rule.to_uppercase();
        let bounded = upper.contains("COUNT=") || upper.contains("UNTIL=");
        let mut rule_str = rule.to_string();
        match until {
            Some(until) if !bounded => {
                rule_str = format!("{};UNTIL={}", rule_str, ical_utc(until));
            }
            None if !bounded => {
                return Err(SchedulingError::Validation(
                    "recurrence rule needs COUNT, UNTIL or an end date".to_string(),
                ))
            }
            _ => {}
        }

        let rule_text = format!("DTSTART:{}\nRRULE:{}", ical_utc(start), rule_str);
        let rule_set: RRuleSet = rule_text
            .parse()
            .map_err(|e| SchedulingError::Validation(format!("invalid recurrence rule: {e}")))?;

        let cap = self.max_occurrences as usize;
        let limit = u16::try_from(cap + 1).unwrap_or(u16::MAX);
        let instances = rule_set.all(limit);

        let windows: Vec<TimeWindow> = instances
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|s| until.map_or(true, |u| *s <= u))
            .map(|s| TimeWindow {
                start: s,
                end: s + duration,
            })
            .collect();

        if windows.len() > cap {
            return Err(SchedulingError::Validation(format!(
                "recurrence rule expands to more than {cap} occurrences"
            )));
        }

        Ok(windows)
    }
}

fn service_duration(service: &Service) -> Result<Duration> {
    if service.duration_minutes == 0 {
        return Err(SchedulingError::Validation(format!(
            "service {} has no duration",
            service.id
        )));
    }
    Ok(service.duration())
}

/// iCalendar UTC form, e.g. `20260217T140000Z`.
fn ical_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Lazy, finite, restartable sequence of candidate windows.
#[derive(Debug, Clone)]
pub struct Occurrences {
    anchor: DateTime<Utc>,
    duration: Duration,
    kind: RecurrenceKind,
    until: Option<DateTime<Utc>>,
    next: Option<DateTime<Utc>>,
}

impl Occurrences {
    /// Rewind to the first occurrence.
    pub fn restart(&mut self) {
        self.next = Some(self.anchor);
    }

    pub fn kind(&self) -> RecurrenceKind {
        self.kind
    }

    /// Start of the occurrence after `previous`.
    fn step(&self, previous: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.kind {
            RecurrenceKind::None => None,
            RecurrenceKind::Daily => previous.checked_add_signed(Duration::days(1)),
            RecurrenceKind::Weekly => previous.checked_add_signed(Duration::weeks(1)),
            RecurrenceKind::Monthly => previous.checked_add_months(Months::new(1)),
        }
    }
}

impl Iterator for Occurrences {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        let start = self.next?;
        if let Some(until) = self.until {
            if start > until {
                self.next = None;
                return None;
            }
        }
        self.next = self.step(start);
        Some(TimeWindow {
            start,
            end: start + self.duration,
        })
    }
}
