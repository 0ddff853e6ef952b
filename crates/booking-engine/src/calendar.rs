//! Calendar artifact encoding (RFC 5545 `VCALENDAR` text).
//!
//! The artifact is attached to the client's confirmation email so the booking can be
//! imported into any calendar application.

use chrono::{DateTime, Utc};

use crate::error::CalendarError;
use crate::events::BookingNotice;
use crate::model::BookingStatus;

/// Maximum octets per content line before folding (RFC 5545 §3.1).
const MAX_LINE_OCTETS: usize = 75;

/// Encodes a booking snapshot into portable calendar text.
pub trait CalendarEncoder: Send + Sync {
    /// # Errors
    /// Returns `CalendarError::InvalidEntry` when the notice cannot be represented.
    fn encode(&self, notice: &BookingNotice) -> Result<String, CalendarError>;
}

/// iCalendar encoder producing one `VEVENT` per booking.
#[derive(Debug, Clone)]
pub struct IcsEncoder {
    prodid: String,
}

impl IcsEncoder {
    pub fn new(prodid: impl Into<String>) -> Self {
        Self {
            prodid: prodid.into(),
        }
    }
}

impl Default for IcsEncoder {
    fn default() -> Self {
        Self::new("-//booking-engine//EN")
    }
}

impl CalendarEncoder for IcsEncoder {
    fn encode(&self, notice: &BookingNotice) -> Result<String, CalendarError> {
        if notice.start >= notice.end {
            return Err(CalendarError::InvalidEntry(format!(
                "booking {} ends before it starts",
                notice.booking_id
            )));
        }
        let organizer = mailto_address(&notice.client_email);
        if organizer.is_empty() {
            return Err(CalendarError::InvalidEntry(format!(
                "booking {} has no organizer email",
                notice.booking_id
            )));
        }

        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!("PRODID:{}", self.prodid),
            "CALSCALE:GREGORIAN".to_string(),
            "METHOD:REQUEST".to_string(),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", notice.booking_id),
            format!("DTSTAMP:{}", ical_utc(notice.created_at)),
            format!("DTSTART:{}", ical_utc(notice.start)),
            format!("DTEND:{}", ical_utc(notice.end)),
            format!(
                "SUMMARY:{}",
                escape_text(&format!(
                    "{} with {}",
                    notice.service_name, notice.professional_name
                ))
            ),
        ];
        if let Some(location) = notice.location.as_deref().filter(|l| !l.trim().is_empty()) {
            lines.push(format!("LOCATION:{}", escape_text(location)));
        }
        lines.push(format!(
            "ORGANIZER;CN=\"{}\":mailto:{}",
            param_value(&notice.client_name),
            organizer
        ));
        lines.push(format!("DESCRIPTION:{}", escape_text(&describe(notice))));
        lines.push(format!("STATUS:{}", ical_status(notice.status)));
        lines.push("END:VEVENT".to_string());
        lines.push("END:VCALENDAR".to_string());

        let mut out = String::new();
        for line in &lines {
            out.push_str(&fold_line(line));
            out.push_str("\r\n");
        }
        Ok(out)
    }
}

fn describe(notice: &BookingNotice) -> String {
    let mut description = format!(
        "Service: {}\nProfessional: {}\nPrice: {}",
        notice.service_name,
        notice.professional_name,
        format_price(notice.price_cents)
    );
    if let Some(notes) = notice.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        description.push_str("\nNotes: ");
        description.push_str(notes);
    }
    description
}

fn ical_status(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "TENTATIVE",
        BookingStatus::Confirmed | BookingStatus::Completed | BookingStatus::NoShow => "CONFIRMED",
        BookingStatus::Canceled => "CANCELLED",
    }
}

/// `12345` -> `123.45`.
pub fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn ical_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape a TEXT value (RFC 5545 §3.3.11).
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push('\t'),
            c if c.is_control() => {}
            other => out.push(other),
        }
    }
    out
}

/// Quoted parameter value: RFC 5545 forbids control characters and `"` there.
pub fn param_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Address part of a `mailto:` URI, with whitespace and control characters removed.
fn mailto_address(email: &str) -> String {
    email
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect()
}

/// Fold a content line so no physical line exceeds 75 octets.
///
/// Continuation lines start with a single space, which counts toward the limit.
/// Splits only on char boundaries so multi-byte characters stay intact.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut used = 0;
    for c in line.chars() {
        let width = c.len_utf8();
        if used + width > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            used = 1;
        }
        out.push(c);
        used += width;
    }
    out
}
