//! Notification fan-out for booking events.
//!
//! The dispatcher is the sole consumer of the booking event queue. For each event it
//! builds a calendar artifact, pushes a real-time message to the professional's group
//! and sends the transactional emails. Each channel is its own failure domain: errors
//! are logged and recorded in the [`DispatchReport`], never propagated.

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::calendar::{format_price, CalendarEncoder};
use crate::channels::{Attachment, EmailChannel, EmailMessage, RealtimeChannel};
use crate::config::EngineConfig;
use crate::error::ChannelError;
use crate::events::{BookingEvent, BookingNotice, NotificationKind};

/// What happened to one event on each channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// `false` when the encoder failed and an empty artifact was used.
    pub artifact_built: bool,
    pub realtime_delivered: bool,
    /// `None` when the event kind sends no client email.
    pub client_email_sent: Option<bool>,
    /// `None` when the event kind sends no professional email.
    pub professional_email_sent: Option<bool>,
}

pub struct NotificationDispatcher<R, E, C> {
    realtime: R,
    email: E,
    encoder: C,
    config: EngineConfig,
}

impl<R, E, C> NotificationDispatcher<R, E, C>
where
    R: RealtimeChannel,
    E: EmailChannel,
    C: CalendarEncoder,
{
    pub fn new(realtime: R, email: E, encoder: C, config: EngineConfig) -> Self {
        Self {
            realtime,
            email,
            encoder,
            config,
        }
    }

    /// Consume events until every publisher is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<BookingEvent>) {
        tracing::info!("notification dispatcher started");
        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
        }
        tracing::info!("notification dispatcher stopped");
    }

    /// Run the consumer loop on a background task.
    pub fn spawn(self, events: mpsc::Receiver<BookingEvent>) -> JoinHandle<()>
    where
        R: 'static,
        E: 'static,
        C: 'static,
    {
        tokio::spawn(self.run(events))
    }

    /// Fan one event out to every channel.
    pub async fn dispatch(&self, event: &BookingEvent) -> DispatchReport {
        let notice = &event.notice;
        let mut report = DispatchReport::default();

        let realtime = self.push_realtime(event).await;
        report.realtime_delivered = log_outcome(notice, "realtime", realtime);

        if event.kind != NotificationKind::NewBooking {
            return report;
        }

        let artifact = match self.encoder.encode(notice) {
            Ok(text) => {
                report.artifact_built = true;
                text
            }
            Err(err) => {
                tracing::warn!(booking_id = %notice.booking_id, error = %err, "calendar artifact failed, sending without it");
                String::new()
            }
        };

        let client_message = self.client_confirmation(notice, &artifact);
        let professional_message = self.professional_alert(notice);
        let (client, professional) = tokio::join!(
            self.email.send(&client_message),
            self.email.send(&professional_message),
        );
        report.client_email_sent = Some(log_outcome(notice, "client email", client));
        report.professional_email_sent = Some(log_outcome(notice, "professional email", professional));

        report
    }

    async fn push_realtime(&self, event: &BookingEvent) -> Result<(), ChannelError> {
        let notice = &event.notice;
        let payload = json!({
            "type": event.kind,
            "bookingId": notice.booking_id,
            "clientName": notice.client_name,
            "serviceName": notice.service_name,
            "startTime": notice.start.to_rfc3339(),
            "message": event.message(),
        });
        self.realtime
            .publish(&notice.group_key(), &self.config.realtime_event, payload)
            .await
    }

    fn client_confirmation(&self, notice: &BookingNotice, artifact: &str) -> EmailMessage {
        let attachments = if artifact.is_empty() {
            Vec::new()
        } else {
            vec![Attachment {
                filename: "booking.ics".to_string(),
                content_type: "text/calendar; charset=utf-8; method=REQUEST".to_string(),
                content: artifact.as_bytes().to_vec(),
            }]
        };

        EmailMessage {
            from: self.config.mail_from.clone(),
            to: notice.client_email.clone(),
            subject: format!("Booking request received: {}", notice.service_name),
            html_body: render_html(
                &format!("Hi {},", notice.client_name),
                "Your booking request has been received.",
                notice,
            ),
            attachments,
        }
    }

    fn professional_alert(&self, notice: &BookingNotice) -> EmailMessage {
        EmailMessage {
            from: self.config.mail_from.clone(),
            to: notice.professional_email.clone(),
            subject: format!("New booking: {} with {}", notice.service_name, notice.client_name),
            html_body: render_html(
                &format!("Hi {},", notice.professional_name),
                &format!("{} booked a new appointment.", notice.client_name),
                notice,
            ),
            attachments: Vec::new(),
        }
    }
}

fn log_outcome(notice: &BookingNotice, channel: &str, outcome: Result<(), ChannelError>) -> bool {
    match outcome {
        Ok(()) => {
            tracing::debug!(booking_id = %notice.booking_id, channel, "notification delivered");
            true
        }
        Err(err) => {
            tracing::warn!(booking_id = %notice.booking_id, channel, error = %err, "notification delivery failed");
            false
        }
    }
}

fn render_html(greeting: &str, lead: &str, notice: &BookingNotice) -> String {
    let notes = notice
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("<p><strong>Notes:</strong> {}</p>", html_escape(n)))
        .unwrap_or_default();
    let location = notice
        .location
        .as_deref()
        .map(|l| format!("<p><strong>Location:</strong> {}</p>", html_escape(l)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{service}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <p>{greeting}</p>
        <p>{lead}</p>
        <p><strong>Service:</strong> {service}</p>
        <p><strong>Professional:</strong> {professional}</p>
        <p><strong>When:</strong> {start} - {end}</p>
        <p><strong>Price:</strong> {price}</p>
        {location}
        {notes}
    </div>
</body>
</html>"#,
        greeting = html_escape(greeting),
        lead = html_escape(lead),
        service = html_escape(&notice.service_name),
        professional = html_escape(&notice.professional_name),
        start = notice.start.format("%Y-%m-%d %H:%M UTC"),
        end = notice.end.format("%H:%M UTC"),
        price = format_price(notice.price_cents),
    )
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
