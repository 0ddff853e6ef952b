//! Tests for notification fan-out.

use booking_engine::calendar::CalendarEncoder;
use booking_engine::error::CalendarError;
use booking_engine::events::{event_channel, BookingNotice};
use booking_engine::model::{BookingId, BookingStatus, ProfessionalId};
use booking_engine::{
    BookingEvent, BroadcastRealtime, EngineConfig, IcsEncoder, MemoryMailer, NotificationDispatcher,
};
use chrono::{TimeZone, Utc};

fn notice() -> BookingNotice {
    BookingNotice {
        booking_id: BookingId::new(),
        professional_id: ProfessionalId::new(),
        professional_name: "Dana Reyes".to_string(),
        professional_email: "dana@example.com".to_string(),
        location: Some("12 Harbour St".to_string()),
        client_name: "Ada".to_string(),
        client_email: "ada@example.com".to_string(),
        service_name: "Physiotherapy".to_string(),
        price_cents: 6500,
        start: Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 1, 8, 9, 30, 0).unwrap(),
        status: BookingStatus::Pending,
        notes: None,
        created_at: Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap(),
    }
}

/// Encoder that always fails, to exercise the empty-artifact path.
struct BrokenEncoder;

impl CalendarEncoder for BrokenEncoder {
    fn encode(&self, _notice: &BookingNotice) -> Result<String, CalendarError> {
        Err(CalendarError::InvalidEntry("broken".to_string()))
    }
}

#[tokio::test]
async fn new_booking_reaches_every_channel() {
    let realtime = BroadcastRealtime::new();
    let mailer = MemoryMailer::new();
    let event = BookingEvent::new_booking(notice());
    let mut rx = realtime.subscribe(event.notice.group_key()).await;

    let dispatcher = NotificationDispatcher::new(
        realtime.clone(),
        mailer.clone(),
        IcsEncoder::default(),
        EngineConfig::default(),
    );
    let report = dispatcher.dispatch(&event).await;

    assert!(report.artifact_built);
    assert!(report.realtime_delivered);
    assert_eq!(report.client_email_sent, Some(true));
    assert_eq!(report.professional_email_sent, Some(true));

    let message = rx.recv().await.unwrap();
    assert_eq!(message.event, "ReceiveNotification");
    assert_eq!(message.payload["type"], "NewBooking");
    assert_eq!(message.payload["clientName"], "Ada");
    assert_eq!(message.payload["serviceName"], "Physiotherapy");
    assert_eq!(
        message.payload["bookingId"],
        event.notice.booking_id.to_string()
    );

    let sent = mailer.sent();
    assert_eq!(sent.len(), 2);
    let to_client = sent.iter().find(|m| m.to == "ada@example.com").unwrap();
    assert_eq!(to_client.subject, "Booking request received: Physiotherapy");
    assert_eq!(to_client.attachments.len(), 1);
    assert_eq!(to_client.attachments[0].filename, "booking.ics");
    let ics = String::from_utf8(to_client.attachments[0].content.clone()).unwrap();
    assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));

    let to_professional = sent.iter().find(|m| m.to == "dana@example.com").unwrap();
    assert_eq!(to_professional.subject, "New booking: Physiotherapy with Ada");
    assert!(to_professional.attachments.is_empty());
}

#[tokio::test]
async fn one_failing_channel_does_not_block_the_others() {
    let mailer = MemoryMailer::new();
    mailer.fail_for("ada@example.com");
    // Nobody subscribed, so the real-time push fails too.
    let dispatcher = NotificationDispatcher::new(
        BroadcastRealtime::new(),
        mailer.clone(),
        IcsEncoder::default(),
        EngineConfig::default(),
    );

    let report = dispatcher
        .dispatch(&BookingEvent::new_booking(notice()))
        .await;

    assert!(!report.realtime_delivered);
    assert_eq!(report.client_email_sent, Some(false));
    assert_eq!(report.professional_email_sent, Some(true));
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "dana@example.com");
}

#[tokio::test]
async fn encoder_failure_sends_confirmation_without_attachment() {
    let mailer = MemoryMailer::new();
    let dispatcher = NotificationDispatcher::new(
        BroadcastRealtime::new(),
        mailer.clone(),
        BrokenEncoder,
        EngineConfig::default(),
    );

    let report = dispatcher
        .dispatch(&BookingEvent::new_booking(notice()))
        .await;

    assert!(!report.artifact_built);
    assert_eq!(report.client_email_sent, Some(true));
    let to_client = mailer
        .sent()
        .into_iter()
        .find(|m| m.to == "ada@example.com")
        .unwrap();
    assert!(to_client.attachments.is_empty());
}

#[tokio::test]
async fn updates_go_to_realtime_only() {
    let realtime = BroadcastRealtime::new();
    let mailer = MemoryMailer::new();
    let mut updated = notice();
    updated.status = BookingStatus::Confirmed;
    let event = BookingEvent::updated(updated);
    let mut rx = realtime.subscribe(event.notice.group_key()).await;

    let dispatcher = NotificationDispatcher::new(
        realtime.clone(),
        mailer.clone(),
        IcsEncoder::default(),
        EngineConfig {
            realtime_event: "BookingChanged".to_string(),
            ..EngineConfig::default()
        },
    );
    let report = dispatcher.dispatch(&event).await;

    assert!(report.realtime_delivered);
    assert_eq!(report.client_email_sent, None);
    assert_eq!(report.professional_email_sent, None);
    assert!(mailer.sent().is_empty());

    let message = rx.recv().await.unwrap();
    assert_eq!(message.event, "BookingChanged");
    assert_eq!(message.payload["type"], "BookingUpdated");
    assert_eq!(message.payload["message"], "Booking of Ada for Physiotherapy is now Confirmed");
}

#[tokio::test]
async fn spawned_dispatcher_drains_queue_and_stops() {
    let realtime = BroadcastRealtime::new();
    let mailer = MemoryMailer::new();
    let (publisher, events) = event_channel(8);

    let handle = NotificationDispatcher::new(
        realtime,
        mailer.clone(),
        IcsEncoder::default(),
        EngineConfig::default(),
    )
    .spawn(events);

    assert!(publisher.emit(BookingEvent::new_booking(notice())));
    assert!(publisher.emit(BookingEvent::new_booking(notice())));
    drop(publisher);

    handle.await.unwrap();
    assert_eq!(mailer.sent().len(), 4);
}

#[test]
fn full_queue_drops_instead_of_blocking() {
    let (publisher, mut events) = event_channel(1);
    assert!(publisher.emit(BookingEvent::new_booking(notice())));
    assert!(!publisher.emit(BookingEvent::new_booking(notice())));
    assert!(events.try_recv().is_ok());
    assert!(events.try_recv().is_err());

    drop(events);
    assert!(!publisher.emit(BookingEvent::new_booking(notice())));
}

#[tokio::test]
async fn log_mailer_accepts_everything() {
    let dispatcher = NotificationDispatcher::new(
        BroadcastRealtime::new(),
        booking_engine::LogMailer,
        IcsEncoder::default(),
        EngineConfig::default(),
    );
    let report = dispatcher
        .dispatch(&BookingEvent::new_booking(notice()))
        .await;
    assert_eq!(report.client_email_sent, Some(true));
    assert_eq!(report.professional_email_sent, Some(true));
}
