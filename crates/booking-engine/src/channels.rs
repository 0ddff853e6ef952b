//! Notification channel ports and in-process adapters.
//!
//! Channels are best-effort: every failure is reported as a [`ChannelError`] for the
//! dispatcher to log, never to the booking caller.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::error::ChannelError;

/// Real-time push to a group of connected clients.
pub trait RealtimeChannel: Send + Sync {
    /// Fire-and-forget publish; no delivery acknowledgment.
    fn publish(
        &self,
        group: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Transactional email delivery.
pub trait EmailChannel: Send + Sync {
    fn send(&self, message: &EmailMessage) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

/// A message delivered to real-time subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeMessage {
    pub group: String,
    pub event: String,
    pub payload: serde_json::Value,
}

const GROUP_CAPACITY: usize = 256;

type Groups = Arc<RwLock<HashMap<String, broadcast::Sender<RealtimeMessage>>>>;

/// In-process real-time hub with one broadcast channel per group.
///
/// Publishing to a group nobody subscribed to fails with `NoSubscribers`.
#[derive(Debug, Clone, Default)]
pub struct BroadcastRealtime {
    groups: Groups,
}

impl BroadcastRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a group, creating it on first use.
    pub async fn subscribe(&self, group: impl Into<String>) -> broadcast::Receiver<RealtimeMessage> {
        let mut groups = self.groups.write().await;
        groups
            .entry(group.into())
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }
}

impl RealtimeChannel for BroadcastRealtime {
    async fn publish(
        &self,
        group: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), ChannelError> {
        let groups = self.groups.read().await;
        let sender = groups
            .get(group)
            .ok_or_else(|| ChannelError::NoSubscribers(group.to_string()))?;
        sender
            .send(RealtimeMessage {
                group: group.to_string(),
                event: event.to_string(),
                payload,
            })
            .map(|_| ())
            .map_err(|_| ChannelError::NoSubscribers(group.to_string()))
    }
}

/// Recording mailer: keeps every delivered message in memory.
///
/// Recipients registered with [`fail_for`](Self::fail_for) are rejected, which lets
/// tests exercise failure isolation.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future message addressed to `recipient`.
    pub fn fail_for(&self, recipient: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(recipient.into().to_lowercase());
        }
    }

    /// Messages delivered so far, in delivery order.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl EmailChannel for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        if !message.to.contains('@') {
            return Err(ChannelError::InvalidAddress(message.to.clone()));
        }
        let rejected = self
            .failing
            .lock()
            .map(|f| f.contains(&message.to.to_lowercase()))
            .unwrap_or(false);
        if rejected {
            return Err(ChannelError::Delivery(format!(
                "mailbox {} unavailable",
                message.to
            )));
        }
        self.sent
            .lock()
            .map_err(|_| ChannelError::Delivery("outbox poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}

/// Mailer that only logs what it would send.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl EmailChannel for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "email (log only)"
        );
        Ok(())
    }
}
