//! Fire-and-forget change broadcast for live views.
//!
//! Delivery to clients is someone else's job; publishing never blocks or
//! fails a request, with or without subscribers.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    ParticipantJoined,
    AvailabilityChanged,
    Locked,
    Reopened,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventChange {
    pub share_id: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<EventChange>,
}

impl Default for Notifier {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl Notifier {
    pub fn subscribe(&self) -> broadcast::Receiver<EventChange> {
        self.tx.subscribe()
    }

    pub fn publish(&self, share_id: &str, kind: ChangeKind) {
        let change = EventChange {
            share_id: share_id.to_string(),
            kind,
        };
        match self.tx.send(change) {
            Ok(receivers) => debug!(share_id, ?kind, receivers, "change published"),
            Err(_) => debug!(share_id, ?kind, "change dropped, no subscribers"),
        }
    }
}
