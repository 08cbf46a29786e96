use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use ulid::Ulid;

use crate::model::{Event, RefundDue};

const CHANNEL_CAPACITY: usize = 256;

/// Per-resource feed of committed events. Refund and notification
/// collaborators subscribe here instead of polling.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a resource's events. Creates the channel if needed.
    pub fn subscribe(&self, resource_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(resource_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, resource_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&resource_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Refund obligations only, for the collaborator that pays money back.
    pub fn subscribe_refunds(&self, resource_id: Ulid) -> RefundFeed {
        RefundFeed {
            resource_id,
            rx: self.subscribe(resource_id),
        }
    }

    /// Drop a deleted resource's channel; its subscribers see the feed close.
    pub fn remove(&self, resource_id: &Ulid) {
        self.channels.remove(resource_id);
    }
}

pub struct RefundFeed {
    resource_id: Ulid,
    rx: broadcast::Receiver<Event>,
}

impl RefundFeed {
    /// Next refund owed on this resource, or `None` once the resource is gone.
    pub async fn recv(&mut self) -> Option<RefundDue> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Some(due) = event.refund_due() {
                        return Some(due);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("refund feed for {} lagged, {skipped} events skipped", self.resource_id);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
