use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::telemetry;

pub const DEFAULT_BUS_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Feed,
    Status,
    Entities,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Feed, Topic::Status, Topic::Entities];
}

/// Wholesale collection updates. Payloads stay raw JSON until the consumer
/// validates them.
#[derive(Clone, Debug)]
pub enum PushEvent {
    FeedSnapshotUpdated(Value),
    StatusSnapshotUpdated(Value),
    EntitiesUpdated(Value),
}

impl PushEvent {
    pub fn topic(&self) -> Topic {
        match self {
            PushEvent::FeedSnapshotUpdated(_) => Topic::Feed,
            PushEvent::StatusSnapshotUpdated(_) => Topic::Status,
            PushEvent::EntitiesUpdated(_) => Topic::Entities,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PushBus {
    tx: broadcast::Sender<PushEvent>,
}

impl Default for PushBus {
    fn default() -> Self { Self::new(DEFAULT_BUS_CAPACITY) }
}

impl PushBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: PushEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        Subscription { rx: self.tx.subscribe(), topics: topics.to_vec() }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

/// Live registration on the bus. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<PushEvent>,
    topics: Vec<Topic>,
}

impl Subscription {
    /// Next event on a subscribed topic; `None` once the bus is gone.
    /// Missed events are skipped since every event is a full snapshot.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if self.topics.contains(&ev.topic()) => return Some(ev),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    telemetry::view().warn_kv("push subscriber lagged", [("missed", missed.to_string())]);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
