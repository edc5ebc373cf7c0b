use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::model::{Entity, StatusRecord};
use crate::telemetry::{self};
use crate::telemetry::ops::poll::Phase as PollPhase;

use super::bus::{PushBus, PushEvent};
use super::pg::{FeedFingerprint, PgSource};
use super::FeedSource;

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Published {
    feed: Option<FeedFingerprint>,
    statuses: Option<Vec<StatusRecord>>,
    entities: Option<Vec<Entity>>,
}

/// Turns the pull-only database into the push channel: wakes every
/// `interval`, and publishes a full snapshot of each collection that changed
/// since the last publish.
pub struct SnapshotPoller {
    source: Arc<PgSource>,
    bus: PushBus,
    interval: Duration,
}

impl SnapshotPoller {
    pub fn new(source: Arc<PgSource>, bus: PushBus, interval: Duration) -> Self {
        Self { source, bus, interval: interval.max(MIN_POLL_INTERVAL) }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let log = telemetry::poll();
        log.info_kv("poller started", [("interval_ms", self.interval.as_millis().to_string())]);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut published = Published::default();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.poll_once(&mut published).await {
                        log.warn_kv("poll failed", [("error", err.to_string())]);
                    }
                }
            }
        }
        log.debug("poller stopped");
    }

    async fn poll_once(&self, published: &mut Published) -> Result<()> {
        let log = telemetry::poll();

        let fp = self.source.fingerprint().instrument(log.span(&PollPhase::Fingerprint)).await?;
        if feed_changed(published.feed, fp) {
            let records = self.source.fetch_snapshot().instrument(log.span(&PollPhase::FetchSnapshot)).await?;
            let n = records.len();
            self.publish(PushEvent::FeedSnapshotUpdated(serde_json::to_value(records)?));
            published.feed = Some(fp);
            log.debug_kv("feed snapshot published", [("records", n.to_string())]);
        }

        let statuses = self.source.fetch_statuses().await?;
        if let Some(value) = changed(&mut published.statuses, statuses)? {
            self.publish(PushEvent::StatusSnapshotUpdated(value));
        }

        let entities = self.source.fetch_entities().await?;
        if let Some(value) = changed(&mut published.entities, entities)? {
            self.publish(PushEvent::EntitiesUpdated(value));
        }
        Ok(())
    }

    fn publish(&self, event: PushEvent) {
        let log = telemetry::poll();
        let _s = log.span(&PollPhase::Publish).entered();
        let delivered = self.bus.publish(event);
        if delivered == 0 {
            log.debug("no subscribers for snapshot");
        }
    }
}

fn feed_changed(last: Option<FeedFingerprint>, next: FeedFingerprint) -> bool {
    last != Some(next)
}

/// Serializes `next` if it differs from what was published last.
fn changed<T: PartialEq + Serialize>(last: &mut Option<T>, next: T) -> Result<Option<serde_json::Value>> {
    if last.as_ref() == Some(&next) {
        return Ok(None);
    }
    let value = serde_json::to_value(&next)?;
    *last = Some(next);
    Ok(Some(value))
}
