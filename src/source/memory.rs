use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::model::{Category, Entity, FeedId, FeedRecord, StatusRecord};

use super::bus::{PushBus, PushEvent};
use super::{FeedSource, SourceError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceOp {
    FetchPage,
    FetchCount,
    MarkRead,
    MarkAllRead,
    DeleteAll,
    FetchEntities,
    FetchStatuses,
}

#[derive(Debug, Default)]
struct State {
    // most recent first
    records: Vec<FeedRecord>,
    entities: Vec<Entity>,
    statuses: Vec<StatusRecord>,
}

/// In-process source that publishes a full snapshot on every change.
#[derive(Debug, Default)]
pub struct MemorySource {
    state: Mutex<State>,
    bus: PushBus,
    failing: Mutex<HashSet<SourceOp>>,
    held_pages: Mutex<HashMap<(Option<Category>, u64), oneshot::Receiver<()>>>,
    calls: Mutex<Vec<SourceOp>>,
}

impl MemorySource {
    pub fn new(bus: PushBus) -> Self {
        Self { bus, ..Self::default() }
    }

    pub fn with_records(bus: PushBus, records: Vec<FeedRecord>) -> Self {
        let src = Self::new(bus);
        lock(&src.state).records = records;
        src
    }

    pub fn bus(&self) -> &PushBus { &self.bus }

    /// Prepends new records (given most recent first) and publishes.
    pub fn push_records(&self, mut fresh: Vec<FeedRecord>) {
        {
            let mut st = lock(&self.state);
            fresh.append(&mut st.records);
            st.records = fresh;
        }
        self.publish_feed();
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        lock(&self.state).entities = entities.clone();
        self.bus.publish(PushEvent::EntitiesUpdated(serde_json::to_value(entities).unwrap_or_default()));
    }

    pub fn set_statuses(&self, statuses: Vec<StatusRecord>) {
        lock(&self.state).statuses = statuses.clone();
        self.bus.publish(PushEvent::StatusSnapshotUpdated(serde_json::to_value(statuses).unwrap_or_default()));
    }

    pub fn publish_feed(&self) {
        let records = lock(&self.state).records.clone();
        self.bus.publish(PushEvent::FeedSnapshotUpdated(serde_json::to_value(records).unwrap_or_default()));
    }

    pub fn records(&self) -> Vec<FeedRecord> { lock(&self.state).records.clone() }

    /// Makes every later call of `op` fail until `recover` is called.
    pub fn fail(&self, op: SourceOp) { lock(&self.failing).insert(op); }

    pub fn recover(&self, op: SourceOp) { lock(&self.failing).remove(&op); }

    /// Holds the response of the next page read at `(category, offset)` until
    /// the returned sender fires or is dropped. The page content is read when
    /// the request arrives, not when it is released.
    pub fn hold_page(&self, category: Option<Category>, offset: u64) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.held_pages).insert((category, offset), rx);
        tx
    }

    pub fn call_count(&self, op: SourceOp) -> usize {
        lock(&self.calls).iter().filter(|c| **c == op).count()
    }

    fn enter(&self, op: SourceOp) -> Result<(), SourceError> {
        lock(&self.calls).push(op);
        if lock(&self.failing).contains(&op) {
            return Err(SourceError::Unavailable(format!("{op:?} failed")));
        }
        Ok(())
    }

    fn matching(st: &State, category: Option<Category>) -> impl Iterator<Item = &FeedRecord> {
        st.records.iter().filter(move |r| category.is_none_or(|c| r.category == c))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl FeedSource for MemorySource {
    async fn fetch_page(&self, category: Option<Category>, limit: u32, offset: u64) -> Result<Vec<FeedRecord>, SourceError> {
        self.enter(SourceOp::FetchPage)?;
        let page: Vec<FeedRecord> = {
            let st = lock(&self.state);
            Self::matching(&st, category).skip(offset as usize).take(limit as usize).cloned().collect()
        };
        let held = lock(&self.held_pages).remove(&(category, offset));
        if let Some(gate) = held {
            let _ = gate.await;
        }
        Ok(page)
    }

    async fn fetch_count(&self, category: Option<Category>) -> Result<u64, SourceError> {
        self.enter(SourceOp::FetchCount)?;
        let st = lock(&self.state);
        Ok(Self::matching(&st, category).count() as u64)
    }

    async fn mark_read(&self, id: &FeedId) -> Result<(), SourceError> {
        self.enter(SourceOp::MarkRead)?;
        let changed = {
            let mut st = lock(&self.state);
            match st.records.iter_mut().find(|r| &r.id == id) {
                Some(r) if !r.read => {
                    r.read = true;
                    true
                }
                Some(_) => false,
                None => return Err(SourceError::Decode(format!("no record {id}"))),
            }
        };
        if changed {
            self.publish_feed();
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), SourceError> {
        self.enter(SourceOp::MarkAllRead)?;
        {
            let mut st = lock(&self.state);
            st.records.iter_mut().for_each(|r| r.read = true);
        }
        self.publish_feed();
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), SourceError> {
        self.enter(SourceOp::DeleteAll)?;
        lock(&self.state).records.clear();
        self.publish_feed();
        Ok(())
    }

    async fn fetch_entities(&self) -> Result<Vec<Entity>, SourceError> {
        self.enter(SourceOp::FetchEntities)?;
        Ok(lock(&self.state).entities.clone())
    }

    async fn fetch_statuses(&self) -> Result<Vec<StatusRecord>, SourceError> {
        self.enter(SourceOp::FetchStatuses)?;
        Ok(lock(&self.state).statuses.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::bus::Topic;
    use crate::testutil::records;

    #[tokio::test]
    async fn pages_follow_offset_and_category() {
        let src = MemorySource::with_records(PushBus::default(), records("r", 9));
        let page = src.fetch_page(None, 4, 4).await.unwrap();
        assert_eq!(page.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["r4", "r5", "r6", "r7"]);
        assert_eq!(src.fetch_count(Some(Category::Video)).await.unwrap(), 3);
        let videos = src.fetch_page(Some(Category::Video), 10, 1).await.unwrap();
        assert_eq!(videos.len(), 2);
    }

    #[tokio::test]
    async fn mutations_publish_snapshots() {
        let bus = PushBus::default();
        let mut sub = bus.subscribe(&[Topic::Feed]);
        let src = MemorySource::with_records(bus, records("r", 3));
        src.mark_read(&FeedId::new("r1")).await.unwrap();
        let Some(PushEvent::FeedSnapshotUpdated(v)) = sub.recv().await else { panic!("expected snapshot") };
        assert_eq!(v[1]["read"], true);
        assert_eq!(v[0]["read"], false);
    }

    #[tokio::test]
    async fn scripted_failure_is_reported_and_recorded() {
        let src = MemorySource::new(PushBus::default());
        src.fail(SourceOp::FetchCount);
        assert!(src.fetch_count(None).await.is_err());
        src.recover(SourceOp::FetchCount);
        assert_eq!(src.fetch_count(None).await.unwrap(), 0);
        assert_eq!(src.call_count(SourceOp::FetchCount), 2);
    }
}
