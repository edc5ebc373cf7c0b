use std::collections::HashMap;

use crate::model::{FeedId, FeedRecord};

use super::token::RequestToken;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    MarkRead(FeedId),
    MarkAllRead,
    DeleteAll,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::MarkRead(_) => "mark_read",
            Mutation::MarkAllRead => "mark_all_read",
            Mutation::DeleteAll => "delete_all",
        }
    }
}

/// Proof that the caller obtained an explicit confirmation before wiping the feed.
#[derive(Clone, Copy, Debug)]
pub struct DeleteAllConfirmed(());

impl DeleteAllConfirmed {
    pub fn confirmed_by_caller() -> Self { DeleteAllConfirmed(()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    InFlight,
    // durable call settled once every load up to this token had been issued
    Settled(RequestToken),
}

/// Local read flips that are ahead of the source. Flips are never rolled
/// back; they stop being re-applied once a load issued after the durable call
/// settled has landed, at which point the source is authoritative again.
#[derive(Debug, Default)]
pub struct OptimisticMutationLayer {
    pending: HashMap<FeedId, Pending>,
    entered: bool,
}

impl OptimisticMutationLayer {
    pub fn new() -> Self { Self::default() }

    /// Flips `read` on the cached record. Returns true when a durable call
    /// should follow; false when the record is absent or already read.
    pub fn mark_read(&mut self, id: &FeedId, items: &mut [FeedRecord]) -> bool {
        let Some(record) = items.iter_mut().find(|r| &r.id == id) else { return false };
        if record.read {
            return false;
        }
        record.read = true;
        self.pending.insert(id.clone(), Pending::InFlight);
        true
    }

    pub fn settle_read(&mut self, id: &FeedId, last_issued: RequestToken) {
        if let Some(p) = self.pending.get_mut(id) {
            *p = Pending::Settled(last_issued);
        }
    }

    /// Re-applies pending flips to a freshly loaded window.
    pub fn overlay(&mut self, loaded_by: RequestToken, items: &mut [FeedRecord]) -> usize {
        self.pending.retain(|_, p| !matches!(p, Pending::Settled(at) if loaded_by > *at));
        let mut applied = 0;
        for record in items.iter_mut().filter(|r| !r.read) {
            if self.pending.contains_key(&record.id) {
                record.read = true;
                applied += 1;
            }
        }
        applied
    }

    pub fn pending(&self) -> usize { self.pending.len() }

    /// True exactly once per view activation.
    pub fn enter_view(&mut self) -> bool {
        !std::mem::replace(&mut self.entered, true)
    }

    pub fn clear(&mut self) { self.pending.clear(); }
}
