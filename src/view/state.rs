use std::collections::BTreeMap;

use serde::Serialize;

use crate::live::JoinedView;
use crate::model::Filter;

use super::cache::PageWindow;
use super::counts::FilterCount;
use super::reconcile::Freshness;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ViewStats {
    pub applied_loads: u64,
    pub superseded_loads: u64,
    pub failed_loads: u64,
    pub snapshots: u64,
    pub rejected_snapshots: u64,
    /// Finished tab count rounds, whether or not every read succeeded.
    pub count_rounds: u64,
    pub settled_mutations: u64,
    pub failed_mutations: u64,
}

/// What a renderer sees after each step of the view actor.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub filter: Filter,
    pub page: u32,
    pub total_pages: Option<u32>,
    pub loading: bool,
    pub freshness: Freshness,
    pub window: Option<PageWindow>,
    pub counts: BTreeMap<Filter, FilterCount>,
    pub live: JoinedView,
    pub pending_reads: usize,
    pub stats: ViewStats,
}

impl ViewState {
    pub fn count(&self, filter: Filter) -> Option<u64> { self.counts.get(&filter).map(|c| c.value) }

    pub fn is_stale(&self) -> bool { self.freshness == Freshness::Stale }

    /// A window for the selected filter and page is displayed and nothing is loading.
    pub fn is_settled(&self) -> bool {
        !self.loading
            && self.window.as_ref().is_some_and(|w| w.filter == self.filter && w.page == self.page)
    }

    pub fn item_ids(&self) -> Vec<&str> {
        self.window.as_ref().map(|w| w.items.iter().map(|r| r.id.as_str()).collect()).unwrap_or_default()
    }
}
