use serde::Serialize;

use crate::model::Snapshot;

use super::cache::{LoadTicket, PaginatedFeedCache, TotalTicket};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Displayed page reflects the latest known snapshot.
    #[default]
    Fresh,
    /// A snapshot changed the total while the user was past page 1.
    Stale,
}

/// What the displayed page has to do about a new snapshot. Counts are always
/// refreshed on top of this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageReaction {
    ReloadFirstPage(LoadTicket),
    RefreshTotal(TotalTicket),
}

#[derive(Debug, Default)]
pub struct UpdateReconciler {
    freshness: Freshness,
}

impl UpdateReconciler {
    pub fn new() -> Self { Self::default() }

    pub fn freshness(&self) -> Freshness { self.freshness }

    pub fn is_stale(&self) -> bool { self.freshness == Freshness::Stale }

    /// New records sort to the front, so only page 1 is reloaded; any other
    /// page keeps its items to preserve the reading position. Off page 1 the
    /// view only goes stale when the snapshot moved the displayed total; a
    /// read flip alone leaves it fresh.
    pub fn on_snapshot(&mut self, snapshot: &Snapshot, cache: &mut PaginatedFeedCache) -> PageReaction {
        if cache.page() == 1 {
            return PageReaction::ReloadFirstPage(cache.begin_load(cache.filter(), 1));
        }
        if cache.total_count() != Some(snapshot.count(cache.filter())) {
            self.freshness = Freshness::Stale;
        }
        PageReaction::RefreshTotal(cache.begin_total_refresh())
    }

    pub fn on_page_applied(&mut self, ticket: &LoadTicket) {
        if ticket.page == 1 {
            self.freshness = Freshness::Fresh;
        }
    }

    pub fn on_filter_changed(&mut self) {
        self.freshness = Freshness::Fresh;
    }

    /// The "new items" affordance: reload page 1 of the current filter.
    pub fn jump_to_first_page(&mut self, cache: &mut PaginatedFeedCache) -> Option<LoadTicket> {
        if !self.is_stale() && cache.page() == 1 {
            return None;
        }
        Some(cache.begin_load(cache.filter(), 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Filter;
    use crate::testutil::records;
    use crate::view::cache::{LoadOutcome, PageFetch};

    fn snapshot_of(n: usize) -> Snapshot {
        Snapshot::from_records(records("s", n)).unwrap()
    }

    fn cache_on_page(page: u32, total: u64) -> PaginatedFeedCache {
        let all = records("r", total as usize);
        let mut cache = PaginatedFeedCache::new(100);
        let t = cache.set_filter(Filter::All);
        cache.complete_load(t, Ok(PageFetch { items: all[..100usize.min(all.len())].to_vec(), total_count: total }));
        if page > 1 {
            let t = cache.go_to_page(page).unwrap();
            let start = (page as usize - 1) * 100;
            let end = (start + 100).min(all.len());
            cache.complete_load(t, Ok(PageFetch { items: all[start..end].to_vec(), total_count: total }));
        }
        cache
    }

    #[test]
    fn snapshot_on_first_page_reloads_and_stays_fresh() {
        let mut cache = cache_on_page(1, 101);
        let mut rec = UpdateReconciler::new();

        let PageReaction::ReloadFirstPage(t) = rec.on_snapshot(&snapshot_of(104), &mut cache) else {
            panic!("expected page-1 reload");
        };
        let fresh = records("n", 104);
        assert!(matches!(
            cache.complete_load(t, Ok(PageFetch { items: fresh[..100].to_vec(), total_count: 104 })),
            LoadOutcome::Applied
        ));
        rec.on_page_applied(&t);

        assert_eq!(rec.freshness(), Freshness::Fresh);
        assert_eq!(cache.items()[0].id.as_str(), "n0");
        assert_eq!(cache.total_count(), Some(104));
    }

    #[test]
    fn snapshot_off_first_page_marks_stale_and_keeps_items() {
        let mut cache = cache_on_page(2, 101);
        let before = cache.items().to_vec();
        let mut rec = UpdateReconciler::new();

        let PageReaction::RefreshTotal(t) = rec.on_snapshot(&snapshot_of(104), &mut cache) else {
            panic!("expected total-only refresh");
        };
        assert!(cache.complete_total(t, 104));

        assert!(rec.is_stale());
        assert_eq!(cache.items(), before.as_slice());
        assert_eq!(cache.total_count(), Some(104));
        assert_eq!(cache.page(), 2);
    }

    #[test]
    fn snapshot_with_same_total_off_first_page_stays_fresh() {
        let mut cache = cache_on_page(2, 150);
        let mut rec = UpdateReconciler::new();

        let mut same = records("r", 150);
        same[120].read = true;
        let reaction = rec.on_snapshot(&Snapshot::from_records(same).unwrap(), &mut cache);

        assert!(matches!(reaction, PageReaction::RefreshTotal(_)));
        assert!(!rec.is_stale());
        assert_eq!(cache.page(), 2);
    }

    #[test]
    fn jump_to_first_page_clears_stale() {
        let mut cache = cache_on_page(2, 101);
        let mut rec = UpdateReconciler::new();
        rec.on_snapshot(&snapshot_of(104), &mut cache);

        let t = rec.jump_to_first_page(&mut cache).unwrap();
        assert_eq!(t.page, 1);
        assert!(rec.is_stale());
        cache.complete_load(t, Ok(PageFetch { items: records("n", 100), total_count: 104 }));
        rec.on_page_applied(&t);
        assert!(!rec.is_stale());
        assert!(rec.jump_to_first_page(&mut cache).is_none());
    }

    #[test]
    fn filter_change_resets_stale() {
        let mut cache = cache_on_page(2, 150);
        let mut rec = UpdateReconciler::new();
        rec.on_snapshot(&snapshot_of(151), &mut cache);
        assert!(rec.is_stale());
        rec.on_filter_changed();
        assert_eq!(rec.freshness(), Freshness::Fresh);
    }
}
