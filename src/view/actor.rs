use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::live::EntityJoinIndex;
use crate::model::{decode_entities, decode_statuses, Entity, FeedId, Filter, Snapshot, StatusRecord};
use crate::source::{FeedSource, PushBus, PushEvent, SourceError, Subscription, Topic};
use crate::telemetry::{self, ctx::LogCtx};
use crate::telemetry::ops::view::{Phase as ViewPhase, View};

use super::cache::{LoadOutcome, LoadTicket, PageFetch, PaginatedFeedCache, TotalTicket};
use super::config::ViewConfig;
use super::counts::{CountsTicket, FilterCountIndex, RefreshReason};
use super::handle::ViewHandle;
use super::optimistic::{DeleteAllConfirmed, Mutation, OptimisticMutationLayer};
use super::reconcile::{PageReaction, UpdateReconciler};
use super::state::{ViewState, ViewStats};

#[derive(Debug)]
pub enum ViewCommand {
    SetFilter(Filter),
    GoToPage(u32),
    JumpToFirstPage,
    MarkRead(FeedId),
    DeleteAll(DeleteAllConfirmed),
}

enum Completion {
    Page { ticket: LoadTicket, result: Result<PageFetch, SourceError> },
    Total { ticket: TotalTicket, result: Result<u64, SourceError> },
    Counts { ticket: CountsTicket, results: Vec<(Filter, Result<u64, SourceError>)> },
    Mutation { mutation: Mutation, result: Result<(), SourceError> },
    Entities { generation: u64, result: Result<Vec<Entity>, SourceError> },
    Statuses { generation: u64, result: Result<Vec<StatusRecord>, SourceError> },
}

/// The feed view: a single task owning the page cache, tab counts, optimistic
/// flips, freshness and the live join. Commands, pushes and pull completions
/// are applied one at a time, so no state is shared with the source.
pub struct FeedView {
    source: Arc<dyn FeedSource>,
    config: ViewConfig,
    cache: PaginatedFeedCache,
    counts: FilterCountIndex,
    optimistic: OptimisticMutationLayer,
    reconciler: UpdateReconciler,
    join: EntityJoinIndex,
    inflight: FuturesUnordered<BoxFuture<'static, Completion>>,
    // bumped by every push; a pull issued before the latest push is dropped
    entities_gen: u64,
    statuses_gen: u64,
    stats: ViewStats,
    state_tx: watch::Sender<ViewState>,
    log: LogCtx<View>,
}

impl FeedView {
    /// Subscribes to `bus` before returning, so no push published after
    /// activation can be missed, then starts the view task.
    pub fn activate(source: Arc<dyn FeedSource>, bus: &PushBus, config: ViewConfig) -> ViewHandle {
        let subscription = bus.subscribe(&Topic::ALL);
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ViewState::default());
        let cancel = CancellationToken::new();
        let view = FeedView::new(source, config, state_tx);
        let task = tokio::spawn(view.run(subscription, cmd_rx, cancel.clone()));
        ViewHandle::new(cmd_tx, state_rx, cancel, task)
    }

    fn new(source: Arc<dyn FeedSource>, config: ViewConfig, state_tx: watch::Sender<ViewState>) -> Self {
        Self {
            source,
            cache: PaginatedFeedCache::new(config.page_size),
            config,
            counts: FilterCountIndex::new(),
            optimistic: OptimisticMutationLayer::new(),
            reconciler: UpdateReconciler::new(),
            join: EntityJoinIndex::new(),
            inflight: FuturesUnordered::new(),
            entities_gen: 0,
            statuses_gen: 0,
            stats: ViewStats::default(),
            state_tx,
            log: telemetry::view(),
        }
    }

    async fn run(mut self, mut subscription: Subscription, mut commands: mpsc::Receiver<ViewCommand>, cancel: CancellationToken) {
        self.enter();
        self.publish_state();
        let mut push_open = true;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => break,
                },
                event = subscription.recv(), if push_open => match event {
                    Some(event) => self.on_push(event),
                    None => {
                        push_open = false;
                        self.log.warn("push channel closed; continuing on pulls only");
                    }
                },
                Some(done) = self.inflight.next(), if !self.inflight.is_empty() => self.on_completion(done),
            }
            self.publish_state();
        }
        let _s = self.log.span(&ViewPhase::Deactivate).entered();
        self.log.info_kv("view deactivated", [("discarded", self.inflight.len().to_string())]);
    }

    fn enter(&mut self) {
        let _s = self.log.span_kv(&ViewPhase::Activate, [("filter", self.config.initial_filter.to_string())]).entered();
        let ticket = self.cache.set_filter(self.config.initial_filter);
        self.spawn_load(ticket);
        self.spawn_counts(RefreshReason::Activation);
        self.spawn_entities();
        self.spawn_statuses();
        if self.optimistic.enter_view() && self.config.mark_all_read_on_enter {
            self.spawn_mutation(Mutation::MarkAllRead);
        }
    }

    fn on_command(&mut self, cmd: ViewCommand) {
        let _s = self.log.span(&ViewPhase::Command).entered();
        match cmd {
            ViewCommand::SetFilter(filter) => {
                self.reconciler.on_filter_changed();
                let ticket = self.cache.set_filter(filter);
                self.spawn_load(ticket);
                self.spawn_counts(RefreshReason::FilterChanged);
            }
            ViewCommand::GoToPage(n) => match self.cache.go_to_page(n) {
                Some(ticket) => self.spawn_load(ticket),
                None => self.log.debug_kv("page change ignored", [("page", n.to_string())]),
            },
            ViewCommand::JumpToFirstPage => {
                if let Some(ticket) = self.reconciler.jump_to_first_page(&mut self.cache) {
                    self.spawn_load(ticket);
                }
            }
            ViewCommand::MarkRead(id) => {
                if self.optimistic.mark_read(&id, self.cache.items_mut()) {
                    self.spawn_mutation(Mutation::MarkRead(id));
                } else {
                    self.log.debug_kv("mark read skipped", [("id", id.to_string())]);
                }
            }
            ViewCommand::DeleteAll(_confirmed) => self.spawn_mutation(Mutation::DeleteAll),
        }
    }

    fn on_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::FeedSnapshotUpdated(value) => {
                let _s = self.log.span(&ViewPhase::Reconcile).entered();
                let snapshot = match Snapshot::from_value(value) {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        self.stats.rejected_snapshots += 1;
                        self.log.warn_kv("snapshot rejected; keeping current state", [("error", err.to_string())]);
                        return;
                    }
                };
                self.stats.snapshots += 1;
                self.log.debug_kv("snapshot", [("records", snapshot.record_count().to_string()), ("unread", snapshot.unread().to_string())]);
                match self.reconciler.on_snapshot(&snapshot, &mut self.cache) {
                    PageReaction::ReloadFirstPage(ticket) => self.spawn_load(ticket),
                    PageReaction::RefreshTotal(ticket) => self.spawn_total(ticket),
                }
                self.spawn_counts(RefreshReason::Snapshot);
            }
            PushEvent::StatusSnapshotUpdated(value) => {
                let _s = self.log.span(&ViewPhase::Join).entered();
                match decode_statuses(value) {
                    Ok(statuses) => {
                        self.statuses_gen += 1;
                        self.join.set_statuses(statuses);
                    }
                    Err(err) => self.log.warn_kv("status snapshot rejected", [("error", err.to_string())]),
                }
            }
            PushEvent::EntitiesUpdated(value) => {
                let _s = self.log.span(&ViewPhase::Join).entered();
                match decode_entities(value) {
                    Ok(entities) => {
                        self.entities_gen += 1;
                        self.join.set_entities(entities);
                    }
                    Err(err) => self.log.warn_kv("entity list rejected", [("error", err.to_string())]),
                }
            }
        }
    }

    fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Page { ticket, result } => self.on_page(ticket, result),
            Completion::Total { ticket, result } => match result {
                Ok(total) => {
                    if !self.cache.complete_total(ticket, total) {
                        self.log.debug_kv("total dropped", [("token", ticket.token.to_string())]);
                    }
                }
                Err(err) => self.log.warn_kv("total refresh failed", [("error", err.to_string())]),
            },
            Completion::Counts { ticket, results } => {
                let _s = self.log.span(&ViewPhase::Counts).entered();
                self.stats.count_rounds += 1;
                for (filter, err) in results.iter().filter_map(|(f, r)| r.as_ref().err().map(|e| (f, e))) {
                    self.log.warn_kv("count failed", [("filter", filter.to_string()), ("error", err.to_string())]);
                }
                let outcome = self.counts.complete_refresh(ticket, results, self.cache.items());
                self.log.counts_applied(ticket.reason.as_str(), outcome.updated.len(), outcome.estimated.len(), outcome.kept.len());
                if !self.counts.is_balanced() {
                    self.log.debug("tab counts not balanced yet");
                }
            }
            Completion::Mutation { mutation, result } => self.on_mutation(mutation, result),
            Completion::Entities { generation, result } => {
                if generation != self.entities_gen {
                    self.log.debug("entity pull superseded by push");
                    return;
                }
                match result {
                    Ok(entities) => { self.join.set_entities(entities); }
                    Err(err) => self.log.warn_kv("entity fetch failed", [("error", err.to_string())]),
                }
            }
            Completion::Statuses { generation, result } => {
                if generation != self.statuses_gen {
                    self.log.debug("status pull superseded by push");
                    return;
                }
                match result {
                    Ok(statuses) => { self.join.set_statuses(statuses); }
                    Err(err) => self.log.warn_kv("status fetch failed", [("error", err.to_string())]),
                }
            }
        }
    }

    fn on_page(&mut self, ticket: LoadTicket, result: Result<PageFetch, SourceError>) {
        let _s = self.log.span(&ViewPhase::Load).entered();
        match self.cache.complete_load(ticket, result) {
            LoadOutcome::Applied => {
                self.stats.applied_loads += 1;
                let overlaid = self.optimistic.overlay(ticket.token, self.cache.items_mut());
                self.reconciler.on_page_applied(&ticket);
                if let Some(w) = self.cache.window() {
                    if w.items.len() != w.expected_len() {
                        self.log.debug_kv("page and total disagree", [("items", w.items.len().to_string()), ("expected", w.expected_len().to_string())]);
                    }
                    self.log.page_applied(w.filter, w.page, w.items.len(), w.total_count);
                }
                if overlaid > 0 {
                    self.log.debug_kv("pending reads re-applied", [("count", overlaid.to_string())]);
                }
            }
            LoadOutcome::Superseded => {
                self.stats.superseded_loads += 1;
                self.log.debug_kv("load superseded", [("token", ticket.token.to_string()), ("filter", ticket.filter.to_string()), ("page", ticket.page.to_string())]);
            }
            LoadOutcome::OutOfRange { clamped } => {
                self.log.info_kv("page out of range", [("page", ticket.page.to_string()), ("clamped", clamped.to_string())]);
                let next = self.cache.begin_load(ticket.filter, clamped);
                self.spawn_load(next);
            }
            LoadOutcome::Failed(err) => {
                self.stats.failed_loads += 1;
                self.log.warn_kv("page load failed; keeping last page", [("page", ticket.page.to_string()), ("error", err.to_string())]);
            }
        }
    }

    fn on_mutation(&mut self, mutation: Mutation, result: Result<(), SourceError>) {
        let _s = self.log.span(&ViewPhase::Mutate).entered();
        self.stats.settled_mutations += 1;
        if let Err(err) = &result {
            self.stats.failed_mutations += 1;
            self.log.warn_kv("mutation failed", [("mutation", mutation.name().to_string()), ("error", err.to_string())]);
        }
        match mutation {
            Mutation::MarkRead(id) => self.optimistic.settle_read(&id, self.cache.last_issued()),
            Mutation::MarkAllRead => {}
            Mutation::DeleteAll if result.is_ok() => {
                self.optimistic.clear();
                self.reconciler.on_filter_changed();
                let ticket = self.cache.set_filter(Filter::All);
                self.spawn_load(ticket);
                self.spawn_counts(RefreshReason::Mutation);
            }
            Mutation::DeleteAll => {}
        }
    }

    fn spawn_load(&mut self, ticket: LoadTicket) {
        let source = Arc::clone(&self.source);
        let limit = self.cache.page_size();
        let category = ticket.filter.category();
        let offset = ticket.offset(limit);
        self.log.debug_kv("load issued", [("token", ticket.token.to_string()), ("filter", ticket.filter.to_string()), ("page", ticket.page.to_string())]);
        self.inflight.push(Box::pin(async move {
            let (page, count) = tokio::join!(source.fetch_page(category, limit, offset), source.fetch_count(category));
            let result = page.and_then(|items| count.map(|total_count| PageFetch { items, total_count }));
            Completion::Page { ticket, result }
        }));
    }

    fn spawn_total(&mut self, ticket: TotalTicket) {
        let source = Arc::clone(&self.source);
        self.inflight.push(Box::pin(async move {
            let result = source.fetch_count(ticket.filter.category()).await;
            Completion::Total { ticket, result }
        }));
    }

    fn spawn_counts(&mut self, reason: RefreshReason) {
        let ticket = self.counts.begin_refresh(reason);
        let source = Arc::clone(&self.source);
        self.inflight.push(Box::pin(async move {
            let reads = Filter::KEYS.iter().map(|filter| {
                let source = Arc::clone(&source);
                let filter = *filter;
                async move { (filter, source.fetch_count(filter.category()).await) }
            });
            let results = join_all(reads).await;
            Completion::Counts { ticket, results }
        }));
    }

    fn spawn_mutation(&mut self, mutation: Mutation) {
        let source = Arc::clone(&self.source);
        self.log.debug_kv("mutation issued", [("mutation", mutation.name().to_string())]);
        self.inflight.push(Box::pin(async move {
            let result = match &mutation {
                Mutation::MarkRead(id) => source.mark_read(id).await,
                Mutation::MarkAllRead => source.mark_all_read().await,
                Mutation::DeleteAll => source.delete_all().await,
            };
            Completion::Mutation { mutation, result }
        }));
    }

    fn spawn_entities(&mut self) {
        let source = Arc::clone(&self.source);
        let generation = self.entities_gen;
        self.inflight.push(Box::pin(async move {
            Completion::Entities { generation, result: source.fetch_entities().await }
        }));
    }

    fn spawn_statuses(&mut self) {
        let source = Arc::clone(&self.source);
        let generation = self.statuses_gen;
        self.inflight.push(Box::pin(async move {
            Completion::Statuses { generation, result: source.fetch_statuses().await }
        }));
    }

    fn state(&self) -> ViewState {
        ViewState {
            filter: self.cache.filter(),
            page: self.cache.page(),
            total_pages: self.cache.total_pages(),
            loading: self.cache.is_loading(),
            freshness: self.reconciler.freshness(),
            window: self.cache.window().cloned(),
            counts: self.counts.snapshot(),
            live: self.join.view().clone(),
            pending_reads: self.optimistic.pending(),
            stats: self.stats,
        }
    }

    fn publish_state(&self) {
        let next = self.state();
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::model::Category;
    use crate::source::memory::SourceOp;
    use crate::source::MemorySource;
    use crate::testutil::{entity, records, status};
    use crate::view::counts::CountSource;

    fn quiet() -> ViewConfig { ViewConfig::default().with_mark_all_read(false) }

    fn start(src: &Arc<MemorySource>, config: ViewConfig) -> ViewHandle {
        FeedView::activate(Arc::clone(src) as Arc<dyn FeedSource>, src.bus(), config)
    }

    async fn settled(handle: &mut ViewHandle) -> ViewState {
        handle.wait_for(|s| s.is_settled()).await.unwrap()
    }

    #[tokio::test]
    async fn activation_loads_first_page_and_counts() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 250)));
        let mut handle = start(&src, quiet());
        let st = handle.wait_for(|s| s.is_settled() && s.counts.len() == 4).await.unwrap();
        assert_eq!(st.page, 1);
        assert_eq!(st.total_pages, Some(3));
        assert_eq!(st.window.as_ref().unwrap().items.len(), 100);
        assert_eq!(st.count(Filter::All), Some(250));
        assert_eq!(st.count(Filter::Only(Category::Video)), Some(83));
        let parts: u64 = Category::ALL.iter().filter_map(|c| st.count(Filter::Only(*c))).sum();
        assert_eq!(st.count(Filter::All), Some(parts));
        assert!(st.counts.values().all(|c| c.source == CountSource::Authoritative));
        handle.deactivate().await.unwrap();
    }

    #[tokio::test]
    async fn older_load_cannot_overwrite_newer_filter() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 250)));
        let mut handle = start(&src, quiet());
        settled(&mut handle).await;

        let gate = src.hold_page(None, 100);
        handle.go_to_page(2).await.unwrap();
        handle.set_filter(Filter::Only(Category::Video)).await.unwrap();
        let st = handle.wait_for(|s| s.is_settled() && s.filter == Filter::Only(Category::Video)).await.unwrap();
        assert_eq!(st.item_ids()[0], "r1");

        gate.send(()).unwrap();
        let st = handle.wait_for(|s| s.stats.superseded_loads == 1).await.unwrap();
        let w = st.window.unwrap();
        assert_eq!((w.filter, w.page), (Filter::Only(Category::Video), 1));
        assert!(w.items.iter().all(|r| r.category == Category::Video));
    }

    #[tokio::test]
    async fn snapshot_past_first_page_only_refreshes_total() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 101)));
        let mut handle = start(&src, quiet());
        settled(&mut handle).await;

        handle.go_to_page(2).await.unwrap();
        let st = handle.wait_for(|s| s.is_settled() && s.page == 2).await.unwrap();
        assert_eq!(st.item_ids(), vec!["r100"]);

        src.push_records(records("n", 3));
        let st = handle
            .wait_for(|s| s.is_stale() && s.count(Filter::All) == Some(104) && s.window.as_ref().is_some_and(|w| w.total_count == 104))
            .await
            .unwrap();
        assert_eq!(st.page, 2);
        assert_eq!(st.item_ids(), vec!["r100"]);

        handle.jump_to_first_page().await.unwrap();
        let st = handle.wait_for(|s| s.is_settled() && s.page == 1 && !s.is_stale()).await.unwrap();
        let ids = st.item_ids();
        assert_eq!(ids.len(), 100);
        assert_eq!(&ids[..4], &["n0", "n1", "n2", "r0"]);
        assert_eq!(ids[99], "r96");
        assert_eq!(st.window.as_ref().unwrap().total_count, 104);
    }

    #[tokio::test]
    async fn read_flip_off_first_page_keeps_view_fresh() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 150)));
        let mut handle = start(&src, quiet());
        settled(&mut handle).await;
        handle.go_to_page(2).await.unwrap();
        handle.wait_for(|s| s.is_settled() && s.page == 2).await.unwrap();

        handle.mark_read(FeedId::new("r120")).await.unwrap();
        let st = handle
            .wait_for(|s| s.stats.snapshots >= 1 && s.stats.settled_mutations == 1 && s.is_settled())
            .await
            .unwrap();
        assert!(!st.is_stale());
        assert_eq!(st.page, 2);
        assert_eq!(st.count(Filter::All), Some(150));
        assert!(st.window.unwrap().get(&FeedId::new("r120")).unwrap().read);
    }

    #[tokio::test]
    async fn slow_first_page_reload_loses_to_later_page_change() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 250)));
        let mut handle = start(&src, quiet());
        settled(&mut handle).await;

        let gate = src.hold_page(None, 0);
        src.push_records(records("n", 3));
        handle.wait_for(|s| s.stats.snapshots == 1).await.unwrap();
        handle.go_to_page(2).await.unwrap();
        let st = handle.wait_for(|s| s.is_settled() && s.page == 2).await.unwrap();
        assert_eq!(st.item_ids()[0], "r97");

        gate.send(()).unwrap();
        let st = handle.wait_for(|s| s.stats.superseded_loads == 1).await.unwrap();
        let w = st.window.unwrap();
        assert_eq!((w.page, w.total_count), (2, 253));
        assert_eq!(w.items[0].id.as_str(), "r97");
    }

    #[tokio::test]
    async fn count_round_finishes_even_when_every_count_fails() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 8)));
        src.fail(SourceOp::FetchCount);
        let mut handle = start(&src, quiet());
        let st = handle.wait_for(|s| s.stats.count_rounds == 1).await.unwrap();
        assert!(st.counts.is_empty());
    }

    #[tokio::test]
    async fn snapshot_on_first_page_reloads_it() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 5)));
        let mut handle = start(&src, quiet());
        settled(&mut handle).await;

        src.push_records(records("n", 2));
        let st = handle.wait_for(|s| s.is_settled() && s.item_ids().first() == Some(&"n0")).await.unwrap();
        assert!(!st.is_stale());
        assert_eq!(st.item_ids().len(), 7);
    }

    #[tokio::test]
    async fn mark_read_is_optimistic_and_sent_once() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 5)));
        let mut handle = start(&src, quiet());
        settled(&mut handle).await;

        handle.mark_read(FeedId::new("r2")).await.unwrap();
        handle.mark_read(FeedId::new("r2")).await.unwrap();
        let st = handle.wait_for(|s| s.stats.snapshots >= 1 && s.is_settled()).await.unwrap();
        let w = st.window.unwrap();
        assert!(w.get(&FeedId::new("r2")).unwrap().read);
        assert!(!w.get(&FeedId::new("r1")).unwrap().read);
        assert_eq!(src.call_count(SourceOp::MarkRead), 1);
        assert!(src.records()[2].read);
    }

    #[tokio::test]
    async fn mark_all_read_runs_once_per_activation() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 5)));
        let mut handle = start(&src, ViewConfig::default());
        handle.wait_for(|s| s.stats.snapshots >= 1 && s.is_settled()).await.unwrap();
        handle.set_filter(Filter::Only(Category::Post)).await.unwrap();
        handle.set_filter(Filter::All).await.unwrap();
        let st = handle.wait_for(|s| s.is_settled() && s.filter == Filter::All).await.unwrap();
        assert!(st.window.unwrap().items.iter().all(|r| r.read));
        assert_eq!(src.call_count(SourceOp::MarkAllRead), 1);
    }

    #[tokio::test]
    async fn malformed_snapshot_keeps_state() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 5)));
        let mut handle = start(&src, quiet());
        let before = settled(&mut handle).await;

        src.bus().publish(PushEvent::FeedSnapshotUpdated(json!({ "not": "a list" })));
        src.bus().publish(PushEvent::FeedSnapshotUpdated(json!([{ "id": "" }])));
        let after = handle.wait_for(|s| s.stats.rejected_snapshots == 2).await.unwrap();
        assert_eq!(after.window, before.window);
        assert_eq!(after.stats.snapshots, 0);
    }

    #[tokio::test]
    async fn failed_load_keeps_last_page() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 150)));
        let mut handle = start(&src, quiet());
        let before = settled(&mut handle).await;

        src.fail(SourceOp::FetchPage);
        handle.go_to_page(2).await.unwrap();
        let st = handle.wait_for(|s| s.stats.failed_loads == 1).await.unwrap();
        assert_eq!(st.page, 1);
        assert!(!st.loading);
        assert_eq!(st.window, before.window);
    }

    #[tokio::test]
    async fn delete_all_resets_to_all_and_estimates_failed_counts() {
        let src = Arc::new(MemorySource::with_records(PushBus::default(), records("r", 12)));
        let mut handle = start(&src, quiet().with_filter(Filter::Only(Category::Live)));
        handle.wait_for(|s| s.is_settled() && s.counts.len() == 4).await.unwrap();

        src.fail(SourceOp::FetchCount);
        handle.delete_all(DeleteAllConfirmed::confirmed_by_caller()).await.unwrap();
        let st = handle
            .wait_for(|s| s.counts.values().any(|c| c.source == CountSource::Estimated))
            .await
            .unwrap();
        assert_eq!(st.filter, Filter::All);
        assert_eq!(st.page, 1);
        assert_eq!(st.count(Filter::All), Some(0));
        assert!(src.records().is_empty());
    }

    #[tokio::test]
    async fn live_join_follows_pushes() {
        let src = Arc::new(MemorySource::new(PushBus::default()));
        src.set_entities(vec![entity("a", "alpha", true), entity("b", "Beta", true), entity("c", "charlie", false)]);
        src.set_statuses(vec![status("b", true)]);
        let mut handle = start(&src, quiet());

        let st = handle.wait_for(|s| s.live.rows.len() == 3).await.unwrap();
        let names: Vec<_> = st.live.rows.iter().map(|r| r.entity.display_name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "alpha", "charlie"]);
        assert_eq!(st.live.live_count, 1);

        src.set_statuses(vec![status("a", true), status("b", true)]);
        let st = handle.wait_for(|s| s.live.live_count == 2).await.unwrap();
        assert_eq!(st.live.rows[0].entity.display_name, "alpha");
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_the_subscription() {
        let bus = PushBus::default();
        let src = Arc::new(MemorySource::with_records(bus.clone(), records("r", 3)));
        let handle = start(&src, quiet());
        assert_eq!(bus.subscriber_count(), 1);
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), async {
            while bus.subscriber_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
