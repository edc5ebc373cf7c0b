use serde::Serialize;

use crate::model::{FeedId, FeedRecord, Filter};
use crate::source::SourceError;

use super::token::{RequestToken, TokenSource};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// One materialized page of the filtered feed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageWindow {
    pub filter: Filter,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<FeedRecord>,
    pub total_count: u64,
}

impl PageWindow {
    pub fn total_pages(&self) -> u32 { total_pages(self.total_count, self.page_size) }

    /// Item count the total implies for this page. The page and the count are
    /// read separately, so the two may briefly disagree.
    pub fn expected_len(&self) -> usize {
        let before = u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size);
        self.total_count.saturating_sub(before).min(u64::from(self.page_size)) as usize
    }

    pub fn get(&self, id: &FeedId) -> Option<&FeedRecord> { self.items.iter().find(|r| &r.id == id) }
}

pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 { return 0; }
    total.div_ceil(u64::from(page_size)).min(u64::from(u32::MAX)) as u32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub token: RequestToken,
    pub filter: Filter,
    pub page: u32,
}

impl LoadTicket {
    pub fn offset(&self, page_size: u32) -> u64 { u64::from(self.page - 1) * u64::from(page_size) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TotalTicket {
    pub token: RequestToken,
    pub filter: Filter,
}

/// Joined result of the page read and the count read of one load.
#[derive(Clone, Debug)]
pub struct PageFetch {
    pub items: Vec<FeedRecord>,
    pub total_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading(LoadTicket),
}

#[derive(Debug)]
pub enum LoadOutcome {
    Applied,
    Superseded,
    OutOfRange { clamped: u32 },
    Failed(SourceError),
}

pub struct PaginatedFeedCache {
    page_size: u32,
    filter: Filter,
    page: u32,
    window: Option<PageWindow>,
    state: LoadState,
    tokens: TokenSource,
    // token of the request that produced the displayed total
    total_as_of: RequestToken,
}

impl PaginatedFeedCache {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            filter: Filter::All,
            page: 1,
            window: None,
            state: LoadState::Idle,
            tokens: TokenSource::default(),
            total_as_of: RequestToken::ZERO,
        }
    }

    pub fn page_size(&self) -> u32 { self.page_size }
    pub fn filter(&self) -> Filter { self.filter }
    pub fn page(&self) -> u32 { self.page }
    pub fn state(&self) -> LoadState { self.state }
    pub fn is_loading(&self) -> bool { matches!(self.state, LoadState::Loading(_)) }
    pub fn window(&self) -> Option<&PageWindow> { self.window.as_ref() }
    pub fn last_issued(&self) -> RequestToken { self.tokens.last_issued() }

    pub fn items(&self) -> &[FeedRecord] {
        self.window.as_ref().map(|w| w.items.as_slice()).unwrap_or(&[])
    }

    pub fn items_mut(&mut self) -> &mut [FeedRecord] {
        self.window.as_mut().map(|w| w.items.as_mut_slice()).unwrap_or(&mut [])
    }

    /// Total of the selected filter, if a window for it is displayed.
    pub fn total_count(&self) -> Option<u64> {
        self.window.as_ref().filter(|w| w.filter == self.filter).map(|w| w.total_count)
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_count().map(|t| total_pages(t, self.page_size))
    }

    pub fn set_filter(&mut self, filter: Filter) -> LoadTicket {
        self.window = None;
        self.begin_load(filter, 1)
    }

    pub fn begin_load(&mut self, filter: Filter, page: u32) -> LoadTicket {
        if self.window.as_ref().is_some_and(|w| w.filter != filter) {
            self.window = None;
        }
        self.filter = filter;
        self.page = page.max(1);
        let ticket = LoadTicket { token: self.tokens.issue(), filter, page: self.page };
        self.state = LoadState::Loading(ticket);
        ticket
    }

    pub fn go_to_page(&mut self, n: u32) -> Option<LoadTicket> {
        let pages = self.total_pages()?;
        if n == self.page || n < 1 || n > pages {
            return None;
        }
        Some(self.begin_load(self.filter, n))
    }

    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<PageFetch, SourceError>) -> LoadOutcome {
        if ticket.token != self.tokens_latest_load() {
            return LoadOutcome::Superseded;
        }
        self.state = LoadState::Idle;
        let fetch = match result {
            Ok(f) => f,
            Err(err) => {
                if let Some(w) = self.window.as_ref().filter(|w| w.filter == self.filter) {
                    self.page = w.page;
                }
                return LoadOutcome::Failed(err);
            }
        };

        let pages = total_pages(fetch.total_count, self.page_size);
        if ticket.page > 1 && ticket.page > pages {
            return LoadOutcome::OutOfRange { clamped: pages.max(1) };
        }

        let total_count = match &self.window {
            // a total refresh issued after this load already landed
            Some(w) if w.filter == ticket.filter && self.total_as_of > ticket.token => w.total_count,
            _ => {
                self.total_as_of = ticket.token;
                fetch.total_count
            }
        };
        self.window = Some(PageWindow {
            filter: ticket.filter,
            page: ticket.page,
            page_size: self.page_size,
            items: fetch.items,
            total_count,
        });
        LoadOutcome::Applied
    }

    pub fn begin_total_refresh(&mut self) -> TotalTicket {
        TotalTicket { token: self.tokens.issue(), filter: self.filter }
    }

    /// Applies a total-only refresh; returns whether the displayed total changed hands.
    pub fn complete_total(&mut self, ticket: TotalTicket, total: u64) -> bool {
        match self.window.as_mut() {
            Some(w) if w.filter == ticket.filter && ticket.token > self.total_as_of => {
                w.total_count = total;
                self.total_as_of = ticket.token;
                true
            }
            _ => false,
        }
    }

    fn tokens_latest_load(&self) -> RequestToken {
        match self.state {
            LoadState::Loading(t) => t.token,
            LoadState::Idle => RequestToken::ZERO,
        }
    }
}
