use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{FeedRecord, Filter};
use crate::source::SourceError;

use super::token::{RequestToken, TokenSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountSource {
    Authoritative,
    /// Derived from the loaded page after a failed count read; not ground truth.
    Estimated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FilterCount {
    pub value: u64,
    pub source: CountSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshReason {
    Activation,
    FilterChanged,
    Snapshot,
    Mutation,
}

impl RefreshReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshReason::Activation => "activation",
            RefreshReason::FilterChanged => "filter_changed",
            RefreshReason::Snapshot => "snapshot",
            RefreshReason::Mutation => "mutation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountsTicket {
    pub token: RequestToken,
    pub reason: RefreshReason,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub updated: Vec<Filter>,
    pub estimated: Vec<Filter>,
    pub kept: Vec<Filter>,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    count: FilterCount,
    as_of: RequestToken,
}

/// Per-tab totals, kept independently of the displayed page.
#[derive(Debug, Default)]
pub struct FilterCountIndex {
    entries: BTreeMap<Filter, Entry>,
    tokens: TokenSource,
}

impl FilterCountIndex {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, filter: Filter) -> Option<FilterCount> { self.entries.get(&filter).map(|e| e.count) }

    pub fn value(&self, filter: Filter) -> u64 { self.get(filter).map(|c| c.value).unwrap_or(0) }

    pub fn snapshot(&self) -> BTreeMap<Filter, FilterCount> {
        self.entries.iter().map(|(f, e)| (*f, e.count)).collect()
    }

    pub fn begin_refresh(&mut self, reason: RefreshReason) -> CountsTicket {
        CountsTicket { token: self.tokens.issue(), reason }
    }

    /// Applies one round of per-filter count reads.
    ///
    /// Each filter is independent: successes are written together, a failed
    /// filter keeps its previous value unless the round was triggered by a
    /// mutation, in which case it falls back to an estimate from `loaded`.
    /// A value older than the one already held for a filter is dropped.
    pub fn complete_refresh(
        &mut self,
        ticket: CountsTicket,
        results: Vec<(Filter, Result<u64, SourceError>)>,
        loaded: &[FeedRecord],
    ) -> RefreshOutcome {
        let mut next = self.entries.clone();
        let mut outcome = RefreshOutcome::default();

        for (filter, result) in results {
            if next.get(&filter).is_some_and(|e| e.as_of > ticket.token) {
                outcome.kept.push(filter);
                continue;
            }
            let count = match result {
                Ok(value) => {
                    outcome.updated.push(filter);
                    FilterCount { value, source: CountSource::Authoritative }
                }
                Err(_) if ticket.reason == RefreshReason::Mutation => {
                    outcome.estimated.push(filter);
                    FilterCount { value: estimate(filter, loaded), source: CountSource::Estimated }
                }
                Err(_) => {
                    outcome.kept.push(filter);
                    continue;
                }
            };
            next.insert(filter, Entry { count, as_of: ticket.token });
        }

        self.entries = next;
        outcome
    }

    /// `All` equals the sum of the category tabs.
    pub fn is_balanced(&self) -> bool {
        let parts: u64 = Filter::KEYS
            .iter()
            .filter(|f| **f != Filter::All)
            .map(|f| self.value(*f))
            .sum();
        self.value(Filter::All) == parts
    }
}

pub fn estimate(filter: Filter, loaded: &[FeedRecord]) -> u64 {
    loaded.iter().filter(|r| filter.matches(r)).count() as u64
}
