use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{debug, info, warn, Span};

use super::{config, emit};
use super::ops::view::View;
use crate::model::Filter;

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

/// Logging context of one command or actor, typed by its op so only that
/// op's phases can open spans. Envelopes carry the time since creation.
pub struct LogCtx<O: OpMarker> {
    json: bool,
    started: Instant,
    _marker: PhantomData<O>,
}

// One plain and one `_kv` method per level; json logs keep the op and
// details as fields, text logs inline them.
macro_rules! level_methods {
    ($($name:ident, $kv:ident => $mac:ident;)*) => {$(
        pub fn $name(&self, msg: impl AsRef<str>) {
            if self.json { $mac!(op = %O::NAME, "{}", msg.as_ref()); } else { $mac!("{}", msg.as_ref()); }
        }

        pub fn $kv<'a, D>(&self, msg: &str, kv: D)
        where
            D: IntoIterator<Item = (&'a str, String)>,
        {
            let details = kv_to_string(kv);
            if self.json { $mac!(op = %O::NAME, details = %details, "{}", msg); }
            else { $mac!("{} {}", msg, details); }
        }
    )*};
}

impl<O: OpMarker> LogCtx<O> {
    pub(crate) fn new() -> Self {
        Self { json: config::logs_are_json(), started: Instant::now(), _marker: PhantomData }
    }

    pub fn root_span(&self) -> Span { O::root_span() }

    /// Root span plus a `start` event listing the invocation's arguments.
    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %O::NAME, "start");
        } else {
            info!(op = %O::NAME, details = %details, "start");
        }
        self.root_span()
    }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        debug!(op = %O::NAME, phase = ph.name(), details = %kv_to_string(fields), "span_start");
        self.span(ph)
    }

    level_methods! {
        info, info_kv => info;
        debug, debug_kv => debug;
        warn, warn_kv => warn;
    }

    pub fn plan<T: Serialize>(&self, plan: &T) -> Result<()> { emit::print_plan(O::NAME, plan, Some(self.meta())) }
    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> { emit::print_result(O::NAME, result, Some(self.meta())) }

    fn meta(&self) -> emit::Meta {
        emit::Meta { duration_ms: Some(self.started.elapsed().as_millis()) }
    }
}

impl LogCtx<View> {
    pub fn page_applied(&self, filter: Filter, page: u32, items: usize, total: u64) {
        if self.json { info!(op = %View::NAME, filter = %filter, page, items, total, "page_applied"); }
        else { info!("📄 Page {} ({}) — items={} total={}", page, filter, items, total); }
    }

    pub fn counts_applied(&self, reason: &str, updated: usize, estimated: usize, kept: usize) {
        if self.json { info!(op = %View::NAME, reason, updated, estimated, kept, "counts_applied"); }
        else { info!("🔢 Counts ({}) — updated={} estimated={} kept={}", reason, updated, estimated, kept); }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    kv.into_iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ")
}
