use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use sqlx::PgPool;

use crate::model::Filter;
use crate::source::{FeedSource, PgSource, PushBus};
use crate::telemetry::{self, ctx::LogCtx};
use crate::telemetry::ops::page::{Page, Phase as PagePhase};
use crate::view::{FeedView, ViewConfig, ViewHandle, ViewState};

pub mod types;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// feedview page: one materialized page of the feed
#[derive(Args, Debug)]
pub struct PageCmd {
    /// all, live, video or post
    #[arg(long, default_value = "all")]
    pub filter: Filter,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Overrides FEEDVIEW_PAGE_SIZE
    #[arg(long)]
    pub page_size: Option<u32>,
    /// Mark every record read, as entering the feed screen does
    #[arg(long, default_value_t = false)]
    pub mark_all_read: bool,
}

pub async fn run(pool: &PgPool, args: PageCmd) -> Result<()> {
    let log = telemetry::page();
    let _g = log
        .root_span_kv([
            ("filter", args.filter.to_string()),
            ("page", args.page.to_string()),
            ("page_size", format!("{:?}", args.page_size)),
        ])
        .entered();

    let mut config = ViewConfig::from_env().with_filter(args.filter).with_mark_all_read(args.mark_all_read);
    if let Some(size) = args.page_size {
        config = config.with_page_size(size);
    }
    let source: Arc<dyn FeedSource> = Arc::new(PgSource::new(pool.clone()));
    // one-shot: nothing publishes, the view only pulls
    let bus = PushBus::default();
    let mut handle = FeedView::activate(source, &bus, config);

    let mut st = {
        let _s = log.span(&PagePhase::Load).entered();
        let st = wait_loaded(&mut handle, |s| s.stats.count_rounds >= 1).await?;
        if args.page > 1 {
            let pages = st.total_pages.unwrap_or(0);
            if args.page > pages {
                bail!("page {} out of range ({} pages for filter {})", args.page, pages, args.filter);
            }
            handle.go_to_page(args.page).await?;
            wait_loaded(&mut handle, |s| s.page == args.page).await?
        } else {
            st
        }
    };
    if args.mark_all_read {
        st = handle.wait_for(|s| s.stats.settled_mutations >= 1).await?;
    }
    handle.deactivate().await?;

    let _s = log.span(&PagePhase::Output).entered();
    render(&log, &st);
    if telemetry::config::json_mode() {
        log.result(&types::PageResult::from_state(&st))?;
    }
    Ok(())
}

/// Waits for a settled window satisfying `extra`; a failed load is an error.
async fn wait_loaded(handle: &mut ViewHandle, mut extra: impl FnMut(&ViewState) -> bool) -> Result<ViewState> {
    let failed_before = handle.state().stats.failed_loads;
    let st = tokio::time::timeout(
        LOAD_TIMEOUT,
        handle.wait_for(|s| s.stats.failed_loads > failed_before || (s.is_settled() && extra(s))),
    )
    .await
    .context("timed out waiting for the page")??;
    if st.stats.failed_loads > failed_before {
        bail!("page load failed; see logs");
    }
    Ok(st)
}

/// Human rendering of a view state, shared with `watch`.
pub fn render(log: &LogCtx<Page>, st: &ViewState) {
    let Some(w) = st.window.as_ref() else {
        log.info("(nothing loaded)");
        return;
    };
    let tabs: Vec<String> = st.counts.iter().map(|(f, c)| format!("{}={}", f, c.value)).collect();
    log.info(format!(
        "📄 {} — page {}/{} total={} [{}]{}",
        w.filter,
        w.page,
        w.total_pages().max(1),
        w.total_count,
        tabs.join(" "),
        if st.is_stale() { " (new items; `first` to jump)" } else { "" }
    ));
    for r in &w.items {
        let mark = if r.read { " " } else { "*" };
        log.info(format!("  {} {:<6} {}  {}  [{}]", mark, r.category.as_str(), r.created_at.format("%Y-%m-%d %H:%M"), r.title, r.id));
    }
}
