use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use sqlx::PgPool;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::model::{FeedId, Filter};
use crate::page::render;
use crate::source::poller::SnapshotPoller;
use crate::source::{FeedSource, PgSource, PushBus};
use crate::telemetry::{self};
use crate::telemetry::ops::page::Phase as PagePhase;
use crate::view::{DeleteAllConfirmed, FeedView, PageWindow, ViewConfig, ViewState};

/// feedview watch: live view fed by the snapshot poller, driven from stdin
#[derive(Args, Debug)]
pub struct WatchCmd {
    #[arg(long, default_value = "all")]
    pub filter: Filter,
    #[arg(long)]
    pub page_size: Option<u32>,
    /// Overrides FEEDVIEW_POLL_INTERVAL_MS
    #[arg(long)]
    pub poll_ms: Option<u64>,
    /// Do not mark everything read on entry
    #[arg(long, default_value_t = false)]
    pub keep_unread: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Page(u32),
    Filter(Filter),
    First,
    Read(FeedId),
    DeleteAll,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<Line>> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else { return Ok(None) };
    let arg = words.next();
    let parsed = match (cmd, arg) {
        ("page" | "p", Some(n)) => Line::Page(n.parse()?),
        ("filter" | "f", Some(f)) => Line::Filter(f.parse().map_err(anyhow::Error::msg)?),
        ("first", None) => Line::First,
        ("read" | "r", Some(id)) => Line::Read(FeedId::new(id)),
        ("delete-all", None) => Line::DeleteAll,
        ("quit" | "q" | "exit", None) => Line::Quit,
        _ => bail!("unknown command '{}' (page N, filter X, first, read ID, delete-all, quit)", line.trim()),
    };
    Ok(Some(parsed))
}

/// Only a literal `yes` answers the delete-all prompt.
fn confirm_delete(answer: &str) -> Option<DeleteAllConfirmed> {
    (answer.trim() == "yes").then(DeleteAllConfirmed::confirmed_by_caller)
}

pub async fn run(pool: &PgPool, args: WatchCmd) -> Result<()> {
    let log = telemetry::page();
    let _g = log
        .root_span_kv([("filter", args.filter.to_string()), ("mode", "watch".to_string())])
        .entered();

    let mut config = ViewConfig::from_env().with_filter(args.filter).with_mark_all_read(!args.keep_unread);
    if let Some(size) = args.page_size {
        config = config.with_page_size(size);
    }
    if let Some(ms) = args.poll_ms {
        config.poll_interval = Duration::from_millis(ms);
    }

    let pg = Arc::new(PgSource::new(pool.clone()));
    let bus = PushBus::default();
    let cancel = CancellationToken::new();
    let poller = SnapshotPoller::new(Arc::clone(&pg), bus.clone(), config.poll_interval).spawn(cancel.clone());

    let source: Arc<dyn FeedSource> = pg;
    let handle = FeedView::activate(source, &bus, config);
    let mut states = handle.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown: Option<(PageWindow, bool)> = None;
    let mut confirming = false;

    let _s = log.span(&PagePhase::Watch).entered();
    log.info("👀 Watching (page N, filter X, first, read ID, delete-all, quit)");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    log.warn("view stopped");
                    break;
                }
                let st: ViewState = states.borrow_and_update().clone();
                if !st.is_settled() {
                    continue;
                }
                let key = st.window.clone().map(|w| (w, st.is_stale()));
                if key != shown {
                    render(&log, &st);
                    shown = key;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if std::mem::take(&mut confirming) {
                    match confirm_delete(&line) {
                        Some(confirmed) => handle.delete_all(confirmed).await?,
                        None => log.info("delete-all cancelled"),
                    }
                    continue;
                }
                let cmd = match parse_line(&line) {
                    Ok(Some(cmd)) => cmd,
                    Ok(None) => continue,
                    Err(err) => {
                        log.warn(err.to_string());
                        continue;
                    }
                };
                match cmd {
                    Line::Page(n) => handle.go_to_page(n).await?,
                    Line::Filter(f) => handle.set_filter(f).await?,
                    Line::First => handle.jump_to_first_page().await?,
                    Line::Read(id) => handle.mark_read(id).await?,
                    Line::DeleteAll => {
                        log.warn("⚠️ delete every notification? type `yes` to confirm");
                        confirming = true;
                    }
                    Line::Quit => break,
                }
            }
        }
    }

    cancel.cancel();
    handle.deactivate().await?;
    poller.await?;
    log.info("watch stopped");
    Ok(())
}
