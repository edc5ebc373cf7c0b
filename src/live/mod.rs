use anyhow::Result;
use clap::Args;
use sqlx::PgPool;

use crate::source::{FeedSource, PgSource};
use crate::telemetry::{self};
use crate::telemetry::ops::live::Phase as LivePhase;

pub mod join;
pub mod types;

pub use join::{EntityJoinIndex, JoinedRow, JoinedView};

/// feedview live
#[derive(Args, Debug)]
pub struct LiveCmd {
    /// Only list streamers that are live right now
    #[arg(long, default_value_t = false)]
    pub live_only: bool,
    /// Include deactivated streamers
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

pub async fn run(pool: &PgPool, args: LiveCmd) -> Result<()> {
    let log = telemetry::live();
    let _g = log
        .root_span_kv([("live_only", args.live_only.to_string()), ("all", args.all.to_string())])
        .entered();
    let source = PgSource::new(pool.clone());

    let entities = {
        let _s = log.span(&LivePhase::FetchEntities).entered();
        source.fetch_entities().await?
    };
    let statuses = {
        let _s = log.span(&LivePhase::FetchStatuses).entered();
        source.fetch_statuses().await?
    };

    let mut index = EntityJoinIndex::new();
    {
        let _s = log.span(&LivePhase::Join).entered();
        index.set_entities(entities);
        index.set_statuses(statuses);
        if index.duplicate_statuses() > 0 {
            log.warn_kv("duplicate status rows", [("dropped", index.duplicate_statuses().to_string())]);
        }
    }

    let _s = log.span(&LivePhase::Output).entered();
    let view = index.view();
    let rows: Vec<&JoinedRow> = view
        .rows
        .iter()
        .filter(|r| args.all || r.entity.active)
        .filter(|r| !args.live_only || r.is_live())
        .collect();

    log.info(format!("📺 Streamers — {} live / {} listed", view.live_count, rows.len()));
    for row in &rows {
        let marker = if row.is_live() { "●" } else { "○" };
        let title = row.status.as_ref().and_then(|s| s.title.as_deref()).unwrap_or("");
        log.info(format!("  {} {:<24} {}", marker, row.entity.display_name, title));
    }

    if telemetry::config::json_mode() {
        let result = types::LiveResult {
            live_count: view.live_count,
            rows: rows.iter().map(|r| types::LiveRow::from_row(r)).collect(),
        };
        log.result(&result)?;
    }
    Ok(())
}
