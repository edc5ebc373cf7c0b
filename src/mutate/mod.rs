use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use sqlx::PgPool;

use crate::model::FeedId;
use crate::source::pg::FeedFingerprint;
use crate::source::{FeedSource, PgSource};
use crate::telemetry::{self};
use crate::telemetry::ops::mutate::Phase as MutatePhase;

pub mod types;

/// feedview mutate read/read-all/delete-all
#[derive(Args, Debug)]
pub struct MutateCmd {
    #[command(subcommand)]
    pub cmd: MutateSub,
}

#[derive(Subcommand, Debug)]
pub enum MutateSub {
    /// Mark one record read
    Read { id: String },
    /// Mark every record read
    ReadAll,
    /// Delete every record (plan-only by default; use --apply to delete)
    DeleteAll {
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
}

pub async fn run(pool: &PgPool, args: MutateCmd) -> Result<()> {
    let log = telemetry::mutate();
    let _g = log.root_span().entered();
    let source = PgSource::new(pool.clone());
    match args.cmd {
        MutateSub::Read { id } => mark_read(&source, id).await,
        MutateSub::ReadAll => mark_all_read(&source).await,
        MutateSub::DeleteAll { apply } => delete_all(&source, apply).await,
    }
}

async fn mark_read(source: &PgSource, id: String) -> Result<()> {
    let log = telemetry::mutate();
    if id.trim().is_empty() {
        bail!("record id must not be empty");
    }
    let _s = log.span_kv(&MutatePhase::Apply, [("action", "read".to_string()), ("id", id.clone())]).entered();
    let before = source.fingerprint().await?;
    source.mark_read(&FeedId::new(id.clone())).await?;
    let after = source.fingerprint().await?;
    let changed = after.read > before.read;
    if changed { log.info(format!("✅ Marked {} read", id)); } else { log.info(format!("♻️ {} was already read (or unknown)", id)); }
    if telemetry::config::json_mode() {
        log.result(&types::MutateResult::new("read", before, after))?;
    }
    Ok(())
}

async fn mark_all_read(source: &PgSource) -> Result<()> {
    let log = telemetry::mutate();
    let _s = log.span_kv(&MutatePhase::Apply, [("action", "read-all".to_string())]).entered();
    let before = source.fingerprint().await?;
    source.mark_all_read().await?;
    let after = source.fingerprint().await?;
    log.info(format!("✅ Marked {} records read", after.read - before.read));
    if telemetry::config::json_mode() {
        log.result(&types::MutateResult::new("read-all", before, after))?;
    }
    Ok(())
}

async fn delete_all(source: &PgSource, apply: bool) -> Result<()> {
    let log = telemetry::mutate();
    let before: FeedFingerprint = source.fingerprint().await?;
    if !apply {
        let _s = log.span(&MutatePhase::Plan).entered();
        log.info(format!("📝 Delete plan — {} records ({} unread) would be removed", before.total, before.total - before.read));
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&types::DeletePlan { action: "delete-all", records: before.total, unread: before.total - before.read })?;
        }
        return Ok(());
    }
    let _s = log.span_kv(&MutatePhase::Apply, [("action", "delete-all".to_string())]).entered();
    source.delete_all().await?;
    let after = source.fingerprint().await?;
    log.info(format!("🗑️ Deleted {} records", before.total - after.total));
    if telemetry::config::json_mode() {
        log.result(&types::MutateResult::new("delete-all", before, after))?;
    }
    Ok(())
}
