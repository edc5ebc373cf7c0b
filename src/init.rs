use anyhow::Result;
use clap::Args;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::PgPool;

use crate::telemetry::{self};
use crate::telemetry::ops::init::Phase as InitPhase;

static MIGRATOR: Migrator = sqlx::migrate!();

/// feedview init: create the monitor schema
#[derive(Args, Debug)]
pub struct InitCmd {
    /// Apply pending migrations (plan-only by default)
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

#[derive(Serialize)]
struct MigrationRow {
    version: i64,
    description: String,
}

#[derive(Serialize)]
struct InitPlan {
    migrations: Vec<MigrationRow>,
}

#[derive(Serialize)]
struct InitResult {
    applied: bool,
    migrations: usize,
}

pub async fn run(pool: &PgPool, args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span_kv([("apply", args.apply.to_string())]).entered();

    if !args.apply {
        let _s = log.span(&InitPhase::Plan).entered();
        let rows: Vec<MigrationRow> = MIGRATOR
            .iter()
            .map(|m| MigrationRow { version: m.version, description: m.description.to_string() })
            .collect();
        log.info(format!("📝 Init plan — {} migrations", rows.len()));
        for r in &rows {
            log.info(format!("  {} {}", r.version, r.description));
        }
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&InitPlan { migrations: rows })?;
        }
        return Ok(());
    }

    let _s = log.span(&InitPhase::Migrate).entered();
    // idempotent
    MIGRATOR.run(pool).await?;
    log.info("✅ Database initialized");
    if telemetry::config::json_mode() {
        log.result(&InitResult { applied: true, migrations: MIGRATOR.iter().count() })?;
    }
    Ok(())
}
