use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

mod init;
mod live;
mod model;
mod mutate;
mod page;
mod source;
mod telemetry;
mod view;
mod watch;

#[cfg(test)]
mod testutil;

#[derive(Parser)]
#[command(name = "feedview", about = "Live paginated notification feed")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init(init::InitCmd),
    Page(page::PageCmd),
    Watch(watch::WatchCmd),
    Mutate(mutate::MutateCmd),
    Live(live::LiveCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // logs on stderr; RUST_LOG and FEEDVIEW_LOG_FORMAT apply
    telemetry::config::init_tracing();
    let dsn = cli
        .dsn
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("Please provide --dsn or set DATABASE_URL in .env")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .context("connecting to the database")?;

    match cli.command {
        Commands::Init(args) => init::run(&pool, args).await?,
        Commands::Page(args) => page::run(&pool, args).await?,
        Commands::Watch(args) => watch::run(&pool, args).await?,
        Commands::Mutate(args) => mutate::run(&pool, args).await?,
        Commands::Live(args) => live::run(&pool, args).await?,
    }

    Ok(())
}
