//! Command-line interface for sqlite-notion-sync
//!
//! # Usage Examples
//!
//! ## Daemon
//! ```bash
//! # One pass at startup, then one every hour until Ctrl+C
//! sqlite-notion-sync run \
//!   --sqlite-path downloads.db \
//!   --notion-key secret_xxx --notion-database-id 0123abcd \
//!   --interval 1h
//! ```
//!
//! ## Single pass
//! ```bash
//! # Timestamp-ordered table, cursor held at the last delivered row
//! sqlite-notion-sync once \
//!   --sqlite-path downloads.db \
//!   --order-column created_at --advance-policy delivered
//! ```
//!
//! ## Cursor maintenance
//! ```bash
//! sqlite-notion-sync cursor show --sqlite-path downloads.db
//! sqlite-notion-sync cursor set "2024-01-01T00:00:00.000Z" --sqlite-path downloads.db
//! sqlite-notion-sync cursor reset --sqlite-path downloads.db
//! ```
//!
//! Environment: `NOTION_KEY`, `NOTION_DATABASE_ID`, `SQLITE_PATH`, `RUST_LOG`.

use std::sync::Arc;

use anyhow::Context;
use checkpoint::SyncCursor;
use clap::{Parser, Subcommand};
use sqlite_notion_sync::{
    config::parse_duration, connect, CursorOpts, NotionOpts, PassOutcome, Scheduler, SqliteOpts,
    SyncOpts,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "sqlite-notion-sync")]
#[command(about = "A tool for incrementally mirroring SQLite rows into a Notion database")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass now and then one per interval until interrupted
    Run {
        /// Time between passes
        /// Format: "1h", "30m", "300s"
        #[arg(long, default_value = "1h")]
        interval: String,

        #[command(flatten)]
        sqlite: SqliteOpts,

        #[command(flatten)]
        notion: NotionOpts,

        #[command(flatten)]
        cursor: CursorOpts,

        #[command(flatten)]
        sync: SyncOpts,
    },
    /// Run a single pass and exit
    Once {
        /// Print the pass outcome as JSON on stdout
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        sqlite: SqliteOpts,

        #[command(flatten)]
        notion: NotionOpts,

        #[command(flatten)]
        cursor: CursorOpts,

        #[command(flatten)]
        sync: SyncOpts,
    },
    /// Inspect or move the sync cursor
    Cursor {
        #[command(subcommand)]
        action: CursorAction,

        #[command(flatten)]
        sqlite: SqliteOpts,

        #[command(flatten)]
        cursor: CursorOpts,
    },
}

#[derive(Subcommand)]
enum CursorAction {
    /// Print the stored cursor
    Show,
    /// Overwrite the stored cursor with POSITION
    Set {
        /// New cursor position, compared against the order column
        position: String,
    },
    /// Move the cursor back to --bootstrap-position
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            interval,
            sqlite,
            notion,
            cursor,
            sync,
        } => {
            let interval = parse_duration(&interval).context("Invalid --interval")?;
            if interval.is_zero() {
                anyhow::bail!("--interval must be greater than zero");
            }
            let settings = sync.to_settings(&cursor.bootstrap_position)?;
            let engine =
                connect::build_engine(&sqlite.source_opts(), &notion, &cursor, settings).await?;

            let shutdown = setup_shutdown_handler();
            Scheduler::new(Arc::new(engine), interval)
                .run(shutdown)
                .await;
        }
        Commands::Once {
            json,
            sqlite,
            notion,
            cursor,
            sync,
        } => {
            let settings = sync.to_settings(&cursor.bootstrap_position)?;
            let engine =
                connect::build_engine(&sqlite.source_opts(), &notion, &cursor, settings).await?;

            let outcome = engine.run_pass().await?;
            if let PassOutcome::Completed(report) = &outcome {
                if report.failed() > 0 {
                    info!(
                        "{} of {} records failed to sync; see errors above",
                        report.failed(),
                        report.selected
                    );
                }
            }
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome)
                        .context("Failed to serialize pass outcome")?
                );
            }
        }
        Commands::Cursor {
            action,
            sqlite,
            cursor,
        } => {
            let client = connect::connect_sqlite(&sqlite.source_opts()).await?;
            let store = connect::open_cursor_store(&cursor, &client);

            match action {
                CursorAction::Show => match store.read_cursor().await? {
                    Some(current) => println!("{current}"),
                    None => println!(
                        "No cursor stored; passes start from '{}'",
                        cursor.bootstrap_position
                    ),
                },
                CursorAction::Set { position } => {
                    let next = SyncCursor::from_cli_string(&position)?;
                    store.write_cursor(&next).await?;
                    info!("Sync cursor set to '{}'", next.to_cli_string());
                }
                CursorAction::Reset => {
                    let sentinel = SyncCursor::sentinel(&cursor.bootstrap_position);
                    store.write_cursor(&sentinel).await?;
                    info!(
                        "Sync cursor reset to '{}'",
                        sentinel.to_cli_string()
                    );
                }
            }
        }
    }

    Ok(())
}

/// Sets up a shutdown signal handler
fn setup_shutdown_handler() -> tokio::sync::broadcast::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            return;
        }
        info!("Received interrupt signal (Ctrl+C), finishing current pass");
        let _ = shutdown_tx.send(());
    });

    shutdown_rx
}
