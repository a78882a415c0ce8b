//! levelmirror CLI
//!
//! Command-line runner for the catalog mirror.
//!
//! # Commands
//!
//! - `sync` - Reconcile the mirror against the remote catalog
//! - `pin` - Capture and display the leaf certificate of an allowed origin
//! - `list` - List mirrored levels, newest first
//! - `remove` - Delete a level and its orphaned lookup rows

mod commands;
mod error;

use clap::{Parser, Subcommand};
use error::CliError;
use levelmirror_fetch::FetchConfig;
use levelmirror_reconcile::{ReconcileConfig, DEFAULT_JSON_ENDPOINT};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Mirror of a remote level catalog.
#[derive(Parser)]
#[command(name = "levelmirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the mirror database
    #[arg(global = true, long, env = "LEVELMIRROR_DB", default_value = "catalog.db")]
    db: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the mirror against the remote catalog
    Sync {
        /// Listing endpoint (newest first)
        #[arg(long, env = "LEVELMIRROR_ENDPOINT", default_value = DEFAULT_JSON_ENDPOINT)]
        endpoint: String,

        /// Base window size of the tail match
        #[arg(long, default_value = "4")]
        match_size: usize,

        /// Pages either side may load before giving up
        #[arg(long, default_value = "10")]
        max_pages: u32,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Capture and display the leaf certificate of an allowed origin
    Pin {
        /// Any URL on the origin
        url: String,
    },

    /// List mirrored levels, newest first
    List {
        /// Maximum number of levels to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a level and its orphaned lookup rows
    Remove {
        /// External ID of the level
        external_id: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(class = ?e.class(), "{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Sync {
            endpoint,
            match_size,
            max_pages,
            dry_run,
        } => {
            let config = ReconcileConfig::new()
                .with_match_size(match_size)
                .with_max_pages(max_pages);
            commands::sync::run(&cli.db, &endpoint, FetchConfig::new(), config, dry_run)
        }
        Commands::Pin { url } => commands::pin::run(&FetchConfig::new(), &url),
        Commands::List { limit, format } => commands::list::run(&cli.db, limit, &format),
        Commands::Remove { external_id } => commands::remove::run(&cli.db, external_id),
    }
}
