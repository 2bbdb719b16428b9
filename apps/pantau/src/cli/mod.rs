//! # Pantau CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP API with background refresh
//! - `summary` - Fetch the statistics summary from the record store
//! - `report` - Regional report: participation, per kecamatan, rankings
//! - `stage` - Stage distribution, or the stage of one proposal
//! - `snapshot` - Write records + roster to a snapshot file
//! - `export` - Write ordered export rows to a file
//! - `verify` - Check an export file's header, row count and checksum
//!
//! Data commands read from `--snapshot`, from `--records`/`--roster` JSON
//! files, or from the remote record store when neither is given.

mod commands;

use crate::config::PantauConfig;
use clap::{Args, Parser, Subcommand};
use pantau_core::PantauError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Pantau - village proposal oversight dashboard
///
/// Tracks where every desa proposal sits in the review pipeline and how
/// each kecamatan participates.
#[derive(Parser, Debug)]
#[command(name = "pantau")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a pantau.toml config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where data commands read records and roster from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Snapshot file written by `pantau snapshot`
    #[arg(short, long, conflicts_with_all = ["records", "roster"])]
    pub snapshot: Option<PathBuf>,

    /// Proposal records as JSON (record store format)
    #[arg(short, long)]
    pub records: Option<PathBuf>,

    /// Regional roster as JSON (record store format)
    #[arg(short = 'R', long)]
    pub roster: Option<PathBuf>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch the statistics summary from the record store
    Summary,

    /// Show the regional report
    Report {
        #[command(flatten)]
        source: SourceArgs,

        /// Ranking length (default: 10 by budget, 15 by count)
        #[arg(short, long)]
        top: Option<usize>,
    },

    /// Show stage distribution, or one proposal's stage
    Stage {
        #[command(flatten)]
        source: SourceArgs,

        /// Proposal id
        #[arg(long)]
        id: Option<u64>,
    },

    /// Write records and roster to a snapshot file
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Export ordered rows
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (rows, json)
        #[arg(short = 't', long, default_value = "rows")]
        format: String,
    },

    /// Verify an export file
    Verify {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), PantauError> {
    let config = PantauConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, host, port).await,
        Some(Commands::Summary) => cmd_summary(&config, json_mode).await,
        Some(Commands::Report { source, top }) => {
            cmd_report(&config, &source, json_mode, top, cli.verbose).await
        }
        Some(Commands::Stage { source, id }) => cmd_stage(&config, &source, json_mode, id).await,
        Some(Commands::Snapshot { source, output }) => {
            cmd_snapshot(&config, &source, &output).await
        }
        Some(Commands::Export {
            source,
            output,
            format,
        }) => cmd_export(&config, &source, &output, &format).await,
        Some(Commands::Verify { input }) => cmd_verify(&input, json_mode),
        None => {
            // No subcommand - show the summary by default
            cmd_summary(&config, json_mode).await
        }
    }
}
