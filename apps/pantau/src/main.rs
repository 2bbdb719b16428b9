//! # Pantau - Proposal Oversight Dashboard
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    apps/pantau (THE BINARY)                  │
//! │                                                              │
//! │  ┌──────────┐   ┌──────────┐   ┌─────────────────────────┐   │
//! │  │   CLI    │   │ HTTP API │   │ StatsCache + Refresher  │   │
//! │  │  (clap)  │   │  (axum)  │   │   (tokio, reqwest)      │   │
//! │  └────┬─────┘   └────┬─────┘   └───────────┬─────────────┘   │
//! │       └──────────────┼─────────────────────┘                 │
//! │                      ▼                                       │
//! │              ┌───────────────┐                               │
//! │              │  pantau-core  │                               │
//! │              │  (THE LOGIC)  │                               │
//! │              └───────────────┘                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! PANTAU_REMOTE_URL=https://records.example/api pantau server --port 8080
//! pantau report --records proposals.json --roster desa.json
//! pantau snapshot -o today.pntu
//! pantau export --snapshot today.pntu -o rows.pntx
//! ```

use clap::Parser;
use pantau::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // PANTAU_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("PANTAU_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pantau=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Pantau startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗  █████╗ ███╗   ██╗████████╗ █████╗ ██╗   ██╗
  ██╔══██╗██╔══██╗████╗  ██║╚══██╔══╝██╔══██╗██║   ██║
  ██████╔╝███████║██╔██╗ ██║   ██║   ███████║██║   ██║
  ██╔═══╝ ██╔══██║██║╚██╗██║   ██║   ██╔══██║██║   ██║
  ██║     ██║  ██║██║ ╚████║   ██║   ██║  ██║╚██████╔╝
  ╚═╝     ╚═╝  ╚═╝╚═╝  ╚═══╝   ╚═╝   ╚═╝  ╚═╝ ╚═════╝

  Proposal Oversight Dashboard v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
