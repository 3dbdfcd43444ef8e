//! # Lodestore - Locked Object Store
//!
//! The main binary for the Lodestore object store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │           apps/lodestore (THE BINARY)         │
//! │                                               │
//! │   ┌─────────────┐        ┌────────────────┐   │
//! │   │    CLI      │        │  Schema (TOML) │   │
//! │   │   (clap)    │        │    (config)    │   │
//! │   └──────┬──────┘        └───────┬────────┘   │
//! │          └───────────┬───────────┘            │
//! │                      ▼                        │
//! │             ┌────────────────┐                │
//! │             │ lodestore-core │                │
//! │             │  (THE LOGIC)   │                │
//! │             └────────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! lodestore init
//! lodestore create Item -s title="River survey" -s item_type=http://purl.org/ontology/bibo/Article \
//!     -s visibility=http://terms.library.ualberta.ca/public
//! lodestore query Item -m river --sort title --facet all_subjects
//! lodestore reindex
//! ```

use clap::Parser;
use lodestore::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing: LODESTORE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("LODESTORE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "lodestore=debug,lodestore_core=debug"
    } else {
        "lodestore=info,lodestore_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so --json-mode output stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Lodestore startup banner.
fn print_banner() {
    println!("lodestore v{} - locked object store", env!("CARGO_PKG_VERSION"));
    println!();
}
