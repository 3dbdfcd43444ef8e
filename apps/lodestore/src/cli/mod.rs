//! # Lodestore CLI Module
//!
//! This module implements the CLI interface for Lodestore.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `status` - Show record and document counts
//! - `types` - Describe the registered types and their index fields
//! - `create` - Create an object from NAME=VALUE pairs
//! - `show` - Load an object by identity
//! - `update` - Change attributes of an object
//! - `destroy` - Remove an object
//! - `query` - Filter, search, sort, page and facet one type
//! - `reindex` - Rebuild the search index from the record store

mod commands;

use clap::{Parser, Subcommand};
use lodestore_core::LodestoreError;
use std::io::Write;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Lodestore - locked object store
///
/// Objects are persisted as predicate records and projected into a search
/// index through a declarative schema.
#[derive(Parser, Debug)]
#[command(name = "lodestore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database file
    #[arg(short = 'D', long, global = true, default_value = "lodestore.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Schema file (TOML); the built-in schema is used when omitted
    #[arg(short = 'S', long, global = true)]
    pub schema: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show record and document counts
    Status,

    /// Describe registered types, attributes and index fields
    Types {
        /// Only describe this type
        type_name: Option<String>,
    },

    /// Create an object
    Create {
        /// Type of the new object
        type_name: String,

        /// Attribute value (repeat for multi-valued attributes)
        #[arg(short, long = "set", value_name = "NAME=VALUE", value_parser = parse_pair)]
        set: Vec<(String, String)>,
    },

    /// Show an object
    Show {
        /// Object identity
        id: String,

        /// Accepted types (any when omitted)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Replace attribute values of an object
    Update {
        /// Object identity
        id: String,

        /// Accepted types (any when omitted)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,

        /// New attribute value; all values of a named attribute are replaced
        #[arg(short, long = "set", value_name = "NAME=VALUE", value_parser = parse_pair)]
        set: Vec<(String, String)>,

        /// Remove every value of an attribute
        #[arg(short, long)]
        unset: Vec<String>,
    },

    /// Destroy an object
    Destroy {
        /// Object identity
        id: String,

        /// Accepted types (any when omitted)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Query one type
    Query {
        /// Type to query
        type_name: String,

        /// Exact-match filter
        #[arg(short = 'w', long = "where", value_name = "NAME=VALUE", value_parser = parse_pair)]
        filters: Vec<(String, String)>,

        /// Restrict to a path and its descendants
        #[arg(long, value_name = "NAME=PATH", value_parser = parse_pair)]
        within: Vec<(String, String)>,

        /// Full-text terms; every term must match
        #[arg(short = 'm', long)]
        text: Option<String>,

        /// Sort attribute
        #[arg(short = 's', long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Page size (clamped to the type's maximum)
        #[arg(short, long)]
        limit: Option<usize>,

        /// 1-based page number
        #[arg(short, long)]
        page: Option<usize>,

        /// Return every match instead of one page
        #[arg(short, long)]
        all: bool,

        /// Facet attribute (repeatable)
        #[arg(short, long = "facet")]
        facets: Vec<String>,
    },

    /// Rebuild the search index from the record store
    Reindex,
}

/// Parse a `NAME=VALUE` argument.
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {:?}", s)),
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments, writing to stdout.
pub fn execute(cli: Cli) -> Result<(), LodestoreError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute_to(cli, &mut out)
}

/// Execute the CLI with parsed arguments, writing to `out`.
pub fn execute_to(cli: Cli, out: &mut dyn Write) -> Result<(), LodestoreError> {
    let ctx = Context {
        database: cli.database,
        backend: cli.backend,
        schema: cli.schema,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, out, force),
        Some(Commands::Status) => cmd_status(&ctx, out),
        Some(Commands::Types { type_name }) => cmd_types(&ctx, out, type_name.as_deref()),
        Some(Commands::Create { type_name, set }) => cmd_create(&ctx, out, &type_name, set),
        Some(Commands::Show { id, types }) => cmd_show(&ctx, out, &id, &types),
        Some(Commands::Update {
            id,
            types,
            set,
            unset,
        }) => cmd_update(&ctx, out, &id, &types, set, &unset),
        Some(Commands::Destroy { id, types }) => cmd_destroy(&ctx, out, &id, &types),
        Some(Commands::Query {
            type_name,
            filters,
            within,
            text,
            sort,
            desc,
            limit,
            page,
            all,
            facets,
        }) => cmd_query(
            &ctx,
            out,
            &QueryArgs {
                type_name,
                filters,
                within,
                text,
                sort,
                desc,
                limit,
                page,
                all,
                facets,
            },
        ),
        Some(Commands::Reindex) => cmd_reindex(&ctx, out),
        None => {
            // No subcommand - show status by default
            cmd_status(&ctx, out)
        }
    }
}
