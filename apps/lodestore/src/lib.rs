//! # Lodestore
//!
//! Command-line front end for the lodestore-core object store.
//!
//! - `cli`: clap command tree and command implementations
//! - `config`: TOML schema declarations turned into a `Registry`

pub mod cli;
pub mod config;
