//! Command-line interface definitions for LinkVault.
//!
//! This module defines all CLI arguments and subcommands using the clap derive API.
//! Global options (verbosity, dry run, logging) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Deduplicate two photo trees into a library
//! linkvault dedupe ~/Pictures /data/photos --library /data/library --pattern '*.jpg'
//!
//! # Preview without touching anything
//! linkvault --dry-run dedupe ~/Pictures --library /data/library
//!
//! # Remove library masters nothing links to any more
//! linkvault cleanup --library /data/library
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Content-addressed file deduplication via hard links.
///
/// LinkVault moves each distinct payload into a master library keyed by its
/// SHA-256 digest and replaces every original path with a hard link to it.
#[derive(Debug, Parser)]
#[command(name = "linkvault")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Simulate: report what would happen without changing anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Append a timestamped record of every decision to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Read settings from this TOML file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Wait for a key press before exiting
    #[arg(long, global = true)]
    pub pause: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Move unique content into the library and hard-link every copy to it
    Dedupe(DedupeArgs),
    /// Delete library masters that no longer have any external link
    Cleanup(CleanupArgs),
}

/// Arguments for the dedupe subcommand.
#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Source directories to deduplicate
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Library root (created if absent; must be on the same volume)
    #[arg(short, long, value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// Extension glob to include, e.g. '*.jpg' (can be specified multiple times)
    #[arg(short, long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Leave the first copy of each file in place as the master
    #[arg(long)]
    pub link_only: bool,
}

/// Arguments for the cleanup subcommand.
#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Library root to audit
    #[arg(short, long, value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// Delete without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Move deleted masters to the system trash
    #[arg(long)]
    pub trash: bool,
}
