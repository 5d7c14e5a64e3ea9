//! CLI argument parsing for the buildsearch binary.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Build Search
///
/// Rebuild and query a full-text index of CI build records.
#[derive(Parser, Debug)]
#[command(name = "buildsearch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/buildsearch/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override index directory
    #[arg(long, global = true)]
    pub index_path: Option<String>,

    /// Override root directory of project build records
    #[arg(long, global = true)]
    pub builds_root: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the index from build records
    Rebuild {
        /// Number of concurrent workers (default from config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Only rebuild this project (repeatable; default: all)
        #[arg(short, long = "project")]
        projects: Vec<String>,

        /// Delete the index before rebuilding
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete every document from the index
    Clean,

    /// Search the index
    Search {
        /// Free-text terms
        terms: Vec<String>,

        /// Restrict to one project (exact full name)
        #[arg(short, long)]
        project: Option<String>,

        /// Restrict to one build number
        #[arg(short, long)]
        build: Option<u64>,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Print the indexed field schema
    Fields,
}
