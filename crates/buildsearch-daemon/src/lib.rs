//! Buildsearch binary library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (rebuild, clean, search, fields)
//! - `fs_host`: Build host reading project directories from disk

pub mod cli;
pub mod commands;
pub mod fs_host;

pub use cli::{Cli, Commands};
pub use commands::{
    build_manager, fields_table, handle_clean, handle_rebuild, handle_search, init_logging,
    load_settings,
};
pub use fs_host::FsHost;
