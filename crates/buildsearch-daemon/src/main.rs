//! Build Search
//!
//! Rebuilds and queries a full-text index of CI build records.
//!
//! # Usage
//!
//! ```bash
//! buildsearch rebuild [--workers N] [--project NAME]... [--overwrite]
//! buildsearch clean
//! buildsearch search <TERMS>... [--project NAME] [--build N] [--limit N]
//! buildsearch fields
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/buildsearch/config.toml)
//! 3. Environment variables (BUILDSEARCH_*)
//! 4. CLI flags

use anyhow::{Context, Result};
use clap::Parser;

use buildsearch_backend::open_backend;
use buildsearch_daemon::{
    fields_table, handle_clean, handle_rebuild, handle_search, init_logging, load_settings, Cli,
    Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&settings)?;

    let response = match cli.command {
        Commands::Rebuild {
            workers,
            projects,
            overwrite,
        } => handle_rebuild(&settings, workers, projects, overwrite).await?,
        Commands::Clean => handle_clean(&settings).await?,
        Commands::Search {
            terms,
            project,
            build,
            limit,
        } => {
            let backend = open_backend(&settings).context("Failed to open search backend")?;
            for line in handle_search(backend.as_ref(), &terms, project.as_deref(), build, limit)? {
                println!("{}", line);
            }
            return Ok(());
        }
        Commands::Fields => {
            print!("{}", fields_table());
            return Ok(());
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize status")?
    );
    if !response.is_ok() {
        std::process::exit(i32::from(response.code.as_u8()));
    }
    Ok(())
}
