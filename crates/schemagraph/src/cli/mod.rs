//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for schemagraph using
//! clap's derive API.
//!
//! # Commands
//!
//! - `init-config`: Write a `schemagraph.yaml` with defaults
//! - `search`: Search the object catalog
//! - `show`: Show the neighborhood of a focus object
//! - `confirm`: Confirm a logical foreign key
//! - `reject`: Reject a suggested logical foreign key
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--config <path>`: Use this configuration file
//! - `--fixture <path>`: Read relationships from a JSON fixture instead of the service
//!
//! # Example
//!
//! ```bash
//! schemagraph search orders
//! schemagraph show 42 --hops 2 --direction tb
//! schemagraph confirm lfk-1 --focus 42 --notes "matches the naming convention"
//! schemagraph --fixture warehouse.json --json show 42
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{EdgeActionArgs, InitConfigArgs, SearchArgs, ShowArgs};
pub use types::DirectionArg;
pub use validators::{validate_object_id, validate_relationship_id};

/// Schemagraph - browse and review foreign-key relationships
///
/// Shows the neighborhood of a database object with its declared and
/// inferred foreign keys, and records review decisions on inferred ones.
#[derive(Parser, Debug)]
#[command(name = "schemagraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to the nearest schemagraph.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Offline project fixture (JSON) used instead of the relationship service
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a schemagraph.yaml in the current directory
    InitConfig(InitConfigArgs),

    /// Search the object catalog
    ///
    /// Matches case-insensitively against object names and schema-qualified
    /// names. Use the listed ids as focus for `show`.
    Search(SearchArgs),

    /// Show the neighborhood of an object
    ///
    /// Lists the objects within the hop radius, laid out in layers, and the
    /// relationships between them with their review status.
    Show(ShowArgs),

    /// Confirm a logical foreign key
    ///
    /// Confirming an already confirmed relationship does nothing.
    Confirm(EdgeActionArgs),

    /// Reject a suggested logical foreign key
    Reject(EdgeActionArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("Schemagraph relationship browser");
            println!("Use --help for more information");
            return Ok(());
        };
        if let Commands::InitConfig(args) = command {
            return execute::execute_init_config(args).await;
        }

        let mut app = App::load(
            &std::env::current_dir()?,
            self.config.as_deref(),
            self.fixture.as_deref(),
        )
        .await?;

        match command {
            Commands::Search(args) => execute::execute_search(&app, args, output_mode).await,
            Commands::Show(args) => execute::execute_show(&mut app, args, output_mode).await,
            Commands::Confirm(args) => execute::execute_confirm(&app, args, output_mode).await,
            Commands::Reject(args) => execute::execute_reject(&app, args, output_mode).await,
            Commands::InitConfig(_) => Ok(()),
        }
    }
}
