//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    AddBlockCommand, CreateCommand, OrderCommand, RemoveBlockCommand, ShowCommand,
    VariableCommand, VariablesCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Template copied into every new pipeline directory
pub const DEFAULT_TEMPLATE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates/pipeline");

/// Block-based data pipelines kept in sync with disk
#[derive(Debug, Parser, Clone)]
#[command(name = "blockline")]
#[command(author = "Blockline Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Define, persist and inspect block-based data pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root containing pipelines/ and block directories
    #[arg(short, long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Template directory copied into new pipelines
    #[arg(long, global = true, default_value = DEFAULT_TEMPLATE_PATH)]
    pub template: PathBuf,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create a pipeline
    Create(CreateCommand),

    /// List pipelines
    List,

    /// Show a pipeline's blocks and edges
    Show(ShowCommand),

    /// Print the order blocks would run in
    Order(OrderCommand),

    /// List block stub files by type
    Blocks,

    /// Create a block and add it to a pipeline
    AddBlock(AddBlockCommand),

    /// Remove a block from a pipeline
    RemoveBlock(RemoveBlockCommand),

    /// Print a stored variable
    Variable(VariableCommand),

    /// List stored variables of a block
    Variables(VariablesCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
