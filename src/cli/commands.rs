//! CLI command definitions

use crate::core::BlockType;
use crate::persistence::VariableType;
use clap::Args;

/// Create a pipeline
#[derive(Debug, Args, Clone)]
pub struct CreateCommand {
    /// Pipeline name; its uuid is derived from it
    pub name: String,
}

/// Show a pipeline
#[derive(Debug, Args, Clone)]
pub struct ShowCommand {
    /// Pipeline uuid
    pub pipeline: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Print the execution order of a pipeline
#[derive(Debug, Args, Clone)]
pub struct OrderCommand {
    /// Pipeline uuid
    pub pipeline: String,
}

/// Create a block and add it to a pipeline
#[derive(Debug, Args, Clone)]
pub struct AddBlockCommand {
    /// Pipeline uuid
    pub pipeline: String,

    /// Block name; its uuid is derived from it
    pub name: String,

    /// Block type
    #[arg(short = 't', long = "type", value_parser = parse_block_type)]
    pub block_type: BlockType,

    /// Upstream block uuids
    #[arg(short, long, value_delimiter = ',')]
    pub upstream: Vec<String>,
}

/// Remove a block from a pipeline
#[derive(Debug, Args, Clone)]
pub struct RemoveBlockCommand {
    /// Pipeline uuid
    pub pipeline: String,

    /// Block uuid
    pub block: String,
}

/// Print a stored variable
#[derive(Debug, Args, Clone)]
pub struct VariableCommand {
    /// Pipeline uuid
    pub pipeline: String,

    /// Block uuid
    pub block: String,

    /// Variable uuid
    pub variable: String,

    /// Storage format, inferred from disk when omitted
    #[arg(short = 't', long = "type", value_parser = parse_variable_type)]
    pub variable_type: Option<VariableType>,

    /// Maximum number of rows to print for dataframes
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

/// List stored variables of a block
#[derive(Debug, Args, Clone)]
pub struct VariablesCommand {
    /// Pipeline uuid
    pub pipeline: String,

    /// Block uuid
    pub block: String,
}

/// Parse a block type name such as `data_loader`
pub fn parse_block_type(s: &str) -> Result<BlockType, String> {
    s.parse()
}

/// Parse a variable type name such as `dataframe`
pub fn parse_variable_type(s: &str) -> Result<VariableType, String> {
    s.parse()
}
