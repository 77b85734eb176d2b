//! CLI output formatting

use crate::core::{Block, BlockStatus, BlockType, Pipeline};
use crate::persistence::{DataFrame, VariableData};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");

/// Format a block status for display
pub fn format_status(status: BlockStatus) -> String {
    match status {
        BlockStatus::NotExecuted => style("NOT EXECUTED").dim().to_string(),
        BlockStatus::Executed => style("EXECUTED").green().to_string(),
    }
}

/// Format a block type for display
pub fn format_block_type(block_type: BlockType) -> String {
    match block_type {
        BlockType::DataLoader => style(block_type).cyan().to_string(),
        BlockType::Transformer => style(block_type).yellow().to_string(),
        BlockType::DataExporter => style(block_type).magenta().to_string(),
        BlockType::Scratchpad => style(block_type).dim().to_string(),
    }
}

/// One line per block: uuid, type, status and upstream edges
pub fn format_block(block: &Block) -> String {
    let mut line = format!(
        "{} [{}] {}",
        style(&block.uuid).bold(),
        format_block_type(block.block_type),
        format_status(block.status)
    );
    if !block.upstream_blocks.is_empty() {
        line.push_str(&format!(" ← {}", style(block.upstream_blocks.join(", ")).dim()));
    }
    line
}

/// Format a pipeline header and its blocks
pub fn format_pipeline(pipeline: &Pipeline) -> String {
    let mut out = format!(
        "{} {} ({})\n",
        INFO,
        style(&pipeline.name).bold(),
        style(&pipeline.uuid).dim()
    );
    if pipeline.is_empty() {
        out.push_str(&format!("  {}\n", style("no blocks").dim()));
    }
    for block in pipeline.blocks() {
        out.push_str(&format!("  {}\n", format_block(block)));
    }
    out
}

/// Format a dataframe as tab separated rows, truncated to `max_rows`
pub fn format_dataframe(df: &DataFrame, max_rows: usize) -> String {
    let mut out = df.column_names().join("\t");
    out.push('\n');

    let columns: Vec<_> = df.columns().map(|(_, values)| values).collect();
    for row in 0..df.num_rows().min(max_rows) {
        let cells: Vec<String> = columns.iter().map(|values| values[row].to_string()).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }

    if df.num_rows() > max_rows {
        out.push_str(&format!(
            "{}... ({} more rows)\n",
            style("[truncated]").dim(),
            df.num_rows() - max_rows
        ));
    }
    out
}

/// Format any variable for display
pub fn format_variable(data: &VariableData, max_rows: usize) -> Result<String, serde_json::Error> {
    match data {
        VariableData::DataFrame(df) => Ok(format_dataframe(df, max_rows)),
        VariableData::Json(value) => serde_json::to_string_pretty(value),
    }
}
