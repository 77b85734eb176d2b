//! Block domain model

use crate::core::config::BlockConfig;
use crate::core::error::PipelineError;
use crate::core::slug::clean_name;
use crate::execution::BlockRuntime;
use crate::persistence::{VariableData, VariableManager};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extension of block stub source files. The block source language belongs
/// to the execution runtime, not to this crate.
pub const BLOCK_FILE_EXTENSION: &str = "py";

/// Empty marker that turns a block type directory into an importable module
pub const MODULE_MARKER_FILE: &str = "__init__.py";

/// Block variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    DataExporter,
    DataLoader,
    Scratchpad,
    Transformer,
}

impl BlockType {
    /// Every block type, in declaration order
    pub const ALL: [BlockType; 4] = [
        BlockType::DataExporter,
        BlockType::DataLoader,
        BlockType::Scratchpad,
        BlockType::Transformer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::DataExporter => "data_exporter",
            BlockType::DataLoader => "data_loader",
            BlockType::Scratchpad => "scratchpad",
            BlockType::Transformer => "transformer",
        }
    }

    /// Names of the variables a block of this type produces
    pub fn output_variables(&self) -> &'static [&'static str] {
        match self {
            BlockType::DataLoader | BlockType::Transformer => &["df"],
            BlockType::DataExporter | BlockType::Scratchpad => &[],
        }
    }

    /// Directory (relative to the repo) holding stub files of this type
    pub fn dir_name(&self) -> String {
        format!("{}s", self.as_str())
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown block type: {}", s))
    }
}

/// Execution status of a block. Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    #[default]
    NotExecuted,
    Executed,
}

impl BlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStatus::NotExecuted => "not_executed",
            BlockStatus::Executed => "executed",
        }
    }
}

/// A named processing step, a node of a pipeline's dependency graph.
///
/// Edges are uuid lists into the owning pipeline's block map; the block never
/// owns its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub uuid: String,
    pub block_type: BlockType,
    pub status: BlockStatus,

    /// Uuid of the owning pipeline, set when the block is added to one
    pub pipeline: Option<String>,

    pub upstream_blocks: Vec<String>,
    pub downstream_blocks: Vec<String>,
}

impl Block {
    /// Create an unconnected block that belongs to no pipeline
    pub fn new(name: impl Into<String>, uuid: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
            block_type,
            status: BlockStatus::NotExecuted,
            pipeline: None,
            upstream_blocks: Vec::new(),
            downstream_blocks: Vec::new(),
        }
    }

    /// Create a block from its config record. Edges are copied verbatim;
    /// resolving them is the pipeline's job.
    pub fn from_config(config: &BlockConfig, pipeline: &str) -> Self {
        Self {
            name: config.name.clone().unwrap_or_else(|| config.uuid.clone()),
            uuid: config.uuid.clone(),
            block_type: config.block_type,
            status: config.status,
            pipeline: Some(pipeline.to_string()),
            upstream_blocks: config.upstream_blocks.clone(),
            downstream_blocks: config.downstream_blocks.clone(),
        }
    }

    /// Create a new block and its stub files under `repo_path`.
    ///
    /// Makes sure `<repo>/<type>s/` exists, then writes an empty module
    /// marker and an empty `<uuid>.py` stub in it. Existing files are left
    /// as they are.
    pub fn create(name: &str, block_type: BlockType, repo_path: &Path) -> Result<Self, PipelineError> {
        let uuid = clean_name(name);
        if uuid.is_empty() {
            return Err(PipelineError::InvalidName(name.to_string()));
        }

        let block_dir = repo_path.join(block_type.dir_name());
        std::fs::create_dir_all(&block_dir).map_err(PipelineError::io(&block_dir))?;

        let marker = block_dir.join(MODULE_MARKER_FILE);
        touch(&marker)?;

        let stub = block_dir.join(format!("{}.{}", uuid, BLOCK_FILE_EXTENSION));
        touch(&stub)?;

        info!("Created {} block {} at {}", block_type, uuid, stub.display());
        Ok(Block::new(name, uuid, block_type))
    }

    /// Discover block uuids from stub files, per block type.
    ///
    /// Types without a directory are left out of the result.
    pub fn list_all(repo_path: &Path) -> Result<IndexMap<BlockType, Vec<String>>, PipelineError> {
        let mut block_uuids = IndexMap::new();

        for block_type in BlockType::ALL {
            let block_dir = repo_path.join(block_type.dir_name());
            if !block_dir.is_dir() {
                continue;
            }

            let mut uuids = Vec::new();
            for entry in std::fs::read_dir(&block_dir).map_err(PipelineError::io(&block_dir))? {
                let entry = entry.map_err(PipelineError::io(&block_dir))?;
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if file_name == MODULE_MARKER_FILE {
                    continue;
                }
                if !file_name.ends_with(&format!(".{}", BLOCK_FILE_EXTENSION)) {
                    continue;
                }
                if let Some(uuid) = file_name.split('.').next() {
                    uuids.push(uuid.to_string());
                }
            }
            uuids.sort();
            block_uuids.insert(block_type, uuids);
        }

        Ok(block_uuids)
    }

    /// Canonical record of this block for the pipeline config
    pub fn to_record(&self) -> BlockConfig {
        BlockConfig {
            name: Some(self.name.clone()),
            uuid: self.uuid.clone(),
            block_type: self.block_type,
            status: self.status,
            upstream_blocks: self.upstream_blocks.clone(),
            downstream_blocks: self.downstream_blocks.clone(),
        }
    }

    /// Names of the variables this block produces
    pub fn output_variables(&self) -> &'static [&'static str] {
        self.block_type.output_variables()
    }

    /// Variable names available from each upstream block, keyed by its uuid
    pub fn input_variables(
        &self,
        blocks: &IndexMap<String, Block>,
    ) -> IndexMap<String, &'static [&'static str]> {
        self.upstream_blocks
            .iter()
            .filter_map(|uuid| blocks.get(uuid))
            .map(|upstream| (upstream.uuid.clone(), upstream.output_variables()))
            .collect()
    }

    pub fn is_executed(&self) -> bool {
        self.status == BlockStatus::Executed
    }

    /// Run the block through `runtime` and store its outputs.
    ///
    /// The runtime must produce exactly one value per output variable.
    /// Outputs are written through `variables` only when the block belongs to
    /// a pipeline; a detached block still succeeds and is marked executed.
    pub fn execute<R: BlockRuntime + ?Sized>(
        &mut self,
        runtime: &R,
        inputs: &IndexMap<String, &'static [&'static str]>,
        variables: &VariableManager,
    ) -> Result<Vec<VariableData>, PipelineError> {
        debug!("Executing block {} with inputs {:?}", self.uuid, inputs);

        let outputs = runtime
            .execute_block(self, inputs)
            .map_err(|source| PipelineError::Runtime {
                block: self.uuid.clone(),
                source,
            })?;

        let output_variables = self.output_variables();
        if outputs.len() != output_variables.len() {
            return Err(PipelineError::ArityMismatch {
                block: self.uuid.clone(),
                block_type: self.block_type,
                expected: output_variables.len(),
                actual: outputs.len(),
            });
        }

        match &self.pipeline {
            Some(pipeline_uuid) => {
                for (variable_uuid, data) in output_variables.iter().zip(&outputs) {
                    variables.add_variable(pipeline_uuid, &self.uuid, variable_uuid, data)?;
                }
            }
            None => {
                warn!(
                    "Block {} has no pipeline, skipping storage of {} outputs",
                    self.uuid,
                    outputs.len()
                );
            }
        }

        self.status = BlockStatus::Executed;
        info!("Executed block {}", self.uuid);
        Ok(outputs)
    }
}

fn touch(path: &Path) -> Result<(), PipelineError> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map(|_| ())
        .map_err(PipelineError::io(path))
}
