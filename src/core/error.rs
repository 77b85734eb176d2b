//! Error types for pipeline and block operations

use crate::core::block::BlockType;
use crate::persistence::VariableError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for pipeline graph and block operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Malformed pipeline config {}: {source}", path.display())]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Pipeline {0} already exists")]
    DuplicatePipeline(String),

    #[error("Name '{0}' does not produce a usable identifier")]
    InvalidName(String),

    #[error("Could not find templates for pipeline at {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Block {block} is not in pipeline {pipeline}")]
    UnknownBlock { pipeline: String, block: String },

    #[error("Pipeline {pipeline} has no block {reference}")]
    UnknownBlockReference { pipeline: String, reference: String },

    #[error("Blocks {downstream:?} are depending on block {block}. Please remove these blocks first")]
    DependencyExists { block: String, downstream: Vec<String> },

    #[error(
        "Block {block} produced {actual} outputs but block type {block_type} declares {expected}"
    )]
    ArityMismatch {
        block: String,
        block_type: BlockType,
        expected: usize,
        actual: usize,
    },

    #[error("Cycle detected in dependency graph involving block {0}")]
    CycleDetected(String),

    #[error("Block {block} failed: {source}")]
    Runtime {
        block: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Wrap an I/O error with the path it happened on
    pub(crate) fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| PipelineError::Io { path, source }
    }
}
