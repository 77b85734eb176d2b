//! blockline - block-based data pipelines persisted on disk

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::{Block, BlockStatus, BlockType, Pipeline, PipelineError};
pub use execution::{BlockRuntime, ExecutionReport, FailurePolicy, PipelineExecutor};
pub use persistence::{DataFrame, Variable, VariableData, VariableError, VariableManager, VariableType};
