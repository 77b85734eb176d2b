//! Pipeline execution
//!
//! Block computation itself is provided by a [`BlockRuntime`]; this module
//! only decides the order blocks run in and what happens when one fails.

pub mod executor;

pub use executor::{ExecutionReport, FailurePolicy, PipelineExecutor};

use crate::core::Block;
use crate::persistence::VariableData;
use indexmap::IndexMap;

/// Trait for block computation - allows for different implementations
pub trait BlockRuntime {
    /// Run `block` and return one value per entry of its
    /// `output_variables()`, in the same order.
    ///
    /// `inputs` maps each upstream block uuid to the variable names it
    /// provides; values can be read through a `VariableManager`.
    fn execute_block(
        &self,
        block: &Block,
        inputs: &IndexMap<String, &'static [&'static str]>,
    ) -> anyhow::Result<Vec<VariableData>>;
}

impl<F> BlockRuntime for F
where
    F: Fn(&Block, &IndexMap<String, &'static [&'static str]>) -> anyhow::Result<Vec<VariableData>>,
{
    fn execute_block(
        &self,
        block: &Block,
        inputs: &IndexMap<String, &'static [&'static str]>,
    ) -> anyhow::Result<Vec<VariableData>> {
        self(block, inputs)
    }
}
