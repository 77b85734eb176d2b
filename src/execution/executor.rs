//! Pipeline executor - runs every block in dependency order

use crate::{
    core::{error::PipelineError, Pipeline},
    execution::BlockRuntime,
    persistence::VariableManager,
};
use std::collections::HashSet;
use tracing::{info, warn};

/// What to do when a block fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the first error
    #[default]
    StopOnFailure,

    /// Record the error, skip everything downstream of it, keep going
    ContinueOnFailure,
}

/// Outcome of a pipeline run
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Blocks that ran successfully, in run order
    pub executed: Vec<String>,

    /// Blocks that failed, with their error
    pub failed: Vec<(String, PipelineError)>,

    /// Blocks not run because an upstream block failed or was skipped
    pub skipped: Vec<String>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs pipelines with a block runtime and a variable store
pub struct PipelineExecutor<R> {
    runtime: R,
    variables: VariableManager,
    policy: FailurePolicy,
}

impl<R: BlockRuntime> PipelineExecutor<R> {
    pub fn new(runtime: R, variables: VariableManager, policy: FailurePolicy) -> Self {
        Self {
            runtime,
            variables,
            policy,
        }
    }

    /// Execute every block of `pipeline`, upstream first.
    ///
    /// Block statuses are saved to the pipeline config when the run ends,
    /// including after a failure under [`FailurePolicy::StopOnFailure`].
    pub fn run(&self, pipeline: &mut Pipeline) -> Result<ExecutionReport, PipelineError> {
        let order = pipeline.execution_order()?;
        info!("Starting pipeline {} ({} blocks)", pipeline.uuid, order.len());

        let mut report = ExecutionReport::default();
        let mut blocked: HashSet<String> = HashSet::new();

        for uuid in order {
            let Some(block) = pipeline.block(&uuid) else {
                continue;
            };
            if block.upstream_blocks.iter().any(|u| blocked.contains(u)) {
                warn!("Skipping block {}: an upstream block did not run", uuid);
                blocked.insert(uuid.clone());
                report.skipped.push(uuid);
                continue;
            }

            let inputs = block.input_variables(pipeline.block_map());
            let result = match pipeline.block_mut(&uuid) {
                Some(block) => block.execute(&self.runtime, &inputs, &self.variables),
                None => continue,
            };

            match result {
                Ok(_) => report.executed.push(uuid),
                Err(e) => {
                    warn!("Block {} failed: {}", uuid, e);
                    if self.policy == FailurePolicy::StopOnFailure {
                        pipeline.save()?;
                        return Err(e);
                    }
                    blocked.insert(uuid.clone());
                    report.failed.push((uuid, e));
                }
            }
        }

        pipeline.save()?;
        info!(
            "Finished pipeline {}: {} executed, {} failed, {} skipped",
            pipeline.uuid,
            report.executed.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
