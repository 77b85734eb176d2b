//! Test: running a pipeline stores outputs and advances statuses

use crate::helpers::*;
use blockline::{
    Block, BlockStatus, BlockType, DataFrame, FailurePolicy, PipelineError, PipelineExecutor,
    VariableData,
};
use indexmap::IndexMap;
use serde_json::json;

fn frame(rows: usize) -> VariableData {
    let records: Vec<_> = (0..rows).map(|i| json!({"row": i})).collect();
    DataFrame::from_records(&records).into()
}

#[test]
fn test_run_stores_outputs_and_marks_executed() {
    let repo = TestRepo::new();
    let mut pipeline = etl_pipeline(&repo);
    repo.add_block(&mut pipeline, "export", BlockType::DataExporter, &["clean"]);

    let runtime = MockRuntime::new()
        .with_output("load_csv", vec![frame(5)])
        .with_output("clean", vec![frame(3)]);
    let executor = PipelineExecutor::new(runtime, repo.variables(), FailurePolicy::StopOnFailure);

    let report = executor.run(&mut pipeline).unwrap();
    assert!(report.is_success());
    assert_eq!(report.executed, vec!["load_csv", "clean", "export"]);

    assert!(pipeline.variables_path().join("load_csv/df/data.parquet").is_file());
    let stored = repo
        .variables()
        .get_variable(&pipeline.uuid, "clean", "df", None)
        .unwrap();
    assert_eq!(stored.as_dataframe().unwrap().num_rows(), 3);

    let reloaded = repo.reload(&pipeline);
    assert!(reloaded.blocks().all(|b| b.status == BlockStatus::Executed));
}

#[test]
fn test_runtime_calls_follow_dependencies() {
    let repo = TestRepo::new();
    let mut pipeline = repo.create_pipeline("fan_in");
    repo.add_block(&mut pipeline, "report", BlockType::Scratchpad, &[]);
    repo.add_block(&mut pipeline, "load_a", BlockType::DataLoader, &[]);
    repo.add_block(&mut pipeline, "load_b", BlockType::DataLoader, &[]);
    repo.add_block(&mut pipeline, "join", BlockType::Transformer, &["load_a", "load_b"]);

    let runtime = MockRuntime::new()
        .with_output("load_a", vec![frame(1)])
        .with_output("load_b", vec![frame(1)])
        .with_output("join", vec![frame(2)]);
    let executor = PipelineExecutor::new(runtime, repo.variables(), FailurePolicy::default());
    let report = executor.run(&mut pipeline).unwrap();

    assert_eq!(report.executed, vec!["report", "load_a", "load_b", "join"]);
    assert_eq!(pipeline.execution_order().unwrap(), report.executed);
}

#[test]
fn test_wrong_output_count_is_rejected() {
    let repo = TestRepo::new();
    let mut pipeline = etl_pipeline(&repo);

    let runtime = MockRuntime::new().with_output("load_csv", vec![frame(1), frame(1)]);
    let executor = PipelineExecutor::new(runtime, repo.variables(), FailurePolicy::StopOnFailure);

    let err = executor.run(&mut pipeline).unwrap_err();
    match err {
        PipelineError::ArityMismatch { block, expected, actual, .. } => {
            assert_eq!(block, "load_csv");
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("Expected ArityMismatch, got {:?}", other),
    }
    assert_eq!(pipeline.block("load_csv").unwrap().status, BlockStatus::NotExecuted);
    assert!(!pipeline.variables_path().join("load_csv").join("df").exists());
}

#[test]
fn test_stop_on_failure() {
    let repo = TestRepo::new();
    let mut pipeline = etl_pipeline(&repo);

    let runtime = MockRuntime::new()
        .with_output("load_csv", vec![frame(2)])
        .with_failure("clean", "division by zero");
    let executor = PipelineExecutor::new(runtime, repo.variables(), FailurePolicy::StopOnFailure);

    let err = executor.run(&mut pipeline).unwrap_err();
    assert!(matches!(err, PipelineError::Runtime { ref block, .. } if block == "clean"));
    assert!(err.to_string().contains("clean"));

    let reloaded = repo.reload(&pipeline);
    assert_eq!(reloaded.block("load_csv").unwrap().status, BlockStatus::Executed);
    assert_eq!(reloaded.block("clean").unwrap().status, BlockStatus::NotExecuted);
}

#[test]
fn test_continue_on_failure_skips_downstream() {
    let repo = TestRepo::new();
    let mut pipeline = etl_pipeline(&repo);
    repo.add_block(&mut pipeline, "export", BlockType::DataExporter, &["clean"]);
    repo.add_block(&mut pipeline, "notes", BlockType::Scratchpad, &[]);

    let runtime = MockRuntime::new()
        .with_output("load_csv", vec![frame(2)])
        .with_failure("clean", "bad column");
    let executor = PipelineExecutor::new(runtime, repo.variables(), FailurePolicy::ContinueOnFailure);

    let report = executor.run(&mut pipeline).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.executed, vec!["load_csv", "notes"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "clean");
    assert_eq!(report.skipped, vec!["export"]);
}

#[test]
fn test_closure_runtime() {
    let repo = TestRepo::new();
    let mut pipeline = etl_pipeline(&repo);

    let runtime = |block: &Block,
                   inputs: &IndexMap<String, &'static [&'static str]>|
     -> anyhow::Result<Vec<VariableData>> {
        let upstream: Vec<_> = inputs.keys().cloned().collect();
        Ok(vec![VariableData::Json(json!({"block": block.uuid, "inputs": upstream}))])
    };
    let executor = PipelineExecutor::new(runtime, repo.variables(), FailurePolicy::StopOnFailure);
    executor.run(&mut pipeline).unwrap();

    let stored = repo
        .variables()
        .get_variable(&pipeline.uuid, "clean", "df", None)
        .unwrap();
    assert_eq!(stored, VariableData::Json(json!({"block": "clean", "inputs": ["load_csv"]})));
}

#[test]
fn test_detached_block_executes_without_storage() {
    let repo = TestRepo::new();
    let runtime = MockRuntime::new().with_output("orphan", vec![frame(1)]);
    let mut block = Block::new("orphan", "orphan", BlockType::Transformer);

    let outputs = block
        .execute(&runtime, &IndexMap::new(), &repo.variables())
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert!(block.is_executed());
    assert_eq!(runtime.calls(), vec!["orphan"]);
    assert!(!repo.path().join("pipelines").exists());
}
