//! Test utility functions for blockline scenarios

use blockline::{Block, BlockRuntime, BlockType, Pipeline, VariableData, VariableManager};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway project directory with a pipeline template
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp repo");
        let template = dir.path().join("templates/pipeline");
        std::fs::create_dir_all(&template).unwrap();
        std::fs::write(template.join("metadata.yaml"), "blocks: []\n").unwrap();
        std::fs::write(template.join("requirements.txt"), "").unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn template(&self) -> PathBuf {
        self.dir.path().join("templates/pipeline")
    }

    pub fn variables(&self) -> VariableManager {
        VariableManager::new(self.path())
    }

    pub fn create_pipeline(&self, name: &str) -> Pipeline {
        Pipeline::create(name, self.path(), &self.template()).expect("create pipeline")
    }

    pub fn reload(&self, pipeline: &Pipeline) -> Pipeline {
        Pipeline::load(&pipeline.uuid, self.path()).expect("reload pipeline")
    }

    /// Create a block's stub files and add it to `pipeline`
    pub fn add_block(&self, pipeline: &mut Pipeline, name: &str, block_type: BlockType, upstream: &[&str]) {
        let block = Block::create(name, block_type, self.path()).expect("create block");
        let upstream: Vec<String> = upstream.iter().map(|s| s.to_string()).collect();
        pipeline.add_block(block, &upstream).expect("add block");
    }
}

/// The `etl` scenario: `load_csv` (data_loader) → `clean` (transformer)
pub fn etl_pipeline(repo: &TestRepo) -> Pipeline {
    let mut pipeline = repo.create_pipeline("etl");
    repo.add_block(&mut pipeline, "load_csv", BlockType::DataLoader, &[]);
    repo.add_block(&mut pipeline, "clean", BlockType::Transformer, &["load_csv"]);
    pipeline
}

/// (uuid, upstream, downstream) per block, in pipeline order
pub fn edges(pipeline: &Pipeline) -> Vec<(String, Vec<String>, Vec<String>)> {
    pipeline
        .blocks()
        .map(|b| (b.uuid.clone(), b.upstream_blocks.clone(), b.downstream_blocks.clone()))
        .collect()
}

/// Every edge resolves and appears on both of its ends
pub fn assert_graph_consistent(pipeline: &Pipeline) {
    for block in pipeline.blocks() {
        for upstream in &block.upstream_blocks {
            let other = pipeline
                .block(upstream)
                .unwrap_or_else(|| panic!("{} references missing upstream {}", block.uuid, upstream));
            assert!(
                other.downstream_blocks.contains(&block.uuid),
                "{} is upstream of {} but does not list it downstream",
                upstream,
                block.uuid
            );
        }
        for downstream in &block.downstream_blocks {
            let other = pipeline
                .block(downstream)
                .unwrap_or_else(|| panic!("{} references missing downstream {}", block.uuid, downstream));
            assert!(
                other.upstream_blocks.contains(&block.uuid),
                "{} is downstream of {} but does not list it upstream",
                downstream,
                block.uuid
            );
        }
    }
}

/// Runtime returning canned outputs per block uuid and recording call order
pub struct MockRuntime {
    outputs: HashMap<String, anyhow::Result<Vec<VariableData>>>,
    pub calls: RefCell<Vec<String>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_output(mut self, block: &str, outputs: Vec<VariableData>) -> Self {
        self.outputs.insert(block.to_string(), Ok(outputs));
        self
    }

    pub fn with_failure(mut self, block: &str, message: &str) -> Self {
        self.outputs.insert(block.to_string(), Err(anyhow::anyhow!(message.to_string())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl BlockRuntime for MockRuntime {
    fn execute_block(
        &self,
        block: &Block,
        _inputs: &IndexMap<String, &'static [&'static str]>,
    ) -> anyhow::Result<Vec<VariableData>> {
        self.calls.borrow_mut().push(block.uuid.clone());
        match self.outputs.get(&block.uuid) {
            Some(Ok(outputs)) => Ok(outputs.clone()),
            Some(Err(e)) => Err(anyhow::anyhow!(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}
