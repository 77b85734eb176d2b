//! Pipeline domain model

use crate::core::{
    block::{Block, BlockType},
    config::PipelineConfig,
    error::PipelineError,
    slug::clean_name,
};
use crate::persistence::VARIABLE_DIR;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory (relative to the repo) holding one directory per pipeline
pub const PIPELINES_FOLDER: &str = "pipelines";

/// Name of the declarative config inside a pipeline directory
pub const PIPELINE_CONFIG_FILE: &str = "metadata.yaml";

/// A pipeline: the block graph plus its mirror on disk.
///
/// Blocks live in an arena keyed by uuid; edges are uuid lists on each block.
/// Every successful mutation is saved before it returns.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline uuid, also its directory name
    pub uuid: String,

    /// Pipeline name
    pub name: String,

    repo_path: PathBuf,

    /// Blocks in insertion order
    blocks: IndexMap<String, Block>,
}

impl Pipeline {
    /// Create a new pipeline directory from `template_path` and load it
    pub fn create(name: &str, repo_path: &Path, template_path: &Path) -> Result<Self, PipelineError> {
        let uuid = clean_name(name);
        if uuid.is_empty() {
            return Err(PipelineError::InvalidName(name.to_string()));
        }

        let pipeline_path = repo_path.join(PIPELINES_FOLDER).join(&uuid);
        if pipeline_path.exists() {
            return Err(PipelineError::DuplicatePipeline(name.to_string()));
        }
        if !template_path.is_dir() {
            return Err(PipelineError::TemplateNotFound(template_path.to_path_buf()));
        }

        copy_dir_all(template_path, &pipeline_path)?;

        let config = PipelineConfig {
            name: Some(name.to_string()),
            uuid: Some(uuid.clone()),
            blocks: Vec::new(),
        };
        config.write_to(pipeline_path.join(PIPELINE_CONFIG_FILE))?;

        info!("Created pipeline {} at {}", uuid, pipeline_path.display());
        Self::load(&uuid, repo_path)
    }

    /// Uuids of every pipeline in the repo, sorted
    pub fn list_all(repo_path: &Path) -> Result<Vec<String>, PipelineError> {
        let pipelines_dir = repo_path.join(PIPELINES_FOLDER);
        if !pipelines_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut uuids = Vec::new();
        for entry in std::fs::read_dir(&pipelines_dir).map_err(PipelineError::io(&pipelines_dir))? {
            let entry = entry.map_err(PipelineError::io(&pipelines_dir))?;
            if entry.path().is_dir() {
                uuids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        uuids.sort();
        Ok(uuids)
    }

    /// Load a pipeline from `<repo>/pipelines/<uuid>/metadata.yaml`
    pub fn load(uuid: &str, repo_path: &Path) -> Result<Self, PipelineError> {
        let config_path = config_path(repo_path, uuid);
        let config = PipelineConfig::from_file(&config_path)?;
        let pipeline = Self::from_config(uuid, repo_path, &config)?;

        debug!("Loaded pipeline {} with {} blocks", uuid, pipeline.blocks.len());
        Ok(pipeline)
    }

    /// Build a pipeline from its config, checking that every edge resolves
    pub fn from_config(uuid: &str, repo_path: &Path, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let blocks: IndexMap<String, Block> = config
            .blocks
            .iter()
            .map(|block_config| (block_config.uuid.clone(), Block::from_config(block_config, uuid)))
            .collect();

        for block in blocks.values() {
            for reference in block.upstream_blocks.iter().chain(&block.downstream_blocks) {
                if !blocks.contains_key(reference) {
                    return Err(PipelineError::UnknownBlockReference {
                        pipeline: uuid.to_string(),
                        reference: reference.clone(),
                    });
                }
            }
        }

        Ok(Pipeline {
            uuid: uuid.to_string(),
            name: config.name.clone().unwrap_or_else(|| uuid.to_string()),
            repo_path: repo_path.to_path_buf(),
            blocks,
        })
    }

    /// Declarative config mirroring the current graph
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            name: Some(self.name.clone()),
            uuid: Some(self.uuid.clone()),
            blocks: self.blocks.values().map(Block::to_record).collect(),
        }
    }

    /// Overwrite the config file with the current graph.
    ///
    /// A failure here leaves memory ahead of disk; nothing is rolled back.
    pub fn save(&self) -> Result<(), PipelineError> {
        self.to_config().write_to(self.config_path())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn dir_path(&self) -> PathBuf {
        self.repo_path.join(PIPELINES_FOLDER).join(&self.uuid)
    }

    pub fn config_path(&self) -> PathBuf {
        config_path(&self.repo_path, &self.uuid)
    }

    /// Directory holding stored variables of every block
    pub fn variables_path(&self) -> PathBuf {
        self.dir_path().join(VARIABLE_DIR)
    }

    /// Get a block by uuid
    pub fn block(&self, uuid: &str) -> Option<&Block> {
        self.blocks.get(uuid)
    }

    pub(crate) fn block_mut(&mut self, uuid: &str) -> Option<&mut Block> {
        self.blocks.get_mut(uuid)
    }

    /// All blocks in insertion order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block_map(&self) -> &IndexMap<String, Block> {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Variable names available to a block from its upstream blocks
    pub fn input_variables(
        &self,
        uuid: &str,
    ) -> Result<IndexMap<String, &'static [&'static str]>, PipelineError> {
        let block = self.block(uuid).ok_or_else(|| self.unknown_block(uuid))?;
        Ok(block.input_variables(&self.blocks))
    }

    /// Add `block` downstream of `upstream_uuids` and save.
    ///
    /// All upstream uuids are resolved before anything changes. A block with
    /// an existing uuid replaces the old one in place; its new upstream list
    /// may not name the block itself or anything downstream of it.
    pub fn add_block(&mut self, mut block: Block, upstream_uuids: &[String]) -> Result<&Block, PipelineError> {
        self.check_upstream(&block.uuid, upstream_uuids)?;

        // A replaced block keeps its downstream edges and drops stale upstream ones
        if let Some(existing) = self.blocks.get(&block.uuid) {
            block.downstream_blocks = existing.downstream_blocks.clone();
            let stale: Vec<String> = existing
                .upstream_blocks
                .iter()
                .filter(|uuid| !upstream_uuids.contains(*uuid))
                .cloned()
                .collect();
            for upstream_uuid in &stale {
                if let Some(upstream) = self.blocks.get_mut(upstream_uuid) {
                    upstream.downstream_blocks.retain(|b| *b != block.uuid);
                }
            }
        }

        for upstream_uuid in upstream_uuids {
            if let Some(upstream) = self.blocks.get_mut(upstream_uuid) {
                if !upstream.downstream_blocks.contains(&block.uuid) {
                    upstream.downstream_blocks.push(block.uuid.clone());
                }
            }
        }
        block.upstream_blocks = upstream_uuids.to_vec();
        block.pipeline = Some(self.uuid.clone());

        let uuid = block.uuid.clone();
        self.blocks.insert(uuid.clone(), block);
        self.save()?;

        info!("Added block {} to pipeline {} (upstream: {:?})", uuid, self.uuid, upstream_uuids);
        Ok(&self.blocks[&uuid])
    }

    /// Create the stub files of a new block and add it downstream of
    /// `upstream_uuids`. The edges are checked before any file is written.
    pub fn create_block(
        &mut self,
        name: &str,
        block_type: BlockType,
        upstream_uuids: &[String],
    ) -> Result<&Block, PipelineError> {
        self.check_upstream(&clean_name(name), upstream_uuids)?;
        let block = Block::create(name, block_type, &self.repo_path)?;
        self.add_block(block, upstream_uuids)
    }

    /// Check that `upstream_uuids` exist and that none of them is `uuid` or
    /// downstream of it
    pub fn check_upstream(&self, uuid: &str, upstream_uuids: &[String]) -> Result<(), PipelineError> {
        if let Some(missing) = upstream_uuids.iter().find(|u| !self.blocks.contains_key(*u)) {
            return Err(PipelineError::UnknownBlockReference {
                pipeline: self.uuid.clone(),
                reference: missing.clone(),
            });
        }

        let descendants = self.descendants(uuid);
        match upstream_uuids
            .iter()
            .find(|u| u.as_str() == uuid || descendants.contains(*u))
        {
            Some(looped) => Err(PipelineError::CycleDetected(looped.clone())),
            None => Ok(()),
        }
    }

    /// Remove a block that nothing depends on and save.
    ///
    /// Fails without touching memory or disk when the block is unknown or
    /// still has downstream blocks.
    pub fn remove_block(&mut self, uuid: &str) -> Result<Block, PipelineError> {
        let block = self.block(uuid).ok_or_else(|| self.unknown_block(uuid))?;
        if !block.downstream_blocks.is_empty() {
            return Err(PipelineError::DependencyExists {
                block: uuid.to_string(),
                downstream: block.downstream_blocks.clone(),
            });
        }

        let upstream_uuids = block.upstream_blocks.clone();
        for upstream_uuid in &upstream_uuids {
            if let Some(upstream) = self.blocks.get_mut(upstream_uuid) {
                upstream.downstream_blocks.retain(|b| b != uuid);
            }
        }
        let removed = self
            .blocks
            .shift_remove(uuid)
            .ok_or_else(|| self.unknown_block(uuid))?;
        self.save()?;

        info!("Removed block {} from pipeline {}", uuid, self.uuid);
        Ok(removed)
    }

    /// Block uuids ordered so every block comes after its upstream blocks.
    ///
    /// Ties keep insertion order.
    pub fn execution_order(&self) -> Result<Vec<String>, PipelineError> {
        let mut result = Vec::with_capacity(self.blocks.len());
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();

        for uuid in self.blocks.keys() {
            self.visit(uuid, &mut visited, &mut in_progress, &mut result)?;
        }

        Ok(result)
    }

    fn visit(
        &self,
        uuid: &str,
        visited: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) -> Result<(), PipelineError> {
        if visited.contains(uuid) {
            return Ok(());
        }
        if !in_progress.insert(uuid.to_string()) {
            return Err(PipelineError::CycleDetected(uuid.to_string()));
        }

        if let Some(block) = self.blocks.get(uuid) {
            for upstream in &block.upstream_blocks {
                self.visit(upstream, visited, in_progress, result)?;
            }
        }

        in_progress.remove(uuid);
        visited.insert(uuid.to_string());
        result.push(uuid.to_string());
        Ok(())
    }

    /// Every block reachable through downstream edges of `uuid`
    fn descendants(&self, uuid: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([uuid]);

        while let Some(current) = queue.pop_front() {
            let Some(block) = self.blocks.get(current) else {
                continue;
            };
            for downstream in &block.downstream_blocks {
                if seen.insert(downstream.clone()) {
                    queue.push_back(downstream.as_str());
                }
            }
        }
        seen
    }

    fn unknown_block(&self, uuid: &str) -> PipelineError {
        PipelineError::UnknownBlock {
            pipeline: self.uuid.clone(),
            block: uuid.to_string(),
        }
    }
}

fn config_path(repo_path: &Path, uuid: &str) -> PathBuf {
    repo_path
        .join(PIPELINES_FOLDER)
        .join(uuid)
        .join(PIPELINE_CONFIG_FILE)
}

fn copy_dir_all(src: &Path, dst: &Path) -> Result<(), PipelineError> {
    std::fs::create_dir_all(dst).map_err(PipelineError::io(dst))?;
    for entry in walkdir::WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| PipelineError::io(src)(e.into()))?;
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);

        // Symlinks are not followed or copied
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(PipelineError::io(&target))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(path, &target).map_err(PipelineError::io(&target))?;
        }
    }
    Ok(())
}
