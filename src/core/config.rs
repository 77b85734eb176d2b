//! Pipeline configuration from YAML
//!
//! `metadata.yaml` is the declarative mirror of a pipeline's block graph.

use crate::core::block::{BlockStatus, BlockType};
use crate::core::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Top-level pipeline configuration stored in `metadata.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline display name
    #[serde(default)]
    pub name: Option<String>,

    /// Pipeline uuid (informational, the directory name is authoritative)
    #[serde(default)]
    pub uuid: Option<String>,

    /// Block records in insertion order
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
}

/// Block record as stored in YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Human-readable block name
    #[serde(default)]
    pub name: Option<String>,

    /// Block uuid, unique within the pipeline
    pub uuid: String,

    /// Block variant
    #[serde(rename = "type")]
    pub block_type: BlockType,

    /// Execution status
    #[serde(default)]
    pub status: BlockStatus,

    /// Uuids of the blocks this block consumes from
    #[serde(default)]
    pub upstream_blocks: Vec<String>,

    /// Uuids of the blocks consuming from this block
    #[serde(default)]
    pub downstream_blocks: Vec<String>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::ConfigNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(PipelineError::io(path)(e)),
        };

        Self::from_yaml(&content).map_err(|source| PipelineError::ConfigMalformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse pipeline configuration from YAML string
    ///
    /// An empty document is a pipeline with no name and no blocks.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value)
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Write the configuration to `path`, replacing the previous file.
    ///
    /// The document is written to a temporary file in the same directory
    /// and renamed over the target, so readers see either the old or the
    /// new config.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let yaml = self.to_yaml().map_err(|source| PipelineError::ConfigMalformed {
            path: path.to_path_buf(),
            source,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(PipelineError::io(dir))?;
        tmp.write_all(yaml.as_bytes())
            .map_err(PipelineError::io(tmp.path()))?;
        // Temp files are owner-only; keep whatever mode the config already had
        if let Ok(metadata) = std::fs::metadata(path) {
            tmp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(PipelineError::io(tmp.path()))?;
        }
        tmp.persist(path)
            .map_err(|e| PipelineError::io(path)(e.error))?;

        debug!("Wrote pipeline config {}", path.display());
        Ok(())
    }
}
