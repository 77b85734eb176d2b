//! Persistence layer for block output variables

pub mod dataframe;
pub mod variable;

pub use dataframe::DataFrame;
pub use variable::{Variable, DATAFRAME_ANALYSIS_KEYS, VARIABLE_DIR};

use crate::core::pipeline::PIPELINES_FOLDER;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Storage format of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    /// Tabular data, stored as Parquet
    Dataframe,
    /// Four JSON section documents describing a dataframe
    DataframeAnalysis,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Dataframe => "dataframe",
            VariableType::DataframeAnalysis => "dataframe_analysis",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VariableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataframe" => Ok(VariableType::Dataframe),
            "dataframe_analysis" => Ok(VariableType::DataframeAnalysis),
            _ => Err(format!("Unknown variable type: {}", s)),
        }
    }
}

/// A value produced by a block
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    /// Tabular data
    DataFrame(DataFrame),
    /// Any other value, including dataframe analyses
    Json(serde_json::Value),
}

impl VariableData {
    /// Convert any serializable value into a portable JSON variable.
    ///
    /// Non-finite floats become `null`, everything numeric becomes a plain
    /// JSON number.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, VariableError> {
        Ok(VariableData::Json(serde_json::to_value(value)?))
    }

    pub fn as_dataframe(&self) -> Option<&DataFrame> {
        match self {
            VariableData::DataFrame(df) => Some(df),
            VariableData::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            VariableData::Json(value) => Some(value),
            VariableData::DataFrame(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            VariableData::DataFrame(_) => "dataframe",
            VariableData::Json(serde_json::Value::Object(_)) => "object",
            VariableData::Json(_) => "json",
        }
    }
}

impl From<DataFrame> for VariableData {
    fn from(df: DataFrame) -> Self {
        VariableData::DataFrame(df)
    }
}

impl From<serde_json::Value> for VariableData {
    fn from(value: serde_json::Value) -> Self {
        VariableData::Json(value)
    }
}

/// Error types for variable storage
#[derive(Debug, Error)]
pub enum VariableError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error at {}: {source}", path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Variable of type {variable_type} cannot store {found} data")]
    UnexpectedData {
        variable_type: VariableType,
        found: &'static str,
    },

    #[error("Column {column} has {actual} rows, expected {expected}")]
    ShapeMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

impl VariableError {
    pub(crate) fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| VariableError::Io { path, source }
    }
}

/// Entry point for reading and writing block variables of a repo.
///
/// Passed explicitly to whatever executes blocks; every call opens a fresh
/// [`Variable`] handle, so type inference never leaks between calls.
#[derive(Debug, Clone)]
pub struct VariableManager {
    repo_path: PathBuf,
}

impl VariableManager {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Directory of a pipeline inside the repo
    pub fn pipeline_path(&self, pipeline_uuid: &str) -> PathBuf {
        self.repo_path.join(PIPELINES_FOLDER).join(pipeline_uuid)
    }

    /// Store a block output, inferring its format from the value
    pub fn add_variable(
        &self,
        pipeline_uuid: &str,
        block_uuid: &str,
        variable_uuid: &str,
        data: &VariableData,
    ) -> Result<(), VariableError> {
        self.add_variable_with_type(pipeline_uuid, block_uuid, variable_uuid, data, None)
    }

    /// Store a block output with an explicit format
    pub fn add_variable_with_type(
        &self,
        pipeline_uuid: &str,
        block_uuid: &str,
        variable_uuid: &str,
        data: &VariableData,
        variable_type: Option<VariableType>,
    ) -> Result<(), VariableError> {
        debug!(
            "Storing variable {} of block {} in pipeline {}",
            variable_uuid, block_uuid, pipeline_uuid
        );
        let mut variable = Variable::new(
            self.pipeline_path(pipeline_uuid),
            block_uuid,
            variable_uuid,
            variable_type,
        )?;
        variable.write_data(data)
    }

    /// Read a stored block output
    pub fn get_variable(
        &self,
        pipeline_uuid: &str,
        block_uuid: &str,
        variable_uuid: &str,
        variable_type: Option<VariableType>,
    ) -> Result<VariableData, VariableError> {
        let mut variable = Variable::new(
            self.pipeline_path(pipeline_uuid),
            block_uuid,
            variable_uuid,
            variable_type,
        )?;
        variable.read_data()
    }

    /// Uuids of the variables stored for a block, sorted
    pub fn get_variables_by_block(
        &self,
        pipeline_uuid: &str,
        block_uuid: &str,
    ) -> Result<Vec<String>, VariableError> {
        let block_dir = self
            .pipeline_path(pipeline_uuid)
            .join(VARIABLE_DIR)
            .join(block_uuid);
        if !block_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut uuids = Vec::new();
        for entry in std::fs::read_dir(&block_dir).map_err(VariableError::io(&block_dir))? {
            let entry = entry.map_err(VariableError::io(&block_dir))?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if path.is_dir() {
                uuids.push(file_name);
            } else if let Some(stem) = file_name.strip_suffix(".json") {
                uuids.push(stem.to_string());
            }
        }
        uuids.sort();
        uuids.dedup();
        Ok(uuids)
    }
}
