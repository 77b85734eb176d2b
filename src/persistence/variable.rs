//! Variable handle: one stored output of one block

use crate::persistence::dataframe::{read_parquet, write_parquet, DataFrame};
use crate::persistence::{VariableData, VariableError, VariableType};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory (inside a pipeline) holding variables, one subdirectory per block
pub const VARIABLE_DIR: &str = ".variables";

/// Section documents of a `dataframe_analysis` variable
pub const DATAFRAME_ANALYSIS_KEYS: [&str; 4] = ["metadata", "statistics", "insights", "suggestions"];

const DATAFRAME_FILE: &str = "data.parquet";

/// Handle on a variable stored under
/// `<pipeline>/.variables/<block_uuid>/<uuid>`.
///
/// The storage format is resolved at most once per handle: when writing a
/// [`VariableData::DataFrame`], or when reading and a Parquet file already
/// exists. After that the type no longer changes.
#[derive(Debug, Clone)]
pub struct Variable {
    pub uuid: String,
    pub pipeline_path: PathBuf,
    pub block_uuid: String,
    variable_dir_path: PathBuf,
    variable_type: Option<VariableType>,
}

impl Variable {
    /// Open a handle, creating the block's variable directory if needed
    pub fn new(
        pipeline_path: impl Into<PathBuf>,
        block_uuid: &str,
        uuid: &str,
        variable_type: Option<VariableType>,
    ) -> Result<Self, VariableError> {
        let pipeline_path = pipeline_path.into();
        let variable_dir_path = pipeline_path.join(VARIABLE_DIR).join(block_uuid);
        std::fs::create_dir_all(&variable_dir_path).map_err(VariableError::io(&variable_dir_path))?;

        Ok(Self {
            uuid: uuid.to_string(),
            pipeline_path,
            block_uuid: block_uuid.to_string(),
            variable_dir_path,
            variable_type,
        })
    }

    pub fn variable_type(&self) -> Option<VariableType> {
        self.variable_type
    }

    /// Per-block directory this variable lives in
    pub fn variable_dir_path(&self) -> &Path {
        &self.variable_dir_path
    }

    /// Directory of a structured (dataframe or analysis) variable
    pub fn variable_path(&self) -> PathBuf {
        self.variable_dir_path.join(&self.uuid)
    }

    fn json_path(&self) -> PathBuf {
        self.variable_dir_path.join(format!("{}.json", self.uuid))
    }

    fn dataframe_path(&self) -> PathBuf {
        self.variable_path().join(DATAFRAME_FILE)
    }

    /// Store `data`, dispatching on the (possibly just inferred) type
    pub fn write_data(&mut self, data: &VariableData) -> Result<(), VariableError> {
        if self.variable_type.is_none() && matches!(data, VariableData::DataFrame(_)) {
            self.variable_type = Some(VariableType::Dataframe);
        }

        match (self.variable_type, data) {
            (Some(VariableType::Dataframe) | None, VariableData::DataFrame(df)) => self.write_dataframe(df),
            (Some(VariableType::DataframeAnalysis), VariableData::Json(Value::Object(sections))) => {
                self.write_dataframe_analysis(sections)
            }
            (None, VariableData::Json(value)) => self.write_json(value),
            (Some(variable_type), other) => Err(VariableError::UnexpectedData {
                variable_type,
                found: other.kind(),
            }),
        }
    }

    /// Load the stored value, dispatching on the (possibly just inferred) type.
    ///
    /// Missing files are not errors: they read as an empty frame or `{}`.
    pub fn read_data(&mut self) -> Result<VariableData, VariableError> {
        if self.variable_type.is_none() && self.dataframe_path().exists() {
            self.variable_type = Some(VariableType::Dataframe);
        }

        match self.variable_type {
            Some(VariableType::Dataframe) => self.read_dataframe().map(VariableData::DataFrame),
            Some(VariableType::DataframeAnalysis) => self.read_dataframe_analysis().map(VariableData::Json),
            None => read_json_file(&self.json_path()).map(VariableData::Json),
        }
    }

    fn write_json(&self, value: &Value) -> Result<(), VariableError> {
        write_json_file(&self.json_path(), value)
    }

    fn write_dataframe(&self, df: &DataFrame) -> Result<(), VariableError> {
        let variable_path = self.variable_path();
        std::fs::create_dir_all(&variable_path).map_err(VariableError::io(&variable_path))?;
        debug!(
            "Writing {} rows x {} columns to {}",
            df.num_rows(),
            df.num_columns(),
            variable_path.display()
        );
        write_parquet(df, &self.dataframe_path())
    }

    fn read_dataframe(&self) -> Result<DataFrame, VariableError> {
        let path = self.dataframe_path();
        if !path.exists() {
            return Ok(DataFrame::new());
        }
        read_parquet(&path)
    }

    fn write_dataframe_analysis(&self, sections: &Map<String, Value>) -> Result<(), VariableError> {
        let variable_path = self.variable_path();
        std::fs::create_dir_all(&variable_path).map_err(VariableError::io(&variable_path))?;

        for key in DATAFRAME_ANALYSIS_KEYS {
            let section = sections.get(key).unwrap_or(&Value::Null);
            write_json_file(&variable_path.join(format!("{}.json", key)), section)?;
        }
        Ok(())
    }

    fn read_dataframe_analysis(&self) -> Result<Value, VariableError> {
        let variable_path = self.variable_path();
        if !variable_path.exists() {
            return Ok(Value::Object(Map::new()));
        }

        let mut result = Map::new();
        for key in DATAFRAME_ANALYSIS_KEYS {
            let section = read_json_file(&variable_path.join(format!("{}.json", key)))?;
            result.insert(key.to_string(), section);
        }
        Ok(Value::Object(result))
    }
}

fn read_json_file(path: &Path) -> Result<Value, VariableError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }
    let content = std::fs::read(path).map_err(VariableError::io(path))?;
    Ok(serde_json::from_slice(&content)?)
}

fn write_json_file(path: &Path, value: &Value) -> Result<(), VariableError> {
    let content = serde_json::to_vec(value)?;
    std::fs::write(path, content).map_err(VariableError::io(path))
}
