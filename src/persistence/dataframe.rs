//! Tabular variables and their Parquet encoding
//!
//! A [`DataFrame`] holds loosely typed JSON cells per column. Parquet needs one
//! type per column, so before writing every column is re-typed after its first
//! non-null value; columns that do not fit fall back to strings. The
//! conversion is lossy on purpose: a column `[1, "2", "x"]` comes back as
//! `["1", "2", "x"]`.

use crate::persistence::VariableError;
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use indexmap::IndexMap;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::Arc;

/// Column-oriented table of JSON cells. All columns have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    columns: IndexMap<String, Vec<Value>>,
    num_rows: usize,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from named columns of equal length
    pub fn from_columns<I>(columns: I) -> Result<Self, VariableError>
    where
        I: IntoIterator<Item = (String, Vec<Value>)>,
    {
        let mut df = DataFrame::new();
        for (name, values) in columns {
            if df.columns.is_empty() {
                df.num_rows = values.len();
            } else if values.len() != df.num_rows {
                return Err(VariableError::ShapeMismatch {
                    column: name,
                    expected: df.num_rows,
                    actual: values.len(),
                });
            }
            df.columns.insert(name, values);
        }
        Ok(df)
    }

    /// Build a frame from row objects. Columns appear in first-seen order and
    /// keys missing from a row are null.
    pub fn from_records(records: &[Value]) -> Self {
        let mut columns: IndexMap<String, Vec<Value>> = IndexMap::new();
        for (row, record) in records.iter().enumerate() {
            let Some(object) = record.as_object() else {
                continue;
            };
            for (key, value) in object {
                let column = columns
                    .entry(key.clone())
                    .or_insert_with(|| vec![Value::Null; row]);
                column.resize(row, Value::Null);
                column.push(value.clone());
            }
        }
        for column in columns.values_mut() {
            column.resize(records.len(), Value::Null);
        }

        DataFrame {
            columns,
            num_rows: records.len(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Encode as a single Arrow record batch, coercing every column
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for (name, values) in &self.columns {
            let column = coerce_column(values);
            fields.push(Field::new(name.as_str(), column.data_type(), true));
            arrays.push(column.into_array());
        }

        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
    }

    /// Decode record batches sharing `schema`
    pub fn from_record_batches(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Self, ArrowError> {
        let mut columns: IndexMap<String, Vec<Value>> = schema
            .fields()
            .iter()
            .map(|field| (field.name().clone(), Vec::new()))
            .collect();
        let mut num_rows = 0;

        for batch in batches {
            num_rows += batch.num_rows();
            for (values, array) in columns.values_mut().zip(batch.columns()) {
                values.extend(array_values(array)?);
            }
        }

        Ok(DataFrame { columns, num_rows })
    }
}

/// A column after coercion to a single Parquet-friendly type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedColumn {
    Boolean(Vec<Option<bool>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
}

impl TypedColumn {
    pub fn data_type(&self) -> DataType {
        match self {
            TypedColumn::Boolean(_) => DataType::Boolean,
            TypedColumn::Int64(_) => DataType::Int64,
            TypedColumn::Float64(_) => DataType::Float64,
            TypedColumn::Utf8(_) => DataType::Utf8,
        }
    }

    fn into_array(self) -> ArrayRef {
        match self {
            TypedColumn::Boolean(v) => Arc::new(BooleanArray::from(v)),
            TypedColumn::Int64(v) => Arc::new(Int64Array::from(v)),
            TypedColumn::Float64(v) => Arc::new(Float64Array::from(v)),
            TypedColumn::Utf8(v) => Arc::new(StringArray::from(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

fn kind_of(value: &Value) -> Option<ColumnKind> {
    match value {
        Value::Bool(_) => Some(ColumnKind::Boolean),
        Value::Number(n) if n.is_i64() => Some(ColumnKind::Int64),
        Value::Number(_) => Some(ColumnKind::Float64),
        Value::String(_) => Some(ColumnKind::Utf8),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Re-type a column after its first non-null value.
///
/// Nulls stay null. If any other value cannot be cast, or the first value is
/// nested JSON, the whole column becomes strings. A column with no values is
/// a column of null strings.
pub fn coerce_column(values: &[Value]) -> TypedColumn {
    let Some(first) = values.iter().find(|v| !v.is_null()) else {
        return TypedColumn::Utf8(vec![None; values.len()]);
    };

    let coerced = match kind_of(first) {
        Some(ColumnKind::Boolean) => cast_all(values, cast_bool).map(TypedColumn::Boolean),
        Some(ColumnKind::Int64) => cast_all(values, cast_i64).map(TypedColumn::Int64),
        Some(ColumnKind::Float64) => cast_all(values, cast_f64).map(TypedColumn::Float64),
        Some(ColumnKind::Utf8) | None => None,
    };

    coerced.unwrap_or_else(|| TypedColumn::Utf8(values.iter().map(stringify).collect()))
}

fn cast_all<T>(values: &[Value], cast: fn(&Value) -> Option<T>) -> Option<Vec<Option<T>>> {
    values
        .iter()
        .map(|v| if v.is_null() { Some(None) } else { cast(v).map(Some) })
        .collect()
}

fn cast_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn cast_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cast_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn array_values(array: &ArrayRef) -> Result<Vec<Value>, ArrowError> {
    let len = array.len();
    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; len],
        DataType::Boolean => {
            let bools = array.as_boolean();
            (0..len)
                .map(|i| if bools.is_null(i) { Value::Null } else { Value::Bool(bools.value(i)) })
                .collect()
        }
        dt if dt.is_integer() => {
            let casted = arrow::compute::cast(array.as_ref(), &DataType::Int64)?;
            let ints = casted.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| if ints.is_null(i) { Value::Null } else { Value::from(ints.value(i)) })
                .collect()
        }
        dt if dt.is_floating() => {
            let casted = arrow::compute::cast(array.as_ref(), &DataType::Float64)?;
            let floats = casted.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    if floats.is_null(i) {
                        Value::Null
                    } else {
                        Number::from_f64(floats.value(i)).map_or(Value::Null, Value::Number)
                    }
                })
                .collect()
        }
        _ => {
            let casted = arrow::compute::cast(array.as_ref(), &DataType::Utf8)?;
            let strings = casted.as_string::<i32>();
            (0..len)
                .map(|i| {
                    if strings.is_null(i) {
                        Value::Null
                    } else {
                        Value::String(strings.value(i).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(values)
}

fn parquet_error(path: &Path) -> impl FnOnce(parquet::errors::ParquetError) -> VariableError {
    let path = path.to_path_buf();
    move |source| VariableError::Parquet { path, source }
}

/// Write `df` to a Parquet file at `path`
pub fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), VariableError> {
    let batch = df.to_record_batch()?;
    let file = std::fs::File::create(path).map_err(VariableError::io(path))?;

    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).map_err(parquet_error(path))?;
    writer.write(&batch).map_err(parquet_error(path))?;
    writer.close().map_err(parquet_error(path))?;
    Ok(())
}

/// Read a Parquet file written by [`write_parquet`] (or any other writer)
pub fn read_parquet(path: &Path) -> Result<DataFrame, VariableError> {
    let file = std::fs::File::open(path).map_err(VariableError::io(path))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_error(path))?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(parquet_error(path))?;

    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(DataFrame::from_record_batches(&schema, &batches)?)
}
