use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::Array;
use arrow::array::AsArray;
use arrow::array::Float64Array;
use arrow::array::StringArray;
use arrow::compute::cast;
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::csv::WriterBuilder;
use arrow::datatypes::DataType;
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use tracing::debug;

use crate::error::AnalysisError;
use crate::error::Result;

// name pandas gives an unnamed index column when it is read back
const PANDAS_INDEX_COLUMN: &str = "Unnamed: 0";

/// Loads an experiment table from a csv file with a header row. Column types
/// are inferred from the data.
pub fn read_csv(path: impl AsRef<Path>) -> Result<RecordBatch> {
    let path = path.as_ref();
    let (schema, records) = Format::default()
        .with_header(true)
        .infer_schema(File::open(path)?, None)?;
    debug!("{path:?}: {records} records, schema: {schema:?}");

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(File::open(path)?)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    drop_index_column(batch)
}

// csv files written with a pandas index carry a leading column with an empty name
fn drop_index_column(batch: RecordBatch) -> Result<RecordBatch> {
    let keep = batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.name().is_empty() && f.name() != PANDAS_INDEX_COLUMN)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    if keep.len() == batch.num_columns() {
        return Ok(batch);
    }

    Ok(batch.project(&keep)?)
}

pub fn write_csv(path: impl AsRef<Path>, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;

    Ok(())
}

pub fn pretty(batch: &RecordBatch) -> Result<String> {
    Ok(pretty_format_batches(&[batch.clone()])?.to_string())
}

/// Column `name` as strings. Missing columns are a configuration error.
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))?;

    Ok(cast(col, &DataType::Utf8)?.as_string::<i32>().clone())
}

/// Numeric column `name` as floats.
pub fn number_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))?;
    if !col.data_type().is_numeric() {
        return Err(AnalysisError::Internal(format!(
            "column {name:?} is not numeric: {}",
            col.data_type()
        )));
    }

    Ok(cast(col, &DataType::Float64)?
        .as_primitive::<Float64Type>()
        .clone())
}

/// Value of a numeric column where nulls count as zero.
pub fn value_or_zero(arr: &Float64Array, idx: usize) -> f64 {
    if arr.is_null(idx) {
        0.0
    } else {
        arr.value(idx)
    }
}
