use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::array::Float64Array;
use arrow::array::Int64Array;
use arrow::array::StringArray;
use arrow::datatypes::DataType;
use arrow::datatypes::Field;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;

use crate::error::AnalysisError;
use crate::error::Result;

// Parses a markdown table into a record batch.
//  * Header cells are `name(type)` where type is one of utf8, i64, f64. A bare
//    `name` is utf8
//  * Empty cells are nulls
//
// # Example
//     let data = r#"
// | optimisation_variant | device_category | impressions(i64) | purchases(f64) |
// |----------------------|-----------------|------------------|----------------|
// | Control              | mobile          | 500              | 50             |
// | Variation 1          |                 | 500              |                |
// "#;
//     let batch = parse_markdown_table(data)?;
pub fn parse_markdown_table(data: &str) -> Result<RecordBatch> {
    let mut lines = data.lines().map(str::trim).filter(|l| l.starts_with('|'));
    let header = lines
        .next()
        .ok_or_else(|| AnalysisError::Internal("table has no header".to_string()))?;
    let fields = split_row(header)
        .iter()
        .map(|cell| parse_field(cell))
        .collect::<Result<Vec<_>>>()?;

    let mut values: Vec<Vec<String>> = vec![vec![]; fields.len()];
    for line in lines {
        let cells = split_row(line);
        if cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
        {
            continue;
        }
        if cells.len() != fields.len() {
            return Err(AnalysisError::Internal(format!(
                "expected {} cells, got {}: {line}",
                fields.len(),
                cells.len()
            )));
        }
        for (idx, cell) in cells.into_iter().enumerate() {
            values[idx].push(cell);
        }
    }

    let columns = fields
        .iter()
        .zip(values)
        .map(|(field, vals)| build_array(field.data_type(), &vals))
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|c| c.trim().to_string()).collect()
}

fn parse_field(cell: &str) -> Result<Field> {
    let Some((name, typ)) = cell.strip_suffix(')').and_then(|c| c.split_once('(')) else {
        return Ok(Field::new(cell, DataType::Utf8, true));
    };
    let data_type = match typ {
        "utf8" => DataType::Utf8,
        "i64" => DataType::Int64,
        "f64" => DataType::Float64,
        other => {
            return Err(AnalysisError::Internal(format!(
                "unsupported type {other:?} of column {name:?}"
            )));
        }
    };

    Ok(Field::new(name, data_type, true))
}

fn build_array(data_type: &DataType, vals: &[String]) -> Result<ArrayRef> {
    let non_empty = |v: &String| if v.is_empty() { None } else { Some(v.clone()) };
    let parse_err = |v: &String| AnalysisError::Internal(format!("can't parse {v:?}"));

    Ok(match data_type {
        DataType::Int64 => {
            let vals = vals
                .iter()
                .map(|v| {
                    non_empty(v)
                        .map(|v| v.parse::<i64>().map_err(|_| parse_err(&v)))
                        .transpose()
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Int64Array::from(vals))
        }
        DataType::Float64 => {
            let vals = vals
                .iter()
                .map(|v| {
                    non_empty(v)
                        .map(|v| v.parse::<f64>().map_err(|_| parse_err(&v)))
                        .transpose()
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Float64Array::from(vals))
        }
        _ => Arc::new(StringArray::from(
            vals.iter().map(non_empty).collect::<Vec<_>>(),
        )),
    })
}
