use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::array::StringArray;
use arrow::datatypes::DataType;
use arrow::datatypes::Field;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use common::types::CONTROL_VARIANT;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AnalysisError;
use crate::error::Result;
use crate::table::string_column;

lazy_static! {
    static ref VARIANT_RX: Regex = Regex::new(r"Variation ([0-9]|\.)*").unwrap();
}

/// Extracts the variant name from a raw experience label, e.g.
/// `"PAH012 - Variation 1.2 (desktop)"` becomes `"Variation 1.2"`.
pub fn determine_variant(label: &str) -> Option<String> {
    if label.contains(CONTROL_VARIANT) {
        return Some(CONTROL_VARIANT.to_string());
    }

    VARIANT_RX.find(label).map(|m| m.as_str().to_string())
}

/// Replaces raw labels in `column` with their variant names.
pub fn derive_variants(batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let labels = string_column(batch, column)?;
    let derived = labels
        .iter()
        .map(|label| {
            label
                .map(|label| {
                    determine_variant(label).ok_or_else(|| {
                        AnalysisError::Internal(format!("can't determine variant of {label:?}"))
                    })
                })
                .transpose()
        })
        .collect::<Result<StringArray>>()?;

    let schema = batch.schema();
    let fields = schema
        .fields()
        .iter()
        .map(|f| {
            if f.name() == column {
                Arc::new(Field::new(column, DataType::Utf8, f.is_nullable()))
            } else {
                f.clone()
            }
        })
        .collect::<Vec<_>>();
    let derived: ArrayRef = Arc::new(derived);
    let columns = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(f, col)| {
            if f.name() == column {
                derived.clone()
            } else {
                col.clone()
            }
        })
        .collect::<Vec<_>>();

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
