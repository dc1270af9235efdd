use std::collections::BTreeMap;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::table::number_column;
use crate::table::string_column;
use crate::table::value_or_zero;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceShare {
    pub device: String,
    pub total: f64,
    /// Share of the overall total, in percent.
    pub share: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Splits the total of `metric` by device, sorted by device name.
pub fn device_report(
    batch: &RecordBatch,
    metric: &str,
    device_column: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<DeviceShare>> {
    let devices = string_column(batch, device_column)?;
    let values = number_column(batch, metric)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        if devices.is_null(row) {
            continue;
        }
        *totals.entry(devices.value(row).to_string()).or_default() += value_or_zero(&values, row);
    }

    let total: f64 = totals.values().sum();
    Ok(totals
        .into_iter()
        .map(|(device, value)| DeviceShare {
            device,
            total: value,
            share: if total == 0.0 {
                0.0
            } else {
                value / total * 100.0
            },
            start_date,
            end_date,
        })
        .collect())
}
