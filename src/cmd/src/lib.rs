use std::path::Path;

use analysis::bayes::Comparator;
use analysis::summary::Options;
use analysis::table::read_csv;
use analysis::variant::derive_variants;
use arrow::record_batch::RecordBatch;
use common::config::Config;
use tracing::debug;

pub mod command;
pub mod config;
pub mod error;
pub mod report;

/// Loads the experiment table, deriving variant names from raw labels when
/// the experiment asks for it.
pub fn init_table(path: &Path, cfg: &Config) -> error::Result<RecordBatch> {
    let batch = read_csv(path)?;
    debug!("loaded {} rows from {path:?}", batch.num_rows());
    if !cfg.experiment.derive_variant {
        return Ok(batch);
    }

    Ok(derive_variants(&batch, &cfg.experiment.variant_column)?)
}

pub fn summary_options(cfg: &Config) -> Options {
    Options {
        variant_column: cfg.experiment.variant_column.clone(),
        dimensions: cfg.experiment.dimensions.clone(),
        control: cfg.experiment.control.clone(),
        significance: cfg.significance.enabled,
        comparator: Comparator::new(cfg.significance.precision, cfg.significance.basis),
    }
}
