use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use tracing::level_filters::LevelFilter;

use crate::funnel::Funnel;

#[derive(Debug, Clone)]
pub struct Log {
    pub level: LevelFilter,
}

#[derive(Debug, Clone)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub control: String,
    pub variant_column: String,
    pub device_column: String,
    pub dimensions: Vec<String>,
    pub derive_variant: bool,
}

/// Which per-variant statistic of the grouped counts is fed into the posterior.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CountBasis {
    #[default]
    Mean,
    Sum,
}

#[derive(Debug, Clone)]
pub struct Significance {
    pub enabled: bool,
    pub precision: usize,
    pub basis: CountBasis,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log: Log,
    pub experiment: Experiment,
    pub significance: Significance,
    pub funnel: Funnel,
}
