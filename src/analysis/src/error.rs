use std::result;

use arrow::error::ArrowError;
use common::error::CommonError;
use thiserror::Error;

pub type Result<T> = result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("missing column {0:?}")]
    MissingColumn(String),
    #[error("invalid counts for {metric:?}: {conversions} conversions out of {impressions} impressions")]
    InvalidCounts {
        metric: String,
        impressions: f64,
        conversions: f64,
    },
    #[error("internal {0:?}")]
    Internal(String),
    #[error("arrow {0:?}")]
    Arrow(#[from] ArrowError),
    #[error("common {0:?}")]
    Common(#[from] CommonError),
    #[error("io {0:?}")]
    Io(#[from] std::io::Error),
}
