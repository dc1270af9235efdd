use std::result;

use analysis::error::AnalysisError;
use common::error::CommonError;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;

pub type Result<T> = result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("analysis: {0:?}")]
    Analysis(#[from] AnalysisError),
    #[error("common: {0:?}")]
    Common(#[from] CommonError),
    #[error("config: {0:?}")]
    Config(#[from] config::ConfigError),
    #[error("json: {0:?}")]
    Json(#[from] serde_json::Error),
    #[error("StdIO: {0:?}")]
    StdIO(#[from] std::io::Error),
    #[error("date: {0:?}")]
    Date(#[from] chrono::ParseError),
    #[error("SetGlobalDefaultError: {0:?}")]
    SetGlobalDefaultError(SetGlobalDefaultError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("other: {0:?}")]
    Other(#[from] anyhow::Error),
}
