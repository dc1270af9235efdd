use std::result;

use thiserror::Error;

pub type Result<T> = result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("invalid funnel: {0}")]
    InvalidFunnel(String),
    #[error("bad config: {0}")]
    BadConfig(String),
}
