pub mod config;
pub mod error;
pub mod funnel;
pub mod types;

pub use types::DEFAULT_PRECISION;
