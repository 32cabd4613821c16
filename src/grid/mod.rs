// Grid mathematics and per-level session state

pub mod calculator;
pub mod tracker;

use thiserror::Error;

pub use tracker::GridStateTracker;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("invalid grid range: lower {lower} / upper {upper} / count {count}")]
    InvalidRange {
        lower: f64,
        upper: f64,
        count: usize,
    },

    #[error("invalid investment: {0} (must be positive)")]
    InvalidInvestment(f64),
}

impl From<GridError> for crate::error::EngineError {
    fn from(err: GridError) -> Self {
        crate::error::EngineError::Configuration(err.to_string())
    }
}
