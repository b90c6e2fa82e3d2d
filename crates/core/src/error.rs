//! Error types for riverscape

use crate::raster::GridShape;
use thiserror::Error;

/// Main error type for riverscape operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster grid mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: GridShape, actual: GridShape },

    #[error("Channel mask contains no valid drainage cells")]
    EmptySourceSet,

    #[error("No-data sentinel {nodata} collides with valid value {value}")]
    InvalidNoData { nodata: f64, value: f64 },

    #[error("No drainage source within {radius} of cell ({row}, {col})")]
    NoSourceInRange { row: usize, col: usize, radius: f64 },

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for riverscape operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_both_grids() {
        let err = Error::DimensionMismatch {
            expected: GridShape { rows: 3, cols: 4, dx: 10.0, dy: 10.0 },
            actual: GridShape { rows: 3, cols: 4, dx: 10.0, dy: 5.0 },
        };
        let msg = err.to_string();
        assert!(msg.contains("3x4 @ 10x10"), "{msg}");
        assert!(msg.contains("3x4 @ 10x5"), "{msg}");
    }
}
