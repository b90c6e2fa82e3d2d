//! # Riverscape Algorithms
//!
//! Terrain analysis algorithms for riverscape.
//!
//! ## Available Algorithm Categories
//!
//! - **hydrology**: HAND (Height Above Nearest Drainage) with a k-d tree
//!   index over the drainage network

pub mod hydrology;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        hand, hand_with_distance, DistanceMetric, Hand, HandOutput, HandParams, OutOfRange,
        SourceIndex,
    };
    pub use riverscape_core::prelude::*;
    pub use riverscape_parallel::{CancelToken, ProcessingMode};
}
