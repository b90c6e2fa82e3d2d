//! Hydrological analysis algorithms
//!
//! Algorithms for hydrological modeling from Digital Elevation Models:
//! - HAND: Height Above Nearest Drainage (flood mapping)

mod hand;

pub use hand::{
    hand, hand_with_distance, DistanceMetric, Hand, HandOutput, HandParams, Nearest,
    NearestSourceResolver, OutOfRange, SourceIndex, SourcePoint,
};
