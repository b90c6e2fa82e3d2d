//! # Riverscape Parallel
//!
//! Parallel processing strategies for raster algorithms.
//!
//! This crate provides:
//! - Row-band and halo-tiled partitioning of large rasters
//! - Parallel execution using Rayon (behind the `parallel` feature)
//! - Cooperative cancellation checked at tile boundaries

pub mod cancel;
pub mod strategy;
pub mod tiled;

pub use cancel::CancelToken;
pub use strategy::{ParallelStrategy, ProcessingMode};
pub use tiled::{Tile, TileIterator, TiledProcessor};
