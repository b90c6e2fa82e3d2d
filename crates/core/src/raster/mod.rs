//! Raster data structures and operations

mod element;
mod extent;
mod geotransform;
mod grid;

pub use element::{Elevation, RasterElement};
pub use extent::Extent;
pub use geotransform::GeoTransform;
pub use grid::{GridShape, Raster, RasterStatistics};
