//! HAND (Height Above Nearest Drainage)
//!
//! For each cell, finds the nearest channel cell (by physical distance on
//! the grid) and returns the elevation difference between the cell and that
//! channel cell. Channel cells get HAND = 0. Differences below zero, caused
//! by DEM noise or depressions next to the channel, are clamped to 0.
//!
//! The channel cells are indexed once in a k-d tree
//! ([`SourceIndex`]); the per-cell pass then runs in full-width row bands,
//! or in halo'd tiles when `tile_size` is set, using the configured
//! [`ProcessingMode`].
//!
//! Reference:
//! Nobre, A.D. et al. (2011). HAND, a new terrain descriptor using
//! SRTM-DEM. *Journal of Hydrology*, 404(1-2), 13–29.

mod driver;
mod resolver;
mod sources;

pub use resolver::{DistanceMetric, Nearest, NearestSourceResolver};
pub use sources::{SourceIndex, SourcePoint};

use riverscape_core::raster::{Elevation, Raster, RasterElement};
use riverscape_core::{Algorithm, Error, Result};
use riverscape_parallel::{CancelToken, ProcessingMode};
use serde::{Deserialize, Serialize};

/// What to do with a cell whose nearest source lies beyond the search radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRange {
    /// Abort with [`Error::NoSourceInRange`]
    #[default]
    Fail,
    /// Write no-data for the cell
    NoData,
}

/// Parameters for HAND computation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandParams {
    /// Maximum distance to a channel cell, in the units of the cell spacing.
    /// `None` for unlimited.
    pub max_search_radius: Option<f64>,
    /// Handling of cells with no channel cell within `max_search_radius`.
    pub out_of_range: OutOfRange,
    /// Metric used to pick the nearest channel cell.
    pub distance_metric: DistanceMetric,
    /// Side length of square tiles, in cells. `None` processes full-width
    /// row bands against a single index of the whole raster.
    pub tile_size: Option<usize>,
    /// Halo around each tile, in cells. Derived from `max_search_radius`
    /// when unset. Cells whose nearest channel cell lies beyond the halo
    /// are measured against the nearest channel cell inside it; a tile whose
    /// halo holds none widens its window until it finds one.
    pub halo: Option<usize>,
    /// Rows per band in row-band mode.
    /// Default: 64
    pub rows_per_batch: usize,
    pub mode: ProcessingMode,
    /// Checked between row bands / tiles.
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl Default for HandParams {
    fn default() -> Self {
        Self {
            max_search_radius: None,
            out_of_range: OutOfRange::Fail,
            distance_metric: DistanceMetric::Euclidean,
            tile_size: None,
            halo: None,
            rows_per_batch: 64,
            mode: ProcessingMode::Parallel,
            cancel: None,
        }
    }
}

impl HandParams {
    /// Check parameter ranges and combinations.
    pub fn validate(&self) -> Result<()> {
        if let Some(radius) = self.max_search_radius {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(Error::InvalidParameter {
                    name: "max_search_radius",
                    value: radius.to_string(),
                    reason: "must be a finite positive distance".into(),
                });
            }
        }
        if self.tile_size == Some(0) {
            return Err(Error::InvalidParameter {
                name: "tile_size",
                value: "0".into(),
                reason: "tiles must hold at least one cell".into(),
            });
        }
        if self.rows_per_batch == 0 {
            return Err(Error::InvalidParameter {
                name: "rows_per_batch",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if let (Some(halo), None) = (self.halo, self.tile_size) {
            return Err(Error::InvalidParameter {
                name: "halo",
                value: halo.to_string(),
                reason: "only used together with tile_size".into(),
            });
        }
        if self.tile_size.is_some() && self.halo.is_none() && self.max_search_radius.is_none() {
            return Err(Error::InvalidParameter {
                name: "tile_size",
                value: format!("{:?}", self.tile_size),
                reason: "tiled processing needs a halo or a max_search_radius".into(),
            });
        }
        self.mode.validate()
    }
}

/// HAND together with the distance to the channel cell each value was measured against
#[derive(Debug, Clone)]
pub struct HandOutput<T: Elevation> {
    pub hand: Raster<T>,
    /// Distance in spacing units; 0 on channel cells, NaN where `hand` is no-data
    pub distance: Raster<f64>,
}

/// HAND algorithm for `f64` DEMs and boolean channel masks
#[derive(Debug, Clone, Copy, Default)]
pub struct Hand;

impl Algorithm for Hand {
    type Input = (Raster<f64>, Raster<bool>);
    type Output = Raster<f64>;
    type Params = HandParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "HAND"
    }

    fn description(&self) -> &'static str {
        "Height Above Nearest Drainage: elevation above the nearest channel cell"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (dem, mask) = input;
        hand(&dem, &mask, params)
    }
}

/// Compute Height Above Nearest Drainage (HAND).
///
/// # Arguments
/// * `dem` - Input DEM raster
/// * `mask` - Channel mask with the same dimensions and cell spacing; a cell
///   is a channel cell when it is set (`true` / non-zero) and not no-data
/// * `params` - Search radius, metric, tiling and execution options
///
/// # Returns
/// Raster with HAND values in elevation units. No-data exactly where the
/// DEM is no-data (plus out-of-range cells under [`OutOfRange::NoData`]),
/// otherwise `>= 0`. The output no-data value is the DEM's, or the type
/// default when the DEM declares none.
///
/// # Errors
/// - [`Error::DimensionMismatch`] if DEM and mask grids differ
/// - [`Error::EmptySourceSet`] if the mask has no channel cell with valid elevation
/// - [`Error::InvalidNoData`] if the no-data value collides with a HAND value
/// - [`Error::NoSourceInRange`] under [`OutOfRange::Fail`] when `max_search_radius` is set
/// - [`Error::Cancelled`] if `params.cancel` was triggered
pub fn hand<T, M>(dem: &Raster<T>, mask: &Raster<M>, params: HandParams) -> Result<Raster<T>>
where
    T: Elevation,
    M: RasterElement,
{
    let nodata = driver::output_nodata(dem);
    let values = driver::run(dem, mask, &params, |h, _| h)?;

    let mut output = dem.with_data(values)?;
    output.set_nodata(Some(nodata));
    Ok(output)
}

/// Compute HAND and the distance to the nearest channel cell in one pass.
///
/// Same rules and errors as [`hand`].
pub fn hand_with_distance<T, M>(dem: &Raster<T>, mask: &Raster<M>, params: HandParams) -> Result<HandOutput<T>>
where
    T: Elevation,
    M: RasterElement,
{
    let nodata = driver::output_nodata(dem);
    let values = driver::run(dem, mask, &params, |h, d| (h, d))?;

    let mut hand = dem.with_data(values.mapv(|(h, _)| h))?;
    hand.set_nodata(Some(nodata));
    let mut distance = dem.with_data(values.mapv(|(_, d)| d))?;
    distance.set_nodata(Some(f64::NAN));

    Ok(HandOutput { hand, distance })
}
