//! Per-cell HAND evaluation over row bands or halo'd tiles

use ndarray::{Array2, ArrayView1};
use riverscape_core::raster::{Elevation, Extent, Raster, RasterElement};
use riverscape_core::{Error, Result};
use riverscape_parallel::TiledProcessor;
use tracing::{debug, warn};

use super::resolver::NearestSourceResolver;
use super::sources::{collect_sources, has_sources, is_channel, SourceIndex, SourcePoint};
use super::{HandParams, OutOfRange};

/// No-data value written to the HAND output
pub(super) fn output_nodata<T: Elevation>(dem: &Raster<T>) -> T {
    dem.nodata().unwrap_or_else(T::default_nodata)
}

/// Evaluate every cell and return `project(hand, distance)` per cell.
///
/// No-data cells are projected as `(nodata, NaN)` and channel cells as
/// `(0, 0.0)`.
pub(super) fn run<T, M, U, P>(
    dem: &Raster<T>,
    mask: &Raster<M>,
    params: &HandParams,
    project: P,
) -> Result<Array2<U>>
where
    T: Elevation,
    M: RasterElement,
    U: Clone + Send,
    P: Fn(T, f64) -> U + Sync + Send,
{
    dem.ensure_same_grid(mask)?;
    params.validate()?;

    let spacing = dem.cell_spacing();
    check_spacing(spacing)?;

    let nodata = output_nodata(dem);
    if T::zero().is_nodata(Some(nodata)) {
        return Err(Error::InvalidNoData {
            nodata: nodata.as_f64(),
            value: 0.0,
        });
    }

    if let Some(token) = &params.cancel {
        token.check()?;
    }

    let (rows, cols) = dem.shape();
    let cells = CellContext {
        dem,
        mask,
        mask_nodata: mask.nodata(),
        nodata,
        out_of_range: params.out_of_range,
    };
    let fill = project(nodata, f64::NAN);

    let values = match params.tile_size {
        None => {
            let index = SourceIndex::build(dem, mask)?;
            debug!(
                "HAND: {} sources, {} x {} cells, {} rows per band",
                index.len(),
                rows,
                cols,
                params.rows_per_batch
            );

            let resolver = NearestSourceResolver::new(&index, params.distance_metric, params.max_search_radius);
            let reach = params.max_search_radius.unwrap_or(f64::INFINITY);

            TiledProcessor::row_bands(params.rows_per_batch).run(
                rows,
                cols,
                params.mode,
                params.cancel.as_ref(),
                fill,
                |tile| cells.eval_core(&tile.core, Some(&resolver), reach, &project),
            )
        }
        Some(tile_size) => {
            if !has_sources(dem, mask) {
                return Err(Error::EmptySourceSet);
            }

            let (halo_rows, halo_cols) = halo_cells(params, spacing);
            let (dx, dy) = spacing;
            let halo_reach = (halo_rows as f64 * dy).min(halo_cols as f64 * dx);
            match params.max_search_radius {
                Some(radius) if halo_reach >= radius => {}
                Some(radius) => warn!(
                    "HAND: halo reaches {} but search radius is {}; tiles may miss closer sources",
                    halo_reach, radius
                ),
                None => warn!(
                    "HAND: unbounded search in tiled mode; cells farther than {} from their tile may be measured against a tile-local source",
                    halo_reach
                ),
            }
            debug!(
                "HAND: {} x {} cells in tiles of {} with halo {} x {}",
                rows, cols, tile_size, halo_rows, halo_cols
            );

            let reach = params.max_search_radius.unwrap_or(f64::INFINITY);
            // An empty window only proves "out of range" when the halo covers the radius
            let halo_is_exact = params.max_search_radius.is_some_and(|r| halo_reach >= r);
            let processor = TiledProcessor::new(tile_size, 0).with_halo(halo_rows, halo_cols);

            processor.run(rows, cols, params.mode, params.cancel.as_ref(), fill, |tile| {
                let mut points = collect_sources(dem, mask, &tile.window)?;
                if points.is_empty() && !halo_is_exact {
                    points = widen_until_sources(dem, mask, &tile.core, (halo_rows, halo_cols))?;
                }
                if points.is_empty() {
                    return cells.eval_core(&tile.core, None, reach, &project);
                }
                let index = SourceIndex::from_points(points, spacing)?;
                let resolver = NearestSourceResolver::new(&index, params.distance_metric, params.max_search_radius);
                cells.eval_core(&tile.core, Some(&resolver), reach, &project)
            })
        }
    }?;

    debug!("HAND: {} x {} cells done", rows, cols);
    Ok(values)
}

/// Sources of the smallest window around `core`, doubling the halo each
/// step, that holds any. Empty only if the whole raster has none.
fn widen_until_sources<T: Elevation, M: RasterElement>(
    dem: &Raster<T>,
    mask: &Raster<M>,
    core: &Extent,
    (halo_rows, halo_cols): (usize, usize),
) -> Result<Vec<SourcePoint<T>>> {
    let bounds = dem.extent();
    let (mut grow_rows, mut grow_cols) = (halo_rows.max(1), halo_cols.max(1));
    loop {
        grow_rows = grow_rows.saturating_mul(2);
        grow_cols = grow_cols.saturating_mul(2);
        let window = core.expand(grow_rows, grow_cols, &bounds);
        let points = collect_sources(dem, mask, &window)?;
        if !points.is_empty() || window == bounds {
            debug!("HAND: tile {:?} widened to {:?} for {} sources", core, window, points.len());
            return Ok(points);
        }
    }
}

/// Halo in `(rows, cols)`: explicit, or wide enough to cover the search radius
fn halo_cells(params: &HandParams, spacing: (f64, f64)) -> (usize, usize) {
    let (dx, dy) = spacing;
    match (params.halo, params.max_search_radius) {
        (Some(halo), _) => (halo, halo),
        (None, Some(radius)) => ((radius / dy).ceil() as usize, (radius / dx).ceil() as usize),
        (None, None) => (0, 0),
    }
}

fn check_spacing((dx, dy): (f64, f64)) -> Result<()> {
    if dx.is_finite() && dy.is_finite() && dx > 0.0 && dy > 0.0 {
        return Ok(());
    }
    Err(Error::InvalidParameter {
        name: "cell_spacing",
        value: format!("{} x {}", dx, dy),
        reason: "cell spacing must be finite and positive".into(),
    })
}

struct CellContext<'a, T: Elevation, M: RasterElement> {
    dem: &'a Raster<T>,
    mask: &'a Raster<M>,
    mask_nodata: Option<M>,
    nodata: T,
    out_of_range: OutOfRange,
}

impl<T: Elevation, M: RasterElement> CellContext<'_, T, M> {
    /// Values of `core` in row-major order. `reach` is reported when no
    /// source is in range.
    fn eval_core<U, P>(
        &self,
        core: &Extent,
        resolver: Option<&NearestSourceResolver<'_, T>>,
        reach: f64,
        project: &P,
    ) -> Result<Vec<U>>
    where
        P: Fn(T, f64) -> U,
    {
        let mut values = Vec::with_capacity(core.len());
        for row in core.row_start..core.row_end {
            let dem_row = self.dem.row(row)?;
            let mask_row = self.mask.row(row)?;
            for col in core.col_start..core.col_end {
                let (h, distance) = self.eval(&dem_row, &mask_row, row, col, resolver, reach)?;
                values.push(project(h, distance));
            }
        }
        Ok(values)
    }

    fn eval(
        &self,
        dem_row: &ArrayView1<'_, T>,
        mask_row: &ArrayView1<'_, M>,
        row: usize,
        col: usize,
        resolver: Option<&NearestSourceResolver<'_, T>>,
        reach: f64,
    ) -> Result<(T, f64)> {
        let z = dem_row[col];
        if self.dem.is_nodata(z) {
            return Ok((self.nodata, f64::NAN));
        }
        if is_channel(mask_row[col], self.mask_nodata) {
            return Ok((T::zero(), 0.0));
        }

        match resolver.and_then(|r| r.nearest(row, col)) {
            Some(hit) => {
                // Cells below their channel get 0
                let diff = z - hit.source.elevation;
                let h = if diff > T::zero() { diff } else { T::zero() };
                if h.is_nodata(Some(self.nodata)) {
                    return Err(Error::InvalidNoData {
                        nodata: self.nodata.as_f64(),
                        value: h.as_f64(),
                    });
                }
                Ok((h, hit.distance))
            }
            None => match self.out_of_range {
                OutOfRange::NoData => Ok((self.nodata, f64::NAN)),
                OutOfRange::Fail => Err(Error::NoSourceInRange {
                    row,
                    col,
                    radius: reach,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riverscape_core::GeoTransform;

    #[test]
    fn test_halo_from_radius() {
        let params = HandParams {
            tile_size: Some(64),
            max_search_radius: Some(25.0),
            ..Default::default()
        };
        assert_eq!(halo_cells(&params, (10.0, 5.0)), (5, 3));

        let explicit = HandParams {
            halo: Some(7),
            ..params
        };
        assert_eq!(halo_cells(&explicit, (10.0, 5.0)), (7, 7));
    }

    #[test]
    fn test_zero_spacing_rejected() {
        let mut dem = Raster::filled(2, 2, 1.0_f64);
        dem.set_transform(GeoTransform::new(0.0, 0.0, 0.0, -1.0));
        let mut mask = Raster::filled(2, 2, true);
        mask.set_transform(*dem.transform());

        let result = run(&dem, &mask, &HandParams::default(), |h, _| h);
        assert!(matches!(result, Err(Error::InvalidParameter { name: "cell_spacing", .. })));
    }

    #[test]
    fn test_fill_never_leaks() {
        let dem = Raster::from_vec((0..30).map(f64::from).collect(), 5, 6).unwrap();
        let mut mask = Raster::filled(5, 6, 0u8);
        mask.set(4, 5, 1).unwrap();
        let params = HandParams {
            rows_per_batch: 2,
            ..Default::default()
        };
        let values = run(&dem, &mask, &params, |h, _| h).unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
        assert_eq!(values[(4, 5)], 0.0);
    }

    #[test]
    fn test_widen_reaches_distant_source() {
        let dem = Raster::filled(12, 12, 5.0_f64);
        let mut mask = Raster::filled(12, 12, false);
        mask.set(0, 11, true).unwrap();

        let core = Extent::new(8, 12, 0, 4);
        let points = widen_until_sources(&dem, &mask, &core, (1, 1)).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!((points[0].row, points[0].col), (0, 11));

        let empty = Raster::filled(12, 12, false);
        assert!(widen_until_sources(&dem, &empty, &core, (0, 0)).unwrap().is_empty());
    }
}
