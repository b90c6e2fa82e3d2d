//! Drainage source index
//!
//! Collects every channel cell with a valid elevation and organises the
//! cells in a 2D k-d tree over their `(row, col)` coordinates, so that the
//! nearest channel cell of any query cell is found in O(log n) instead of a
//! scan over all channel cells.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;

use riverscape_core::raster::{Elevation, Extent, Raster, RasterElement};
use riverscape_core::{Error, Result};

use super::resolver::{DistanceMetric, Nearest, NearestSourceResolver};

/// A channel cell eligible as a nearest-drainage target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePoint<T> {
    pub row: usize,
    pub col: usize,
    pub elevation: T,
}

/// Split axis of a k-d tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Row,
    Col,
}

impl Axis {
    fn for_depth(depth: usize) -> Self {
        if depth % 2 == 0 {
            Axis::Row
        } else {
            Axis::Col
        }
    }

    /// Coordinate of `p` along this axis
    pub(crate) fn coord<T>(self, p: &SourcePoint<T>) -> usize {
        match self {
            Axis::Row => p.row,
            Axis::Col => p.col,
        }
    }
}

#[derive(Debug)]
pub(crate) struct KdNode {
    /// Index into `points`
    pub(crate) point_idx: usize,
    pub(crate) axis: Axis,
    /// Left child index (coordinates <= split)
    pub(crate) left: Option<usize>,
    /// Right child index (coordinates >= split)
    pub(crate) right: Option<usize>,
}

/// Immutable spatial index over the drainage source cells of a DEM.
///
/// The index owns copies of the source points; the DEM and mask it was
/// built from are only borrowed during [`SourceIndex::build`]. It is never
/// empty.
#[derive(Debug)]
pub struct SourceIndex<T> {
    nodes: Vec<KdNode>,
    /// Points stored in tree order
    points: Vec<SourcePoint<T>>,
    /// Cell spacing `(dx, dy)` of the source grid
    spacing: (f64, f64),
}

impl<T: Elevation> SourceIndex<T> {
    /// Build an index over all cells where `mask` is set and `dem` is valid.
    ///
    /// # Errors
    /// - [`Error::DimensionMismatch`] if the rasters differ in shape or spacing
    /// - [`Error::EmptySourceSet`] if no channel cell has a valid elevation
    pub fn build<M: RasterElement>(dem: &Raster<T>, mask: &Raster<M>) -> Result<Self> {
        Self::build_window(dem, mask, &dem.extent())
    }

    /// Like [`SourceIndex::build`], but only cells inside `window` are collected.
    pub fn build_window<M: RasterElement>(
        dem: &Raster<T>,
        mask: &Raster<M>,
        window: &Extent,
    ) -> Result<Self> {
        dem.ensure_same_grid(mask)?;
        let points = collect_sources(dem, mask, window)?;
        Self::from_points(points, dem.cell_spacing())
    }

    /// Build an index from already collected points.
    pub fn from_points(mut points: Vec<SourcePoint<T>>, spacing: (f64, f64)) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptySourceSet);
        }

        let mut nodes = Vec::with_capacity(points.len());
        build_recursive(&mut points, 0, 0, &mut nodes);

        Ok(Self {
            nodes,
            points,
            spacing,
        })
    }

    /// Number of source points in the index.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Cell spacing `(dx, dy)` used to measure distances.
    pub fn spacing(&self) -> (f64, f64) {
        self.spacing
    }

    /// Source points in tree order.
    pub fn points(&self) -> &[SourcePoint<T>] {
        &self.points
    }

    /// Nearest source to `(row, col)` by Euclidean distance, no radius limit.
    pub fn nearest(&self, row: usize, col: usize) -> Nearest<T> {
        NearestSourceResolver::new(self, DistanceMetric::Euclidean, None).nearest_unbounded(row, col)
    }

    pub(crate) fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }
}

/// Whether `(row, col)` is a channel cell of `mask`.
pub(crate) fn is_channel<M: RasterElement>(value: M, nodata: Option<M>) -> bool {
    !value.is_nodata(nodata) && value.is_truthy()
}

/// Copy out every channel cell with a valid elevation inside `window`.
pub(crate) fn collect_sources<T: Elevation, M: RasterElement>(
    dem: &Raster<T>,
    mask: &Raster<M>,
    window: &Extent,
) -> Result<Vec<SourcePoint<T>>> {
    let window = window.intersect(&dem.extent());
    let mask_nodata = mask.nodata();
    let mut points = Vec::new();

    for row in window.row_start..window.row_end {
        let dem_row = dem.row(row)?;
        let mask_row = mask.row(row)?;
        for col in window.col_start..window.col_end {
            let elevation = dem_row[col];
            if is_channel(mask_row[col], mask_nodata) && !dem.is_nodata(elevation) {
                points.push(SourcePoint { row, col, elevation });
            }
        }
    }

    Ok(points)
}

/// Whether any channel cell with a valid elevation exists. Stops at the first hit.
pub(crate) fn has_sources<T: Elevation, M: RasterElement>(
    dem: &Raster<T>,
    mask: &Raster<M>,
) -> bool {
    let mask_nodata = mask.nodata();
    dem.data()
        .iter()
        .zip(mask.data().iter())
        .any(|(&z, &m)| is_channel(m, mask_nodata) && !dem.is_nodata(z))
}

/// Recursively build the k-d tree in place.
///
/// `points` is the slice for this subtree, `offset` its position in the
/// full point array. The median along the split axis becomes the node.
fn build_recursive<T>(
    points: &mut [SourcePoint<T>],
    offset: usize,
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let axis = Axis::for_depth(depth);
    let median = points.len() / 2;

    points.select_nth_unstable_by(median, |a, b| compare_along(axis, a, b));

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: offset + median,
        axis,
        left: None,
        right: None,
    });

    let (left, rest) = points.split_at_mut(median);
    let right = &mut rest[1..];

    if !left.is_empty() {
        let left_idx = build_recursive(left, offset, depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }

    if !right.is_empty() {
        let right_idx = build_recursive(right, offset + median + 1, depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}

/// Order by the split axis, then by the other axis so builds are reproducible.
fn compare_along<T>(axis: Axis, a: &SourcePoint<T>, b: &SourcePoint<T>) -> Ordering {
    match axis {
        Axis::Row => (a.row, a.col).cmp(&(b.row, b.col)),
        Axis::Col => (a.col, a.row).cmp(&(b.col, b.row)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riverscape_core::GeoTransform;

    fn grid(rows: usize, cols: usize) -> (Raster<f64>, Raster<bool>) {
        let mut dem = Raster::filled(rows, cols, 10.0);
        dem.set_nodata(Some(-9999.0));
        (dem, Raster::filled(rows, cols, false))
    }

    /// Check the k-d invariant for every node
    fn assert_kd_invariant<T: Elevation>(index: &SourceIndex<T>) {
        fn subtree<T: Elevation>(index: &SourceIndex<T>, node: usize, out: &mut Vec<usize>) {
            let n = &index.nodes()[node];
            out.push(n.point_idx);
            if let Some(l) = n.left {
                subtree(index, l, out);
            }
            if let Some(r) = n.right {
                subtree(index, r, out);
            }
        }

        for node in index.nodes() {
            let split = node.axis.coord(&index.points()[node.point_idx]);
            if let Some(l) = node.left {
                let mut ids = Vec::new();
                subtree(index, l, &mut ids);
                assert!(ids.iter().all(|&i| node.axis.coord(&index.points()[i]) <= split));
            }
            if let Some(r) = node.right {
                let mut ids = Vec::new();
                subtree(index, r, &mut ids);
                assert!(ids.iter().all(|&i| node.axis.coord(&index.points()[i]) >= split));
            }
        }
    }

    #[test]
    fn test_build_collects_valid_channel_cells() {
        let (mut dem, mut mask) = grid(4, 4);
        mask.set(0, 0, true).unwrap();
        mask.set(2, 3, true).unwrap();
        mask.set(3, 1, true).unwrap();
        dem.set(3, 1, -9999.0).unwrap(); // channel cell without elevation

        let index = SourceIndex::build(&dem, &mask).unwrap();
        assert_eq!(index.len(), 2);
        assert!(!index.is_empty());
        assert!(index.points().iter().all(|p| (p.row, p.col) != (3, 1)));
        assert_eq!(index.nodes().len(), 2);
    }

    #[test]
    fn test_empty_mask_is_an_error() {
        let (dem, mask) = grid(3, 3);
        assert!(matches!(SourceIndex::build(&dem, &mask), Err(Error::EmptySourceSet)));
        assert!(!has_sources(&dem, &mask));
    }

    #[test]
    fn test_only_nodata_channels_is_an_error() {
        let (mut dem, mut mask) = grid(3, 3);
        mask.set(1, 1, true).unwrap();
        dem.set(1, 1, f64::NAN).unwrap();
        assert!(matches!(SourceIndex::build(&dem, &mask), Err(Error::EmptySourceSet)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let (dem, _) = grid(3, 3);
        let mask = Raster::filled(3, 4, true);
        assert!(matches!(
            SourceIndex::build(&dem, &mask),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_spacing_mismatch() {
        let (dem, _) = grid(3, 3);
        let mut mask = Raster::filled(3, 3, true);
        mask.set_transform(GeoTransform::new(0.0, 0.0, 2.0, -1.0));
        assert!(matches!(
            SourceIndex::build(&dem, &mask),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_u8_mask_with_nodata() {
        let dem = Raster::filled(2, 3, 1.0_f32);
        let mut mask = Raster::from_vec(vec![0u8, 1, 255, 1, 0, 0], 2, 3).unwrap();
        mask.set_nodata(Some(255));
        let index = SourceIndex::build(&dem, &mask).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_build_window() {
        let (dem, _) = grid(6, 6);
        let mask = Raster::filled(6, 6, true);
        let index = SourceIndex::build_window(&dem, &mask, &Extent::new(1, 3, 2, 5)).unwrap();
        assert_eq!(index.len(), 6);
        assert!(index.points().iter().all(|p| (1..3).contains(&p.row) && (2..5).contains(&p.col)));

        let outside = SourceIndex::build_window(&dem, &mask, &Extent::new(6, 9, 0, 6));
        assert!(matches!(outside, Err(Error::EmptySourceSet)));
    }

    #[test]
    fn test_tree_invariant_holds() {
        let points: Vec<SourcePoint<f64>> = (0..500)
            .map(|i| SourcePoint {
                row: (i * 7 + 13) % 97,
                col: (i * 11 + 37) % 89,
                elevation: i as f64,
            })
            .collect();
        let index = SourceIndex::from_points(points, (1.0, 1.0)).unwrap();
        assert_eq!(index.len(), 500);
        assert_eq!(index.nodes().len(), 500);
        assert_kd_invariant(&index);
    }

    #[test]
    fn test_build_is_reproducible() {
        let (dem, _) = grid(20, 20);
        let mut mask = Raster::filled(20, 20, false);
        for i in 0..20 {
            mask.set(i, (i * 3) % 20, true).unwrap();
            mask.set((i * 7) % 20, i, true).unwrap();
        }
        let a = SourceIndex::build(&dem, &mask).unwrap();
        let b = SourceIndex::build(&dem, &mask).unwrap();
        assert_eq!(a.points(), b.points());
    }

    #[test]
    fn test_nearest_exact_hit() {
        let (mut dem, mut mask) = grid(5, 5);
        mask.set(4, 4, true).unwrap();
        mask.set(0, 1, true).unwrap();
        dem.set(0, 1, 3.0).unwrap();

        let hit = index_nearest(&dem, &mask, 0, 1);
        assert_eq!((hit.source.row, hit.source.col), (0, 1));
        assert_eq!(hit.distance, 0.0);
        assert_eq!(hit.source.elevation, 3.0);
    }

    fn index_nearest(dem: &Raster<f64>, mask: &Raster<bool>, row: usize, col: usize) -> Nearest<f64> {
        SourceIndex::build(dem, mask).unwrap().nearest(row, col)
    }
}
