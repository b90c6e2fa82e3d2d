//! Nearest drainage source queries
//!
//! Walks the [`SourceIndex`] k-d tree to find the source closest to a query
//! cell. Distances are physical: row offsets are scaled by `dy`, column
//! offsets by `dx`.
//!
//! Ties are broken deterministically: among equally distant sources the one
//! with the lowest `(row, col)` in row-major order wins, then the lowest
//! elevation. Subtree pruning is inclusive, so every equally distant source
//! is inspected and the traversal order never changes the answer.
//!
//! Euclidean candidates are compared on the squared distance, not its
//! square root. Two squared distances that differ can round to the same
//! `sqrt` in f64; such sources are not tied here, the exactly closer one wins.

use std::cmp::Ordering;

use riverscape_core::raster::Elevation;
use riverscape_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::sources::{Axis, SourceIndex, SourcePoint};

/// Distance metric used to pick the nearest source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Straight-line distance
    #[default]
    Euclidean,
    /// Sum of the row and column distances
    Manhattan,
    /// Larger of the row and column distances
    Chebyshev,
}

impl DistanceMetric {
    /// Comparison key for a physical offset. Monotonic in the distance.
    fn key(self, along_rows: f64, along_cols: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean => along_rows * along_rows + along_cols * along_cols,
            DistanceMetric::Manhattan => along_rows.abs() + along_cols.abs(),
            DistanceMetric::Chebyshev => along_rows.abs().max(along_cols.abs()),
        }
    }

    /// Smallest key any point `offset` away along a single axis can have
    fn axis_key(self, offset: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean => offset * offset,
            DistanceMetric::Manhattan | DistanceMetric::Chebyshev => offset.abs(),
        }
    }

    fn key_to_distance(self, key: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean => key.sqrt(),
            DistanceMetric::Manhattan | DistanceMetric::Chebyshev => key,
        }
    }

    fn distance_to_key(self, distance: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean => distance * distance,
            DistanceMetric::Manhattan | DistanceMetric::Chebyshev => distance,
        }
    }

    /// Physical distance between two cells of a grid with spacing `(dx, dy)`.
    pub fn distance(self, from: (usize, usize), to: (usize, usize), spacing: (f64, f64)) -> f64 {
        let (dx, dy) = spacing;
        let along_rows = (from.0 as f64 - to.0 as f64) * dy;
        let along_cols = (from.1 as f64 - to.1 as f64) * dx;
        self.key_to_distance(self.key(along_rows, along_cols))
    }
}

/// A resolved nearest source and its distance from the query cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest<T> {
    pub source: SourcePoint<T>,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    key: f64,
    idx: usize,
}

/// Read-only nearest-source lookup over a [`SourceIndex`].
///
/// Cheap to construct and `Sync`, so one resolver can serve many workers.
#[derive(Debug, Clone, Copy)]
pub struct NearestSourceResolver<'a, T> {
    index: &'a SourceIndex<T>,
    metric: DistanceMetric,
    max_radius: Option<f64>,
    radius_key: f64,
}

impl<'a, T: Elevation> NearestSourceResolver<'a, T> {
    /// `max_radius` is in the same physical units as the cell spacing.
    /// A source exactly `max_radius` away is in range.
    pub fn new(index: &'a SourceIndex<T>, metric: DistanceMetric, max_radius: Option<f64>) -> Self {
        let radius_key = max_radius.map_or(f64::INFINITY, |r| metric.distance_to_key(r));
        Self {
            index,
            metric,
            max_radius,
            radius_key,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn max_radius(&self) -> Option<f64> {
        self.max_radius
    }

    /// Nearest source to `(row, col)`, or `None` if none lies within the
    /// configured radius.
    pub fn nearest(&self, row: usize, col: usize) -> Option<Nearest<T>> {
        let best = self.search(row, col, self.radius_key);
        (best.key <= self.radius_key).then(|| self.to_nearest(best))
    }

    /// Like [`nearest`](Self::nearest), failing with
    /// [`Error::NoSourceInRange`] instead of returning `None`.
    pub fn resolve(&self, row: usize, col: usize) -> Result<Nearest<T>> {
        self.nearest(row, col).ok_or(Error::NoSourceInRange {
            row,
            col,
            radius: self.max_radius.unwrap_or(f64::INFINITY),
        })
    }

    /// Nearest source ignoring the radius. Always succeeds; the index is non-empty.
    pub(crate) fn nearest_unbounded(&self, row: usize, col: usize) -> Nearest<T> {
        let best = self.search(row, col, f64::INFINITY);
        self.to_nearest(best)
    }

    fn to_nearest(&self, best: Candidate) -> Nearest<T> {
        Nearest {
            source: self.index.points()[best.idx],
            distance: self.metric.key_to_distance(best.key),
        }
    }

    /// Seed with the root and descend. Subtrees farther than `limit_key`
    /// are skipped; the result may then lie outside the limit.
    fn search(&self, row: usize, col: usize, limit_key: f64) -> Candidate {
        let root = &self.index.nodes()[0];
        let mut best = self.candidate(root.point_idx, row, col);
        self.search_recursive(0, row, col, limit_key, &mut best);
        best
    }

    fn search_recursive(&self, node_idx: usize, row: usize, col: usize, limit_key: f64, best: &mut Candidate) {
        let node = &self.index.nodes()[node_idx];
        let candidate = self.candidate(node.point_idx, row, col);
        if self.is_better(&candidate, best) {
            *best = candidate;
        }

        let (dx, dy) = self.index.spacing();
        let split = node.axis.coord(&self.index.points()[node.point_idx]) as f64;
        let (query, scale) = match node.axis {
            Axis::Row => (row as f64, dy),
            Axis::Col => (col as f64, dx),
        };
        let diff = query - split;

        // Search the closer side first
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.search_recursive(child, row, col, limit_key, best);
        }

        // Inclusive so that equally distant sources across the plane are seen
        if self.metric.axis_key(diff * scale) <= best.key.min(limit_key) {
            if let Some(child) = second {
                self.search_recursive(child, row, col, limit_key, best);
            }
        }
    }

    fn candidate(&self, idx: usize, row: usize, col: usize) -> Candidate {
        let (dx, dy) = self.index.spacing();
        let p = &self.index.points()[idx];
        let along_rows = (row as f64 - p.row as f64) * dy;
        let along_cols = (col as f64 - p.col as f64) * dx;
        Candidate {
            key: self.metric.key(along_rows, along_cols),
            idx,
        }
    }

    fn is_better(&self, a: &Candidate, b: &Candidate) -> bool {
        match a.key.partial_cmp(&b.key) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => {
                let points = self.index.points();
                tie_break(&points[a.idx], &points[b.idx]) == Ordering::Less
            }
            _ => false,
        }
    }
}

/// Row-major position first, then elevation.
fn tie_break<T: Elevation>(a: &SourcePoint<T>, b: &SourcePoint<T>) -> Ordering {
    (a.row, a.col)
        .cmp(&(b.row, b.col))
        .then_with(|| a.elevation.partial_cmp(&b.elevation).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(row: usize, col: usize, elevation: f64) -> SourcePoint<f64> {
        SourcePoint { row, col, elevation }
    }

    fn scattered(n: usize) -> Vec<SourcePoint<f64>> {
        (0..n)
            .map(|i| point((i * 7 + 13) % 50, (i * 11 + 37) % 60, i as f64))
            .collect()
    }

    /// Reference answer: scan everything, same ordering rules
    fn brute_force(
        points: &[SourcePoint<f64>],
        metric: DistanceMetric,
        spacing: (f64, f64),
        row: usize,
        col: usize,
    ) -> (f64, SourcePoint<f64>) {
        let mut best: Option<(f64, SourcePoint<f64>)> = None;
        for p in points {
            let d = metric.distance((row, col), (p.row, p.col), spacing);
            best = match best {
                None => Some((d, *p)),
                Some((bd, bp)) => {
                    if d < bd || (d == bd && tie_break(p, &bp) == Ordering::Less) {
                        Some((d, *p))
                    } else {
                        Some((bd, bp))
                    }
                }
            };
        }
        best.unwrap()
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let pts = scattered(120);
        for spacing in [(1.0, 1.0), (30.0, 10.0), (2.5, 7.0)] {
            let index = SourceIndex::from_points(pts.clone(), spacing).unwrap();
            for metric in [DistanceMetric::Euclidean, DistanceMetric::Manhattan, DistanceMetric::Chebyshev] {
                let resolver = NearestSourceResolver::new(&index, metric, None);
                for row in (0..55).step_by(3) {
                    for col in (0..65).step_by(4) {
                        let got = resolver.nearest(row, col).unwrap();
                        let (bd, bp) = brute_force(&pts, metric, spacing, row, col);
                        assert_eq!(
                            (got.source.row, got.source.col),
                            (bp.row, bp.col),
                            "{:?} {:?} at ({}, {})",
                            metric,
                            spacing,
                            row,
                            col
                        );
                        assert!((got.distance - bd).abs() < 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn test_tie_prefers_row_major_first() {
        // (0,0) and (0,4) are both 2 cells from (0,2)
        let pts = vec![point(0, 4, 7.0), point(0, 0, 3.0)];
        let index = SourceIndex::from_points(pts, (1.0, 1.0)).unwrap();
        let hit = index.nearest(0, 2);
        assert_eq!((hit.source.row, hit.source.col), (0, 0));
        assert_eq!(hit.source.elevation, 3.0);
        assert_eq!(hit.distance, 2.0);
    }

    #[test]
    fn test_tie_across_rows() {
        // Four sources at distance 3 around (5,5); (2,5) is first row-major
        let pts = vec![point(8, 5, 1.0), point(5, 8, 2.0), point(5, 2, 3.0), point(2, 5, 4.0)];
        for order in 0..4 {
            let mut rotated = pts.clone();
            rotated.rotate_left(order);
            let index = SourceIndex::from_points(rotated, (1.0, 1.0)).unwrap();
            let hit = index.nearest(5, 5);
            assert_eq!((hit.source.row, hit.source.col), (2, 5));
        }
    }

    #[test]
    fn test_non_square_spacing_changes_winner() {
        // One row away vs two columns away
        let pts = vec![point(4, 5, 0.0), point(5, 7, 0.0)];
        let index = SourceIndex::from_points(pts.clone(), (1.0, 10.0)).unwrap();
        let hit = index.nearest(5, 5);
        assert_eq!((hit.source.row, hit.source.col), (5, 7));
        assert_eq!(hit.distance, 2.0);

        let index = SourceIndex::from_points(pts, (10.0, 1.0)).unwrap();
        let hit = index.nearest(5, 5);
        assert_eq!((hit.source.row, hit.source.col), (4, 5));
    }

    #[test]
    fn test_radius_is_inclusive() {
        let index = SourceIndex::from_points(vec![point(0, 0, 1.0)], (3.0, 4.0)).unwrap();
        // (1,1) is 5 units away with dx=3, dy=4
        let resolver = NearestSourceResolver::new(&index, DistanceMetric::Euclidean, Some(5.0));
        assert!(resolver.nearest(1, 1).is_some());

        let tight = NearestSourceResolver::new(&index, DistanceMetric::Euclidean, Some(4.9));
        assert!(tight.nearest(1, 1).is_none());
        assert!(matches!(
            tight.resolve(1, 1),
            Err(Error::NoSourceInRange { row: 1, col: 1, .. })
        ));
    }

    #[test]
    fn test_radius_does_not_change_winner() {
        let pts = scattered(80);
        let index = SourceIndex::from_points(pts, (1.0, 1.0)).unwrap();
        let open = NearestSourceResolver::new(&index, DistanceMetric::Euclidean, None);
        let bounded = NearestSourceResolver::new(&index, DistanceMetric::Euclidean, Some(6.0));
        for row in 0..50 {
            for col in 0..60 {
                let unbounded = open.nearest(row, col).unwrap();
                match bounded.nearest(row, col) {
                    Some(hit) => assert_eq!(hit, unbounded),
                    None => assert!(unbounded.distance > 6.0),
                }
            }
        }
    }

    #[test]
    fn test_single_source() {
        let index = SourceIndex::from_points(vec![point(3, 4, 100.0)], (1.0, 1.0)).unwrap();
        let hit = index.nearest(0, 0);
        assert_eq!(hit.distance, 5.0);
        assert_eq!(hit.source.elevation, 100.0);
    }

    #[test]
    fn test_metric_distances() {
        let spacing = (2.0, 1.0);
        assert_eq!(DistanceMetric::Manhattan.distance((0, 0), (3, 4), spacing), 11.0);
        assert_eq!(DistanceMetric::Chebyshev.distance((0, 0), (3, 4), spacing), 8.0);
        assert!((DistanceMetric::Euclidean.distance((0, 0), (3, 4), spacing) - 73f64.sqrt()).abs() < 1e-12);
    }
}
