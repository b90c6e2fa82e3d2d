//! Rectangular cell windows over a raster

/// A half-open rectangular window of cells: rows `row_start..row_end`,
/// columns `col_start..col_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Extent {
    pub fn new(row_start: usize, row_end: usize, col_start: usize, col_end: usize) -> Self {
        Self {
            row_start,
            row_end: row_end.max(row_start),
            col_start,
            col_end: col_end.max(col_start),
        }
    }

    /// Window covering a whole `rows x cols` grid
    pub fn full(rows: usize, cols: usize) -> Self {
        Self::new(0, rows, 0, cols)
    }

    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    /// Number of cells in the window
    pub fn len(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_start..self.row_end).contains(&row) && (self.col_start..self.col_end).contains(&col)
    }

    /// Overlap of two windows (empty if they are disjoint)
    pub fn intersect(&self, other: &Extent) -> Extent {
        Extent::new(
            self.row_start.max(other.row_start),
            self.row_end.min(other.row_end),
            self.col_start.max(other.col_start),
            self.col_end.min(other.col_end),
        )
    }

    /// Grow by `halo_rows`/`halo_cols` on every side, clipped to `bounds`
    pub fn expand(&self, halo_rows: usize, halo_cols: usize, bounds: &Extent) -> Extent {
        Extent::new(
            self.row_start.saturating_sub(halo_rows),
            self.row_end.saturating_add(halo_rows),
            self.col_start.saturating_sub(halo_cols),
            self.col_end.saturating_add(halo_cols),
        )
        .intersect(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_size() {
        let e = Extent::new(2, 5, 1, 9);
        assert_eq!(e.rows(), 3);
        assert_eq!(e.cols(), 8);
        assert_eq!(e.len(), 24);
        assert!(e.contains(2, 1));
        assert!(!e.contains(5, 1));
    }

    #[test]
    fn test_expand_clips_to_bounds() {
        let bounds = Extent::full(10, 10);
        let grown = Extent::new(0, 4, 6, 10).expand(2, 3, &bounds);
        assert_eq!(grown, Extent::new(0, 6, 3, 10));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = Extent::new(0, 2, 0, 2);
        let b = Extent::new(5, 8, 5, 8);
        assert!(a.intersect(&b).is_empty());
    }
}
