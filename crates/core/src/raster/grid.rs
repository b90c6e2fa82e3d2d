//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{Extent, GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView1, ArrayView2};
use std::fmt;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a row-major 2D grid together
/// with its geotransform (cell spacing) and an optional no-data sentinel.
/// Every cell either holds a valid value or the sentinel.
///
/// # Example
///
/// ```ignore
/// use riverscape_core::Raster;
///
/// let mut dem: Raster<f64> = Raster::filled(100, 100, 0.0);
/// dem.set_nodata(Some(-9999.0));
/// dem.set(10, 20, 42.0)?;
/// let value = dem.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// No-data value
    nodata: Option<T>,
}

/// Dimensions and cell spacing of a grid, used to validate raster pairings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
    pub dx: f64,
    pub dy: f64,
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {}x{}", self.rows, self.cols, self.dx, self.dy)
    }
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Wrap `data` in a raster carrying this raster's georeferencing.
    ///
    /// The new raster has no no-data value; `data` must match this shape.
    pub fn with_data<U: RasterElement>(&self, data: Array2<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (dx, dy) = self.cell_spacing();
            return Err(Error::DimensionMismatch {
                expected: self.grid_shape(),
                actual: GridShape {
                    rows: data.nrows(),
                    cols: data.ncols(),
                    dx,
                    dy,
                },
            });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            nodata: None,
        })
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Window covering every cell
    pub fn extent(&self) -> Extent {
        Extent::full(self.rows(), self.cols())
    }

    /// Dimensions plus cell spacing
    pub fn grid_shape(&self) -> GridShape {
        let (dx, dy) = self.cell_spacing();
        GridShape {
            rows: self.rows(),
            cols: self.cols(),
            dx,
            dy,
        }
    }

    /// Fail with [`Error::DimensionMismatch`] unless `other` has exactly the
    /// same dimensions and cell spacing.
    pub fn ensure_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        let expected = self.grid_shape();
        let actual = other.grid_shape();
        if expected != actual {
            return Err(Error::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    /// Get a row slice
    pub fn row(&self, row: usize) -> Result<ArrayView1<'_, T>> {
        if row >= self.rows() {
            return Err(Error::IndexOutOfBounds {
                row,
                col: 0,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.data.row(row))
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell spacing `(dx, dy)`
    pub fn cell_spacing(&self) -> (f64, f64) {
        self.transform.cell_spacing()
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T>
    where
        T: PartialOrd,
    {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            sum += value.as_f64();
            count += 1;
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::filled(100, 200, 0.0);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::filled(10, 10, 0.0);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
    }

    #[test]
    fn test_access_is_bounds_checked() {
        let mut raster: Raster<u8> = Raster::filled(3, 4, 0);
        assert!(matches!(
            raster.get(3, 0),
            Err(Error::IndexOutOfBounds { row: 3, col: 0, rows: 3, cols: 4 })
        ));
        assert!(raster.set(0, 4, 1).is_err());
        assert!(raster.row(3).is_err());
    }

    #[test]
    fn test_from_vec_length_checked() {
        assert!(Raster::from_vec(vec![1.0_f64; 5], 2, 3).is_err());
        let r = Raster::from_vec(vec![1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(r.get(1, 0).unwrap(), 4.0);
    }

    #[test]
    fn test_same_grid_checks_spacing() {
        let mut dem: Raster<f64> = Raster::filled(4, 4, 1.0);
        dem.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        let mut mask: Raster<bool> = Raster::filled(4, 4, false);
        assert!(matches!(
            dem.ensure_same_grid(&mask),
            Err(Error::DimensionMismatch { .. })
        ));

        mask.set_transform(GeoTransform::new(100.0, 40.0, 10.0, -10.0));
        assert!(dem.ensure_same_grid(&mask).is_ok());

        let other: Raster<bool> = Raster::filled(4, 5, false);
        assert!(dem.ensure_same_grid(&other).is_err());
    }

    #[test]
    fn test_with_data_carries_transform() {
        let mut dem: Raster<f64> = Raster::filled(2, 2, 1.0);
        dem.set_transform(GeoTransform::new(0.0, 0.0, 5.0, -2.0));
        let out = dem.with_data(Array2::from_elem((2, 2), 7_u8)).unwrap();
        assert_eq!(out.cell_spacing(), (5.0, 2.0));
        assert_eq!(out.nodata(), None);
        assert!(dem.with_data(Array2::from_elem((3, 2), 7_u8)).is_err());
    }

    #[test]
    fn test_raster_statistics() {
        let mut raster: Raster<f32> = Raster::filled(10, 10, 0.0);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f32).unwrap();
            }
        }
        raster.set(0, 0, -1.0).unwrap();
        raster.set_nodata(Some(-1.0));

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }
}
