//! Tiled processing for large rasters
//!
//! A raster is cut into disjoint *cores* that together cover every cell.
//! Each core is surrounded by a *halo*: extra rows and columns a worker may
//! read but never writes. Full-width tiles without a halo are plain row
//! bands.

use crate::cancel::CancelToken;
use crate::strategy::{ParallelStrategy, ProcessingMode};
use ndarray::{s, Array2};
use riverscape_core::{Error, Extent, Result};

/// A subset of a raster assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Cells this tile is responsible for writing
    pub core: Extent,
    /// Core grown by the halo and clipped to the raster
    pub window: Extent,
}

/// Iterator over tiles covering a raster, row-major
pub struct TileIterator {
    bounds: Extent,
    tile_rows: usize,
    tile_cols: usize,
    halo_rows: usize,
    halo_cols: usize,
    current_row: usize,
    current_col: usize,
}

impl TileIterator {
    /// Create a new tile iterator. Zero tile sizes are treated as 1.
    pub fn new(
        total_rows: usize,
        total_cols: usize,
        tile_rows: usize,
        tile_cols: usize,
        halo_rows: usize,
        halo_cols: usize,
    ) -> Self {
        Self {
            bounds: Extent::full(total_rows, total_cols),
            tile_rows: tile_rows.max(1),
            tile_cols: tile_cols.max(1),
            halo_rows,
            halo_cols,
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for TileIterator {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bounds.is_empty() || self.current_row >= self.bounds.row_end {
            return None;
        }

        let core = Extent::new(
            self.current_row,
            self.current_row.saturating_add(self.tile_rows),
            self.current_col,
            self.current_col.saturating_add(self.tile_cols),
        )
        .intersect(&self.bounds);
        let window = core.expand(self.halo_rows, self.halo_cols, &self.bounds);

        self.current_col = self.current_col.saturating_add(self.tile_cols);
        if self.current_col >= self.bounds.col_end {
            self.current_col = 0;
            self.current_row = self.current_row.saturating_add(self.tile_rows);
        }

        Some(Tile { core, window })
    }
}

/// Processor for tiled raster operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiledProcessor {
    tile_rows: usize,
    tile_cols: usize,
    halo_rows: usize,
    halo_cols: usize,
}

impl TiledProcessor {
    /// Square tiles of `tile_size` cells with the same halo on both axes
    pub fn new(tile_size: usize, halo: usize) -> Self {
        Self {
            tile_rows: tile_size,
            tile_cols: tile_size,
            halo_rows: halo,
            halo_cols: halo,
        }
    }

    /// Full-width bands of `band_rows` rows with no halo
    pub fn row_bands(band_rows: usize) -> Self {
        Self {
            tile_rows: band_rows,
            tile_cols: usize::MAX,
            halo_rows: 0,
            halo_cols: 0,
        }
    }

    /// Replace the halo with separate row and column widths
    pub fn with_halo(mut self, halo_rows: usize, halo_cols: usize) -> Self {
        self.halo_rows = halo_rows;
        self.halo_cols = halo_cols;
        self
    }

    pub fn halo(&self) -> (usize, usize) {
        (self.halo_rows, self.halo_cols)
    }

    /// Tiles covering a `rows x cols` raster
    pub fn tiles(&self, rows: usize, cols: usize) -> TileIterator {
        TileIterator::new(
            rows,
            cols,
            self.tile_rows,
            self.tile_cols,
            self.halo_rows,
            self.halo_cols,
        )
    }

    /// Evaluate `f` for every tile and merge the results into one grid.
    ///
    /// `f` returns the values of the tile's core in row-major order. The
    /// cancel token is checked before each tile starts; once it is set no
    /// further tiles run and [`Error::Cancelled`] is returned. `fill` only
    /// seeds the output buffer, every cell is overwritten by some core.
    pub fn run<U, F>(
        &self,
        rows: usize,
        cols: usize,
        mode: ProcessingMode,
        cancel: Option<&CancelToken>,
        fill: U,
        f: F,
    ) -> Result<Array2<U>>
    where
        U: Clone + Send,
        F: Fn(&Tile) -> Result<Vec<U>> + Sync + Send,
    {
        let tiles: Vec<Tile> = self.tiles(rows, cols).collect();

        let results = mode.try_par_map(0..tiles.len(), |i| {
            if let Some(token) = cancel {
                token.check()?;
            }
            f(&tiles[i])
        })?;

        let mut output = Array2::from_elem((rows, cols), fill);
        for (tile, values) in tiles.iter().zip(results) {
            let core = tile.core;
            if values.len() != core.len() {
                return Err(Error::Other(format!(
                    "tile {:?} produced {} values for {} cells",
                    core,
                    values.len(),
                    core.len()
                )));
            }
            let block = Array2::from_shape_vec((core.rows(), core.cols()), values)
                .map_err(|e| Error::Other(e.to_string()))?;
            output
                .slice_mut(s![core.row_start..core.row_end, core.col_start..core.col_end])
                .assign(&block);
        }

        Ok(output)
    }
}
