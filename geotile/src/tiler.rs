//! Halo tiling of point clouds.

use crate::{grid::SpatialGrid, Cell, GridError, Point};
use geo::geometry::Rect;
use log::{debug, warn};
use std::collections::{btree_map::Entry, BTreeMap};

/// Points for one grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    cell: Cell,

    /// Projected bounds of `cell`, excluding the buffer.
    bounds: Rect<f64>,

    /// Points owned by this tile.
    core: Vec<Point>,

    /// Copies of neighbouring tiles' points that lie within the buffer
    /// of this tile's bounds.
    halo: Vec<Point>,

    /// Positions in the partitioned slice of `core` and `halo`.
    core_index: Vec<usize>,
    halo_index: Vec<usize>,
}

impl Tile {
    pub fn new(cell: Cell, bounds: Rect<f64>) -> Self {
        Self {
            cell,
            bounds,
            core: Vec::new(),
            halo: Vec::new(),
            core_index: Vec::new(),
            halo_index: Vec::new(),
        }
    }

    pub fn cell(&self) -> Cell {
        self.cell
    }

    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    pub fn core(&self) -> &[Point] {
        &self.core
    }

    pub fn halo(&self) -> &[Point] {
        &self.halo
    }

    /// Returns the number of core and halo points in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.core.len() + self.halo.len()
    }

    /// Returns an iterator over core then halo points.
    pub fn points(&self) -> impl Iterator<Item = &Point> + '_ {
        self.core.iter().chain(self.halo.iter())
    }

    /// Like [`Tile::points`], paired with each point's position in the
    /// slice given to [`Tiler::partition`].
    pub fn indexed_points(&self) -> impl Iterator<Item = (usize, &Point)> + '_ {
        self.core_index
            .iter()
            .chain(self.halo_index.iter())
            .copied()
            .zip(self.points())
    }

    fn push_core(&mut self, index: usize, point: Point) {
        self.core_index.push(index);
        self.core.push(point);
    }

    fn push_halo(&mut self, index: usize, point: Point) {
        self.halo_index.push(index);
        self.halo.push(point);
    }
}

/// A point the tiler could not place.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// Position of the point in the partitioned slice.
    pub index: usize,
    pub error: GridError,
}

/// A tile holding far more points than the average tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Imbalance {
    pub cell: Cell,
    pub points: usize,
    pub mean: f64,
}

#[derive(Debug, Clone)]
pub struct Tiler {
    grid: SpatialGrid,

    /// Halo width in projected units.
    buffer_size: f64,
}

impl Tiler {
    pub fn new(grid: SpatialGrid, buffer_size: f64) -> Result<Self, GridError> {
        if buffer_size.is_finite() && buffer_size >= 0.0 {
            Ok(Self { grid, buffer_size })
        } else {
            Err(GridError::Buffer(buffer_size))
        }
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn buffer_size(&self) -> f64 {
        self.buffer_size
    }

    /// Splits `points` into tiles.
    ///
    /// Every accepted point is core in exactly one tile and halo in
    /// every other tile whose bounds, grown by the buffer, contain it.
    /// Points outside the grid's domain are skipped and reported in
    /// [`Partition::rejected`].
    pub fn partition(&self, points: &[Point]) -> Partition {
        let mut tiles: BTreeMap<Cell, Tile> = BTreeMap::new();
        let mut rejected = Vec::new();

        for (index, point) in points.iter().enumerate() {
            let xy = match self.grid.project(point.lon, point.lat) {
                Ok(xy) => xy,
                Err(error) => {
                    debug!("skipping point {index}: {error}");
                    rejected.push(Rejected { index, error });
                    continue;
                }
            };
            let owner = self.grid.cell_of_projected(xy);
            self.tile_mut(&mut tiles, owner).push_core(index, *point);
            for cell in self.grid.cells_within(xy, self.buffer_size) {
                if cell != owner {
                    self.tile_mut(&mut tiles, cell).push_halo(index, *point);
                }
            }
        }

        if !rejected.is_empty() {
            warn!(
                "{} of {} points are outside the grid domain",
                rejected.len(),
                points.len()
            );
        }
        debug!(
            "partitioned {} points into {} tiles",
            points.len() - rejected.len(),
            tiles.len()
        );

        Partition { tiles, rejected }
    }
}

/// Private API.
impl Tiler {
    fn tile_mut<'a>(&self, tiles: &'a mut BTreeMap<Cell, Tile>, cell: Cell) -> &'a mut Tile {
        match tiles.entry(cell) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(Tile::new(cell, self.grid.bounds(cell))),
        }
    }
}

/// The output of [`Tiler::partition`].
#[derive(Debug, Clone, Default)]
pub struct Partition {
    tiles: BTreeMap<Cell, Tile>,
    rejected: Vec<Rejected>,
}

impl Partition {
    /// Returns tiles in row-major cell order.
    pub fn tiles(&self) -> impl ExactSizeIterator<Item = &Tile> + '_ {
        self.tiles.values()
    }

    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles.into_values().collect()
    }

    pub fn get(&self, cell: Cell) -> Option<&Tile> {
        self.tiles.get(&cell)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn rejected(&self) -> &[Rejected] {
        &self.rejected
    }

    /// Reassembles the accepted points, each exactly once.
    pub fn join(&self) -> Vec<Point> {
        join(self.tiles())
    }

    /// Returns tiles holding more than `factor` times the mean number
    /// of points per tile.
    pub fn imbalanced(&self, factor: f64) -> Vec<Imbalance> {
        if self.tiles.is_empty() {
            return Vec::new();
        }
        let total: usize = self.tiles.values().map(Tile::len).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / self.tiles.len() as f64;
        self.tiles
            .values()
            .filter(|tile| {
                #[allow(clippy::cast_precision_loss)]
                let n = tile.len() as f64;
                n > factor * mean
            })
            .map(|tile| Imbalance {
                cell: tile.cell,
                points: tile.len(),
                mean,
            })
            .collect()
    }
}

/// Returns the union of the core points of `tiles`.
pub fn join<'a>(tiles: impl IntoIterator<Item = &'a Tile>) -> Vec<Point> {
    tiles
        .into_iter()
        .flat_map(|tile| tile.core.iter().copied())
        .collect()
}
