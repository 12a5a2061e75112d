//! Fixed resolution grid over a projected plane.

use crate::{GridError, Projection};
use geo::geometry::{Coord, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one grid cell.
///
/// Ordering is row-major so that iterating over cells is
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    pub row: i64,
    pub col: i64,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}c{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialGrid {
    projection: Projection,

    /// Projected coordinate of the SW corner of cell (0, 0).
    origin: Coord<f64>,

    /// Cell width and height in projected units.
    cell_size: f64,

    /// Optional projected domain; anything outside is rejected.
    extent: Option<Rect<f64>>,
}

impl SpatialGrid {
    pub fn new(projection: Projection, cell_size: f64) -> Result<Self, GridError> {
        if cell_size.is_finite() && cell_size > 0.0 {
            Ok(Self {
                projection,
                origin: Coord { x: 0.0, y: 0.0 },
                cell_size,
                extent: None,
            })
        } else {
            Err(GridError::CellSize(cell_size))
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Coord<f64>) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_extent(mut self, extent: Rect<f64>) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Returns the projected coordinate of (`lon`, `lat`).
    pub fn project(&self, lon: f64, lat: f64) -> Result<Coord<f64>, GridError> {
        let xy = self.projection.forward(Coord { x: lon, y: lat })?;
        match self.extent {
            Some(extent)
                if xy.x < extent.min().x
                    || xy.x > extent.max().x
                    || xy.y < extent.min().y
                    || xy.y > extent.max().y =>
            {
                Err(GridError::OutOfDomain { lon, lat })
            }
            _ => Ok(xy),
        }
    }

    /// Returns the cell owning (`lon`, `lat`).
    ///
    /// Cells are half-open, `[low, high)`, on both axes so a point on a
    /// shared edge belongs to the cell above/right of it.
    pub fn cell_of(&self, lon: f64, lat: f64) -> Result<Cell, GridError> {
        self.project(lon, lat).map(|xy| self.cell_of_projected(xy))
    }

    pub fn cell_of_projected(&self, Coord { x, y }: Coord<f64>) -> Cell {
        #[allow(clippy::cast_possible_truncation)]
        let cell = Cell {
            row: ((y - self.origin.y) / self.cell_size).floor() as i64,
            col: ((x - self.origin.x) / self.cell_size).floor() as i64,
        };
        cell
    }

    /// Returns the projected bounds of `cell`.
    pub fn bounds(&self, Cell { row, col }: Cell) -> Rect<f64> {
        #[allow(clippy::cast_precision_loss)]
        let min = Coord {
            x: self.origin.x + col as f64 * self.cell_size,
            y: self.origin.y + row as f64 * self.cell_size,
        };
        let max = Coord {
            x: min.x + self.cell_size,
            y: min.y + self.cell_size,
        };
        Rect::new(min, max)
    }

    /// Returns every cell whose bounds, grown by `margin` on all sides,
    /// contain `xy`. Edges of the grown bounds are inclusive.
    pub fn cells_within(&self, xy: Coord<f64>, margin: f64) -> impl Iterator<Item = Cell> + '_ {
        let lo = self.cell_of_projected(Coord {
            x: xy.x - margin,
            y: xy.y - margin,
        });
        let hi = self.cell_of_projected(Coord {
            x: xy.x + margin,
            y: xy.y + margin,
        });
        ((lo.row - 1)..=(hi.row + 1))
            .flat_map(move |row| ((lo.col - 1)..=(hi.col + 1)).map(move |col| Cell { row, col }))
            .filter(move |cell| within_margin(&self.bounds(*cell), margin, xy))
    }
}

/// Returns true if `xy` lies inside `rect` grown by `margin`.
pub fn within_margin(rect: &Rect<f64>, margin: f64, xy: Coord<f64>) -> bool {
    rect.min().x - margin <= xy.x
        && xy.x <= rect.max().x + margin
        && rect.min().y - margin <= xy.y
        && xy.y <= rect.max().y + margin
}

#[cfg(test)]
mod tests {
    use super::{Cell, Coord, GridError, Projection, Rect, SpatialGrid};

    fn grid() -> SpatialGrid {
        SpatialGrid::new(Projection::PlateCarree, 1.0).unwrap()
    }

    #[test]
    fn test_invalid_cell_size() {
        for size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                SpatialGrid::new(Projection::PlateCarree, size),
                Err(GridError::CellSize(_))
            ));
        }
    }

    #[test]
    fn test_cell_of() {
        let grid = grid();
        assert_eq!(grid.cell_of(0.5, 0.5).unwrap(), Cell { row: 0, col: 0 });
        assert_eq!(grid.cell_of(-0.5, 0.5).unwrap(), Cell { row: 0, col: -1 });
        assert_eq!(grid.cell_of(-71.3, 44.27).unwrap(), Cell { row: 44, col: -72 });
        assert!(matches!(
            grid.cell_of(0.0, 91.0),
            Err(GridError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn test_half_open_boundary() {
        let grid = grid();
        // On the shared edge, the upper/right cell owns the point.
        assert_eq!(grid.cell_of(1.0, 0.5).unwrap(), Cell { row: 0, col: 1 });
        assert_eq!(grid.cell_of(0.5, 1.0).unwrap(), Cell { row: 1, col: 0 });
        assert_eq!(grid.cell_of(1.0, 1.0).unwrap(), Cell { row: 1, col: 1 });
    }

    #[test]
    fn test_origin_and_extent() {
        let grid = SpatialGrid::new(Projection::PlateCarree, 2.0)
            .unwrap()
            .with_origin(Coord { x: 1.0, y: 1.0 })
            .with_extent(Rect::new(Coord { x: -10.0, y: -10.0 }, Coord { x: 10.0, y: 10.0 }));
        assert_eq!(grid.cell_of(0.5, 0.5).unwrap(), Cell { row: -1, col: -1 });
        assert_eq!(grid.cell_of(3.0, 2.9).unwrap(), Cell { row: 0, col: 1 });
        assert!(matches!(
            grid.cell_of(11.0, 0.0),
            Err(GridError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn test_bounds() {
        let grid = grid();
        let bounds = grid.bounds(Cell { row: -2, col: 3 });
        assert_eq!(bounds.min(), Coord { x: 3.0, y: -2.0 });
        assert_eq!(bounds.max(), Coord { x: 4.0, y: -1.0 });
    }

    #[test]
    fn test_cells_within() {
        let grid = grid();
        let own = Cell { row: 0, col: 0 };

        let mut cells: Vec<Cell> = grid.cells_within(Coord { x: 0.5, y: 0.5 }, 0.1).collect();
        assert_eq!(cells, vec![own]);

        // Near the NE corner every neighbour around that corner is hit.
        cells = grid.cells_within(Coord { x: 0.95, y: 0.95 }, 0.1).collect();
        cells.sort();
        assert_eq!(
            cells,
            vec![
                own,
                Cell { row: 0, col: 1 },
                Cell { row: 1, col: 0 },
                Cell { row: 1, col: 1 },
            ]
        );

        // Margins wider than a cell reach past the immediate ring.
        cells = grid.cells_within(Coord { x: 0.5, y: 0.5 }, 1.6).collect();
        assert_eq!(cells.len(), 25);
    }
}
