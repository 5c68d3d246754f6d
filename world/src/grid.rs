//! Terrain grid describing traversal costs and static obstacles.

use courier_core::{CellCoord, Connectivity};
use thiserror::Error;

/// Cost of entering a single cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerrainCost {
    /// Traversable terrain charging the contained cost, always at least 1.
    Finite(u32),
    /// Static obstacle that can never be entered.
    Impassable,
}

impl TerrainCost {
    /// Open flat ground.
    pub const FLAT: Self = Self::Finite(1);
    /// Rolling hills.
    pub const HILLS: Self = Self::Finite(2);
    /// Mountain passes.
    pub const MOUNTAINS: Self = Self::Finite(3);
    /// Shallow water.
    pub const WATER: Self = Self::Finite(4);

    /// Finite cost of entering the cell, or `None` when impassable.
    #[must_use]
    pub const fn finite(self) -> Option<u32> {
        match self {
            Self::Finite(cost) => Some(cost),
            Self::Impassable => None,
        }
    }

    /// Reports whether the terrain blocks movement.
    #[must_use]
    pub const fn is_impassable(self) -> bool {
        matches!(self, Self::Impassable)
    }
}

/// Errors raised by grid construction and queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    /// The queried cell lies outside the grid.
    #[error("cell {cell} lies outside the {rows}x{columns} grid")]
    OutOfBounds {
        /// Offending cell.
        cell: CellCoord,
        /// Number of rows in the grid.
        rows: u32,
        /// Number of columns in the grid.
        columns: u32,
    },
    /// One of the grid dimensions was zero.
    #[error("grid dimensions {rows}x{columns} must both be positive")]
    Empty {
        /// Requested number of rows.
        rows: u32,
        /// Requested number of columns.
        columns: u32,
    },
    /// The terrain buffer length does not match the dimensions.
    #[error("expected {expected} terrain entries, found {found}")]
    DimensionMismatch {
        /// Entries implied by the dimensions.
        expected: usize,
        /// Entries supplied.
        found: usize,
    },
    /// A traversable cell was assigned a cost below 1.
    #[error("terrain cost at {cell} must be at least 1")]
    ZeroCost {
        /// Offending cell.
        cell: CellCoord,
    },
}

/// Dense row-major terrain grid.
///
/// The grid is built once from a map description and is read-only afterwards.
/// Every traversable cell costs at least 1 to enter, which keeps uniform-cost
/// and A* search correct and lets the heuristic scale by [`Grid::min_step_cost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    rows: u32,
    columns: u32,
    connectivity: Connectivity,
    terrain: Vec<TerrainCost>,
    min_step_cost: u32,
}

impl Grid {
    /// Creates a grid from row-major terrain costs.
    pub fn new(
        rows: u32,
        columns: u32,
        connectivity: Connectivity,
        terrain: Vec<TerrainCost>,
    ) -> Result<Self, GridError> {
        if rows == 0 || columns == 0 {
            return Err(GridError::Empty { rows, columns });
        }

        let expected = cell_count(rows, columns);
        if terrain.len() != expected {
            return Err(GridError::DimensionMismatch {
                expected,
                found: terrain.len(),
            });
        }

        let mut grid = Self {
            rows,
            columns,
            connectivity,
            terrain,
            min_step_cost: 1,
        };

        for (offset, cost) in grid.terrain.iter().enumerate() {
            if *cost == TerrainCost::Finite(0) {
                return Err(GridError::ZeroCost {
                    cell: grid.cell_at_offset(offset),
                });
            }
        }

        grid.refresh_min_step_cost();
        Ok(grid)
    }

    /// Creates a grid of flat terrain without obstacles.
    pub fn open(rows: u32, columns: u32, connectivity: Connectivity) -> Result<Self, GridError> {
        Self::new(
            rows,
            columns,
            connectivity,
            vec![TerrainCost::FLAT; cell_count(rows, columns)],
        )
    }

    /// Returns the grid with the terrain of `cell` replaced.
    pub fn with_terrain(mut self, cell: CellCoord, cost: TerrainCost) -> Result<Self, GridError> {
        if cost == TerrainCost::Finite(0) {
            return Err(GridError::ZeroCost { cell });
        }
        let offset = self.offset(cell)?;
        self.terrain[offset] = cost;
        self.refresh_min_step_cost();
        Ok(self)
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Movement model used when enumerating neighbours.
    #[must_use]
    pub const fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Smallest finite terrain cost present on the grid.
    #[must_use]
    pub const fn min_step_cost(&self) -> u32 {
        self.min_step_cost
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.row() < self.rows && cell.column() < self.columns
    }

    /// Terrain cost of entering the cell.
    pub fn cost(&self, cell: CellCoord) -> Result<TerrainCost, GridError> {
        let offset = self.offset(cell)?;
        Ok(self.terrain[offset])
    }

    /// Reports whether the cell is a static obstacle.
    pub fn is_blocked(&self, cell: CellCoord) -> Result<bool, GridError> {
        self.cost(cell).map(TerrainCost::is_impassable)
    }

    /// Finite cost of entering the cell, or `None` when blocked or outside the grid.
    #[must_use]
    pub fn step_cost(&self, cell: CellCoord) -> Option<u32> {
        self.cost(cell).ok().and_then(TerrainCost::finite)
    }

    /// Enumerates in-bounds neighbours of the cell in a fixed order.
    ///
    /// Orthogonal neighbours come first (north, east, south, west), followed by
    /// the diagonals on 8-connected grids. Static obstacles are included; callers
    /// filter them through [`Grid::is_blocked`] or [`Grid::step_cost`].
    pub fn neighbors(&self, cell: CellCoord) -> Result<Neighbors, GridError> {
        let _ = self.offset(cell)?;
        let mut neighbors = Neighbors::default();

        let offsets: &[(i64, i64)] = match self.connectivity {
            Connectivity::Four => &ORTHOGONAL,
            Connectivity::Eight => &ALL_DIRECTIONS,
        };

        for (row_delta, column_delta) in offsets {
            let row = i64::from(cell.row()) + row_delta;
            let column = i64::from(cell.column()) + column_delta;
            if row < 0 || column < 0 || row >= i64::from(self.rows) || column >= i64::from(self.columns)
            {
                continue;
            }
            let (Ok(row), Ok(column)) = (u32::try_from(row), u32::try_from(column)) else {
                continue;
            };
            neighbors.push(CellCoord::new(row, column));
        }

        Ok(neighbors)
    }

    /// Iterates over every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.rows)
            .flat_map(move |row| (0..self.columns).map(move |column| CellCoord::new(row, column)))
    }

    fn offset(&self, cell: CellCoord) -> Result<usize, GridError> {
        if !self.contains(cell) {
            return Err(GridError::OutOfBounds {
                cell,
                rows: self.rows,
                columns: self.columns,
            });
        }
        let row = usize::try_from(cell.row()).unwrap_or(usize::MAX);
        let column = usize::try_from(cell.column()).unwrap_or(usize::MAX);
        let width = usize::try_from(self.columns).unwrap_or(usize::MAX);
        Ok(row * width + column)
    }

    fn cell_at_offset(&self, offset: usize) -> CellCoord {
        let width = usize::try_from(self.columns).unwrap_or(1).max(1);
        let row = u32::try_from(offset / width).unwrap_or(u32::MAX);
        let column = u32::try_from(offset % width).unwrap_or(u32::MAX);
        CellCoord::new(row, column)
    }

    fn refresh_min_step_cost(&mut self) {
        self.min_step_cost = self
            .terrain
            .iter()
            .filter_map(|cost| cost.finite())
            .min()
            .unwrap_or(1)
            .max(1);
    }
}

const ORTHOGONAL: [(i64, i64); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];
const ALL_DIRECTIONS: [(i64, i64); 8] = [
    (-1, 0),
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 1),
    (1, 1),
    (1, -1),
    (-1, -1),
];

fn cell_count(rows: u32, columns: u32) -> usize {
    let rows = usize::try_from(rows).unwrap_or(0);
    let columns = usize::try_from(columns).unwrap_or(0);
    rows.checked_mul(columns).unwrap_or(0)
}

/// Fixed-capacity iterator over the neighbours of a cell.
#[derive(Clone, Debug, Default)]
pub struct Neighbors {
    buffer: [Option<CellCoord>; 8],
    len: usize,
    cursor: usize,
}

impl Neighbors {
    fn push(&mut self, cell: CellCoord) {
        if self.len < self.buffer.len() {
            self.buffer[self.len] = Some(cell);
            self.len += 1;
        }
    }
}

impl Iterator for Neighbors {
    type Item = CellCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }

        let value = self.buffer[self.cursor];
        self.cursor += 1;
        value
    }
}
