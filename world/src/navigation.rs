//! Static cost-to-goal field built from the terrain grid.

use std::{cmp::Reverse, collections::BinaryHeap};

use courier_core::CellCoord;

use crate::grid::Grid;

/// Dense cost-to-goal grid seeded from a single goal cell.
///
/// The field stores the cheapest terrain cost of reaching the goal from every
/// cell while ignoring dynamic obstacles, computed with a reverse Dijkstra
/// sweep. Because dynamic obstacles only remove options, these distances are
/// lower bounds on the true remaining cost at any tick. Unreachable cells and
/// walls hold `u64::MAX`.
#[derive(Clone, Debug, Default)]
pub struct CostField {
    rows: u32,
    columns: u32,
    goal: Option<CellCoord>,
    distances: Vec<u64>,
}

impl CostField {
    /// Builds a field for `goal` over `grid`.
    #[must_use]
    pub fn build(grid: &Grid, goal: CellCoord) -> Self {
        let mut field = Self::default();
        field.rebuild(grid, goal);
        field
    }

    /// Rebuilds the distances in place, reusing the allocation.
    pub fn rebuild(&mut self, grid: &Grid, goal: CellCoord) {
        let rows = grid.rows();
        let columns = grid.columns();
        let width = usize::try_from(columns).unwrap_or(0);
        let cell_count = usize::try_from(rows)
            .unwrap_or(0)
            .checked_mul(width)
            .unwrap_or(0);

        if self.distances.len() != cell_count {
            self.distances = vec![u64::MAX; cell_count];
        } else {
            self.distances.fill(u64::MAX);
        }

        self.rows = rows;
        self.columns = columns;
        self.goal = Some(goal);

        if grid.step_cost(goal).is_none() {
            return;
        }
        let Some(goal_index) = index(width, goal) else {
            return;
        };
        self.distances[goal_index] = 0;

        let mut heap = BinaryHeap::new();
        heap.push(Reverse((0_u64, goal)));

        while let Some(Reverse((distance, cell))) = heap.pop() {
            let Some(current_index) = index(width, cell) else {
                continue;
            };
            if distance > self.distances[current_index] {
                continue;
            }

            let Some(entry_cost) = grid.step_cost(cell) else {
                continue;
            };
            let next_distance = distance.saturating_add(u64::from(entry_cost));

            let Ok(neighbors) = grid.neighbors(cell) else {
                continue;
            };
            for neighbor in neighbors {
                if grid.step_cost(neighbor).is_none() {
                    continue;
                }

                let Some(neighbor_index) = index(width, neighbor) else {
                    continue;
                };

                if self.distances[neighbor_index] <= next_distance {
                    continue;
                }

                self.distances[neighbor_index] = next_distance;
                heap.push(Reverse((next_distance, neighbor)));
            }
        }
    }

    /// Goal the field was built for.
    #[must_use]
    pub fn goal(&self) -> Option<CellCoord> {
        self.goal
    }

    /// Cheapest static cost from the cell to the goal, if reachable.
    #[must_use]
    pub fn distance(&self, cell: CellCoord) -> Option<u64> {
        if cell.row() >= self.rows || cell.column() >= self.columns {
            return None;
        }

        let width = usize::try_from(self.columns).ok()?;
        index(width, cell)
            .and_then(|offset| self.distances.get(offset).copied())
            .filter(|distance| *distance != u64::MAX)
    }

    /// Reports whether the goal is statically reachable from the cell.
    #[must_use]
    pub fn is_reachable(&self, cell: CellCoord) -> bool {
        self.distance(cell).is_some()
    }
}

fn index(width: usize, cell: CellCoord) -> Option<usize> {
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    row.checked_mul(width)?.checked_add(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TerrainCost;
    use courier_core::Connectivity;

    #[test]
    fn build_sets_goal_to_zero_and_counts_entered_terrain() {
        let grid = Grid::open(3, 4, Connectivity::Four)
            .and_then(|grid| grid.with_terrain(CellCoord::new(1, 1), TerrainCost::WATER))
            .expect("grid");
        let field = CostField::build(&grid, CellCoord::new(1, 2));

        assert_eq!(field.distance(CellCoord::new(1, 2)), Some(0));
        assert_eq!(field.distance(CellCoord::new(0, 2)), Some(1));
        assert_eq!(field.distance(CellCoord::new(1, 1)), Some(1));
        assert_eq!(field.distance(CellCoord::new(1, 0)), Some(4));
    }

    #[test]
    fn build_respects_walls() {
        let grid = Grid::open(3, 3, Connectivity::Four)
            .and_then(|grid| grid.with_terrain(CellCoord::new(0, 1), TerrainCost::Impassable))
            .and_then(|grid| grid.with_terrain(CellCoord::new(1, 1), TerrainCost::Impassable))
            .and_then(|grid| grid.with_terrain(CellCoord::new(2, 1), TerrainCost::Impassable))
            .expect("grid");
        let field = CostField::build(&grid, CellCoord::new(0, 2));

        assert_eq!(field.distance(CellCoord::new(0, 1)), None);
        assert!(!field.is_reachable(CellCoord::new(0, 0)));
        assert!(field.is_reachable(CellCoord::new(2, 2)));
    }
}
