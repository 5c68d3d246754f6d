#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the courier simulation.
//!
//! The world bundles the static terrain grid, the deterministic schedule of
//! dynamic obstacles and the mission endpoints. It is immutable once built;
//! planners and the controller read it through [`query`].

pub mod grid;
pub mod map;
pub mod navigation;
pub mod schedule;

use courier_core::CellCoord;

pub use grid::{Grid, GridError, Neighbors, TerrainCost};
pub use map::MapError;
pub use navigation::CostField;
pub use schedule::{
    DynamicObstacle, MovementRule, ObstacleSchedule, Occupancy, Recurrence, ScheduleSnapshot,
};

/// Terrain, obstacles and mission endpoints of a single delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct World {
    grid: Grid,
    schedule: ObstacleSchedule,
    start: CellCoord,
    goal: CellCoord,
}

impl World {
    /// Creates a world, checking that both endpoints lie on the grid.
    pub fn new(
        grid: Grid,
        schedule: ObstacleSchedule,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<Self, GridError> {
        for cell in [start, goal] {
            let _ = grid.cost(cell)?;
        }
        Ok(Self {
            grid,
            schedule,
            start,
            goal,
        })
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use courier_core::CellCoord;

    use super::{Grid, ObstacleSchedule, World};

    /// Provides read-only access to the terrain grid.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Provides read-only access to the dynamic obstacle schedule.
    #[must_use]
    pub fn schedule(world: &World) -> &ObstacleSchedule {
        &world.schedule
    }

    /// Cell the courier departs from.
    #[must_use]
    pub fn start(world: &World) -> CellCoord {
        world.start
    }

    /// Cell the courier must reach.
    #[must_use]
    pub fn goal(world: &World) -> CellCoord {
        world.goal
    }
}
