#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Path-finding strategies over the time-expanded courier grid.
//!
//! Every strategy answers the same question: which contiguous sequence of
//! cells leads from the query's start to its goal, entering one cell per tick
//! from `time_offset` onwards, without touching a static wall or a cell the
//! schedule snapshot reports occupied at the arrival tick. Failure is reported
//! through [`SearchOutcome`] and never panics.

mod local;
mod systematic;

use courier_core::{Algorithm, CellCoord, Heuristic, LocalSearchConfig, MissionConfig, Plan};
use courier_world::{Grid, ScheduleSnapshot};

pub use local::{HillClimbing, SimulatedAnnealing};
pub use systematic::{AStar, BreadthFirst, UniformCost};

/// Expansion cap applied when a context is created without an explicit one.
pub const DEFAULT_MAX_EXPANSIONS: u64 = 200_000;

/// Read-only view of the world a search call plans against.
#[derive(Clone, Copy, Debug)]
pub struct SearchContext<'a> {
    grid: &'a Grid,
    snapshot: ScheduleSnapshot<'a>,
    max_expansions: u64,
}

impl<'a> SearchContext<'a> {
    /// Creates a context using the default expansion cap.
    #[must_use]
    pub const fn new(grid: &'a Grid, snapshot: ScheduleSnapshot<'a>) -> Self {
        Self {
            grid,
            snapshot,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }

    /// Replaces the node-expansion cap.
    #[must_use]
    pub const fn with_max_expansions(mut self, max_expansions: u64) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Terrain grid searched over.
    #[must_use]
    pub const fn grid(&self) -> &'a Grid {
        self.grid
    }

    /// Obstacle schedule as known to the planner.
    #[must_use]
    pub const fn snapshot(&self) -> ScheduleSnapshot<'a> {
        self.snapshot
    }

    /// Maximum number of nodes a single call may expand.
    #[must_use]
    pub const fn max_expansions(&self) -> u64 {
        self.max_expansions
    }

    /// Reports whether `cell` may be entered at tick `time`.
    #[must_use]
    pub fn is_enterable(&self, cell: CellCoord, time: u64) -> bool {
        self.grid.step_cost(cell).is_some() && !self.snapshot.occupied_at(cell, time)
    }

    /// Number of cells on `cells` that are walls or known to be occupied when
    /// the path is followed from `time_offset`. The first cell is not checked.
    #[must_use]
    pub fn collisions(&self, cells: &[CellCoord], time_offset: u64) -> usize {
        cells
            .iter()
            .zip(time_offset..)
            .skip(1)
            .filter(|(cell, time)| !self.is_enterable(**cell, *time))
            .count()
    }
}

/// Terrain cost of following `cells`, charging every cell after the first.
///
/// Returns `None` when the path enters a wall or leaves the grid.
#[must_use]
pub fn path_cost(grid: &Grid, cells: &[CellCoord]) -> Option<u64> {
    cells.iter().skip(1).try_fold(0_u64, |total, cell| {
        grid.step_cost(*cell)
            .map(|cost| total.saturating_add(u64::from(cost)))
    })
}

/// Single planning request.
#[derive(Clone, Copy, Debug)]
pub struct SearchQuery<'p> {
    start: CellCoord,
    goal: CellCoord,
    time_offset: u64,
    previous: Option<&'p Plan>,
}

impl<'p> SearchQuery<'p> {
    /// Creates a query departing `start` at tick `time_offset`.
    #[must_use]
    pub const fn new(start: CellCoord, goal: CellCoord, time_offset: u64) -> Self {
        Self {
            start,
            goal,
            time_offset,
            previous: None,
        }
    }

    /// Attaches the plan being replaced; local search uses it as a seed.
    #[must_use]
    pub const fn with_previous(mut self, previous: &'p Plan) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Cell the path departs from.
    #[must_use]
    pub const fn start(&self) -> CellCoord {
        self.start
    }

    /// Cell the path must reach.
    #[must_use]
    pub const fn goal(&self) -> CellCoord {
        self.goal
    }

    /// Tick at which the agent stands on the start cell.
    #[must_use]
    pub const fn time_offset(&self) -> u64 {
        self.time_offset
    }

    /// Plan being replaced, if any.
    #[must_use]
    pub const fn previous(&self) -> Option<&'p Plan> {
        self.previous
    }
}

/// Result of a search call without the bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A feasible plan was found.
    Found(Plan),
    /// No feasible plan exists under the known schedule.
    Unreachable,
    /// The node-expansion cap was hit before the search concluded.
    ExpansionLimit,
}

/// Outcome of a search call together with the work it performed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    outcome: SearchOutcome,
    nodes_expanded: u64,
}

impl SearchResult {
    /// Creates a result.
    #[must_use]
    pub const fn new(outcome: SearchOutcome, nodes_expanded: u64) -> Self {
        Self {
            outcome,
            nodes_expanded,
        }
    }

    /// Outcome of the search.
    #[must_use]
    pub const fn outcome(&self) -> &SearchOutcome {
        &self.outcome
    }

    /// Nodes expanded, or candidate paths evaluated for local search.
    #[must_use]
    pub const fn nodes_expanded(&self) -> u64 {
        self.nodes_expanded
    }

    /// Plan found by the search, if any.
    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        match &self.outcome {
            SearchOutcome::Found(plan) => Some(plan),
            SearchOutcome::Unreachable | SearchOutcome::ExpansionLimit => None,
        }
    }

    /// Consumes the result, yielding the plan if one was found.
    #[must_use]
    pub fn into_plan(self) -> Option<Plan> {
        match self.outcome {
            SearchOutcome::Found(plan) => Some(plan),
            SearchOutcome::Unreachable | SearchOutcome::ExpansionLimit => None,
        }
    }
}

/// Capability shared by every path-finding strategy.
pub trait SearchStrategy {
    /// Algorithm implemented by the strategy.
    fn algorithm(&self) -> Algorithm;

    /// Searches for a path satisfying `query` within `context`.
    fn find_path(&mut self, context: &SearchContext<'_>, query: &SearchQuery<'_>) -> SearchResult;
}

/// Strategy selected by an [`Algorithm`] value.
#[derive(Clone, Debug)]
pub enum Search {
    /// Breadth-first search.
    BreadthFirst(BreadthFirst),
    /// Uniform-cost search.
    UniformCost(UniformCost),
    /// A* search.
    AStar(AStar),
    /// Hill climbing with random restarts.
    HillClimbing(HillClimbing),
    /// Simulated annealing.
    Annealing(SimulatedAnnealing),
}

impl Search {
    /// Builds the strategy for `algorithm` with explicit tuning.
    #[must_use]
    pub fn new(
        algorithm: Algorithm,
        heuristic: Heuristic,
        local_search: LocalSearchConfig,
        seed: u64,
    ) -> Self {
        match algorithm {
            Algorithm::BreadthFirst => Self::BreadthFirst(BreadthFirst),
            Algorithm::UniformCost => Self::UniformCost(UniformCost),
            Algorithm::AStar => Self::AStar(AStar::new(heuristic)),
            Algorithm::HillClimbing => Self::HillClimbing(HillClimbing::new(local_search, seed)),
            Algorithm::Annealing => Self::Annealing(SimulatedAnnealing::new(local_search, seed)),
        }
    }

    /// Builds the strategy for `algorithm` using the mission's tuning.
    #[must_use]
    pub fn from_config(algorithm: Algorithm, config: &MissionConfig) -> Self {
        Self::new(
            algorithm,
            config.heuristic,
            config.local_search,
            config.seed,
        )
    }
}

impl SearchStrategy for Search {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::BreadthFirst(strategy) => strategy.algorithm(),
            Self::UniformCost(strategy) => strategy.algorithm(),
            Self::AStar(strategy) => strategy.algorithm(),
            Self::HillClimbing(strategy) => strategy.algorithm(),
            Self::Annealing(strategy) => strategy.algorithm(),
        }
    }

    fn find_path(&mut self, context: &SearchContext<'_>, query: &SearchQuery<'_>) -> SearchResult {
        let result = match self {
            Self::BreadthFirst(strategy) => strategy.find_path(context, query),
            Self::UniformCost(strategy) => strategy.find_path(context, query),
            Self::AStar(strategy) => strategy.find_path(context, query),
            Self::HillClimbing(strategy) => strategy.find_path(context, query),
            Self::Annealing(strategy) => strategy.find_path(context, query),
        };

        match result.plan() {
            Some(plan) => tracing::debug!(
                algorithm = %self.algorithm(),
                start = %query.start(),
                time = query.time_offset(),
                cost = plan.cost(),
                steps = plan.steps(),
                nodes_expanded = result.nodes_expanded(),
                "search found a plan"
            ),
            None => tracing::debug!(
                algorithm = %self.algorithm(),
                start = %query.start(),
                time = query.time_offset(),
                outcome = ?result.outcome(),
                nodes_expanded = result.nodes_expanded(),
                "search found no plan"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Connectivity;
    use courier_world::{
        schedule::{DynamicObstacle, MovementRule, Timetable},
        ObstacleSchedule, TerrainCost,
    };

    #[test]
    fn path_cost_skips_the_first_cell_and_rejects_walls() {
        let grid = Grid::open(1, 3, Connectivity::Four)
            .and_then(|grid| grid.with_terrain(CellCoord::new(0, 0), TerrainCost::WATER))
            .and_then(|grid| grid.with_terrain(CellCoord::new(0, 2), TerrainCost::HILLS))
            .expect("grid");
        let cells = [
            CellCoord::new(0, 0),
            CellCoord::new(0, 1),
            CellCoord::new(0, 2),
        ];
        assert_eq!(path_cost(&grid, &cells), Some(3));

        let walled = grid
            .with_terrain(CellCoord::new(0, 1), TerrainCost::Impassable)
            .expect("grid");
        assert_eq!(path_cost(&walled, &cells), None);
    }

    #[test]
    fn collisions_use_arrival_ticks() {
        let grid = Grid::open(1, 3, Connectivity::Four).expect("grid");
        let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
            "parked",
            MovementRule::Timetable(Timetable::new(vec![(6, CellCoord::new(0, 2))])),
        )]);
        let context = SearchContext::new(&grid, schedule.snapshot(None));
        let cells = [
            CellCoord::new(0, 0),
            CellCoord::new(0, 1),
            CellCoord::new(0, 2),
        ];

        assert_eq!(context.collisions(&cells, 4), 1);
        assert_eq!(context.collisions(&cells, 3), 0);
    }

    #[test]
    fn search_dispatches_by_algorithm() {
        let config = MissionConfig::default();
        for algorithm in Algorithm::ALL {
            assert_eq!(Search::from_config(algorithm, &config).algorithm(), algorithm);
        }
    }
}
