#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Courier delivery engine.
//!
//! This crate defines the value types that connect the map loader, the
//! search strategies, the execution controller, and the command-line adapter.
//! The controller drives a single agent through simulated ticks and reports
//! every transition as an [`Event`] so adapters can present progress without
//! reaching into controller state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of a single grid cell expressed as row and column coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    row: u32,
    column: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.row.abs_diff(other.row) + self.column.abs_diff(other.column)
    }

    /// Computes the Chebyshev (king move) distance between two cell coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.row
            .abs_diff(other.row)
            .max(self.column.abs_diff(other.column))
    }

    /// Computes the straight-line distance between two cell centres.
    #[must_use]
    pub fn euclidean_distance(self, other: CellCoord) -> f64 {
        let rows = f64::from(self.row.abs_diff(other.row));
        let columns = f64::from(self.column.abs_diff(other.column));
        rows.hypot(columns)
    }

    /// Reports whether a single move under `connectivity` joins the two cells.
    #[must_use]
    pub fn is_adjacent(self, other: CellCoord, connectivity: Connectivity) -> bool {
        let rows = self.row.abs_diff(other.row);
        let columns = self.column.abs_diff(other.column);
        match connectivity {
            Connectivity::Four => rows + columns == 1,
            Connectivity::Eight => rows <= 1 && columns <= 1 && rows + columns > 0,
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Movement model that determines which cells neighbour each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Orthogonal moves only.
    #[default]
    Four,
    /// Orthogonal and diagonal moves.
    Eight,
}

/// Distance estimates available to the informed search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heuristic {
    /// Sum of row and column offsets.
    #[default]
    Manhattan,
    /// Straight-line distance, rounded down.
    Euclidean,
    /// Largest of the row and column offsets.
    Chebyshev,
}

impl Heuristic {
    /// Returns a heuristic that never overestimates the number of moves under
    /// `connectivity`.
    ///
    /// Diagonal moves make Manhattan and Euclidean distances overestimate the
    /// move count, so both collapse to Chebyshev on 8-connected grids.
    #[must_use]
    pub const fn admissible_for(self, connectivity: Connectivity) -> Self {
        match connectivity {
            Connectivity::Four => self,
            Connectivity::Eight => Self::Chebyshev,
        }
    }

    /// Estimates the remaining cost from `from` to `to`.
    ///
    /// The move count estimate is scaled by `min_step_cost`, the cheapest
    /// terrain cost on the grid, so every move is assumed to be as cheap as
    /// possible.
    #[must_use]
    pub fn estimate(self, from: CellCoord, to: CellCoord, min_step_cost: u32) -> u64 {
        let moves = match self {
            Self::Manhattan => u64::from(from.manhattan_distance(to)),
            Self::Euclidean => from.euclidean_distance(to).floor() as u64,
            Self::Chebyshev => u64::from(from.chebyshev_distance(to)),
        };
        moves.saturating_mul(u64::from(min_step_cost))
    }
}

/// Search algorithms selectable for planning and replanning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Breadth-first search minimising the number of moves.
    #[serde(rename = "bfs")]
    BreadthFirst,
    /// Uniform-cost search minimising accumulated terrain cost.
    #[serde(rename = "ucs")]
    UniformCost,
    /// A* search guided by an admissible heuristic.
    #[default]
    #[serde(rename = "astar")]
    AStar,
    /// Hill climbing over path mutations with random restarts.
    #[serde(rename = "hill-climbing")]
    HillClimbing,
    /// Simulated annealing over path mutations.
    #[serde(rename = "annealing")]
    Annealing,
}

impl Algorithm {
    /// Every algorithm in a stable order, used by comparative experiments.
    pub const ALL: [Algorithm; 5] = [
        Self::BreadthFirst,
        Self::UniformCost,
        Self::AStar,
        Self::HillClimbing,
        Self::Annealing,
    ];

    /// Short identifier used in reports and configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BreadthFirst => "bfs",
            Self::UniformCost => "ucs",
            Self::AStar => "astar",
            Self::HillClimbing => "hill-climbing",
            Self::Annealing => "annealing",
        }
    }

    /// Reports whether the algorithm improves a seed path instead of
    /// exploring the state space systematically.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::HillClimbing | Self::Annealing)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered route from a start cell to a goal cell with its total cost.
///
/// The first cell is where the route begins and is not charged; every later
/// cell contributes its terrain cost. Plans are disposable: the controller
/// replaces them wholesale and never edits one in place.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plan {
    cells: Vec<CellCoord>,
    cost: u64,
}

impl Plan {
    /// Creates a plan from its cells and total cost.
    #[must_use]
    pub fn new(cells: Vec<CellCoord>, cost: u64) -> Self {
        Self { cells, cost }
    }

    /// Cells visited by the plan, starting with the origin.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// Total terrain cost charged for following the plan.
    #[must_use]
    pub const fn cost(&self) -> u64 {
        self.cost
    }

    /// Number of moves required to follow the plan.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    /// Cell the plan starts from.
    #[must_use]
    pub fn origin(&self) -> Option<CellCoord> {
        self.cells.first().copied()
    }

    /// Cell the plan ends at.
    #[must_use]
    pub fn destination(&self) -> Option<CellCoord> {
        self.cells.last().copied()
    }

    /// Cell occupied after `step` moves along the plan.
    #[must_use]
    pub fn cell_at(&self, step: usize) -> Option<CellCoord> {
        self.cells.get(step).copied()
    }

    /// Reports whether every consecutive pair of cells is adjacent.
    #[must_use]
    pub fn is_contiguous(&self, connectivity: Connectivity) -> bool {
        self.cells
            .windows(2)
            .all(|pair| pair[0].is_adjacent(pair[1], connectivity))
    }

    /// Consumes the plan, yielding its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<CellCoord> {
        self.cells
    }
}

/// Terminal reasons a mission can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// No path to the goal existed when the mission started.
    Unreachable,
    /// Replanning was exhausted without finding a feasible path.
    NoFeasiblePlan,
    /// The next move would have consumed more fuel than remained.
    OutOfFuel,
    /// The next move would have exceeded the time limit.
    TimeExceeded,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unreachable => "Unreachable",
            Self::NoFeasiblePlan => "NoFeasiblePlan",
            Self::OutOfFuel => "OutOfFuel",
            Self::TimeExceeded => "TimeExceeded",
        };
        f.write_str(label)
    }
}

/// Binary outcome of a mission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionStatus {
    /// The agent reached the goal within its fuel and time budgets.
    Succeeded,
    /// The mission terminated without delivering.
    Failed(FailureReason),
}

impl MissionStatus {
    /// Reports whether the mission delivered successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("SUCCEEDED"),
            Self::Failed(reason) => write!(f, "FAILED: {reason}"),
        }
    }
}

/// Notifications emitted by the controller while a mission runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A search produced a plan that the controller adopted.
    PlanComputed {
        /// Cell the plan starts from.
        origin: CellCoord,
        /// Tick at which the plan was computed.
        time: u64,
        /// Algorithm that produced the plan.
        algorithm: Algorithm,
        /// Total cost of the plan.
        cost: u64,
        /// Number of moves in the plan.
        steps: usize,
        /// Nodes expanded by the search.
        nodes_expanded: u64,
        /// Whether the plan replaced an invalidated one.
        replan: bool,
    },
    /// A search failed to produce a plan.
    PlanNotFound {
        /// Cell the search started from.
        origin: CellCoord,
        /// Tick at which the search ran.
        time: u64,
        /// Algorithm that failed.
        algorithm: Algorithm,
        /// Nodes expanded before the search gave up.
        nodes_expanded: u64,
    },
    /// The agent moved one cell along its plan.
    StepTaken {
        /// Cell the agent occupied before moving.
        from: CellCoord,
        /// Cell the agent occupies after moving.
        to: CellCoord,
        /// Tick at which the agent arrived.
        time: u64,
        /// Terrain cost charged for the move.
        step_cost: u32,
        /// Fuel left after the move.
        fuel_remaining: u64,
    },
    /// A dynamic obstacle made the next planned move infeasible.
    ReplanTriggered {
        /// Cell the agent occupies.
        cell: CellCoord,
        /// Cell the agent intended to enter.
        blocked: CellCoord,
        /// Tick at which the obstacle occupies the blocked cell.
        time: u64,
    },
    /// The agent held position for one tick while waiting to replan.
    Waited {
        /// Cell the agent occupies.
        cell: CellCoord,
        /// Tick reached after waiting.
        time: u64,
    },
    /// The mission reached a terminal state.
    MissionFinished {
        /// Final status of the mission.
        status: MissionStatus,
        /// Cell the agent finished in.
        cell: CellCoord,
        /// Elapsed ticks when the mission ended.
        time: u64,
    },
}

/// How far into the future the planner may observe obstacle positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Foresight {
    /// The full obstacle schedule is known in advance.
    Full,
    /// Obstacle positions are known for the given number of ticks ahead.
    Ticks(u64),
}

impl Foresight {
    /// Last tick whose obstacle positions are known when planning at `now`.
    ///
    /// The next tick is always visible, so `Ticks(0)` behaves like `Ticks(1)`.
    #[must_use]
    pub const fn horizon(self, now: u64) -> Option<u64> {
        match self {
            Self::Full => None,
            Self::Ticks(0) => Some(now.saturating_add(1)),
            Self::Ticks(ticks) => Some(now.saturating_add(ticks)),
        }
    }
}

impl Default for Foresight {
    fn default() -> Self {
        Self::Ticks(1)
    }
}

/// Tuning parameters for the local-search strategies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSearchConfig {
    /// Number of hill-climbing restarts.
    pub restarts: u32,
    /// Mutations attempted per restart.
    pub iterations: u32,
    /// Starting temperature for simulated annealing.
    pub initial_temperature: f64,
    /// Multiplicative cooling applied after every annealing iteration.
    pub cooling_rate: f64,
    /// Maximum cells explored when searching for a detour segment.
    pub detour_budget: usize,
    /// Maximum length of a random walk used to seed a path.
    pub walk_length: usize,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            restarts: 10,
            iterations: 100,
            initial_temperature: 1000.0,
            cooling_rate: 0.95,
            detour_budget: 100,
            walk_length: 50,
        }
    }
}

/// Mission parameters accepted by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Algorithm used for the initial plan.
    pub algorithm: Algorithm,
    /// Algorithm used when replanning; defaults to `algorithm`.
    pub replan_algorithm: Option<Algorithm>,
    /// Heuristic used by A*.
    pub heuristic: Heuristic,
    /// Fuel available at the start of the mission.
    pub fuel: u64,
    /// Maximum number of ticks the mission may take.
    pub time_limit: u64,
    /// How far ahead the planner sees dynamic obstacles.
    pub foresight: Foresight,
    /// Consecutive failed replanning attempts tolerated before giving up.
    pub max_replan_attempts: u32,
    /// Node-expansion cap applied to every search call.
    pub max_expansions: u64,
    /// Seed for the local-search random number generator.
    pub seed: u64,
    /// Local-search tuning.
    pub local_search: LocalSearchConfig,
}

impl MissionConfig {
    /// Algorithm used when the current plan is invalidated.
    #[must_use]
    pub fn effective_replan_algorithm(&self) -> Algorithm {
        self.replan_algorithm.unwrap_or(self.algorithm)
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::AStar,
            replan_algorithm: None,
            heuristic: Heuristic::Manhattan,
            fuel: 100,
            time_limit: 100,
            foresight: Foresight::default(),
            max_replan_attempts: 5,
            max_expansions: 200_000,
            seed: 0x5eed_c0de_0000_0001,
            local_search: LocalSearchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Algorithm, CellCoord, Connectivity, FailureReason, Foresight, Heuristic, MissionConfig,
        MissionStatus, Plan,
    };

    #[test]
    fn distances_match_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
        assert_eq!(origin.chebyshev_distance(destination), 3);
        assert!((origin.euclidean_distance(destination) - 13f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn adjacency_follows_connectivity() {
        let centre = CellCoord::new(2, 2);
        assert!(centre.is_adjacent(CellCoord::new(1, 2), Connectivity::Four));
        assert!(!centre.is_adjacent(CellCoord::new(1, 1), Connectivity::Four));
        assert!(centre.is_adjacent(CellCoord::new(1, 1), Connectivity::Eight));
        assert!(!centre.is_adjacent(centre, Connectivity::Eight));
        assert!(!centre.is_adjacent(CellCoord::new(4, 2), Connectivity::Eight));
    }

    #[test]
    fn heuristics_collapse_to_chebyshev_with_diagonals() {
        assert_eq!(
            Heuristic::Manhattan.admissible_for(Connectivity::Eight),
            Heuristic::Chebyshev
        );
        assert_eq!(
            Heuristic::Euclidean.admissible_for(Connectivity::Four),
            Heuristic::Euclidean
        );
    }

    #[test]
    fn heuristic_scales_with_minimum_step_cost() {
        let from = CellCoord::new(0, 0);
        let to = CellCoord::new(3, 4);
        assert_eq!(Heuristic::Manhattan.estimate(from, to, 2), 14);
        assert_eq!(Heuristic::Euclidean.estimate(from, to, 1), 5);
        assert_eq!(Heuristic::Chebyshev.estimate(from, to, 3), 12);
    }

    #[test]
    fn plan_reports_contiguity() {
        let straight = Plan::new(
            vec![CellCoord::new(0, 0), CellCoord::new(0, 1), CellCoord::new(1, 1)],
            2,
        );
        assert!(straight.is_contiguous(Connectivity::Four));
        assert_eq!(straight.steps(), 2);

        let jump = Plan::new(vec![CellCoord::new(0, 0), CellCoord::new(1, 1)], 1);
        assert!(!jump.is_contiguous(Connectivity::Four));
        assert!(jump.is_contiguous(Connectivity::Eight));
    }

    #[test]
    fn foresight_horizon_is_relative_to_now() {
        assert_eq!(Foresight::Ticks(2).horizon(5), Some(7));
        assert_eq!(Foresight::Ticks(0).horizon(5), Some(6));
        assert_eq!(Foresight::Full.horizon(5), None);
    }

    #[test]
    fn mission_status_display_names_reason() {
        assert_eq!(MissionStatus::Succeeded.to_string(), "SUCCEEDED");
        assert_eq!(
            MissionStatus::Failed(FailureReason::OutOfFuel).to_string(),
            "FAILED: OutOfFuel"
        );
    }

    #[test]
    fn mission_config_reads_partial_toml() {
        let config: MissionConfig = toml::from_str(
            r#"
            algorithm = "ucs"
            replan_algorithm = "annealing"
            fuel = 42
            foresight = "full"

            [local_search]
            restarts = 3
            "#,
        )
        .expect("config parses");

        assert_eq!(config.algorithm, Algorithm::UniformCost);
        assert_eq!(config.effective_replan_algorithm(), Algorithm::Annealing);
        assert_eq!(config.fuel, 42);
        assert_eq!(config.time_limit, MissionConfig::default().time_limit);
        assert_eq!(config.foresight, Foresight::Full);
        assert_eq!(config.local_search.restarts, 3);
        assert_eq!(config.local_search.iterations, 100);
    }

    #[test]
    fn foresight_ticks_read_from_toml_table() {
        let config: MissionConfig =
            toml::from_str("foresight = { ticks = 3 }").expect("config parses");
        assert_eq!(config.foresight, Foresight::Ticks(3));
    }

    #[test]
    fn plan_round_trips_through_bincode() {
        let plan = Plan::new(vec![CellCoord::new(5, 7), CellCoord::new(5, 8)], 3);
        let bytes = bincode::serialize(&plan).expect("serialize");
        let restored: Plan = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, plan);
    }
}
