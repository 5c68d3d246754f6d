//! Text and JSON rendering of mission results.

use std::{collections::HashSet, fmt, fmt::Write as _, path::Path, time::Duration};

use courier_core::{Algorithm, CellCoord, FailureReason, MissionConfig};
use courier_system_controller::MissionOutcome;
use courier_world::{query, TerrainCost, World};
use serde::Serialize;

/// Summary of a single mission, printed by `courier plan`.
#[derive(Debug, Serialize)]
pub(crate) struct MissionReport {
    map: String,
    algorithm: Algorithm,
    replan_algorithm: Algorithm,
    status: &'static str,
    failure: Option<FailureReason>,
    path: Vec<CellCoord>,
    total_cost: u64,
    fuel_remaining: u64,
    elapsed: u64,
    replan_count: u32,
    nodes_expanded: u64,
    wall_time_ms: f64,
}

impl MissionReport {
    pub(crate) fn new(
        map: &Path,
        config: &MissionConfig,
        outcome: &MissionOutcome,
        wall_time: Duration,
    ) -> Self {
        let (status, failure) = split_status(outcome);
        Self {
            map: map.display().to_string(),
            algorithm: config.algorithm,
            replan_algorithm: config.effective_replan_algorithm(),
            status,
            failure,
            path: outcome.trajectory.clone(),
            total_cost: outcome.cost,
            fuel_remaining: outcome.fuel_remaining,
            elapsed: outcome.elapsed,
            replan_count: outcome.replan_count,
            nodes_expanded: outcome.nodes_expanded,
            wall_time_ms: millis(wall_time),
        }
    }
}

impl fmt::Display for MissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Delivery Results ===")?;
        match self.failure {
            Some(reason) => writeln!(f, "status: {} ({reason})", self.status)?,
            None => writeln!(f, "status: {}", self.status)?,
        }
        writeln!(
            f,
            "algorithm: {} (replanning: {})",
            self.algorithm, self.replan_algorithm
        )?;
        writeln!(f, "path: {}", format_path(&self.path))?;
        writeln!(f, "total cost: {}", self.total_cost)?;
        writeln!(f, "fuel remaining: {}", self.fuel_remaining)?;
        writeln!(f, "elapsed: {}", self.elapsed)?;
        writeln!(f, "replans: {}", self.replan_count)?;
        writeln!(f, "nodes expanded: {}", self.nodes_expanded)?;
        writeln!(f, "wall time: {:.3} ms", self.wall_time_ms)
    }
}

/// One algorithm run on one map, printed by `courier experiment`.
#[derive(Debug, Serialize)]
pub(crate) struct ExperimentRow {
    pub(crate) map: String,
    algorithm: Algorithm,
    status: &'static str,
    failure: Option<FailureReason>,
    total_cost: u64,
    elapsed: u64,
    replan_count: u32,
    nodes_expanded: u64,
    wall_time_ms: f64,
}

impl ExperimentRow {
    pub(crate) fn new(
        map: &Path,
        algorithm: Algorithm,
        outcome: &MissionOutcome,
        wall_time: Duration,
    ) -> Self {
        let (status, failure) = split_status(outcome);
        let map = map
            .file_name()
            .map_or_else(|| map.display().to_string(), |name| name.to_string_lossy().into_owned());
        Self {
            map,
            algorithm,
            status,
            failure,
            total_cost: outcome.cost,
            elapsed: outcome.elapsed,
            replan_count: outcome.replan_count,
            nodes_expanded: outcome.nodes_expanded,
            wall_time_ms: millis(wall_time),
        }
    }
}

/// Formats experiment rows as an aligned comparison table.
pub(crate) fn render_table(rows: &[ExperimentRow]) -> String {
    let map_width = rows
        .iter()
        .map(|row| row.map.len())
        .chain(std::iter::once("map".len()))
        .max()
        .unwrap_or(3);

    let mut table = String::new();
    let _ = writeln!(
        table,
        "{:<map_width$}  {:<13}  {:<24}  {:>6}  {:>7}  {:>7}  {:>9}  {:>10}",
        "map", "algorithm", "status", "cost", "elapsed", "replans", "expanded", "time (ms)"
    );
    for row in rows {
        let status = match row.failure {
            Some(reason) => format!("{} ({reason})", row.status),
            None => row.status.to_owned(),
        };
        let _ = writeln!(
            table,
            "{:<map_width$}  {:<13}  {:<24}  {:>6}  {:>7}  {:>7}  {:>9}  {:>10.3}",
            row.map,
            row.algorithm.name(),
            status,
            row.total_cost,
            row.elapsed,
            row.replan_count,
            row.nodes_expanded,
            row.wall_time_ms
        );
    }
    table
}

/// Draws the map with the travelled path overlaid as `*`.
pub(crate) fn render_map(world: &World, trajectory: &[CellCoord]) -> String {
    let grid = query::grid(world);
    let visited: HashSet<CellCoord> = trajectory.iter().copied().collect();

    let mut canvas = String::new();
    for row in 0..grid.rows() {
        let line: Vec<String> = (0..grid.columns())
            .map(|column| {
                let cell = CellCoord::new(row, column);
                let symbol = if cell == query::start(world) {
                    'S'
                } else if cell == query::goal(world) {
                    'G'
                } else if visited.contains(&cell) {
                    '*'
                } else {
                    grid.cost(cell).map_or('?', terrain_symbol)
                };
                symbol.to_string()
            })
            .collect();
        let _ = writeln!(canvas, "{}", line.join(" "));
    }
    canvas
}

fn terrain_symbol(cost: TerrainCost) -> char {
    match cost {
        TerrainCost::Impassable => 'X',
        TerrainCost::Finite(1) => '.',
        TerrainCost::Finite(2) => 'h',
        TerrainCost::Finite(3) => '^',
        TerrainCost::Finite(4) => '~',
        TerrainCost::Finite(value) => char::from_digit(value, 10).unwrap_or('+'),
    }
}

fn split_status(outcome: &MissionOutcome) -> (&'static str, Option<FailureReason>) {
    match outcome.status {
        courier_core::MissionStatus::Succeeded => ("SUCCEEDED", None),
        courier_core::MissionStatus::Failed(reason) => ("FAILED", Some(reason)),
    }
}

fn format_path(path: &[CellCoord]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
