//! Text map loader.
//!
//! A map is a block of terrain rows plus optional directives. Lines starting
//! with `#` are comments. Terrain symbols:
//!
//! | Symbol | Meaning |
//! |---|---|
//! | `.` | flat ground, cost 1 |
//! | `1`-`9` | explicit cost |
//! | `h` | hills, cost 2 |
//! | `^` | mountains, cost 3 |
//! | `~` | water, cost 4 |
//! | `X` | wall |
//! | `S` | start, cost 1 |
//! | `G` | goal, cost 1 |
//!
//! Directives:
//!
//! ```text
//! connectivity 8
//! obstacle car bounce 0,2 4,2 phase=6
//! obstacle bus loop 1,1 1,2 2,2 2,1
//! obstacle van path 0:0,4 6:4,4
//! obstacle bike at 3:2,2 4:2,3
//! ```

use std::{fs, path::Path};

use courier_core::{CellCoord, Connectivity};
use thiserror::Error;

use crate::{
    grid::{Grid, GridError, TerrainCost},
    schedule::{
        Bounce, DynamicObstacle, Loop, MovementRule, ObstacleSchedule, Timetable, Waypoints,
    },
    World,
};

/// Reasons a map description is malformed.
#[derive(Debug, Error)]
pub enum MapError {
    /// The map file could not be read.
    #[error("could not read map file {path}")]
    Io {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// No terrain rows were present.
    #[error("map contains no terrain rows")]
    Empty,
    /// A terrain row differs in width from the first row.
    #[error("line {line}: expected {expected} cells, found {found}")]
    RaggedRow {
        /// One-based line number.
        line: usize,
        /// Width of the first terrain row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// A terrain row contained an unrecognised symbol.
    #[error("line {line}: unknown terrain symbol '{symbol}'")]
    UnknownSymbol {
        /// One-based line number.
        line: usize,
        /// Offending symbol.
        symbol: char,
    },
    /// No `S` cell was present.
    #[error("map has no start cell 'S'")]
    MissingStart,
    /// No `G` cell was present.
    #[error("map has no goal cell 'G'")]
    MissingGoal,
    /// More than one `S` or `G` cell was present.
    #[error("line {line}: duplicate '{symbol}' cell")]
    Duplicate {
        /// One-based line number.
        line: usize,
        /// Duplicated marker.
        symbol: char,
    },
    /// A directive line could not be parsed.
    #[error("line {line}: {reason}")]
    InvalidDirective {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        reason: String,
    },
    /// An obstacle references a cell outside the grid.
    #[error("line {line}: obstacle '{id}' visits {cell} outside the grid")]
    ObstacleOutOfBounds {
        /// One-based line number.
        line: usize,
        /// Obstacle identifier.
        id: String,
        /// Offending cell.
        cell: CellCoord,
    },
    /// Two obstacles share an identifier.
    #[error("line {line}: obstacle '{id}' is defined twice")]
    DuplicateObstacle {
        /// One-based line number.
        line: usize,
        /// Duplicated identifier.
        id: String,
    },
    /// The terrain could not form a valid grid.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Reads and parses a map file.
pub fn load_file(path: &Path) -> Result<World, MapError> {
    let source = fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load(&source)
}

/// Parses a textual map description into a [`World`].
pub fn load(source: &str) -> Result<World, MapError> {
    let mut connectivity = Connectivity::Four;
    let mut rows: Vec<Vec<TerrainCost>> = Vec::new();
    let mut start: Option<CellCoord> = None;
    let mut goal: Option<CellCoord> = None;
    let mut obstacles: Vec<(usize, DynamicObstacle, Vec<CellCoord>)> = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut words = trimmed.split_whitespace();
        match words.next() {
            Some("connectivity") => {
                connectivity = parse_connectivity(line, words.next())?;
                continue;
            }
            Some("obstacle") => {
                let (obstacle, cells) = parse_obstacle(line, words)?;
                if obstacles
                    .iter()
                    .any(|(_, existing, _)| existing.id() == obstacle.id())
                {
                    return Err(MapError::DuplicateObstacle {
                        line,
                        id: obstacle.id().to_owned(),
                    });
                }
                obstacles.push((line, obstacle, cells));
                continue;
            }
            _ => {}
        }

        let row_index = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let mut row = Vec::new();
        for symbol in trimmed.chars().filter(|symbol| !symbol.is_whitespace()) {
            let column = u32::try_from(row.len()).unwrap_or(u32::MAX);
            let cell = CellCoord::new(row_index, column);
            let cost = match symbol {
                'S' => {
                    mark(&mut start, cell, line, symbol)?;
                    TerrainCost::FLAT
                }
                'G' => {
                    mark(&mut goal, cell, line, symbol)?;
                    TerrainCost::FLAT
                }
                _ => terrain_for(symbol).ok_or(MapError::UnknownSymbol { line, symbol })?,
            };
            row.push(cost);
        }

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(MapError::RaggedRow {
                    line,
                    expected: first.len(),
                    found: row.len(),
                });
            }
        }
        rows.push(row);
    }

    let height = u32::try_from(rows.len()).unwrap_or(u32::MAX);
    let width = rows
        .first()
        .map(|row| u32::try_from(row.len()).unwrap_or(u32::MAX))
        .ok_or(MapError::Empty)?;
    let start = start.ok_or(MapError::MissingStart)?;
    let goal = goal.ok_or(MapError::MissingGoal)?;

    let grid = Grid::new(
        height,
        width,
        connectivity,
        rows.into_iter().flatten().collect(),
    )?;

    let mut schedule = Vec::with_capacity(obstacles.len());
    for (line, obstacle, cells) in obstacles {
        if let Some(cell) = cells.into_iter().find(|cell| !grid.contains(*cell)) {
            return Err(MapError::ObstacleOutOfBounds {
                line,
                id: obstacle.id().to_owned(),
                cell,
            });
        }
        schedule.push(obstacle);
    }

    Ok(World::new(
        grid,
        ObstacleSchedule::new(schedule),
        start,
        goal,
    )?)
}

fn terrain_for(symbol: char) -> Option<TerrainCost> {
    match symbol {
        '.' => Some(TerrainCost::FLAT),
        'h' => Some(TerrainCost::HILLS),
        '^' => Some(TerrainCost::MOUNTAINS),
        '~' => Some(TerrainCost::WATER),
        'X' => Some(TerrainCost::Impassable),
        '1'..='9' => symbol.to_digit(10).map(TerrainCost::Finite),
        _ => None,
    }
}

fn mark(
    slot: &mut Option<CellCoord>,
    cell: CellCoord,
    line: usize,
    symbol: char,
) -> Result<(), MapError> {
    if slot.is_some() {
        return Err(MapError::Duplicate { line, symbol });
    }
    *slot = Some(cell);
    Ok(())
}

fn parse_connectivity(line: usize, value: Option<&str>) -> Result<Connectivity, MapError> {
    match value {
        Some("4") => Ok(Connectivity::Four),
        Some("8") => Ok(Connectivity::Eight),
        other => Err(MapError::InvalidDirective {
            line,
            reason: format!("connectivity must be 4 or 8, found {other:?}"),
        }),
    }
}

fn parse_obstacle<'a>(
    line: usize,
    mut words: impl Iterator<Item = &'a str>,
) -> Result<(DynamicObstacle, Vec<CellCoord>), MapError> {
    let invalid = |reason: String| MapError::InvalidDirective { line, reason };

    let id = words
        .next()
        .ok_or_else(|| invalid("obstacle is missing an identifier".to_owned()))?;
    let kind = words
        .next()
        .ok_or_else(|| invalid(format!("obstacle '{id}' is missing a movement rule")))?;
    let arguments: Vec<&str> = words.collect();

    let (rule, cells) = match kind {
        "at" | "path" => {
            let entries = arguments
                .iter()
                .map(|argument| {
                    parse_timed_cell(argument).ok_or_else(|| {
                        invalid(format!("expected <tick>:<row>,<col>, found '{argument}'"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if entries.is_empty() {
                return Err(invalid(format!("obstacle '{id}' lists no positions")));
            }
            let cells = entries.iter().map(|(_, cell)| *cell).collect();
            let rule = if kind == "at" {
                MovementRule::Timetable(Timetable::new(entries))
            } else {
                let waypoints = Waypoints::new(entries)
                    .ok_or_else(|| invalid(format!("obstacle '{id}' lists no keyframes")))?;
                MovementRule::Waypoints(waypoints)
            };
            (rule, cells)
        }
        "bounce" | "loop" => {
            let mut phase = 0;
            let mut cells = Vec::new();
            for argument in &arguments {
                if let Some(value) = argument.strip_prefix("phase=") {
                    phase = value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("invalid phase '{value}'")))?;
                } else {
                    let cell = parse_cell(argument)
                        .ok_or_else(|| invalid(format!("expected <row>,<col>, found '{argument}'")))?;
                    cells.push(cell);
                }
            }

            if kind == "bounce" {
                let [from, to] = cells.as_slice() else {
                    return Err(invalid(format!(
                        "bounce obstacle '{id}' needs exactly two cells, found {}",
                        cells.len()
                    )));
                };
                let rule = MovementRule::Bounce(Bounce::new(*from, *to, phase));
                (rule, cells)
            } else {
                let route = Loop::new(cells.clone(), phase)
                    .ok_or_else(|| invalid(format!("loop obstacle '{id}' lists no cells")))?;
                (MovementRule::Loop(route), cells)
            }
        }
        other => {
            return Err(invalid(format!(
                "unknown movement rule '{other}' for obstacle '{id}'"
            )))
        }
    };

    Ok((DynamicObstacle::new(id, rule), cells))
}

fn parse_cell(value: &str) -> Option<CellCoord> {
    let (row, column) = value.split_once(',')?;
    Some(CellCoord::new(
        row.trim().parse().ok()?,
        column.trim().parse().ok()?,
    ))
}

fn parse_timed_cell(value: &str) -> Option<(u64, CellCoord)> {
    let (time, cell) = value.split_once(':')?;
    Some((time.trim().parse().ok()?, parse_cell(cell)?))
}
