//! Local search over whole paths.
//!
//! Both strategies start from a seed path (the suffix of the plan being
//! replaced when it is still collision-free, otherwise a breadth-first path)
//! and repeatedly splice a short detour between
//! two of its cells. Candidates are scored by terrain cost plus a penalty per
//! collision with a wall or a known obstacle; only a collision-free candidate
//! is ever returned.

use std::collections::{HashMap, VecDeque};

use courier_core::{Algorithm, CellCoord, LocalSearchConfig, Plan};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    path_cost,
    systematic::{preflight, BreadthFirst},
    SearchContext, SearchOutcome, SearchQuery, SearchResult, SearchStrategy,
};

const COLLISION_PENALTY: u64 = 10_000;
const MAX_COOLING_RATE: f64 = 0.999;

/// Hill climbing with random restarts.
#[derive(Clone, Debug)]
pub struct HillClimbing {
    config: LocalSearchConfig,
    rng: ChaCha8Rng,
}

impl HillClimbing {
    /// Creates the strategy with a deterministic random stream.
    #[must_use]
    pub fn new(config: LocalSearchConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for HillClimbing {
    fn algorithm(&self) -> Algorithm {
        Algorithm::HillClimbing
    }

    fn find_path(&mut self, context: &SearchContext<'_>, query: &SearchQuery<'_>) -> SearchResult {
        if let Some(result) = preflight(context, query) {
            return result;
        }

        let mut search = PathMutator::new(context, query, self.config, &mut self.rng);
        let mut best = search.initial_seed();

        for _ in 0..self.config.restarts {
            let current = match &best {
                Some(candidate) => Some(candidate.clone()),
                None => search.random_walk(),
            };
            let Some(mut current) = current else {
                continue;
            };

            for _ in 0..self.config.iterations {
                if search.exhausted() {
                    break;
                }
                let Some(candidate) = search.mutate(&current) else {
                    continue;
                };
                if candidate.score < current.score {
                    current = candidate;
                }
            }

            if best
                .as_ref()
                .map_or(true, |known| current.score < known.score)
            {
                best = Some(current);
            }
        }

        search.finish(best)
    }
}

/// Simulated annealing over path mutations.
#[derive(Clone, Debug)]
pub struct SimulatedAnnealing {
    config: LocalSearchConfig,
    rng: ChaCha8Rng,
}

impl SimulatedAnnealing {
    /// Creates the strategy with a deterministic random stream.
    #[must_use]
    pub fn new(config: LocalSearchConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for SimulatedAnnealing {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Annealing
    }

    fn find_path(&mut self, context: &SearchContext<'_>, query: &SearchQuery<'_>) -> SearchResult {
        if let Some(result) = preflight(context, query) {
            return result;
        }

        let cooling_rate = self.config.cooling_rate.clamp(0.0, MAX_COOLING_RATE);
        let mut temperature = self.config.initial_temperature;
        let mut search = PathMutator::new(context, query, self.config, &mut self.rng);

        let mut seed = search.initial_seed();
        for _ in 0..self.config.restarts.max(1) {
            if seed.is_some() {
                break;
            }
            seed = search.random_walk();
        }
        let Some(mut current) = seed else {
            return search.finish(None);
        };
        let mut best = current.clone();

        while temperature > 1.0 && !search.exhausted() {
            if let Some(candidate) = search.mutate(&current) {
                let delta = current.score as f64 - candidate.score as f64;
                if candidate.score < current.score || search.sample() < (delta / temperature).exp()
                {
                    current = candidate;
                    if current.score < best.score {
                        best = current.clone();
                    }
                }
            }
            temperature *= cooling_rate;
        }

        search.finish(Some(best))
    }
}

/// Scored path under consideration.
#[derive(Clone, Debug)]
struct Candidate {
    cells: Vec<CellCoord>,
    cost: u64,
    collisions: usize,
    score: u64,
}

/// Per-call state shared by both local strategies.
struct PathMutator<'c, 'w, 'r> {
    context: &'c SearchContext<'w>,
    start: CellCoord,
    goal: CellCoord,
    time_offset: u64,
    previous: Option<&'c Plan>,
    config: LocalSearchConfig,
    rng: &'r mut ChaCha8Rng,
    evaluations: u64,
}

impl<'c, 'w, 'r> PathMutator<'c, 'w, 'r> {
    fn new(
        context: &'c SearchContext<'w>,
        query: &SearchQuery<'c>,
        config: LocalSearchConfig,
        rng: &'r mut ChaCha8Rng,
    ) -> Self {
        Self {
            context,
            start: query.start(),
            goal: query.goal(),
            time_offset: query.time_offset(),
            previous: query.previous(),
            config,
            rng,
            evaluations: 0,
        }
    }

    fn exhausted(&self) -> bool {
        self.evaluations >= self.context.max_expansions()
    }

    fn sample(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn evaluate(&mut self, cells: Vec<CellCoord>) -> Option<Candidate> {
        self.evaluations += 1;
        if cells.first() != Some(&self.start) || cells.last() != Some(&self.goal) {
            return None;
        }
        let cost = path_cost(self.context.grid(), &cells)?;
        let collisions = self.context.collisions(&cells, self.time_offset);
        let penalty = COLLISION_PENALTY.saturating_mul(u64::try_from(collisions).unwrap_or(u64::MAX));
        Some(Candidate {
            cells,
            cost,
            collisions,
            score: cost.saturating_add(penalty),
        })
    }

    /// Path to start improving from.
    ///
    /// The replaced plan is reused while it is still collision-free. Otherwise
    /// a breadth-first path is used, falling back to the colliding plan when
    /// no such path is found.
    fn initial_seed(&mut self) -> Option<Candidate> {
        match self.seed_from_previous() {
            Some(seed) if seed.collisions == 0 => Some(seed),
            previous => self.seed_from_search().or(previous),
        }
    }

    /// Remainder of the replaced plan from the current cell onwards.
    fn seed_from_previous(&mut self) -> Option<Candidate> {
        let previous = self.previous?;
        let position = previous.cells().iter().position(|cell| *cell == self.start)?;
        let suffix = previous.cells()[position..].to_vec();
        self.evaluate(suffix)
    }

    /// Fewest-moves path under the same context; its expansions count
    /// against the evaluation budget.
    fn seed_from_search(&mut self) -> Option<Candidate> {
        let query = SearchQuery::new(self.start, self.goal, self.time_offset);
        let result = BreadthFirst.find_path(self.context, &query);
        self.evaluations = self.evaluations.saturating_add(result.nodes_expanded());
        let plan = result.into_plan()?;
        self.evaluate(plan.into_cells())
    }

    /// Self-avoiding random walk that succeeds only if it stumbles onto the goal.
    fn random_walk(&mut self) -> Option<Candidate> {
        if self.exhausted() {
            return None;
        }

        let grid = self.context.grid();
        let mut cells = vec![self.start];
        let mut current = self.start;

        for time in (self.time_offset + 1..).take(self.config.walk_length) {
            let options: Vec<CellCoord> = grid
                .neighbors(current)
                .into_iter()
                .flatten()
                .filter(|neighbor| !cells.contains(neighbor))
                .filter(|neighbor| self.context.is_enterable(*neighbor, time))
                .collect();
            let Some(next) = options.choose(&mut *self.rng).copied() else {
                break;
            };
            cells.push(next);
            current = next;
            if current == self.goal {
                return self.evaluate(cells);
            }
        }

        self.evaluations += 1;
        None
    }

    /// Replaces a random segment of `current` with a short detour.
    fn mutate(&mut self, current: &Candidate) -> Option<Candidate> {
        if self.exhausted() || current.cells.len() < 3 {
            return None;
        }

        let last = current.cells.len() - 1;
        let from_index = self.rng.gen_range(0..last);
        let to_index = self.rng.gen_range(from_index + 1..=last);
        let departure = self
            .time_offset
            .saturating_add(u64::try_from(from_index).unwrap_or(u64::MAX));

        let detour = self.detour(
            current.cells[from_index],
            current.cells[to_index],
            to_index - from_index,
            departure,
        );
        let Some(detour) = detour else {
            self.evaluations += 1;
            return None;
        };

        let mut cells = Vec::with_capacity(current.cells.len() + detour.len());
        cells.extend_from_slice(&current.cells[..=from_index]);
        cells.extend(detour);
        cells.extend_from_slice(&current.cells[to_index + 1..]);
        self.evaluate(cells)
    }

    /// Bounded breadth-first detour from `from` to `to`, excluding `from`.
    ///
    /// The detour may be at most two moves longer than the segment it
    /// replaces and avoids cells known to be occupied on arrival.
    fn detour(
        &mut self,
        from: CellCoord,
        to: CellCoord,
        segment_moves: usize,
        departure: u64,
    ) -> Option<Vec<CellCoord>> {
        let grid = self.context.grid();
        let max_moves = segment_moves + 2;
        let mut parents: HashMap<CellCoord, Option<CellCoord>> = HashMap::new();
        let mut queue = VecDeque::new();
        let _ = parents.insert(from, None);
        queue.push_back((from, 0_usize));

        while let Some((cell, moves)) = queue.pop_front() {
            if cell == to {
                let mut detour = Vec::with_capacity(moves);
                let mut cursor = cell;
                while let Some(Some(parent)) = parents.get(&cursor).copied() {
                    detour.push(cursor);
                    cursor = parent;
                }
                detour.reverse();
                return Some(detour);
            }
            if moves >= max_moves {
                continue;
            }

            let arrival = departure.saturating_add(u64::try_from(moves + 1).unwrap_or(u64::MAX));
            let mut options: Vec<CellCoord> = grid.neighbors(cell).into_iter().flatten().collect();
            options.shuffle(&mut *self.rng);

            for neighbor in options {
                if parents.len() >= self.config.detour_budget {
                    return None;
                }
                if parents.contains_key(&neighbor)
                    || !self.context.is_enterable(neighbor, arrival)
                {
                    continue;
                }
                let _ = parents.insert(neighbor, Some(cell));
                queue.push_back((neighbor, moves + 1));
            }
        }

        None
    }

    fn finish(self, best: Option<Candidate>) -> SearchResult {
        let outcome = match best {
            Some(candidate) if candidate.collisions == 0 => {
                SearchOutcome::Found(Plan::new(candidate.cells, candidate.cost))
            }
            _ if self.exhausted() => SearchOutcome::ExpansionLimit,
            _ => SearchOutcome::Unreachable,
        };
        SearchResult::new(outcome, self.evaluations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Connectivity;
    use courier_world::{
        schedule::{DynamicObstacle, MovementRule, Timetable},
        Grid, ObstacleSchedule,
    };

    fn cell(row: u32, column: u32) -> CellCoord {
        CellCoord::new(row, column)
    }

    fn detour_plan() -> Plan {
        // Wanders around the long way before reaching the goal.
        let cells = vec![
            cell(0, 0),
            cell(1, 0),
            cell(2, 0),
            cell(2, 1),
            cell(1, 1),
            cell(0, 1),
            cell(0, 2),
        ];
        Plan::new(cells, 6)
    }

    #[test]
    fn hill_climbing_shortens_a_wasteful_seed() {
        let grid = Grid::open(3, 3, Connectivity::Four).expect("grid");
        let schedule = ObstacleSchedule::default();
        let context = SearchContext::new(&grid, schedule.snapshot(None));
        let previous = detour_plan();
        let query = SearchQuery::new(cell(0, 0), cell(0, 2), 0).with_previous(&previous);

        let mut strategy = HillClimbing::new(LocalSearchConfig::default(), 7);
        let plan = strategy
            .find_path(&context, &query)
            .into_plan()
            .expect("feasible plan");

        assert!(plan.cost() < previous.cost());
        assert!(plan.is_contiguous(Connectivity::Four));
        assert_eq!(plan.origin(), Some(cell(0, 0)));
        assert_eq!(plan.destination(), Some(cell(0, 2)));
    }

    #[test]
    fn annealing_never_returns_a_colliding_path() {
        let grid = Grid::open(3, 3, Connectivity::Four).expect("grid");
        let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
            "parked",
            MovementRule::Timetable(Timetable::new(vec![(1, cell(0, 1))])),
        )]);
        let context = SearchContext::new(&grid, schedule.snapshot(None));
        let previous = Plan::new(vec![cell(0, 0), cell(0, 1), cell(0, 2)], 2);
        let query = SearchQuery::new(cell(0, 0), cell(0, 2), 0).with_previous(&previous);

        for seed in 0..8 {
            let mut strategy = SimulatedAnnealing::new(LocalSearchConfig::default(), seed);
            let result = strategy.find_path(&context, &query);
            if let Some(plan) = result.plan() {
                assert_eq!(context.collisions(plan.cells(), 0), 0);
                assert!(plan.is_contiguous(Connectivity::Four));
            }
        }
    }

    #[test]
    fn same_seed_gives_same_result() {
        let grid = Grid::open(6, 6, Connectivity::Four).expect("grid");
        let schedule = ObstacleSchedule::default();
        let context = SearchContext::new(&grid, schedule.snapshot(None));
        let query = SearchQuery::new(cell(0, 0), cell(5, 5), 0);

        let first = HillClimbing::new(LocalSearchConfig::default(), 42).find_path(&context, &query);
        let second = HillClimbing::new(LocalSearchConfig::default(), 42).find_path(&context, &query);
        assert_eq!(first, second);
    }
}
