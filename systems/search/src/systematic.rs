//! Systematic strategies exploring `(cell, time key)` states.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, HashSet, VecDeque},
};

use courier_core::{Algorithm, CellCoord, Heuristic, Plan};
use courier_world::CostField;

use crate::{SearchContext, SearchOutcome, SearchQuery, SearchResult, SearchStrategy};

type StateKey = (CellCoord, u64);

/// Breadth-first search minimising the number of moves.
///
/// The reported cost is the terrain cost of the path found, which is not
/// necessarily the cheapest on weighted grids.
#[derive(Clone, Copy, Debug, Default)]
pub struct BreadthFirst;

impl SearchStrategy for BreadthFirst {
    fn algorithm(&self) -> Algorithm {
        Algorithm::BreadthFirst
    }

    fn find_path(&mut self, context: &SearchContext<'_>, query: &SearchQuery<'_>) -> SearchResult {
        if let Some(result) = preflight(context, query) {
            return result;
        }

        let snapshot = context.snapshot();
        let mut tree = SearchTree::default();
        let mut seen: HashSet<StateKey> = HashSet::new();
        let mut queue = VecDeque::new();

        let root = tree.push(query.start(), query.time_offset(), 0, None);
        let _ = seen.insert((query.start(), snapshot.time_key(query.time_offset())));
        queue.push_back(root);

        let mut expanded = 0_u64;
        while let Some(index) = queue.pop_front() {
            if expanded >= context.max_expansions() {
                return SearchResult::new(SearchOutcome::ExpansionLimit, expanded);
            }
            expanded += 1;

            let node = tree.node(index);
            if node.cell == query.goal() {
                return SearchResult::new(SearchOutcome::Found(tree.plan(index)), expanded);
            }

            let time = node.time.saturating_add(1);
            for (neighbor, step_cost) in successors(*context, node.cell, time) {
                if !seen.insert((neighbor, snapshot.time_key(time))) {
                    continue;
                }
                let cost = node.cost.saturating_add(u64::from(step_cost));
                queue.push_back(tree.push(neighbor, time, cost, Some(index)));
            }
        }

        SearchResult::new(SearchOutcome::Unreachable, expanded)
    }
}

/// Uniform-cost search returning the cheapest feasible path.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformCost;

impl SearchStrategy for UniformCost {
    fn algorithm(&self) -> Algorithm {
        Algorithm::UniformCost
    }

    fn find_path(&mut self, context: &SearchContext<'_>, query: &SearchQuery<'_>) -> SearchResult {
        best_first(context, query, |_| 0)
    }
}

/// A* search guided by a distance heuristic.
#[derive(Clone, Copy, Debug, Default)]
pub struct AStar {
    heuristic: Heuristic,
}

impl AStar {
    /// Creates an A* strategy using `heuristic`.
    ///
    /// The heuristic is swapped for Chebyshev distance on 8-connected grids,
    /// where the other distances overestimate.
    #[must_use]
    pub const fn new(heuristic: Heuristic) -> Self {
        Self { heuristic }
    }

    /// Heuristic requested for the strategy.
    #[must_use]
    pub const fn heuristic(&self) -> Heuristic {
        self.heuristic
    }
}

impl SearchStrategy for AStar {
    fn algorithm(&self) -> Algorithm {
        Algorithm::AStar
    }

    fn find_path(&mut self, context: &SearchContext<'_>, query: &SearchQuery<'_>) -> SearchResult {
        let grid = context.grid();
        let heuristic = self.heuristic.admissible_for(grid.connectivity());
        let min_step_cost = grid.min_step_cost();
        let goal = query.goal();
        best_first(context, query, |cell| {
            heuristic.estimate(cell, goal, min_step_cost)
        })
    }
}

fn best_first<H>(context: &SearchContext<'_>, query: &SearchQuery<'_>, estimate: H) -> SearchResult
where
    H: Fn(CellCoord) -> u64,
{
    if let Some(result) = preflight(context, query) {
        return result;
    }

    let snapshot = context.snapshot();
    let mut tree = SearchTree::default();
    let mut best_cost: HashMap<StateKey, u64> = HashMap::new();
    let mut closed: HashSet<StateKey> = HashSet::new();
    let mut frontier = BinaryHeap::new();
    let mut sequence = 0_u64;

    let root = tree.push(query.start(), query.time_offset(), 0, None);
    let _ = best_cost.insert((query.start(), snapshot.time_key(query.time_offset())), 0);
    frontier.push(Reverse((estimate(query.start()), sequence, root)));

    let mut expanded = 0_u64;
    while let Some(Reverse((_, _, index))) = frontier.pop() {
        let node = tree.node(index);
        if !closed.insert((node.cell, snapshot.time_key(node.time))) {
            continue;
        }

        if expanded >= context.max_expansions() {
            return SearchResult::new(SearchOutcome::ExpansionLimit, expanded);
        }
        expanded += 1;

        if node.cell == query.goal() {
            return SearchResult::new(SearchOutcome::Found(tree.plan(index)), expanded);
        }

        let time = node.time.saturating_add(1);
        for (neighbor, step_cost) in successors(*context, node.cell, time) {
            let key = (neighbor, snapshot.time_key(time));
            if closed.contains(&key) {
                continue;
            }

            let cost = node.cost.saturating_add(u64::from(step_cost));
            if best_cost.get(&key).is_some_and(|known| *known <= cost) {
                continue;
            }
            let _ = best_cost.insert(key, cost);

            let child = tree.push(neighbor, time, cost, Some(index));
            sequence += 1;
            frontier.push(Reverse((
                cost.saturating_add(estimate(neighbor)),
                sequence,
                child,
            )));
        }
    }

    SearchResult::new(SearchOutcome::Unreachable, expanded)
}

/// Resolves queries that need no exploration.
pub(crate) fn preflight(context: &SearchContext<'_>, query: &SearchQuery<'_>) -> Option<SearchResult> {
    let grid = context.grid();
    let (start, goal) = (query.start(), query.goal());

    if !grid.contains(start) || !grid.contains(goal) {
        return Some(SearchResult::new(SearchOutcome::Unreachable, 0));
    }
    if start == goal {
        let plan = Plan::new(vec![start], 0);
        return Some(SearchResult::new(SearchOutcome::Found(plan), 0));
    }
    if !CostField::build(grid, goal).is_reachable(start) {
        return Some(SearchResult::new(SearchOutcome::Unreachable, 0));
    }
    None
}

/// Enterable neighbours of `cell` for an arrival at `time`, with entry costs.
fn successors<'a>(
    context: SearchContext<'a>,
    cell: CellCoord,
    time: u64,
) -> impl Iterator<Item = (CellCoord, u32)> + 'a {
    let grid = context.grid();
    let snapshot = context.snapshot();
    grid.neighbors(cell)
        .into_iter()
        .flatten()
        .filter(move |neighbor| !snapshot.occupied_at(*neighbor, time))
        .filter_map(move |neighbor| grid.step_cost(neighbor).map(|cost| (neighbor, cost)))
}

#[derive(Clone, Copy, Debug)]
struct Node {
    cell: CellCoord,
    time: u64,
    cost: u64,
    parent: Option<usize>,
}

#[derive(Debug, Default)]
struct SearchTree {
    nodes: Vec<Node>,
}

impl SearchTree {
    fn push(&mut self, cell: CellCoord, time: u64, cost: u64, parent: Option<usize>) -> usize {
        self.nodes.push(Node {
            cell,
            time,
            cost,
            parent,
        });
        self.nodes.len() - 1
    }

    fn node(&self, index: usize) -> Node {
        self.nodes[index]
    }

    fn plan(&self, index: usize) -> Plan {
        let cost = self.nodes[index].cost;
        let mut cells = Vec::new();
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            let node = self.nodes[current];
            cells.push(node.cell);
            cursor = node.parent;
        }
        cells.reverse();
        Plan::new(cells, cost)
    }
}
