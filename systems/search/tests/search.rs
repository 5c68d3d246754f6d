use courier_core::{Algorithm, CellCoord, Connectivity, Heuristic, MissionConfig, Plan};
use courier_system_search::{
    AStar, BreadthFirst, Search, SearchContext, SearchOutcome, SearchQuery, SearchStrategy,
    UniformCost,
};
use courier_world::{
    schedule::{Bounce, DynamicObstacle, Loop, MovementRule, Timetable, Waypoints},
    CostField, Grid, ObstacleSchedule, TerrainCost,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn cell(row: u32, column: u32) -> CellCoord {
    CellCoord::new(row, column)
}

fn random_grid(seed: u64, rows: u32, columns: u32, connectivity: Connectivity) -> Grid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let terrain = (0..rows * columns)
        .map(|_| {
            if rng.gen_bool(0.2) {
                TerrainCost::Impassable
            } else {
                TerrainCost::Finite(rng.gen_range(1..=4))
            }
        })
        .collect();
    Grid::new(rows, columns, connectivity, terrain)
        .and_then(|grid| grid.with_terrain(cell(0, 0), TerrainCost::FLAT))
        .and_then(|grid| grid.with_terrain(cell(rows - 1, columns - 1), TerrainCost::FLAT))
        .expect("grid")
}

fn solve(
    strategy: &mut dyn SearchStrategy,
    grid: &Grid,
    start: CellCoord,
    goal: CellCoord,
) -> Option<Plan> {
    let schedule = ObstacleSchedule::default();
    let context = SearchContext::new(grid, schedule.snapshot(None));
    strategy
        .find_path(&context, &SearchQuery::new(start, goal, 0))
        .into_plan()
}

#[test]
fn open_five_by_five_costs_eight() {
    let grid = Grid::open(5, 5, Connectivity::Four).expect("grid");
    for mut strategy in [
        Search::UniformCost(UniformCost),
        Search::AStar(AStar::new(Heuristic::Manhattan)),
        Search::AStar(AStar::new(Heuristic::Euclidean)),
        Search::BreadthFirst(BreadthFirst),
    ] {
        let plan = solve(&mut strategy, &grid, cell(0, 0), cell(4, 4)).expect("plan");
        assert_eq!(plan.cost(), 8, "{} returned {plan:?}", strategy.algorithm());
        assert_eq!(plan.steps(), 8);
        assert!(plan.is_contiguous(Connectivity::Four));
    }
}

#[test]
fn uniform_cost_and_astar_agree_on_static_grids() {
    for seed in 0..24 {
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let grid = random_grid(seed, 9, 11, connectivity);
            let goal = cell(8, 10);
            let expected = solve(&mut UniformCost, &grid, cell(0, 0), goal).map(|plan| plan.cost());

            for heuristic in [Heuristic::Manhattan, Heuristic::Euclidean, Heuristic::Chebyshev] {
                let astar = solve(&mut AStar::new(heuristic), &grid, cell(0, 0), goal)
                    .map(|plan| plan.cost());
                assert_eq!(
                    astar, expected,
                    "seed {seed} {connectivity:?} {heuristic:?} disagrees with uniform cost"
                );
            }
        }
    }
}

#[test]
fn found_cost_matches_reverse_dijkstra_distance() {
    for seed in 0..12 {
        let grid = random_grid(seed, 8, 8, Connectivity::Four);
        let goal = cell(7, 7);
        let field = CostField::build(&grid, goal);
        let plan = solve(&mut UniformCost, &grid, cell(0, 0), goal);
        assert_eq!(plan.map(|plan| plan.cost()), field.distance(cell(0, 0)), "seed {seed}");
    }
}

#[test]
fn heuristics_never_exceed_true_remaining_cost() {
    for seed in 0..12 {
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let grid = random_grid(seed, 10, 10, connectivity);
            let goal = cell(9, 9);
            let field = CostField::build(&grid, goal);

            for heuristic in [Heuristic::Manhattan, Heuristic::Euclidean, Heuristic::Chebyshev] {
                let effective = heuristic.admissible_for(connectivity);
                for current in grid.cells() {
                    let Some(distance) = field.distance(current) else {
                        continue;
                    };
                    let estimate = effective.estimate(current, goal, grid.min_step_cost());
                    assert!(
                        estimate <= distance,
                        "{heuristic:?} overestimates at {current}: {estimate} > {distance}"
                    );
                }
            }
        }
    }
}

#[test]
fn walls_make_the_goal_unreachable() {
    let mut grid = Grid::open(5, 5, Connectivity::Eight).expect("grid");
    for row in 0..5 {
        grid = grid
            .with_terrain(cell(row, 2), TerrainCost::Impassable)
            .expect("in bounds");
    }

    let schedule = ObstacleSchedule::default();
    let context = SearchContext::new(&grid, schedule.snapshot(None));
    let query = SearchQuery::new(cell(0, 0), cell(4, 4), 0);
    let config = MissionConfig::default();

    for algorithm in Algorithm::ALL {
        let result = Search::from_config(algorithm, &config).find_path(&context, &query);
        assert_eq!(result.outcome(), &SearchOutcome::Unreachable, "{algorithm}");
    }
}

#[test]
fn raising_a_terrain_cost_never_lowers_the_optimum() {
    for seed in 0..8 {
        let base = random_grid(seed, 7, 7, Connectivity::Four);
        let goal = cell(6, 6);
        let Some(baseline) = solve(&mut UniformCost, &base, cell(0, 0), goal) else {
            continue;
        };

        for target in base.cells() {
            let Some(cost) = base.step_cost(target) else {
                continue;
            };
            let raised = base
                .clone()
                .with_terrain(target, TerrainCost::Finite(cost + 3))
                .expect("in bounds");
            let plan = solve(&mut UniformCost, &raised, cell(0, 0), goal).expect("still reachable");
            assert!(plan.cost() >= baseline.cost(), "seed {seed} raising {target}");
        }
    }
}

#[test]
fn breadth_first_uses_the_fewest_moves() {
    for seed in 0..12 {
        let grid = random_grid(seed, 8, 9, Connectivity::Four);
        let goal = cell(7, 8);
        let bfs = solve(&mut BreadthFirst, &grid, cell(0, 0), goal);
        let ucs = solve(&mut UniformCost, &grid, cell(0, 0), goal);
        match (bfs, ucs) {
            (Some(bfs), Some(ucs)) => {
                assert!(bfs.steps() <= ucs.steps());
                assert!(bfs.cost() >= ucs.cost());
            }
            (None, None) => {}
            other => panic!("seed {seed}: strategies disagree on reachability: {other:?}"),
        }
    }
}

#[test]
fn timed_obstacle_forces_a_detour() {
    let grid = Grid::open(3, 5, Connectivity::Four).expect("grid");
    let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
        "bike",
        MovementRule::Timetable(Timetable::new(vec![(2, cell(0, 2))])),
    )]);
    let context = SearchContext::new(&grid, schedule.snapshot(None));
    let query = SearchQuery::new(cell(0, 0), cell(0, 4), 0);

    for mut strategy in [
        Search::UniformCost(UniformCost),
        Search::AStar(AStar::default()),
    ] {
        let plan = strategy
            .find_path(&context, &query)
            .into_plan()
            .expect("detour exists");
        assert_eq!(plan.cost(), 6);
        assert_eq!(context.collisions(plan.cells(), 0), 0);
        assert_ne!(plan.cell_at(2), Some(cell(0, 2)));
    }
}

#[test]
fn plans_avoid_moving_obstacles_and_stay_contiguous() {
    let grid = Grid::open(7, 7, Connectivity::Four).expect("grid");
    let schedule = ObstacleSchedule::new(vec![
        DynamicObstacle::new(
            "patrol",
            MovementRule::Bounce(Bounce::new(cell(0, 3), cell(6, 3), 0)),
        ),
        DynamicObstacle::new(
            "loop",
            MovementRule::Loop(
                Loop::new(vec![cell(2, 1), cell(2, 2), cell(3, 2), cell(3, 1)], 1)
                    .expect("cells"),
            ),
        ),
        DynamicObstacle::new(
            "van",
            MovementRule::Waypoints(
                Waypoints::new(vec![(0, cell(5, 0)), (6, cell(5, 6))]).expect("keyframes"),
            ),
        ),
    ]);
    let config = MissionConfig::default();

    for time_offset in 0..6 {
        let context = SearchContext::new(&grid, schedule.snapshot(None));
        let query = SearchQuery::new(cell(0, 0), cell(6, 6), time_offset);
        for algorithm in [Algorithm::BreadthFirst, Algorithm::UniformCost, Algorithm::AStar] {
            let result = Search::from_config(algorithm, &config).find_path(&context, &query);
            let plan = result.plan().expect("plan");
            assert!(plan.is_contiguous(Connectivity::Four), "{algorithm}");
            assert_eq!(plan.origin(), Some(cell(0, 0)));
            assert_eq!(plan.destination(), Some(cell(6, 6)));
            for (step, visited) in plan.cells().iter().enumerate().skip(1) {
                let time = time_offset + step as u64;
                assert!(
                    !schedule.occupied_at(*visited, time),
                    "{algorithm} collides at {visited} on tick {time}"
                );
            }
        }
    }
}

#[test]
fn permanently_occupied_goal_is_unreachable_with_full_foresight() {
    let grid = Grid::open(4, 4, Connectivity::Four).expect("grid");
    let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
        "parked",
        MovementRule::Waypoints(Waypoints::new(vec![(0, cell(3, 3))]).expect("keyframe")),
    )]);
    let query = SearchQuery::new(cell(0, 0), cell(3, 3), 0);

    let context = SearchContext::new(&grid, schedule.snapshot(None));
    let result = UniformCost.find_path(&context, &query);
    assert_eq!(result.outcome(), &SearchOutcome::Unreachable);

    let short_sighted = SearchContext::new(&grid, schedule.snapshot(Some(2)));
    let result = AStar::default().find_path(&short_sighted, &query);
    assert_eq!(result.plan().map(Plan::cost), Some(6));
}

#[test]
fn local_search_only_returns_feasible_paths() {
    let grid = Grid::open(6, 6, Connectivity::Four).expect("grid");
    let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
        "patrol",
        MovementRule::Bounce(Bounce::new(cell(0, 2), cell(5, 2), 3)),
    )]);
    let context = SearchContext::new(&grid, schedule.snapshot(None));
    let previous = UniformCost
        .find_path(
            &SearchContext::new(&grid, ObstacleSchedule::default().snapshot(None)),
            &SearchQuery::new(cell(0, 0), cell(5, 5), 0),
        )
        .into_plan()
        .expect("static plan");
    let query = SearchQuery::new(cell(0, 0), cell(5, 5), 0).with_previous(&previous);

    let mut config = MissionConfig::default();
    for seed in 0..6 {
        config.seed = seed;
        for algorithm in [Algorithm::HillClimbing, Algorithm::Annealing] {
            let result = Search::from_config(algorithm, &config).find_path(&context, &query);
            let Some(plan) = result.plan() else {
                continue;
            };
            assert!(plan.is_contiguous(Connectivity::Four));
            assert_eq!(plan.origin(), Some(cell(0, 0)));
            assert_eq!(plan.destination(), Some(cell(5, 5)));
            assert_eq!(context.collisions(plan.cells(), 0), 0, "{algorithm} seed {seed}");
        }
    }
}

#[test]
fn local_search_plans_across_a_large_open_grid_without_a_seed_plan() {
    let grid = Grid::open(15, 20, Connectivity::Four).expect("grid");
    let schedule = ObstacleSchedule::default();
    let context = SearchContext::new(&grid, schedule.snapshot(None));
    let query = SearchQuery::new(cell(0, 0), cell(14, 19), 0);
    let config = MissionConfig::default();

    for algorithm in [Algorithm::HillClimbing, Algorithm::Annealing] {
        let result = Search::from_config(algorithm, &config).find_path(&context, &query);
        let plan = result
            .plan()
            .unwrap_or_else(|| panic!("{algorithm} gave up: {:?}", result.outcome()));
        assert_eq!(plan.cost(), 33, "{algorithm}");
        assert!(plan.is_contiguous(Connectivity::Four));
        assert_eq!(plan.origin(), Some(cell(0, 0)));
        assert_eq!(plan.destination(), Some(cell(14, 19)));
    }
}

#[test]
fn local_search_replaces_a_colliding_seed_plan() {
    let grid = Grid::open(4, 4, Connectivity::Four).expect("grid");
    let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
        "parked",
        MovementRule::Waypoints(Waypoints::new(vec![(0, cell(0, 2))]).expect("keyframe")),
    )]);
    let context = SearchContext::new(&grid, schedule.snapshot(None));
    let previous = Plan::new(
        vec![cell(0, 0), cell(0, 1), cell(0, 2), cell(0, 3), cell(1, 3)],
        4,
    );
    let query = SearchQuery::new(cell(0, 0), cell(1, 3), 0).with_previous(&previous);
    let config = MissionConfig::default();

    for algorithm in [Algorithm::HillClimbing, Algorithm::Annealing] {
        let plan = Search::from_config(algorithm, &config)
            .find_path(&context, &query)
            .into_plan()
            .expect("a detour around the parked obstacle exists");
        assert_eq!(context.collisions(plan.cells(), 0), 0, "{algorithm}");
        assert!(!plan.cells().contains(&cell(0, 2)));
    }
}
