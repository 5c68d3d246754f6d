#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plans and executes courier missions.

mod report;

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use courier_core::{Algorithm, Event, Foresight, Heuristic, MissionConfig};
use courier_system_controller::Controller;
use courier_world::{map, World};
use tracing_subscriber::EnvFilter;

use crate::report::{ExperimentRow, MissionReport};

#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(about = "Plan and execute deliveries on a weighted grid with moving obstacles")]
struct Cli {
    /// Log search and controller internals at debug level.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan and execute a single delivery mission.
    Plan(PlanArgs),
    /// Run every algorithm on every map in a directory and compare them.
    Experiment(ExperimentArgs),
}

#[derive(Debug, Args)]
struct PlanArgs {
    /// Path to the map file.
    #[arg(long)]
    map_file: PathBuf,

    /// Algorithm used for the initial plan.
    #[arg(long, value_enum)]
    algorithm: Option<AlgorithmArg>,

    /// Algorithm used when the plan is invalidated.
    #[arg(long, value_enum)]
    replan_algorithm: Option<AlgorithmArg>,

    #[command(flatten)]
    mission: MissionArgs,

    /// Print the mission report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ExperimentArgs {
    /// Directory containing `*.map` files.
    #[arg(long, default_value = "maps")]
    map_dir: PathBuf,

    #[command(flatten)]
    mission: MissionArgs,

    /// Print the comparison as JSON.
    #[arg(long)]
    json: bool,
}

/// Mission parameters shared by both commands.
#[derive(Debug, Args)]
struct MissionArgs {
    /// TOML file with mission parameters; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Heuristic used by A*.
    #[arg(long, value_enum)]
    heuristic: Option<HeuristicArg>,

    /// Initial fuel.
    #[arg(long)]
    fuel: Option<u64>,

    /// Maximum number of ticks.
    #[arg(long)]
    time_limit: Option<u64>,

    /// Ticks of obstacle foresight, or `full`.
    #[arg(long, value_parser = parse_foresight)]
    foresight: Option<Foresight>,

    /// Seed for the local-search strategies.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AlgorithmArg {
    /// Breadth-first search.
    Bfs,
    /// Uniform-cost search.
    Ucs,
    /// A* search.
    Astar,
    /// Hill climbing with random restarts.
    #[value(alias = "hillclimbing")]
    HillClimbing,
    /// Simulated annealing.
    Annealing,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::Bfs => Self::BreadthFirst,
            AlgorithmArg::Ucs => Self::UniformCost,
            AlgorithmArg::Astar => Self::AStar,
            AlgorithmArg::HillClimbing => Self::HillClimbing,
            AlgorithmArg::Annealing => Self::Annealing,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum HeuristicArg {
    /// Sum of row and column offsets.
    Manhattan,
    /// Straight-line distance.
    Euclidean,
    /// Largest of the row and column offsets.
    Chebyshev,
}

impl From<HeuristicArg> for Heuristic {
    fn from(value: HeuristicArg) -> Self {
        match value {
            HeuristicArg::Manhattan => Self::Manhattan,
            HeuristicArg::Euclidean => Self::Euclidean,
            HeuristicArg::Chebyshev => Self::Chebyshev,
        }
    }
}

fn parse_foresight(value: &str) -> Result<Foresight, String> {
    if value.eq_ignore_ascii_case("full") {
        return Ok(Foresight::Full);
    }
    value
        .parse()
        .map(Foresight::Ticks)
        .map_err(|_| format!("expected a tick count or `full`, found `{value}`"))
}

impl MissionArgs {
    /// Builds the mission configuration from the optional file and flags.
    fn resolve(&self) -> Result<MissionConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => MissionConfig::default(),
        };
        if let Some(heuristic) = self.heuristic {
            config.heuristic = heuristic.into();
        }
        if let Some(fuel) = self.fuel {
            config.fuel = fuel;
        }
        if let Some(time_limit) = self.time_limit {
            config.time_limit = time_limit;
        }
        if let Some(foresight) = self.foresight {
            config.foresight = foresight;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<MissionConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read mission config {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse mission config {}", path.display()))
}

fn load_world(path: &Path) -> Result<World> {
    map::load_file(path).with_context(|| format!("failed to load map {}", path.display()))
}

/// Entry point for the courier command-line interface.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Plan(args) => plan(&args),
        Command::Experiment(args) => experiment(&args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn plan(args: &PlanArgs) -> Result<ExitCode> {
    let mut config = args.mission.resolve()?;
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm.into();
    }
    if let Some(algorithm) = args.replan_algorithm {
        config.replan_algorithm = Some(algorithm.into());
    }

    let world = load_world(&args.map_file)?;
    tracing::info!(
        map = %args.map_file.display(),
        algorithm = %config.algorithm,
        replan_algorithm = %config.effective_replan_algorithm(),
        fuel = config.fuel,
        time_limit = config.time_limit,
        "starting delivery"
    );

    let started = Instant::now();
    let mut events = Vec::new();
    let outcome = Controller::new(config, &world).run(&world, &mut events);
    let wall_time = started.elapsed();

    for event in &events {
        log_event(event);
    }

    let report = MissionReport::new(&args.map_file, &config, &outcome, wall_time);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to encode mission report")?
        );
    } else {
        print!("{}", report::render_map(&world, &outcome.trajectory));
        print!("{report}");
    }

    Ok(if outcome.status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn experiment(args: &ExperimentArgs) -> Result<ExitCode> {
    let base = args.mission.resolve()?;
    let maps = map_files(&args.map_dir)?;
    if maps.is_empty() {
        bail!("no *.map files found in {}", args.map_dir.display());
    }

    let mut rows = Vec::new();
    for path in &maps {
        let world = load_world(path)?;
        for algorithm in Algorithm::ALL {
            let config = MissionConfig {
                algorithm,
                replan_algorithm: None,
                ..base
            };
            let started = Instant::now();
            let mut events = Vec::new();
            let outcome = Controller::new(config, &world).run(&world, &mut events);
            let row = ExperimentRow::new(path, algorithm, &outcome, started.elapsed());
            tracing::debug!(map = %row.map, algorithm = %algorithm, status = %outcome.status, "experiment run finished");
            rows.push(row);
        }
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("failed to encode experiment results")?
        );
    } else {
        print!("{}", report::render_table(&rows));
    }
    Ok(ExitCode::SUCCESS)
}

fn map_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to list map directory {}", directory.display()))?;
    let mut maps = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", directory.display()))?
            .path();
        if path.extension().is_some_and(|extension| extension == "map") {
            maps.push(path);
        }
    }
    maps.sort();
    Ok(maps)
}

fn log_event(event: &Event) {
    match event {
        Event::PlanComputed {
            origin,
            time,
            algorithm,
            cost,
            steps,
            nodes_expanded,
            replan,
        } => tracing::info!(
            %origin,
            time,
            %algorithm,
            cost,
            steps,
            nodes_expanded,
            replan,
            "plan computed"
        ),
        Event::PlanNotFound {
            origin,
            time,
            algorithm,
            nodes_expanded,
        } => tracing::warn!(%origin, time, %algorithm, nodes_expanded, "no plan found"),
        Event::StepTaken {
            from,
            to,
            time,
            step_cost,
            fuel_remaining,
        } => tracing::debug!(%from, %to, time, step_cost, fuel_remaining, "step taken"),
        Event::ReplanTriggered {
            cell,
            blocked,
            time,
        } => tracing::info!(%cell, %blocked, time, "obstacle ahead, replanning"),
        Event::Waited { cell, time } => tracing::info!(%cell, time, "waiting in place"),
        Event::MissionFinished { status, cell, time } => {
            tracing::info!(%status, %cell, time, "mission finished")
        }
    }
}
