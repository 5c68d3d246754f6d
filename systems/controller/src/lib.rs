#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Mission controller that plans, executes and replans a single delivery.
//!
//! The controller advances simulated time one tick per executed step. Before
//! every move it checks the true obstacle schedule for the arrival tick; a
//! conflict invalidates the plan and triggers a new search from the agent's
//! current cell. Every transition is reported as an [`Event`].

use courier_core::{CellCoord, Event, FailureReason, MissionConfig, MissionStatus, Plan};
use courier_system_search::{Search, SearchContext, SearchQuery, SearchResult, SearchStrategy};
use courier_world::{query, World};

/// Phase of the mission state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissionState {
    /// No plan has been computed yet.
    Planning,
    /// Following the current plan.
    Executing,
    /// The current plan was invalidated and a new one is being sought.
    Replanning,
    /// The agent reached the goal within budget.
    Succeeded,
    /// The mission ended without reaching the goal.
    Failed(FailureReason),
}

impl MissionState {
    /// Reports whether the mission has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Mutable state of the courier, owned by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentState {
    cell: CellCoord,
    fuel: u64,
    elapsed: u64,
    cost: u64,
    plan: Option<Plan>,
    cursor: usize,
    replan_count: u32,
    nodes_expanded: u64,
    trajectory: Vec<CellCoord>,
}

impl AgentState {
    fn new(cell: CellCoord, fuel: u64) -> Self {
        Self {
            cell,
            fuel,
            elapsed: 0,
            cost: 0,
            plan: None,
            cursor: 0,
            replan_count: 0,
            nodes_expanded: 0,
            trajectory: vec![cell],
        }
    }

    /// Cell the agent occupies.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Fuel left.
    #[must_use]
    pub const fn fuel(&self) -> u64 {
        self.fuel
    }

    /// Ticks elapsed since the mission started.
    #[must_use]
    pub const fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Terrain cost accumulated by executed moves.
    #[must_use]
    pub const fn cost(&self) -> u64 {
        self.cost
    }

    /// Plan being followed, if any.
    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Moves of the current plan not yet executed.
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        self.plan
            .as_ref()
            .map_or(0, |plan| plan.steps().saturating_sub(self.cursor))
    }

    /// Number of times the plan was invalidated.
    #[must_use]
    pub const fn replan_count(&self) -> u32 {
        self.replan_count
    }

    /// Nodes expanded across every search call.
    #[must_use]
    pub const fn nodes_expanded(&self) -> u64 {
        self.nodes_expanded
    }

    /// Cell occupied at each tick so far, starting at tick 0.
    #[must_use]
    pub fn trajectory(&self) -> &[CellCoord] {
        &self.trajectory
    }

    fn next_cell(&self) -> Option<CellCoord> {
        self.plan.as_ref()?.cell_at(self.cursor + 1)
    }

    fn adopt(&mut self, plan: Plan) {
        self.plan = Some(plan);
        self.cursor = 0;
    }

    fn advance(&mut self, next: CellCoord, step_cost: u32) {
        self.cell = next;
        self.fuel -= u64::from(step_cost);
        self.cost += u64::from(step_cost);
        self.elapsed += 1;
        self.cursor += 1;
        self.trajectory.push(next);
    }

    fn wait(&mut self) {
        self.elapsed += 1;
        self.trajectory.push(self.cell);
    }
}

/// Summary of a finished mission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissionOutcome {
    /// Final status.
    pub status: MissionStatus,
    /// Cell the agent finished in.
    pub final_cell: CellCoord,
    /// Cell occupied at each tick, starting at tick 0.
    pub trajectory: Vec<CellCoord>,
    /// Terrain cost of every executed move.
    pub cost: u64,
    /// Fuel left at the end.
    pub fuel_remaining: u64,
    /// Ticks elapsed.
    pub elapsed: u64,
    /// Number of times the plan was invalidated.
    pub replan_count: u32,
    /// Nodes expanded across every search call.
    pub nodes_expanded: u64,
    /// Moves of the last plan that were never executed.
    pub remaining_steps: usize,
}

/// Drives a single agent from the world's start cell to its goal.
#[derive(Debug)]
pub struct Controller {
    config: MissionConfig,
    planner: Search,
    replanner: Search,
    state: MissionState,
    agent: AgentState,
    failed_replans: u32,
}

impl Controller {
    /// Creates a controller with the agent standing on the world's start cell.
    #[must_use]
    pub fn new(config: MissionConfig, world: &World) -> Self {
        let replan_config = MissionConfig {
            seed: config.seed.wrapping_add(1),
            ..config
        };
        Self {
            planner: Search::from_config(config.algorithm, &config),
            replanner: Search::from_config(config.effective_replan_algorithm(), &replan_config),
            state: MissionState::Planning,
            agent: AgentState::new(query::start(world), config.fuel),
            failed_replans: 0,
            config,
        }
    }

    /// Current phase of the mission.
    #[must_use]
    pub const fn state(&self) -> MissionState {
        self.state
    }

    /// Read-only view of the agent.
    #[must_use]
    pub const fn agent(&self) -> &AgentState {
        &self.agent
    }

    /// Mission parameters.
    #[must_use]
    pub const fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// Performs one state-machine transition and returns the new state.
    ///
    /// Terminal states are absorbing: stepping a finished mission emits nothing.
    pub fn step(&mut self, world: &World, out_events: &mut Vec<Event>) -> MissionState {
        self.state = match self.state {
            MissionState::Planning => self.plan_initial(world, out_events),
            MissionState::Executing => self.execute(world, out_events),
            MissionState::Replanning => self.replan(world, out_events),
            terminal @ (MissionState::Succeeded | MissionState::Failed(_)) => terminal,
        };
        self.state
    }

    /// Steps the mission until it ends.
    pub fn run(mut self, world: &World, out_events: &mut Vec<Event>) -> MissionOutcome {
        while !self.step(world, out_events).is_terminal() {}
        self.into_outcome()
    }

    /// Summarises the mission; a mission that has not ended reports failure.
    #[must_use]
    pub fn into_outcome(self) -> MissionOutcome {
        let status = match self.state {
            MissionState::Succeeded => MissionStatus::Succeeded,
            MissionState::Failed(reason) => MissionStatus::Failed(reason),
            MissionState::Planning | MissionState::Executing | MissionState::Replanning => {
                MissionStatus::Failed(FailureReason::NoFeasiblePlan)
            }
        };
        let remaining_steps = self.agent.remaining_steps();
        MissionOutcome {
            status,
            final_cell: self.agent.cell,
            trajectory: self.agent.trajectory,
            cost: self.agent.cost,
            fuel_remaining: self.agent.fuel,
            elapsed: self.agent.elapsed,
            replan_count: self.agent.replan_count,
            nodes_expanded: self.agent.nodes_expanded,
            remaining_steps,
        }
    }

    fn plan_initial(&mut self, world: &World, out_events: &mut Vec<Event>) -> MissionState {
        let result = search(&mut self.planner, &self.config, &self.agent, world, None);
        let nodes_expanded = result.nodes_expanded();
        self.agent.nodes_expanded += nodes_expanded;

        match result.into_plan() {
            Some(plan) => {
                self.record_plan(&plan, nodes_expanded, false, out_events);
                self.agent.adopt(plan);
                if self.agent.cell == query::goal(world) {
                    return self.finish(MissionState::Succeeded, out_events);
                }
                MissionState::Executing
            }
            None => {
                out_events.push(Event::PlanNotFound {
                    origin: self.agent.cell,
                    time: self.agent.elapsed,
                    algorithm: self.planner.algorithm(),
                    nodes_expanded,
                });
                self.finish(MissionState::Failed(FailureReason::Unreachable), out_events)
            }
        }
    }

    fn execute(&mut self, world: &World, out_events: &mut Vec<Event>) -> MissionState {
        if self.agent.cell == query::goal(world) {
            return self.finish(MissionState::Succeeded, out_events);
        }

        let arrival = self.agent.elapsed + 1;
        // Plans end at the goal, which was handled above.
        let Some(next) = self.agent.next_cell() else {
            return MissionState::Replanning;
        };

        let step_cost = match query::grid(world).step_cost(next) {
            Some(cost) if !query::schedule(world).occupied_at(next, arrival) => cost,
            _ => {
                self.agent.replan_count += 1;
                tracing::debug!(
                    cell = %self.agent.cell,
                    blocked = %next,
                    time = arrival,
                    "plan invalidated"
                );
                out_events.push(Event::ReplanTriggered {
                    cell: self.agent.cell,
                    blocked: next,
                    time: arrival,
                });
                return MissionState::Replanning;
            }
        };
        if self.agent.fuel < u64::from(step_cost) {
            return self.finish(MissionState::Failed(FailureReason::OutOfFuel), out_events);
        }
        if arrival > self.config.time_limit {
            return self.finish(MissionState::Failed(FailureReason::TimeExceeded), out_events);
        }

        let from = self.agent.cell;
        self.agent.advance(next, step_cost);
        out_events.push(Event::StepTaken {
            from,
            to: next,
            time: self.agent.elapsed,
            step_cost,
            fuel_remaining: self.agent.fuel,
        });

        if self.agent.cell == query::goal(world) {
            return self.finish(MissionState::Succeeded, out_events);
        }
        MissionState::Executing
    }

    fn replan(&mut self, world: &World, out_events: &mut Vec<Event>) -> MissionState {
        let previous = self.agent.plan.clone();
        let result = search(
            &mut self.replanner,
            &self.config,
            &self.agent,
            world,
            previous.as_ref(),
        );
        let nodes_expanded = result.nodes_expanded();
        self.agent.nodes_expanded += nodes_expanded;

        if let Some(plan) = result.into_plan() {
            self.failed_replans = 0;
            self.record_plan(&plan, nodes_expanded, true, out_events);
            self.agent.adopt(plan);
            return MissionState::Executing;
        }

        out_events.push(Event::PlanNotFound {
            origin: self.agent.cell,
            time: self.agent.elapsed,
            algorithm: self.replanner.algorithm(),
            nodes_expanded,
        });

        self.failed_replans += 1;
        let can_wait = self.failed_replans <= self.config.max_replan_attempts
            && self.agent.elapsed < self.config.time_limit;
        if !can_wait {
            return self.finish(MissionState::Failed(FailureReason::NoFeasiblePlan), out_events);
        }

        self.agent.wait();
        out_events.push(Event::Waited {
            cell: self.agent.cell,
            time: self.agent.elapsed,
        });
        MissionState::Replanning
    }

    fn record_plan(
        &self,
        plan: &Plan,
        nodes_expanded: u64,
        replan: bool,
        out_events: &mut Vec<Event>,
    ) {
        let algorithm = if replan {
            self.replanner.algorithm()
        } else {
            self.planner.algorithm()
        };
        out_events.push(Event::PlanComputed {
            origin: self.agent.cell,
            time: self.agent.elapsed,
            algorithm,
            cost: plan.cost(),
            steps: plan.steps(),
            nodes_expanded,
            replan,
        });
    }

    fn finish(&self, state: MissionState, out_events: &mut Vec<Event>) -> MissionState {
        let status = match state {
            MissionState::Failed(reason) => MissionStatus::Failed(reason),
            _ => MissionStatus::Succeeded,
        };
        tracing::debug!(
            %status,
            cell = %self.agent.cell,
            time = self.agent.elapsed,
            "mission finished"
        );
        out_events.push(Event::MissionFinished {
            status,
            cell: self.agent.cell,
            time: self.agent.elapsed,
        });
        state
    }
}

fn search(
    strategy: &mut Search,
    config: &MissionConfig,
    agent: &AgentState,
    world: &World,
    previous: Option<&Plan>,
) -> SearchResult {
    let horizon = config.foresight.horizon(agent.elapsed);
    let context = SearchContext::new(query::grid(world), query::schedule(world).snapshot(horizon))
        .with_max_expansions(config.max_expansions);
    let mut request = SearchQuery::new(agent.cell, query::goal(world), agent.elapsed);
    if let Some(previous) = previous {
        request = request.with_previous(previous);
    }
    strategy.find_path(&context, &request)
}
