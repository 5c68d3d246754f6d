//! Time-indexed occupancy of dynamic obstacles.
//!
//! Every obstacle follows a movement rule that is a pure function of the tick,
//! so the schedule can be queried for arbitrary past or future ticks without
//! mutation. Rules also describe their [`Recurrence`], which the search uses
//! to fold time into a finite state space.

use courier_core::CellCoord;

/// Longest combined period the schedule folds before giving up on folding.
const MAX_FOLDED_PERIOD: u64 = 100_000;

/// Capability shared by every movement rule: report the occupied cell at a tick.
pub trait Occupancy {
    /// Cell occupied at `time`, if any.
    fn position_at(&self, time: u64) -> Option<CellCoord>;

    /// Describes when the rule becomes periodic.
    fn recurrence(&self) -> Recurrence;
}

/// Tick after which occupancy repeats with a fixed period.
///
/// For every `t >= settles_at`, the occupancy at `t` equals the occupancy at
/// `t + period`. A period of 1 means the rule is stationary after settling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Recurrence {
    settles_at: u64,
    period: u64,
}

impl Recurrence {
    /// Creates a recurrence; a zero period is treated as 1.
    #[must_use]
    pub const fn new(settles_at: u64, period: u64) -> Self {
        let period = if period == 0 { 1 } else { period };
        Self { settles_at, period }
    }

    /// Recurrence of a rule that never changes.
    #[must_use]
    pub const fn stationary() -> Self {
        Self::new(0, 1)
    }

    /// Tick from which occupancy repeats.
    #[must_use]
    pub const fn settles_at(&self) -> u64 {
        self.settles_at
    }

    /// Length of the repeating cycle.
    #[must_use]
    pub const fn period(&self) -> u64 {
        self.period
    }

    /// Combines two recurrences into one that holds for both rules.
    ///
    /// Returns `None` when the combined period would exceed the folding cap.
    #[must_use]
    pub fn combine(self, other: Recurrence) -> Option<Recurrence> {
        let period = lcm(self.period, other.period)?;
        if period > MAX_FOLDED_PERIOD {
            return None;
        }
        Some(Recurrence::new(self.settles_at.max(other.settles_at), period))
    }

    /// Canonical representative of `time` with identical future occupancy.
    #[must_use]
    pub const fn fold(&self, time: u64) -> u64 {
        if time < self.settles_at {
            time
        } else {
            self.settles_at + (time - self.settles_at) % self.period
        }
    }
}

/// Explicit occupancy entries; the obstacle exists only at listed ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timetable {
    entries: Vec<(u64, CellCoord)>,
}

impl Timetable {
    /// Creates a timetable, sorting entries by tick. The first entry wins for
    /// duplicated ticks.
    #[must_use]
    pub fn new(mut entries: Vec<(u64, CellCoord)>) -> Self {
        entries.sort_by_key(|(time, _)| *time);
        entries.dedup_by_key(|(time, _)| *time);
        Self { entries }
    }
}

impl Occupancy for Timetable {
    fn position_at(&self, time: u64) -> Option<CellCoord> {
        self.entries
            .binary_search_by_key(&time, |(tick, _)| *tick)
            .ok()
            .map(|index| self.entries[index].1)
    }

    fn recurrence(&self) -> Recurrence {
        match self.entries.last() {
            Some((time, _)) => Recurrence::new(time.saturating_add(1), 1),
            None => Recurrence::stationary(),
        }
    }
}

/// Keyframed route with linear interpolation between keyframes.
///
/// The first keyframe's cell is held before it and the last keyframe's cell
/// is held after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Waypoints {
    keyframes: Vec<(u64, CellCoord)>,
}

impl Waypoints {
    /// Creates a keyframed route; returns `None` when no keyframes are given.
    #[must_use]
    pub fn new(mut keyframes: Vec<(u64, CellCoord)>) -> Option<Self> {
        if keyframes.is_empty() {
            return None;
        }
        keyframes.sort_by_key(|(time, _)| *time);
        Some(Self { keyframes })
    }
}

impl Occupancy for Waypoints {
    fn position_at(&self, time: u64) -> Option<CellCoord> {
        let (first_time, first_cell) = *self.keyframes.first()?;
        let (last_time, last_cell) = *self.keyframes.last()?;
        if time <= first_time {
            return Some(first_cell);
        }
        if time >= last_time {
            return Some(last_cell);
        }

        self.keyframes.windows(2).find_map(|pair| {
            let (start_time, start_cell) = pair[0];
            let (end_time, end_cell) = pair[1];
            if time < start_time || time > end_time {
                return None;
            }
            if end_time == start_time {
                return Some(start_cell);
            }
            let ratio = (time - start_time) as f64 / (end_time - start_time) as f64;
            Some(interpolate(start_cell, end_cell, ratio))
        })
    }

    fn recurrence(&self) -> Recurrence {
        let settles_at = self.keyframes.last().map_or(0, |(time, _)| *time);
        Recurrence::new(settles_at, 1)
    }
}

/// Back-and-forth patrol along the straight line between two cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bounce {
    line: Vec<CellCoord>,
    phase: u64,
}

impl Bounce {
    /// Creates a patrol from `from` to `to` and back.
    ///
    /// At tick `t` the obstacle is where a patrol started at `from` on tick 0
    /// would be at tick `t + phase`.
    #[must_use]
    pub fn new(from: CellCoord, to: CellCoord, phase: u64) -> Self {
        Self {
            line: rasterize(from, to),
            phase,
        }
    }

    /// Cells visited on a single leg of the patrol.
    #[must_use]
    pub fn line(&self) -> &[CellCoord] {
        &self.line
    }

    fn leg_length(&self) -> u64 {
        u64::try_from(self.line.len().saturating_sub(1)).unwrap_or(0)
    }
}

impl Occupancy for Bounce {
    fn position_at(&self, time: u64) -> Option<CellCoord> {
        let leg = self.leg_length();
        if leg == 0 {
            return self.line.first().copied();
        }
        let cycle = leg * 2;
        let offset = (time % cycle + self.phase % cycle) % cycle;
        let index = if offset <= leg { offset } else { cycle - offset };
        self.line.get(usize::try_from(index).ok()?).copied()
    }

    fn recurrence(&self) -> Recurrence {
        Recurrence::new(0, self.leg_length() * 2)
    }
}

/// Fixed cyclic route that advances one cell per tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
    cells: Vec<CellCoord>,
    phase: u64,
}

impl Loop {
    /// Creates a cyclic route; returns `None` when no cells are given.
    #[must_use]
    pub fn new(cells: Vec<CellCoord>, phase: u64) -> Option<Self> {
        if cells.is_empty() {
            return None;
        }
        Some(Self { cells, phase })
    }
}

impl Occupancy for Loop {
    fn position_at(&self, time: u64) -> Option<CellCoord> {
        let length = u64::try_from(self.cells.len()).ok()?;
        let index = (time % length + self.phase % length) % length;
        self.cells.get(usize::try_from(index).ok()?).copied()
    }

    fn recurrence(&self) -> Recurrence {
        Recurrence::new(0, u64::try_from(self.cells.len()).unwrap_or(1))
    }
}

/// Movement rules supported by the map format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MovementRule {
    /// Explicit per-tick occupancy.
    Timetable(Timetable),
    /// Interpolated keyframes.
    Waypoints(Waypoints),
    /// Linear back-and-forth patrol.
    Bounce(Bounce),
    /// Fixed cyclic route.
    Loop(Loop),
}

impl Occupancy for MovementRule {
    fn position_at(&self, time: u64) -> Option<CellCoord> {
        match self {
            Self::Timetable(rule) => rule.position_at(time),
            Self::Waypoints(rule) => rule.position_at(time),
            Self::Bounce(rule) => rule.position_at(time),
            Self::Loop(rule) => rule.position_at(time),
        }
    }

    fn recurrence(&self) -> Recurrence {
        match self {
            Self::Timetable(rule) => rule.recurrence(),
            Self::Waypoints(rule) => rule.recurrence(),
            Self::Bounce(rule) => rule.recurrence(),
            Self::Loop(rule) => rule.recurrence(),
        }
    }
}

/// Named obstacle that moves according to a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicObstacle {
    id: String,
    rule: MovementRule,
}

impl DynamicObstacle {
    /// Creates a named obstacle.
    #[must_use]
    pub fn new(id: impl Into<String>, rule: MovementRule) -> Self {
        Self {
            id: id.into(),
            rule,
        }
    }

    /// Identifier assigned by the map.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Movement rule followed by the obstacle.
    #[must_use]
    pub fn rule(&self) -> &MovementRule {
        &self.rule
    }
}

impl Occupancy for DynamicObstacle {
    fn position_at(&self, time: u64) -> Option<CellCoord> {
        self.rule.position_at(time)
    }

    fn recurrence(&self) -> Recurrence {
        self.rule.recurrence()
    }
}

/// Deterministic schedule of every dynamic obstacle in the world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObstacleSchedule {
    obstacles: Vec<DynamicObstacle>,
    recurrence: Option<Recurrence>,
}

impl ObstacleSchedule {
    /// Creates a schedule from the provided obstacles.
    #[must_use]
    pub fn new(obstacles: Vec<DynamicObstacle>) -> Self {
        let recurrence = obstacles
            .iter()
            .try_fold(Recurrence::stationary(), |combined, obstacle| {
                combined.combine(obstacle.recurrence())
            });
        Self {
            obstacles,
            recurrence,
        }
    }

    /// Obstacles tracked by the schedule.
    #[must_use]
    pub fn obstacles(&self) -> &[DynamicObstacle] {
        &self.obstacles
    }

    /// Reports whether the schedule tracks no obstacles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Reports whether any obstacle occupies `cell` at `time`.
    #[must_use]
    pub fn occupied_at(&self, cell: CellCoord, time: u64) -> bool {
        self.obstacles
            .iter()
            .any(|obstacle| obstacle.position_at(time) == Some(cell))
    }

    /// Cells occupied at `time`, sorted and without duplicates.
    #[must_use]
    pub fn occupied_cells(&self, time: u64) -> Vec<CellCoord> {
        let mut cells: Vec<CellCoord> = self
            .obstacles
            .iter()
            .filter_map(|obstacle| obstacle.position_at(time))
            .collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Position of the named obstacle at `time`.
    #[must_use]
    pub fn position_of(&self, id: &str, time: u64) -> Option<CellCoord> {
        self.obstacles
            .iter()
            .find(|obstacle| obstacle.id() == id)
            .and_then(|obstacle| obstacle.position_at(time))
    }

    /// Combined recurrence of every obstacle, if it fits the folding cap.
    #[must_use]
    pub fn recurrence(&self) -> Option<Recurrence> {
        self.recurrence
    }

    /// Canonical tick whose future occupancy matches that of `time`.
    #[must_use]
    pub fn time_key(&self, time: u64) -> u64 {
        self.recurrence
            .map_or(time, |recurrence| recurrence.fold(time))
    }

    /// Captures the schedule as known when positions up to `known_until` are
    /// visible; `None` exposes the whole schedule.
    #[must_use]
    pub fn snapshot(&self, known_until: Option<u64>) -> ScheduleSnapshot<'_> {
        ScheduleSnapshot {
            schedule: self,
            known_until,
        }
    }
}

/// Partial view of the schedule available to a planner.
///
/// Ticks past the visibility horizon are assumed free. The view borrows the
/// schedule immutably, so a plan computed against it stays consistent for as
/// long as the snapshot lives.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleSnapshot<'a> {
    schedule: &'a ObstacleSchedule,
    known_until: Option<u64>,
}

impl<'a> ScheduleSnapshot<'a> {
    /// Last tick whose occupancy is visible, or `None` for full visibility.
    #[must_use]
    pub const fn known_until(&self) -> Option<u64> {
        self.known_until
    }

    /// Underlying schedule.
    #[must_use]
    pub const fn schedule(&self) -> &'a ObstacleSchedule {
        self.schedule
    }

    /// Reports whether the cell is known to be occupied at `time`.
    #[must_use]
    pub fn occupied_at(&self, cell: CellCoord, time: u64) -> bool {
        let visible = self.known_until.map_or(true, |horizon| time <= horizon);
        visible && self.schedule.occupied_at(cell, time)
    }

    /// Canonical key for `time`: equal keys imply identical visible futures.
    ///
    /// With a finite horizon every visible tick is its own key and every tick
    /// beyond it shares `u64::MAX`, since nothing is known to be occupied there.
    #[must_use]
    pub fn time_key(&self, time: u64) -> u64 {
        match self.known_until {
            None => self.schedule.time_key(time),
            Some(horizon) if time > horizon => u64::MAX,
            Some(_) => time,
        }
    }
}

/// Cells on the straight line from `from` to `to`, inclusive, one per tick.
#[must_use]
pub fn rasterize(from: CellCoord, to: CellCoord) -> Vec<CellCoord> {
    let steps = from.chebyshev_distance(to);
    if steps == 0 {
        return vec![from];
    }
    (0..=steps)
        .map(|step| interpolate(from, to, f64::from(step) / f64::from(steps)))
        .collect()
}

fn interpolate(from: CellCoord, to: CellCoord, ratio: f64) -> CellCoord {
    let lerp = |start: u32, end: u32| {
        let value = f64::from(start) + ratio * (f64::from(end) - f64::from(start));
        value.round().max(0.0) as u32
    };
    CellCoord::new(
        lerp(from.row(), to.row()),
        lerp(from.column(), to.column()),
    )
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let remainder = a % b;
        a = b;
        b = remainder;
    }
    a
}

fn lcm(a: u64, b: u64) -> Option<u64> {
    if a == 0 || b == 0 {
        return Some(a.max(b));
    }
    (a / gcd(a, b)).checked_mul(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32, column: u32) -> CellCoord {
        CellCoord::new(row, column)
    }

    #[test]
    fn timetable_occupies_only_listed_ticks() {
        let rule = Timetable::new(vec![(4, cell(2, 2)), (1, cell(0, 1))]);
        assert_eq!(rule.position_at(1), Some(cell(0, 1)));
        assert_eq!(rule.position_at(4), Some(cell(2, 2)));
        assert_eq!(rule.position_at(3), None);
        assert_eq!(rule.recurrence(), Recurrence::new(5, 1));
    }

    #[test]
    fn waypoints_interpolate_and_hold_ends() {
        let rule = Waypoints::new(vec![(2, cell(0, 0)), (6, cell(4, 0))]).expect("keyframes");
        assert_eq!(rule.position_at(0), Some(cell(0, 0)));
        assert_eq!(rule.position_at(4), Some(cell(2, 0)));
        assert_eq!(rule.position_at(6), Some(cell(4, 0)));
        assert_eq!(rule.position_at(60), Some(cell(4, 0)));
        assert!(Waypoints::new(Vec::new()).is_none());
    }

    #[test]
    fn bounce_patrols_back_and_forth() {
        let rule = Bounce::new(cell(0, 2), cell(4, 2), 0);
        let rows: Vec<u32> = (0..10)
            .filter_map(|time| rule.position_at(time))
            .map(|position| position.row())
            .collect();
        assert_eq!(rows, vec![0, 1, 2, 3, 4, 3, 2, 1, 0, 1]);
        assert_eq!(rule.recurrence(), Recurrence::new(0, 8));
    }

    #[test]
    fn bounce_phase_shifts_the_patrol() {
        let rule = Bounce::new(cell(0, 2), cell(4, 2), 6);
        assert_eq!(rule.position_at(0), Some(cell(2, 2)));
        assert_eq!(rule.position_at(2), Some(cell(0, 2)));
        assert_eq!(rule.position_at(4), Some(cell(2, 2)));
    }

    #[test]
    fn loop_cycles_through_cells() {
        let rule = Loop::new(vec![cell(1, 1), cell(1, 2), cell(2, 2)], 1).expect("cells");
        assert_eq!(rule.position_at(0), Some(cell(1, 2)));
        assert_eq!(rule.position_at(2), Some(cell(1, 1)));
        assert_eq!(rule.position_at(5), Some(cell(1, 1)));
    }

    #[test]
    fn rasterized_diagonal_moves_one_cell_per_tick() {
        let line = rasterize(cell(0, 0), cell(2, 4));
        assert_eq!(line.len(), 5);
        assert_eq!(line.first(), Some(&cell(0, 0)));
        assert_eq!(line.last(), Some(&cell(2, 4)));
    }

    #[test]
    fn schedule_folds_time_with_combined_recurrence() {
        let schedule = ObstacleSchedule::new(vec![
            DynamicObstacle::new(
                "a",
                MovementRule::Bounce(Bounce::new(cell(0, 0), cell(0, 2), 0)),
            ),
            DynamicObstacle::new(
                "b",
                MovementRule::Timetable(Timetable::new(vec![(6, cell(3, 3))])),
            ),
        ]);
        assert_eq!(schedule.recurrence(), Some(Recurrence::new(7, 4)));
        assert_eq!(schedule.time_key(3), 3);
        assert_eq!(schedule.time_key(11), 7);
        for time in 7..40 {
            let key = schedule.time_key(time);
            assert_eq!(schedule.occupied_cells(time), schedule.occupied_cells(key));
        }
    }

    #[test]
    fn repeated_queries_are_stable() {
        let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
            "patrol",
            MovementRule::Loop(Loop::new(vec![cell(0, 0), cell(0, 1)], 0).expect("cells")),
        )]);
        for time in 0..10 {
            let first = schedule.occupied_cells(time);
            assert_eq!(first, schedule.occupied_cells(time));
            assert_eq!(schedule.position_of("patrol", time), first.first().copied());
        }
        assert_eq!(schedule.position_of("missing", 0), None);
    }

    #[test]
    fn snapshot_hides_ticks_beyond_horizon() {
        let schedule = ObstacleSchedule::new(vec![DynamicObstacle::new(
            "parked",
            MovementRule::Timetable(Timetable::new(vec![(2, cell(1, 1)), (5, cell(1, 1))])),
        )]);
        let snapshot = schedule.snapshot(Some(3));
        assert!(snapshot.occupied_at(cell(1, 1), 2));
        assert!(!snapshot.occupied_at(cell(1, 1), 5));
        assert_eq!(snapshot.time_key(3), 3);
        assert_eq!(snapshot.time_key(4), u64::MAX);

        let full = schedule.snapshot(None);
        assert!(full.occupied_at(cell(1, 1), 5));
        assert_eq!(full.time_key(9), 6);
    }
}
