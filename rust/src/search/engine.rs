//! Depth-first branch-and-bound over partial schedules.
//!
//! One `BranchAndBound` drives one exploration on one thread. Several may run
//! concurrently against the same `SearchProgress`; they only meet in the
//! shared best-schedule record (and in the duplicate filter, if shared).

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;

use crate::graph::{TaskGraph, Time};
use crate::interner::TaskIdx;
use crate::preprocess::{ClassId, GraphAnalysis};
use crate::{log_progress, log_pruning, log_trace};

use super::best::SearchProgress;
use super::filter::{DuplicateFilter, StateKey};
use super::state::ScheduleState;

/// States counted locally before being published to `SearchProgress`.
const STATE_FLUSH_INTERVAL: u64 = 4096;

/// How often (in states) the wall-clock deadline is consulted.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// The three frame-wide lower bounds on any completion of a partial schedule.
///
/// They depend only on the state, not on the candidate, and the best makespan
/// only ever decreases, so once one of them reaches the best the whole frame
/// is dead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameBounds {
    /// Earliest processor finish plus remaining work spread over all processors.
    pub load_balance: u64,
    /// Earliest processor finish plus the longest bottom level in the ready set.
    pub critical_path: u64,
    /// Latest processor finish; the schedule can only grow from here.
    pub latest_finish: u64,
}

impl FrameBounds {
    pub fn of(analysis: &GraphAnalysis, state: &ScheduleState) -> Self {
        let earliest = state.earliest_finish() as u64;
        let processors = state.num_processors().max(1) as u64;
        let longest_ready = state
            .ready()
            .iter()
            .map(|&t| analysis.bottom_level(t))
            .max()
            .unwrap_or(0);
        Self {
            load_balance: earliest + state.remaining_work().div_ceil(processors),
            critical_path: earliest + longest_ready as u64,
            latest_finish: state.latest_finish() as u64,
        }
    }

    pub fn lower_bound(&self) -> u64 {
        self.load_balance
            .max(self.critical_path)
            .max(self.latest_finish)
    }

    #[inline]
    pub fn prunes(&self, best: Time) -> bool {
        self.lower_bound() >= best as u64
    }
}

/// Ready tasks in exploration order with equivalent siblings removed.
///
/// Order is bottom level ascending, ties by index. Only the first member of
/// each equivalence class is kept: expanding any other member would explore a
/// mirror image of the same subtree.
pub fn ordered_candidates(analysis: &GraphAnalysis, ready: &[TaskIdx]) -> Vec<TaskIdx> {
    let mut candidates = ready.to_vec();
    candidates.sort_unstable_by_key(|&t| (analysis.bottom_level(t), t));
    let mut tried: FxHashSet<ClassId> = FxHashSet::default();
    candidates.retain(|&t| tried.insert(analysis.class_of(t)));
    candidates
}

/// Every state one placement away from `state` that can still beat `best`,
/// in the order the sequential search would visit them.
pub fn child_states(
    graph: &TaskGraph,
    analysis: &GraphAnalysis,
    state: &ScheduleState,
    best: Time,
) -> Vec<ScheduleState> {
    if state.is_complete() || FrameBounds::of(analysis, state).prunes(best) {
        return Vec::new();
    }

    let mut children = Vec::new();
    for task in ordered_candidates(analysis, state.ready()) {
        let mut released = state.clone();
        let _release = released.release(graph, task);
        let arrival = released.data_arrival(graph, task);
        for processor in released.candidate_processors() {
            let start = released.earliest_start(&arrival, processor);
            if start + analysis.bottom_level(task) >= best {
                continue;
            }
            let mut child = released.clone();
            let _placed = child.place(task, processor, start, graph.duration(task));
            children.push(child);
        }
    }
    children
}

/// Recursive branch-and-bound driver.
pub struct BranchAndBound<'a, F> {
    graph: &'a TaskGraph,
    analysis: &'a GraphAnalysis,
    progress: &'a SearchProgress,
    filter: F,
    verbosity: u8,
    deadline: Option<DateTime<Utc>>,
    unflushed_states: u64,
    states: u64,
    stopped: bool,
}

impl<'a, F: DuplicateFilter> BranchAndBound<'a, F> {
    pub fn new(
        graph: &'a TaskGraph,
        analysis: &'a GraphAnalysis,
        progress: &'a SearchProgress,
        filter: F,
    ) -> Self {
        Self {
            graph,
            analysis,
            progress,
            filter,
            verbosity: 0,
            deadline: None,
            unflushed_states: 0,
            states: 0,
            stopped: false,
        }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Explore everything reachable from `state`, which is left as it was
    /// found. Returns false if a deadline or cancellation cut the search short.
    pub fn run(&mut self, state: &mut ScheduleState) -> bool {
        self.search(state);
        self.flush_states();
        !self.stopped
    }

    /// States visited by this engine so far.
    pub fn states(&self) -> u64 {
        self.states
    }

    pub fn into_filter(self) -> F {
        self.filter
    }

    fn flush_states(&mut self) {
        if self.unflushed_states > 0 {
            self.progress.add_states(self.unflushed_states);
            self.unflushed_states = 0;
        }
    }

    fn count_state(&mut self) {
        self.states += 1;
        self.unflushed_states += 1;
        if self.unflushed_states >= STATE_FLUSH_INTERVAL {
            self.flush_states();
        }
    }

    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.progress.is_cancelled() {
            log_progress!(self.verbosity, "Search cancelled after {} states", self.states);
            self.stopped = true;
        } else if let Some(deadline) = self.deadline {
            if self.states % DEADLINE_CHECK_INTERVAL == 0 && Utc::now() >= deadline {
                log_progress!(self.verbosity, "Time limit reached after {} states", self.states);
                self.stopped = true;
            }
        }
        self.stopped
    }

    fn search(&mut self, state: &mut ScheduleState) {
        if self.should_stop() {
            return;
        }
        self.count_state();

        if state.is_complete() {
            if self.progress.best().try_improve(self.graph, state) {
                log_progress!(
                    self.verbosity,
                    "New best makespan {} after {} states",
                    state.makespan(),
                    self.progress.states_explored() + self.unflushed_states
                );
            }
            return;
        }

        if !self.filter.first_visit(StateKey::of(state)) {
            log_trace!(self.verbosity, "  Duplicate state, skipping");
            return;
        }

        let bounds = FrameBounds::of(self.analysis, state);
        let candidates = ordered_candidates(self.analysis, state.ready());
        log_trace!(
            self.verbosity,
            "Frame: {} placed, candidates {:?}, bounds {:?}",
            state.placed().count(),
            candidates,
            bounds
        );

        for task in candidates {
            let best = self.progress.current_best();
            if bounds.prunes(best) {
                log_pruning!(
                    self.verbosity,
                    "  Prune frame: lower bound {} >= best {} ({:?})",
                    bounds.lower_bound(),
                    best,
                    bounds
                );
                return;
            }
            self.expand(state, task);
            if self.stopped {
                return;
            }
        }
    }

    /// Try `task` on every useful processor.
    fn expand(&mut self, state: &mut ScheduleState, task: TaskIdx) {
        let graph = self.graph;
        let release = state.release(graph, task);
        let arrival = state.data_arrival(graph, task);
        let first_idle = state.first_idle_processor();
        let duration = graph.duration(task);
        let bottom_level = self.analysis.bottom_level(task);

        for processor in 0..state.num_processors() {
            if state.is_idle(processor) && Some(processor) != first_idle {
                continue;
            }
            let start = state.earliest_start(&arrival, processor);
            let best = self.progress.current_best();
            if start + bottom_level >= best {
                log_pruning!(
                    self.verbosity,
                    "  Skip task {} on P{}: start {} + bottom level {} >= best {}",
                    graph.name(task),
                    processor,
                    start,
                    bottom_level,
                    best
                );
                continue;
            }

            let placed = state.place(task, processor, start, duration);
            self.search(state);
            state.unplace(placed);
            if self.stopped {
                break;
            }
        }

        state.restore(graph, release);
    }
}
