//! Sequential and parallel drivers for the branch-and-bound engine.

use chrono::{DateTime, TimeDelta, Utc};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::config::SolverConfig;
use crate::graph::{GraphError, TaskGraph, Time};
use crate::list_schedule::{list_schedule, serial_schedule};
use crate::models::AlgorithmResult;
use crate::preprocess::GraphAnalysis;
use crate::schedule::Schedule;
use crate::{log_progress, log_trace};

use super::best::{BestSchedule, ProgressSnapshot, SearchProgress};
use super::engine::{child_states, BranchAndBound};
use super::filter::{DuplicateFilter, LocalFilter, SharedFilter, StateKey};
use super::state::ScheduleState;

/// Subproblems handed to the pool per worker thread.
const FRONTIER_PER_THREAD: usize = 4;

/// Errors that can occur while setting up or running a search.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid task graph: {0}")]
    InvalidGraph(#[from] GraphError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No schedule with makespan at most {0} exists")]
    NoScheduleBelowBound(Time),
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),
    #[error("Search thread panicked")]
    WorkerPanicked,
    #[error("Search was already joined")]
    AlreadyJoined,
}

/// Result of a finished (or stopped) search.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub schedule: Schedule,
    pub states_explored: u64,
    /// True when the whole space was covered, i.e. the schedule is optimal.
    pub exhausted: bool,
    pub elapsed: TimeDelta,
}

impl SearchOutcome {
    pub fn makespan(&self) -> Time {
        self.schedule.makespan
    }

    /// Name-keyed result for front-ends.
    pub fn to_algorithm_result(&self, graph: &TaskGraph, num_threads: usize) -> AlgorithmResult {
        let mut metadata = HashMap::new();
        metadata.insert("algorithm".to_string(), "branch_and_bound".to_string());
        metadata.insert("threads".to_string(), num_threads.to_string());
        metadata.insert(
            "elapsed_ms".to_string(),
            self.elapsed.num_milliseconds().to_string(),
        );

        AlgorithmResult {
            scheduled_tasks: self.schedule.to_scheduled_tasks(graph),
            makespan: self.schedule.makespan,
            states_explored: self.states_explored,
            exhausted: self.exhausted,
            algorithm_metadata: metadata,
        }
    }
}

/// Owns one search problem: graph, processor count, configuration and the
/// progress surface shared with every worker.
pub struct SearchCoordinator {
    graph: Arc<TaskGraph>,
    analysis: Arc<GraphAnalysis>,
    num_processors: usize,
    config: SolverConfig,
    progress: Arc<SearchProgress>,
}

impl SearchCoordinator {
    /// Validate the problem, analyse the graph and seed the best schedule.
    ///
    /// The seed is a greedy list schedule (or every task on one processor when
    /// seeding is disabled). A caller-supplied `upper_bound` replaces the seed
    /// when the seed does not meet it.
    pub fn new(
        graph: impl Into<Arc<TaskGraph>>,
        num_processors: usize,
        config: SolverConfig,
    ) -> Result<Self, SolverError> {
        if num_processors == 0 {
            return Err(SolverError::InvalidConfig(
                "num_processors must be at least 1".to_string(),
            ));
        }
        if config.num_threads == 0 {
            return Err(SolverError::InvalidConfig(
                "num_threads must be at least 1".to_string(),
            ));
        }

        let graph = graph.into();
        let analysis = Arc::new(GraphAnalysis::new(&graph));

        let seed = if config.use_list_schedule_seed {
            list_schedule(&graph, &analysis, num_processors)
        } else {
            serial_schedule(&graph)
        };
        log_progress!(
            config.verbosity,
            "Seed schedule: makespan {}, critical path {}",
            seed.makespan,
            analysis.critical_path_length()
        );

        let best = match config.upper_bound {
            Some(bound) if seed.makespan > bound => {
                BestSchedule::with_bound(bound.saturating_add(1))
            }
            _ => BestSchedule::seeded(seed),
        };

        Ok(Self {
            graph,
            analysis,
            num_processors,
            config,
            progress: Arc::new(SearchProgress::new(best)),
        })
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn num_processors(&self) -> usize {
        self.num_processors
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Progress surface; may be polled from other threads while `run` works.
    pub fn progress(&self) -> &Arc<SearchProgress> {
        &self.progress
    }

    /// Search to completion (or until cancelled / out of time) on the calling
    /// thread, using a worker pool when more than one thread is configured.
    pub fn run(&self) -> Result<SearchOutcome, SolverError> {
        let deadline = self
            .config
            .time_limit_ms
            .and_then(|ms| TimeDelta::try_milliseconds(i64::try_from(ms).ok()?))
            .and_then(|limit| Utc::now().checked_add_signed(limit));

        log_progress!(
            self.config.verbosity,
            "Branch and bound: {} tasks, {} processors, {} threads, initial bound {}",
            self.graph.num_tasks(),
            self.num_processors,
            self.config.num_threads,
            self.progress.current_best()
        );

        let result = if self.config.num_threads <= 1 {
            Ok(self.run_sequential(deadline))
        } else {
            self.run_parallel(deadline)
        };
        self.progress.mark_done();
        let exhausted = result? && !self.progress.is_cancelled();

        log_progress!(
            self.config.verbosity,
            "Search {} after {} states: makespan {}",
            if exhausted { "finished" } else { "stopped" },
            self.progress.states_explored(),
            self.progress.current_best()
        );

        let schedule = self.progress.best().snapshot().ok_or_else(|| {
            let bound = self
                .config
                .upper_bound
                .unwrap_or_else(|| self.progress.current_best());
            SolverError::NoScheduleBelowBound(bound)
        })?;

        Ok(SearchOutcome {
            schedule,
            states_explored: self.progress.states_explored(),
            exhausted,
            elapsed: self.progress.elapsed(),
        })
    }

    /// Run the search on a background thread.
    pub fn spawn(self) -> SearchHandle {
        let progress = Arc::clone(&self.progress);
        let handle = thread::spawn(move || self.run());
        SearchHandle {
            progress,
            handle: Some(handle),
        }
    }

    fn run_sequential(&self, deadline: Option<DateTime<Utc>>) -> bool {
        let mut state = ScheduleState::initial(&self.graph, self.num_processors);
        let filter = LocalFilter::new(self.config.duplicate_filter_capacity);
        let mut engine = BranchAndBound::new(&self.graph, &self.analysis, &self.progress, filter)
            .with_verbosity(self.config.verbosity)
            .with_deadline(deadline);
        engine.run(&mut state)
    }

    fn run_parallel(&self, deadline: Option<DateTime<Utc>>) -> Result<bool, SolverError> {
        let threads = self.config.num_threads;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SolverError::ThreadPool(e.to_string()))?;

        let frontier = self.frontier(threads * FRONTIER_PER_THREAD);
        log_progress!(
            self.config.verbosity,
            "Distributing {} subproblems over {} threads",
            frontier.len(),
            threads
        );

        let stopped = AtomicBool::new(false);
        let capacity = self.config.duplicate_filter_capacity;
        let explore = |filter: &mut dyn DuplicateFilter, mut state: ScheduleState| {
            let mut engine =
                BranchAndBound::new(&self.graph, &self.analysis, &self.progress, filter)
                    .with_verbosity(self.config.verbosity)
                    .with_deadline(deadline);
            if !engine.run(&mut state) {
                stopped.store(true, Ordering::Relaxed);
            }
        };

        pool.install(|| {
            if self.config.shared_duplicate_filter {
                let shared = SharedFilter::new(capacity);
                frontier
                    .into_par_iter()
                    .for_each(|state| explore(&mut shared.clone(), state));
            } else {
                frontier.into_par_iter().for_each_init(
                    || LocalFilter::new(capacity),
                    |filter, state| explore(filter, state),
                );
            }
        });

        Ok(!stopped.load(Ordering::Relaxed))
    }

    /// Expand the top of the tree breadth-first until there are at least
    /// `target` open subproblems (or nothing left to expand).
    ///
    /// Children come out in the same order and under the same pruning rules
    /// as in the sequential search, and duplicates are dropped.
    fn frontier(&self, target: usize) -> Vec<ScheduleState> {
        let mut frontier = vec![ScheduleState::initial(&self.graph, self.num_processors)];
        let mut expanded = 0;

        while frontier.len() < target && frontier.iter().any(|s| !s.is_complete()) {
            let best = self.progress.current_best();
            let mut seen = LocalFilter::new(None);
            let mut next = Vec::with_capacity(frontier.len() * 2);
            for state in frontier {
                if state.is_complete() {
                    next.push(state);
                    continue;
                }
                expanded += 1;
                for child in child_states(&self.graph, &self.analysis, &state, best) {
                    if seen.first_visit(StateKey::of(&child)) {
                        next.push(child);
                    }
                }
            }
            log_trace!(
                self.config.verbosity,
                "Frontier level: {} open subproblems",
                next.len()
            );
            frontier = next;
        }

        self.progress.add_states(expanded);
        frontier
    }
}

/// Background search started by `SearchCoordinator::spawn`.
pub struct SearchHandle {
    progress: Arc<SearchProgress>,
    handle: Option<JoinHandle<Result<SearchOutcome, SolverError>>>,
}

impl SearchHandle {
    pub fn progress(&self) -> &Arc<SearchProgress> {
        &self.progress
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn cancel(&self) {
        self.progress.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.progress.is_done()
    }

    /// Wait for the search thread and return its outcome. A second call
    /// reports `AlreadyJoined`.
    pub fn join(&mut self) -> Result<SearchOutcome, SolverError> {
        let handle = self.handle.take().ok_or(SolverError::AlreadyJoined)?;
        handle.join().map_err(|_| SolverError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use crate::test_support::random_graph;
    use crate::validation::validate_schedule;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn diamond() -> TaskGraph {
        TaskGraph::from_tasks(&[
            Task::new("a", 2),
            Task::new("b", 3).depends_on("a", 1),
            Task::new("c", 3).depends_on("a", 1),
            Task::new("d", 2).depends_on("b", 1).depends_on("c", 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_zero_processors_and_threads() {
        let err = SearchCoordinator::new(diamond(), 0, SolverConfig::default()).err();
        assert!(matches!(err, Some(SolverError::InvalidConfig(_))));

        let config = SolverConfig::default().with_threads(0);
        let err = SearchCoordinator::new(diamond(), 2, config).err();
        assert!(matches!(err, Some(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn test_sequential_run() {
        let graph = diamond();
        let coordinator =
            SearchCoordinator::new(graph.clone(), 2, SolverConfig::default()).unwrap();
        let outcome = coordinator.run().unwrap();

        assert!(outcome.exhausted);
        assert_eq!(outcome.makespan(), 8);
        assert!(coordinator.progress().is_done());
        validate_schedule(&graph, &outcome.schedule, 2).unwrap();
    }

    #[test]
    fn test_empty_graph() {
        let graph = TaskGraph::from_tasks(&[]).unwrap();
        let outcome = SearchCoordinator::new(graph, 3, SolverConfig::default())
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(outcome.makespan(), 0);
        assert!(outcome.schedule.placements.is_empty());
        assert!(outcome.exhausted);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..12 {
            let graph = Arc::new(random_graph(&mut rng, 5 + round % 4, 0.35));
            let processors = 2 + round % 2;

            let sequential =
                SearchCoordinator::new(Arc::clone(&graph), processors, SolverConfig::default())
                    .unwrap()
                    .run()
                    .unwrap();

            let mut config = SolverConfig::default().with_threads(3);
            config.shared_duplicate_filter = round % 2 == 1;
            let parallel = SearchCoordinator::new(Arc::clone(&graph), processors, config)
                .unwrap()
                .run()
                .unwrap();

            assert!(parallel.exhausted);
            assert_eq!(parallel.makespan(), sequential.makespan(), "round {round}");
            validate_schedule(&graph, &parallel.schedule, processors).unwrap();
        }
    }

    #[test]
    fn test_without_list_seed_still_optimal() {
        let config = SolverConfig {
            use_list_schedule_seed: false,
            ..SolverConfig::default()
        };
        let outcome = SearchCoordinator::new(diamond(), 2, config).unwrap().run().unwrap();
        assert_eq!(outcome.makespan(), 8);
    }

    #[test]
    fn test_upper_bound_is_respected() {
        let config = SolverConfig::default().with_upper_bound(8);
        let outcome = SearchCoordinator::new(diamond(), 2, config).unwrap().run().unwrap();
        assert!(outcome.makespan() <= 8);

        let config = SolverConfig {
            use_list_schedule_seed: false,
            ..SolverConfig::default().with_upper_bound(7)
        };
        let err = SearchCoordinator::new(diamond(), 2, config).unwrap().run().err();
        assert!(matches!(err, Some(SolverError::NoScheduleBelowBound(7))));
    }

    #[test]
    fn test_cancelled_search_keeps_seed() {
        let graph = TaskGraph::from_edges(&[3; 10], &[]).unwrap();
        let coordinator = SearchCoordinator::new(graph, 3, SolverConfig::default()).unwrap();
        coordinator.progress().cancel();
        let outcome = coordinator.run().unwrap();

        assert!(!outcome.exhausted);
        assert!(outcome.makespan() >= 12);
    }

    #[test]
    fn test_spawned_search_can_be_joined() {
        let coordinator = SearchCoordinator::new(diamond(), 2, SolverConfig::default()).unwrap();
        let mut handle = coordinator.spawn();
        let outcome = handle.join().unwrap();

        assert!(handle.is_done());
        assert_eq!(outcome.makespan(), 8);
        assert_eq!(handle.snapshot().best_makespan, 8);
        assert!(matches!(handle.join(), Err(SolverError::AlreadyJoined)));
    }

    #[test]
    fn test_algorithm_result() {
        let graph = diamond();
        let outcome = SearchCoordinator::new(graph.clone(), 2, SolverConfig::default())
            .unwrap()
            .run()
            .unwrap();
        let result = outcome.to_algorithm_result(&graph, 1);

        assert_eq!(result.makespan, 8);
        assert_eq!(result.scheduled_tasks.len(), 4);
        assert_eq!(result.scheduled_tasks[3].task_id, "d");
        assert_eq!(result.algorithm_metadata["algorithm"], "branch_and_bound");
    }
}
