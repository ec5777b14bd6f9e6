//! Exact multiprocessor scheduling of task graphs with communication costs.
//!
//! Given a DAG of tasks with durations and per-edge communication costs and a
//! number of identical processors, finds a schedule of minimum makespan by
//! branch-and-bound. Communication cost is only paid when a task and its
//! parent run on different processors.

// Allow clippy warning triggered by PyO3 macro expansion
#![cfg_attr(feature = "python", allow(clippy::useless_conversion))]

use std::sync::Arc;

mod config;
mod graph;
mod interner;
mod list_schedule;
pub mod logging;
mod models;
mod preprocess;
mod schedule;
pub mod search;
mod validation;

#[cfg(feature = "python")]
mod python;
#[cfg(test)]
mod test_support;

pub use config::SolverConfig;
pub use graph::{GraphError, TaskGraph, Time};
pub use interner::{TaskIdx, TaskNameInterner};
pub use list_schedule::{list_schedule, serial_schedule};
pub use models::{AlgorithmResult, Dependency, ScheduledTask, Task};
pub use preprocess::{critical_path_bounds, equivalence_classes, ClassId, GraphAnalysis};
pub use schedule::{Placement, Schedule};
pub use search::{SearchCoordinator, SearchHandle, SearchOutcome, SolverError};
pub use validation::{schedule_from_records, validate_schedule, ScheduleViolation};

/// Solve `graph` on `num_processors` processors.
///
/// # Errors
/// * `InvalidConfig` for zero processors or threads
/// * `NoScheduleBelowBound` if `config.upper_bound` cannot be met
/// * `ThreadPool` if the worker pool cannot be built
pub fn solve(
    graph: impl Into<Arc<TaskGraph>>,
    num_processors: usize,
    config: SolverConfig,
) -> Result<SearchOutcome, SolverError> {
    SearchCoordinator::new(graph, num_processors, config)?.run()
}

/// Validate named tasks, solve, and report the schedule by task name.
pub fn solve_tasks(
    tasks: &[Task],
    num_processors: usize,
    config: SolverConfig,
) -> Result<AlgorithmResult, SolverError> {
    let graph = Arc::new(TaskGraph::from_tasks(tasks)?);
    let num_threads = config.num_threads;
    let outcome = solve(Arc::clone(&graph), num_processors, config)?;
    Ok(outcome.to_algorithm_result(&graph, num_threads))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_chain() -> Vec<Task> {
        vec![Task::new("A", 2), Task::new("B", 3).depends_on("A", 4)]
    }

    #[test]
    fn test_solve_tasks_chain() {
        for processors in [1, 2] {
            let result = solve_tasks(&named_chain(), processors, SolverConfig::default()).unwrap();

            assert_eq!(result.makespan, 5);
            assert!(result.exhausted);
            let b = &result.scheduled_tasks[1];
            assert_eq!((b.task_id.as_str(), b.start, b.finish), ("B", 2, 5));
            assert_eq!(b.processor, result.scheduled_tasks[0].processor);
        }
    }

    #[test]
    fn test_solve_tasks_rejects_bad_input() {
        let cyclic = vec![
            Task::new("A", 1).depends_on("B", 0),
            Task::new("B", 1).depends_on("A", 0),
        ];
        assert!(matches!(
            solve_tasks(&cyclic, 2, SolverConfig::default()),
            Err(SolverError::InvalidGraph(GraphError::CircularDependency))
        ));

        let dangling = vec![Task::new("A", 1).depends_on("missing", 0)];
        assert!(matches!(
            solve_tasks(&dangling, 2, SolverConfig::default()),
            Err(SolverError::InvalidGraph(GraphError::UnknownDependency { .. }))
        ));

        assert!(matches!(
            solve_tasks(&named_chain(), 0, SolverConfig::default()),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_solved_schedule_round_trips_through_records() {
        let tasks = vec![
            Task::new("load", 2),
            Task::new("left", 4).depends_on("load", 3),
            Task::new("right", 4).depends_on("load", 3),
            Task::new("merge", 1).depends_on("left", 2).depends_on("right", 2),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        let result = solve_tasks(&tasks, 2, SolverConfig::default().with_threads(2)).unwrap();

        let schedule = schedule_from_records(&graph, &result.scheduled_tasks).unwrap();
        assert_eq!(validate_schedule(&graph, &schedule, 2), Ok(()));
        assert_eq!(schedule.makespan, result.makespan);
    }

    #[test]
    fn test_solve_is_feasible_and_optimal_on_random_graphs() {
        use crate::test_support::{brute_force_makespan, random_graph};
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0xda65);
        for round in 0..200 {
            let tasks = rng.random_range(1..=6);
            let processors = rng.random_range(1..=3);
            let graph = Arc::new(random_graph(&mut rng, tasks, 0.35));
            let expected = brute_force_makespan(&graph, processors);

            for use_list_schedule_seed in [false, true] {
                let config = SolverConfig {
                    use_list_schedule_seed,
                    ..SolverConfig::default()
                };
                let outcome = solve(Arc::clone(&graph), processors, config).unwrap();

                assert!(outcome.exhausted);
                assert_eq!(
                    validate_schedule(&graph, &outcome.schedule, processors),
                    Ok(()),
                    "round {round}, seeded {use_list_schedule_seed}"
                );
                assert_eq!(
                    outcome.makespan(),
                    expected,
                    "round {round}, seeded {use_list_schedule_seed}: {graph:?}"
                );
            }
        }
    }
}
