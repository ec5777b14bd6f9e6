//! Python bindings for the dagsched solver.

use chrono::TimeDelta;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::sync::{Arc, Mutex};

use crate::config::SolverConfig;
use crate::graph::TaskGraph;
use crate::models::{AlgorithmResult, Dependency, ScheduledTask, Task};
use crate::search::{SearchCoordinator, SearchHandle, SearchProgress, SolverError};
use crate::validation::{schedule_from_records, validate_schedule};

fn value_error(err: impl ToString) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Find a minimum-makespan schedule for `tasks` on `num_processors`
/// identical processors.
///
/// # Raises
/// * ValueError if the graph or configuration is invalid, or if no schedule
///   meets the configured upper bound
#[pyfunction]
#[pyo3(signature = (tasks, num_processors, config=None))]
fn solve(
    py: Python<'_>,
    tasks: Vec<Task>,
    num_processors: usize,
    config: Option<SolverConfig>,
) -> PyResult<AlgorithmResult> {
    let config = config.unwrap_or_default();
    py.allow_threads(|| crate::solve_tasks(&tasks, num_processors, config))
        .map_err(value_error)
}

/// Check a schedule produced elsewhere against the task graph.
///
/// # Raises
/// * ValueError describing the first violated rule
#[pyfunction]
fn validate(
    tasks: Vec<Task>,
    num_processors: usize,
    scheduled_tasks: Vec<ScheduledTask>,
) -> PyResult<()> {
    let graph = TaskGraph::from_tasks(&tasks).map_err(value_error)?;
    let schedule = schedule_from_records(&graph, &scheduled_tasks).map_err(value_error)?;
    validate_schedule(&graph, &schedule, num_processors).map_err(value_error)
}

/// Start a search on a background thread and return a handle to poll it.
#[pyfunction]
#[pyo3(signature = (tasks, num_processors, config=None))]
fn start_search(
    tasks: Vec<Task>,
    num_processors: usize,
    config: Option<SolverConfig>,
) -> PyResult<PySearchHandle> {
    let config = config.unwrap_or_default();
    let num_threads = config.num_threads;
    let graph = Arc::new(TaskGraph::from_tasks(&tasks).map_err(value_error)?);
    let coordinator =
        SearchCoordinator::new(Arc::clone(&graph), num_processors, config).map_err(value_error)?;
    let handle = coordinator.spawn();

    Ok(PySearchHandle {
        progress: Arc::clone(handle.progress()),
        handle: Mutex::new(Some(handle)),
        graph,
        num_threads,
    })
}

/// Live view of a background search.
#[pyclass(name = "SearchHandle")]
pub struct PySearchHandle {
    progress: Arc<SearchProgress>,
    handle: Mutex<Option<SearchHandle>>,
    graph: Arc<TaskGraph>,
    num_threads: usize,
}

#[pymethods]
impl PySearchHandle {
    /// Number of search states explored so far.
    fn state_count(&self) -> u64 {
        self.progress.states_explored()
    }

    /// Makespan of the best schedule so far (or the bound still to beat).
    fn current_best(&self) -> u32 {
        self.progress.current_best()
    }

    /// True once after each improvement.
    fn best_changed(&self) -> bool {
        self.progress.best().take_changed()
    }

    fn best_schedule(&self) -> Option<Vec<ScheduledTask>> {
        self.progress
            .best()
            .snapshot()
            .map(|schedule| schedule.to_scheduled_tasks(&self.graph))
    }

    fn is_done(&self) -> bool {
        self.progress.is_done()
    }

    fn cancel(&self) {
        self.progress.cancel();
    }

    fn elapsed(&self) -> TimeDelta {
        self.progress.elapsed()
    }

    /// Block until the search finishes and return its result.
    ///
    /// # Raises
    /// * ValueError if the search found no schedule or was already joined
    fn join(&self, py: Python<'_>) -> PyResult<AlgorithmResult> {
        let taken = self
            .handle
            .lock()
            .map_err(|_| value_error("search handle lock poisoned"))?
            .take();
        let mut handle = taken.ok_or_else(|| value_error(SolverError::AlreadyJoined))?;
        let outcome = py.allow_threads(|| handle.join()).map_err(value_error)?;
        Ok(outcome.to_algorithm_result(&self.graph, self.num_threads))
    }

    fn __repr__(&self) -> String {
        format!(
            "SearchHandle(states={}, best={}, done={})",
            self.progress.states_explored(),
            self.progress.current_best(),
            self.progress.is_done()
        )
    }
}

/// The dagsched.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<Dependency>()?;
    m.add_class::<Task>()?;
    m.add_class::<ScheduledTask>()?;
    m.add_class::<AlgorithmResult>()?;
    m.add_class::<PySearchHandle>()?;

    // Config types
    m.add_class::<SolverConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(solve, m)?)?;
    m.add_function(wrap_pyfunction!(validate, m)?)?;
    m.add_function(wrap_pyfunction!(start_search, m)?)?;

    Ok(())
}
