//! Named input and output types exchanged with graph loaders and front-ends.
//!
//! These carry task names rather than indices; `TaskGraph::from_tasks`
//! validates and interns them before any search starts.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use std::collections::HashMap;

// std HashMap on the boundary types for PyO3 compatibility

/// An incoming edge: the task this one depends on and the cost of moving its
/// output to another processor.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub task_id: String,
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub comm_cost: i64,
}

impl Dependency {
    pub fn new(task_id: impl Into<String>, comm_cost: i64) -> Self {
        Self {
            task_id: task_id.into(),
            comm_cost,
        }
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl Dependency {
    #[new]
    #[pyo3(signature = (task_id, comm_cost=0))]
    fn py_new(task_id: String, comm_cost: i64) -> Self {
        Self::new(task_id, comm_cost)
    }

    fn __repr__(&self) -> String {
        format!(
            "Dependency(task_id={:?}, comm_cost={})",
            self.task_id, self.comm_cost
        )
    }
}

/// A task node as produced by a graph loader.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub id: String,
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub duration: i64,
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub dependencies: Vec<Dependency>,
}

impl Task {
    pub fn new(id: impl Into<String>, duration: i64) -> Self {
        Self {
            id: id.into(),
            duration,
            dependencies: Vec::new(),
        }
    }

    /// Builder-style helper used heavily by tests and loaders.
    pub fn depends_on(mut self, task_id: impl Into<String>, comm_cost: i64) -> Self {
        self.dependencies.push(Dependency::new(task_id, comm_cost));
        self
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl Task {
    #[new]
    #[pyo3(signature = (id, duration, dependencies=None))]
    fn py_new(id: String, duration: i64, dependencies: Option<Vec<Dependency>>) -> Self {
        Self {
            id,
            duration,
            dependencies: dependencies.unwrap_or_default(),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, duration={}, deps={})",
            self.id,
            self.duration,
            self.dependencies.len()
        )
    }
}

/// A task placed on a processor.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledTask {
    #[cfg_attr(feature = "python", pyo3(get))]
    pub task_id: String,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub start: u32,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub finish: u32,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub processor: u32,
}

#[cfg(feature = "python")]
#[pymethods]
impl ScheduledTask {
    fn __repr__(&self) -> String {
        format!(
            "ScheduledTask(task_id={:?}, start={}, finish={}, processor={})",
            self.task_id, self.start, self.finish, self.processor
        )
    }
}

/// Outcome of a solver run, keyed by task names.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, Default)]
pub struct AlgorithmResult {
    #[cfg_attr(feature = "python", pyo3(get))]
    pub scheduled_tasks: Vec<ScheduledTask>,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub makespan: u32,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub states_explored: u64,
    /// False when a time limit or cancellation stopped the search early.
    #[cfg_attr(feature = "python", pyo3(get))]
    pub exhausted: bool,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub algorithm_metadata: HashMap<String, String>,
}

#[cfg(feature = "python")]
#[pymethods]
impl AlgorithmResult {
    fn __repr__(&self) -> String {
        format!(
            "AlgorithmResult(makespan={}, scheduled_tasks={}, states_explored={}, exhausted={})",
            self.makespan,
            self.scheduled_tasks.len(),
            self.states_explored,
            self.exhausted
        )
    }
}
