//! Immutable task graph consumed by the preprocessor and the search.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use thiserror::Error;

use crate::interner::{TaskIdx, TaskNameInterner};
use crate::models::Task;

/// Time unit used for durations, communication costs and start times.
pub type Time = u32;

/// Reasons a graph is rejected before any search starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },
    #[error("Task {0} depends on itself")]
    SelfDependency(String),
    #[error("Task {task} lists dependency {dependency} more than once")]
    DuplicateDependency { task: String, dependency: String },
    #[error("Task {task} has negative duration {duration}")]
    NegativeDuration { task: String, duration: i64 },
    #[error("Edge {from} -> {to} has negative communication cost {cost}")]
    NegativeCommCost { from: String, to: String, cost: i64 },
    #[error("{context} = {value} exceeds the supported time range")]
    OutOfRange { context: String, value: u64 },
    #[error("Circular dependency detected in task graph")]
    CircularDependency,
}

/// Validated DAG of tasks with durations and per-edge communication costs.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    names: TaskNameInterner,
    durations: Vec<Time>,
    parents: Vec<Vec<TaskIdx>>,
    /// Communication cost of each entry in `parents`, same order.
    parent_costs: Vec<Vec<Time>>,
    children: Vec<Vec<TaskIdx>>,
    comm_costs: FxHashMap<(TaskIdx, TaskIdx), Time>,
    topo_order: Vec<TaskIdx>,
    total_work: u64,
}

impl TaskGraph {
    /// Build a graph from named tasks.
    ///
    /// Task indices follow the order of `tasks`. Parents and children are kept
    /// in declaration order.
    pub fn from_tasks(tasks: &[Task]) -> Result<Self, GraphError> {
        let mut names = TaskNameInterner::with_capacity(tasks.len());
        let mut durations = Vec::with_capacity(tasks.len());
        for task in tasks {
            if names.insert_new(&task.id).is_none() {
                return Err(GraphError::DuplicateTask(task.id.clone()));
            }
            if task.duration < 0 {
                return Err(GraphError::NegativeDuration {
                    task: task.id.clone(),
                    duration: task.duration,
                });
            }
            durations.push(to_time(task.duration as u64, || {
                format!("duration of {}", task.id)
            })?);
        }

        let mut edges = Vec::new();
        for (child, task) in tasks.iter().enumerate() {
            for dep in &task.dependencies {
                let Some(parent) = names.get(&dep.task_id) else {
                    return Err(GraphError::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dep.task_id.clone(),
                    });
                };
                if dep.comm_cost < 0 {
                    return Err(GraphError::NegativeCommCost {
                        from: dep.task_id.clone(),
                        to: task.id.clone(),
                        cost: dep.comm_cost,
                    });
                }
                let cost = to_time(dep.comm_cost as u64, || {
                    format!("communication cost {} -> {}", dep.task_id, task.id)
                })?;
                edges.push((parent, child, cost));
            }
        }

        Self::build(names, durations, &edges)
    }

    /// Build a graph from index-addressed durations and `(parent, child, cost)`
    /// edges. Tasks are named by their index.
    pub fn from_edges(
        durations: &[Time],
        edges: &[(TaskIdx, TaskIdx, Time)],
    ) -> Result<Self, GraphError> {
        let mut names = TaskNameInterner::with_capacity(durations.len());
        for idx in 0..durations.len() {
            names.insert_new(&idx.to_string());
        }
        for &(parent, child, _) in edges {
            let n = durations.len();
            if parent >= n || child >= n {
                let (task, dependency) = (child.to_string(), parent.to_string());
                return Err(GraphError::UnknownDependency { task, dependency });
            }
        }
        Self::build(names, durations.to_vec(), edges)
    }

    fn build(
        names: TaskNameInterner,
        durations: Vec<Time>,
        edges: &[(TaskIdx, TaskIdx, Time)],
    ) -> Result<Self, GraphError> {
        let n = durations.len();
        let mut parents: Vec<Vec<TaskIdx>> = vec![Vec::new(); n];
        let mut parent_costs: Vec<Vec<Time>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<TaskIdx>> = vec![Vec::new(); n];
        let mut comm_costs: FxHashMap<(TaskIdx, TaskIdx), Time> =
            FxHashMap::with_capacity_and_hasher(edges.len(), Default::default());

        let name_of = |idx: TaskIdx| names.resolve(idx).unwrap_or_default().to_string();

        // Every time the search can produce is bounded by this sum, which keeps
        // all start/finish arithmetic inside `Time`.
        let mut horizon: u64 = durations.iter().map(|&d| d as u64).sum();
        let total_work = horizon;

        for &(parent, child, cost) in edges {
            if parent == child {
                return Err(GraphError::SelfDependency(name_of(child)));
            }
            if comm_costs.insert((parent, child), cost).is_some() {
                return Err(GraphError::DuplicateDependency {
                    task: name_of(child),
                    dependency: name_of(parent),
                });
            }
            parents[child].push(parent);
            parent_costs[child].push(cost);
            children[parent].push(child);
            horizon += cost as u64;
        }

        if horizon > Time::MAX as u64 {
            return Err(GraphError::OutOfRange {
                context: "total work plus communication".to_string(),
                value: horizon,
            });
        }

        let topo_order = topological_sort(&parents, &children)?;

        Ok(Self {
            names,
            durations,
            parents,
            parent_costs,
            children,
            comm_costs,
            topo_order,
            total_work,
        })
    }

    pub fn num_tasks(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    #[inline]
    pub fn duration(&self, task: TaskIdx) -> Time {
        self.durations[task]
    }

    #[inline]
    pub fn parents(&self, task: TaskIdx) -> &[TaskIdx] {
        &self.parents[task]
    }

    #[inline]
    pub fn children(&self, task: TaskIdx) -> &[TaskIdx] {
        &self.children[task]
    }

    /// Parents of `task` paired with the cost of their edge into `task`.
    #[inline]
    pub fn incoming(&self, task: TaskIdx) -> impl Iterator<Item = (TaskIdx, Time)> + '_ {
        self.parents[task]
            .iter()
            .copied()
            .zip(self.parent_costs[task].iter().copied())
    }

    /// Communication cost of the edge `parent -> child`; 0 when there is no edge.
    pub fn comm_cost(&self, parent: TaskIdx, child: TaskIdx) -> Time {
        self.comm_costs.get(&(parent, child)).copied().unwrap_or(0)
    }

    pub fn has_edge(&self, parent: TaskIdx, child: TaskIdx) -> bool {
        self.comm_costs.contains_key(&(parent, child))
    }

    /// All edges as `(parent, child, cost)`, ordered by child then declaration.
    pub fn edges(&self) -> impl Iterator<Item = (TaskIdx, TaskIdx, Time)> + '_ {
        (0..self.num_tasks()).flat_map(move |child| {
            self.incoming(child)
                .map(move |(parent, cost)| (parent, child, cost))
        })
    }

    /// Tasks ordered so that every parent precedes its children.
    pub fn topological_order(&self) -> &[TaskIdx] {
        &self.topo_order
    }

    /// Sum of all task durations.
    pub fn total_work(&self) -> u64 {
        self.total_work
    }

    pub fn name(&self, task: TaskIdx) -> &str {
        self.names.resolve(task).unwrap_or_default()
    }

    pub fn index_of(&self, name: &str) -> Option<TaskIdx> {
        self.names.get(name)
    }
}

fn to_time(value: u64, context: impl FnOnce() -> String) -> Result<Time, GraphError> {
    Time::try_from(value).map_err(|_| GraphError::OutOfRange {
        context: context(),
        value,
    })
}

/// Kahn's algorithm; sources are released in index order so the result is
/// deterministic for a given graph.
fn topological_sort(
    parents: &[Vec<TaskIdx>],
    children: &[Vec<TaskIdx>],
) -> Result<Vec<TaskIdx>, GraphError> {
    let mut in_degree: Vec<usize> = parents.iter().map(|p| p.len()).collect();
    let mut queue: VecDeque<TaskIdx> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(idx, _)| idx)
        .collect();

    let mut order = Vec::with_capacity(parents.len());
    while let Some(task) = queue.pop_front() {
        order.push(task);
        for &child in &children[task] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if order.len() != parents.len() {
        return Err(GraphError::CircularDependency);
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Vec<Task> {
        vec![
            Task::new("a", 2),
            Task::new("b", 3).depends_on("a", 1),
            Task::new("c", 4).depends_on("a", 2),
            Task::new("d", 1).depends_on("b", 3).depends_on("c", 1),
        ]
    }

    #[test]
    fn test_accessors() {
        let graph = TaskGraph::from_tasks(&diamond()).unwrap();

        assert_eq!(graph.num_tasks(), 4);
        assert_eq!(graph.duration(2), 4);
        assert_eq!(graph.children(0), &[1, 2]);
        assert_eq!(graph.parents(3), &[1, 2]);
        assert_eq!(graph.comm_cost(1, 3), 3);
        assert_eq!(graph.comm_cost(0, 3), 0);
        assert!(!graph.has_edge(0, 3));
        assert_eq!(graph.total_work(), 10);
        assert_eq!(graph.name(3), "d");
        assert_eq!(graph.index_of("c"), Some(2));
        assert_eq!(graph.edges().count(), 4);
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let graph = TaskGraph::from_tasks(&diamond()).unwrap();
        let order = graph.topological_order();
        let position = |t: TaskIdx| order.iter().position(|&x| x == t).unwrap();

        for (parent, child, _) in graph.edges() {
            assert!(position(parent) < position(child));
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let tasks = vec![
            Task::new("a", 1).depends_on("b", 0),
            Task::new("b", 1).depends_on("a", 0),
        ];
        let err = TaskGraph::from_tasks(&tasks).unwrap_err();
        assert_eq!(err, GraphError::CircularDependency);
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let tasks = vec![Task::new("a", 1).depends_on("ghost", 0)];
        let err = TaskGraph::from_tasks(&tasks).unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency { .. }));

        let err = TaskGraph::from_edges(&[1, 1], &[(0, 5, 0)]).unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency { .. }));
    }

    #[test]
    fn test_negative_weights_rejected() {
        let err = TaskGraph::from_tasks(&[Task::new("a", -1)]).unwrap_err();
        assert!(matches!(err, GraphError::NegativeDuration { duration: -1, .. }));

        let tasks = vec![Task::new("a", 1), Task::new("b", 1).depends_on("a", -3)];
        let err = TaskGraph::from_tasks(&tasks).unwrap_err();
        assert!(matches!(err, GraphError::NegativeCommCost { cost: -3, .. }));
    }

    #[test]
    fn test_duplicates_and_self_loops_rejected() {
        let err = TaskGraph::from_tasks(&[Task::new("a", 1), Task::new("a", 2)]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateTask("a".to_string()));

        let err = TaskGraph::from_tasks(&[Task::new("a", 1).depends_on("a", 0)]).unwrap_err();
        assert_eq!(err, GraphError::SelfDependency("a".to_string()));

        let tasks = vec![
            Task::new("a", 1),
            Task::new("b", 1).depends_on("a", 0).depends_on("a", 2),
        ];
        let err = TaskGraph::from_tasks(&tasks).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateDependency { .. }));
    }

    #[test]
    fn test_time_overflow_rejected() {
        let tasks = vec![Task::new("a", Time::MAX as i64), Task::new("b", 1)];
        let err = TaskGraph::from_tasks(&tasks).unwrap_err();
        assert!(matches!(err, GraphError::OutOfRange { .. }));
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = TaskGraph::from_tasks(&[]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.topological_order().is_empty());
    }
}
