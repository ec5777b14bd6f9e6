//! Static analysis run once per graph before the search starts.
//!
//! Produces the bottom level of every task (used both as the candidate
//! ordering key and as an admissible lower bound) and the partition of tasks
//! into structurally interchangeable equivalence classes.

use rustc_hash::FxHashMap;

use crate::graph::{TaskGraph, Time};
use crate::interner::TaskIdx;

/// Identifier of an equivalence class; dense, assigned in order of each
/// class's lowest task index.
pub type ClassId = usize;

/// Precomputed, read-only facts about a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphAnalysis {
    bottom_levels: Vec<Time>,
    class_of: Vec<ClassId>,
    classes: Vec<Vec<TaskIdx>>,
}

impl GraphAnalysis {
    pub fn new(graph: &TaskGraph) -> Self {
        let bottom_levels = critical_path_bounds(graph);
        let (class_of, classes) = equivalence_classes(graph);
        Self {
            bottom_levels,
            class_of,
            classes,
        }
    }

    /// Longest duration-weighted path from `task` to any sink, own duration
    /// included.
    #[inline]
    pub fn bottom_level(&self, task: TaskIdx) -> Time {
        self.bottom_levels[task]
    }

    pub fn bottom_levels(&self) -> &[Time] {
        &self.bottom_levels
    }

    #[inline]
    pub fn class_of(&self, task: TaskIdx) -> ClassId {
        self.class_of[task]
    }

    pub fn classes(&self) -> &[Vec<TaskIdx>] {
        &self.classes
    }

    /// Members of the class containing `task`, including `task` itself.
    pub fn equivalent_tasks(&self, task: TaskIdx) -> &[TaskIdx] {
        &self.classes[self.class_of[task]]
    }

    /// Longest bottom level in the graph, a lower bound on any makespan.
    pub fn critical_path_length(&self) -> Time {
        self.bottom_levels.iter().copied().max().unwrap_or(0)
    }
}

/// `bound(t) = duration(t) + max(bound(c) for c in children(t))`, evaluated in
/// reverse topological order so children are always ready.
pub fn critical_path_bounds(graph: &TaskGraph) -> Vec<Time> {
    let mut bounds = vec![0; graph.num_tasks()];
    for &task in graph.topological_order().iter().rev() {
        let longest_child = graph
            .children(task)
            .iter()
            .map(|&c| bounds[c])
            .max()
            .unwrap_or(0);
        bounds[task] = graph.duration(task) + longest_child;
    }
    bounds
}

/// Structural signature: two tasks are interchangeable iff these match.
#[derive(Hash, PartialEq, Eq)]
struct Signature {
    duration: Time,
    /// (parent, cost into this task), sorted by parent.
    parents: Vec<(TaskIdx, Time)>,
    /// (child, cost out of this task), sorted by child.
    children: Vec<(TaskIdx, Time)>,
}

fn signature(graph: &TaskGraph, task: TaskIdx) -> Signature {
    let mut parents: Vec<(TaskIdx, Time)> = graph.incoming(task).collect();
    parents.sort_unstable();
    let mut children: Vec<(TaskIdx, Time)> = graph
        .children(task)
        .iter()
        .map(|&c| (c, graph.comm_cost(task, c)))
        .collect();
    children.sort_unstable();
    Signature {
        duration: graph.duration(task),
        parents,
        children,
    }
}

/// Partition tasks into classes of identical parents, children, duration and
/// incident communication costs.
pub fn equivalence_classes(graph: &TaskGraph) -> (Vec<ClassId>, Vec<Vec<TaskIdx>>) {
    let mut by_signature: FxHashMap<Signature, ClassId> = FxHashMap::default();
    let mut class_of = Vec::with_capacity(graph.num_tasks());
    let mut classes: Vec<Vec<TaskIdx>> = Vec::new();

    for task in 0..graph.num_tasks() {
        let next_id = classes.len();
        let id = *by_signature.entry(signature(graph, task)).or_insert(next_id);
        if id == next_id {
            classes.push(Vec::new());
        }
        classes[id].push(task);
        class_of.push(id);
    }

    (class_of, classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    /// a fans out to b, c, d which all feed e; b and c are twins, d differs in
    /// its outgoing cost.
    fn fan() -> TaskGraph {
        TaskGraph::from_tasks(&[
            Task::new("a", 2),
            Task::new("b", 3).depends_on("a", 1),
            Task::new("c", 3).depends_on("a", 1),
            Task::new("d", 3).depends_on("a", 1),
            Task::new("e", 1)
                .depends_on("b", 2)
                .depends_on("c", 2)
                .depends_on("d", 5),
        ])
        .unwrap()
    }

    #[test]
    fn test_bottom_levels() {
        let analysis = GraphAnalysis::new(&fan());
        assert_eq!(analysis.bottom_levels(), &[6, 4, 4, 4, 1]);
        assert_eq!(analysis.critical_path_length(), 6);
    }

    #[test]
    fn test_bottom_level_ignores_comm_costs() {
        let graph = TaskGraph::from_edges(&[2, 3], &[(0, 1, 100)]).unwrap();
        assert_eq!(critical_path_bounds(&graph), vec![5, 3]);
    }

    #[test]
    fn test_twins_share_a_class() {
        let analysis = GraphAnalysis::new(&fan());

        assert_eq!(analysis.class_of(1), analysis.class_of(2));
        assert_ne!(analysis.class_of(1), analysis.class_of(3));
        assert_eq!(analysis.equivalent_tasks(2), &[1, 2]);
        assert_eq!(analysis.classes().len(), 4);
    }

    #[test]
    fn test_duration_and_parents_distinguish_classes() {
        // Independent tasks: equal durations group, different durations split.
        let graph = TaskGraph::from_edges(&[3, 3, 5], &[]).unwrap();
        let analysis = GraphAnalysis::new(&graph);
        assert_eq!(analysis.class_of(0), analysis.class_of(1));
        assert_ne!(analysis.class_of(0), analysis.class_of(2));

        // Same duration, different parent.
        let graph = TaskGraph::from_edges(&[1, 1, 2, 2], &[(0, 2, 0), (1, 3, 0)]).unwrap();
        let analysis = GraphAnalysis::new(&graph);
        assert_ne!(analysis.class_of(2), analysis.class_of(3));
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let graph = fan();
        assert_eq!(GraphAnalysis::new(&graph), GraphAnalysis::new(&graph));
    }
}
