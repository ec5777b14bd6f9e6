//! Complete schedules as produced by the solvers.

use crate::graph::{TaskGraph, Time};
use crate::interner::TaskIdx;
use crate::models::ScheduledTask;
use crate::search::ScheduleState;

/// Where and when one task runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub task: TaskIdx,
    pub start: Time,
    pub finish: Time,
    pub processor: usize,
}

/// A complete schedule: one placement per task, indexed by task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub placements: Vec<Placement>,
    pub makespan: Time,
}

impl Schedule {
    /// Assemble a schedule from per-task start times and processors.
    pub fn from_assignment(
        graph: &TaskGraph,
        start_times: &[Time],
        processors: &[usize],
    ) -> Self {
        let placements: Vec<Placement> = (0..graph.num_tasks())
            .map(|task| Placement {
                task,
                start: start_times[task],
                finish: start_times[task] + graph.duration(task),
                processor: processors[task],
            })
            .collect();
        let makespan = placements.iter().map(|p| p.finish).max().unwrap_or(0);
        Self {
            placements,
            makespan,
        }
    }

    /// Assemble a schedule from a complete search state.
    pub fn from_state(graph: &TaskGraph, state: &ScheduleState) -> Self {
        let mut start_times = vec![0; graph.num_tasks()];
        let mut processors = vec![0; graph.num_tasks()];
        for (task, start, processor) in state.placed() {
            start_times[task] = start;
            processors[task] = processor;
        }
        Self::from_assignment(graph, &start_times, &processors)
    }

    pub fn placement(&self, task: TaskIdx) -> &Placement {
        &self.placements[task]
    }

    /// Placements grouped by processor and sorted by start time, the layout a
    /// Gantt-style front-end draws.
    pub fn by_processor(&self, num_processors: usize) -> Vec<Vec<Placement>> {
        let mut lanes: Vec<Vec<Placement>> = vec![Vec::new(); num_processors];
        for placement in &self.placements {
            if let Some(lane) = lanes.get_mut(placement.processor) {
                lane.push(*placement);
            }
        }
        for lane in &mut lanes {
            lane.sort_by_key(|p| (p.start, p.task));
        }
        lanes
    }

    /// Convert to name-keyed output records.
    pub fn to_scheduled_tasks(&self, graph: &TaskGraph) -> Vec<ScheduledTask> {
        self.placements
            .iter()
            .map(|p| ScheduledTask {
                task_id: graph.name(p.task).to_string(),
                start: p.start,
                finish: p.finish,
                processor: p.processor as u32,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_assignment_and_lanes() {
        let graph = TaskGraph::from_edges(&[2, 3, 1], &[(0, 2, 4)]).unwrap();
        let schedule = Schedule::from_assignment(&graph, &[0, 0, 2], &[0, 1, 0]);

        assert_eq!(schedule.makespan, 3);
        assert_eq!(schedule.placement(2).finish, 3);

        let lanes = schedule.by_processor(2);
        let lane0: Vec<TaskIdx> = lanes[0].iter().map(|p| p.task).collect();
        assert_eq!(lane0, vec![0, 2]);
        assert_eq!(lanes[1].len(), 1);

        let named = schedule.to_scheduled_tasks(&graph);
        assert_eq!(named[1].task_id, "1");
        assert_eq!(named[1].processor, 1);
    }
}
