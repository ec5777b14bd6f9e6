//! Greedy schedules used to seed the branch-and-bound bound.

use std::cmp::Reverse;

use crate::graph::{TaskGraph, Time};
use crate::interner::TaskIdx;
use crate::preprocess::GraphAnalysis;
use crate::schedule::Schedule;

/// Critical-path list scheduling.
///
/// Repeatedly takes the ready task with the largest bottom level (ties to the
/// lowest index) and appends it to the processor where it can start earliest
/// (ties to the lowest processor). Communication costs are waived between
/// tasks on the same processor, as in the exact search.
pub fn list_schedule(
    graph: &TaskGraph,
    analysis: &GraphAnalysis,
    num_processors: usize,
) -> Schedule {
    let n = graph.num_tasks();
    let mut waiting_on: Vec<usize> = (0..n).map(|t| graph.parents(t).len()).collect();
    let mut ready: Vec<TaskIdx> = (0..n).filter(|&t| waiting_on[t] == 0).collect();

    let mut start_times: Vec<Time> = vec![0; n];
    let mut processors: Vec<usize> = vec![0; n];
    let mut processor_finish: Vec<Time> = vec![0; num_processors.max(1)];

    while let Some(pos) = ready
        .iter()
        .enumerate()
        .max_by_key(|&(_, &t)| (analysis.bottom_level(t), Reverse(t)))
        .map(|(pos, _)| pos)
    {
        let task = ready.swap_remove(pos);

        let (start, processor) = (0..processor_finish.len())
            .map(|p| {
                let arrival = graph
                    .incoming(task)
                    .map(|(parent, cost)| {
                        let finish = start_times[parent] + graph.duration(parent);
                        if processors[parent] == p {
                            finish
                        } else {
                            finish + cost
                        }
                    })
                    .max()
                    .unwrap_or(0);
                (processor_finish[p].max(arrival), p)
            })
            .min()
            .unwrap_or((0, 0));

        start_times[task] = start;
        processors[task] = processor;
        processor_finish[processor] = start + graph.duration(task);

        for &child in graph.children(task) {
            waiting_on[child] -= 1;
            if waiting_on[child] == 0 {
                ready.push(child);
            }
        }
    }

    Schedule::from_assignment(graph, &start_times, &processors)
}

/// Every task on processor 0 in topological order. Its makespan is the total
/// work, the loosest bound any schedule can have.
pub fn serial_schedule(graph: &TaskGraph) -> Schedule {
    let n = graph.num_tasks();
    let mut start_times = vec![0; n];
    let mut time: Time = 0;
    for &task in graph.topological_order() {
        start_times[task] = time;
        time += graph.duration(task);
    }
    Schedule::from_assignment(graph, &start_times, &vec![0; n])
}
