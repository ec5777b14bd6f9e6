//! Partial schedule owned by the active search frame.
//!
//! Every mutation comes as an apply/undo pair: `release`/`restore` for the
//! ready-set bookkeeping of a candidate task and `place`/`unplace` for putting
//! it on a processor. Frames mutate in place and undo on the way out; the
//! state is only cloned when a subtree is handed to another worker.

use crate::graph::{TaskGraph, Time};
use crate::interner::TaskIdx;

/// Snapshot of which tasks are placed, where, when, and what may run next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleState {
    /// `(start, processor)`; `None` until the task is placed.
    placements: Vec<Option<(Time, usize)>>,
    /// Number of parents not yet released.
    in_degree: Vec<u32>,
    processor_finish: Vec<Time>,
    /// Tasks placed per processor; zero means the processor was never used.
    processor_load: Vec<u32>,
    placed_count: usize,
    remaining_work: u64,
    ready: Vec<TaskIdx>,
}

/// What `release` changed, needed to reverse it exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ReleaseUndo {
    task: TaskIdx,
    /// Where the task sat in the ready set.
    position: Option<usize>,
    newly_ready: usize,
}

/// What `place` changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct PlacementUndo {
    task: TaskIdx,
    processor: usize,
    prev_finish: Time,
}

impl ScheduleState {
    /// Empty schedule: nothing placed, every source ready.
    pub fn initial(graph: &TaskGraph, num_processors: usize) -> Self {
        let n = graph.num_tasks();
        let in_degree: Vec<u32> = (0..n).map(|t| graph.parents(t).len() as u32).collect();
        let ready = (0..n).filter(|&t| in_degree[t] == 0).collect();
        Self {
            placements: vec![None; n],
            in_degree,
            processor_finish: vec![0; num_processors],
            processor_load: vec![0; num_processors],
            placed_count: 0,
            remaining_work: graph.total_work(),
            ready,
        }
    }

    pub fn num_processors(&self) -> usize {
        self.processor_finish.len()
    }

    pub fn ready(&self) -> &[TaskIdx] {
        &self.ready
    }

    /// Every task has a placement.
    pub fn is_complete(&self) -> bool {
        self.placed_count == self.placements.len()
    }

    #[inline]
    pub fn start_time(&self, task: TaskIdx) -> Option<Time> {
        self.placements[task].map(|(start, _)| start)
    }

    #[inline]
    pub fn processor_of(&self, task: TaskIdx) -> Option<usize> {
        self.placements[task].map(|(_, processor)| processor)
    }

    #[inline]
    pub fn processor_finish(&self, processor: usize) -> Time {
        self.processor_finish[processor]
    }

    #[inline]
    pub fn is_idle(&self, processor: usize) -> bool {
        self.processor_load[processor] == 0
    }

    pub fn remaining_work(&self) -> u64 {
        self.remaining_work
    }

    pub fn earliest_finish(&self) -> Time {
        self.processor_finish.iter().copied().min().unwrap_or(0)
    }

    pub fn latest_finish(&self) -> Time {
        self.processor_finish.iter().copied().max().unwrap_or(0)
    }

    /// Current makespan; final once the state is complete.
    pub fn makespan(&self) -> Time {
        self.latest_finish()
    }

    /// Placed tasks as `(task, start, processor)` in task order.
    pub fn placed(&self) -> impl Iterator<Item = (TaskIdx, Time, usize)> + '_ {
        self.placements
            .iter()
            .enumerate()
            .filter_map(|(task, placed)| placed.map(|(start, processor)| (task, start, processor)))
    }

    /// Take `task` out of the ready set and release its children.
    ///
    /// Children whose last parent this was are appended to the ready set. The
    /// rest of the ready set keeps its order, so nested release/restore pairs
    /// always leave the appended children at the tail.
    pub fn release(&mut self, graph: &TaskGraph, task: TaskIdx) -> ReleaseUndo {
        let position = self.ready.iter().position(|&t| t == task);
        if let Some(position) = position {
            self.ready.remove(position);
        }
        self.remaining_work -= graph.duration(task) as u64;

        let mut newly_ready = 0;
        for &child in graph.children(task) {
            self.in_degree[child] -= 1;
            if self.in_degree[child] == 0 {
                self.ready.push(child);
                newly_ready += 1;
            }
        }
        ReleaseUndo {
            task,
            position,
            newly_ready,
        }
    }

    /// Exact inverse of `release`, ready-set order included.
    pub fn restore(&mut self, graph: &TaskGraph, undo: ReleaseUndo) {
        let task = undo.task;
        self.ready.truncate(self.ready.len() - undo.newly_ready);
        for &child in graph.children(task) {
            self.in_degree[child] += 1;
        }
        self.remaining_work += graph.duration(task) as u64;
        if let Some(position) = undo.position {
            self.ready.insert(position, task);
        }
    }

    /// Put `task` on `processor` starting at `start`.
    pub fn place(
        &mut self,
        task: TaskIdx,
        processor: usize,
        start: Time,
        duration: Time,
    ) -> PlacementUndo {
        let prev_finish = self.processor_finish[processor];
        self.processor_finish[processor] = start + duration;
        self.processor_load[processor] += 1;
        self.placed_count += 1;
        self.placements[task] = Some((start, processor));
        PlacementUndo {
            task,
            processor,
            prev_finish,
        }
    }

    /// Exact inverse of `place`.
    pub fn unplace(&mut self, undo: PlacementUndo) {
        self.processor_finish[undo.processor] = undo.prev_finish;
        self.processor_load[undo.processor] -= 1;
        self.placed_count -= 1;
        self.placements[undo.task] = None;
    }

    /// Processors worth trying for the next placement: every used processor
    /// plus the first idle one, since idle processors are interchangeable.
    pub fn candidate_processors(&self) -> impl Iterator<Item = usize> + '_ {
        let first_idle = self.first_idle_processor();
        (0..self.num_processors()).filter(move |&p| !self.is_idle(p) || Some(p) == first_idle)
    }

    pub fn first_idle_processor(&self) -> Option<usize> {
        (0..self.num_processors()).find(|&p| self.is_idle(p))
    }

    /// Earliest time `task`'s inputs can all be present, per processor.
    ///
    /// All parents of `task` must already be placed.
    pub fn data_arrival(&self, graph: &TaskGraph, task: TaskIdx) -> DataArrival {
        let mut arrival = DataArrival::default();
        for (parent, cost) in graph.incoming(task) {
            let Some((start, processor)) = self.placements[parent] else {
                debug_assert!(false, "parent {parent} of {task} is not placed");
                continue;
            };
            arrival.observe(start + graph.duration(parent) + cost, processor);
        }
        arrival
    }

    /// Earliest start of `task` on `processor` given its data arrival.
    #[inline]
    pub fn earliest_start(&self, arrival: &DataArrival, processor: usize) -> Time {
        self.processor_finish[processor].max(arrival.ready_on(processor))
    }
}

/// Largest parent arrival time (communication included), the processor that
/// produced it, and the largest arrival from any other processor.
///
/// Placing the task on the processor that produced the maximum waives that
/// transfer, so the binding arrival there is the second value. Parents already
/// on the target processor finish before its current finish time, so their
/// own (waived) arrivals never matter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataArrival {
    pub max: Time,
    pub max_processor: Option<usize>,
    pub second_max: Time,
}

impl DataArrival {
    fn observe(&mut self, arrival: Time, processor: usize) {
        if arrival >= self.max {
            if self.max_processor != Some(processor) {
                self.second_max = self.max;
            }
            self.max = arrival;
            self.max_processor = Some(processor);
        } else if self.max_processor != Some(processor) && arrival > self.second_max {
            self.second_max = arrival;
        }
    }

    #[inline]
    pub fn ready_on(&self, processor: usize) -> Time {
        if self.max_processor == Some(processor) {
            self.second_max
        } else {
            self.max
        }
    }
}
