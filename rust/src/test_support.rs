//! Helpers shared by the unit tests: random graphs and an exhaustive solver.

use rand::Rng;

use crate::graph::{TaskGraph, Time};
use crate::interner::TaskIdx;

/// Random DAG with edges only from lower to higher index.
pub fn random_graph<R: Rng>(rng: &mut R, num_tasks: usize, edge_probability: f64) -> TaskGraph {
    let durations: Vec<Time> = (0..num_tasks).map(|_| rng.random_range(1..=6)).collect();
    let mut edges = Vec::new();
    for parent in 0..num_tasks {
        for child in parent + 1..num_tasks {
            if rng.random_bool(edge_probability) {
                edges.push((parent, child, rng.random_range(0..=4)));
            }
        }
    }
    TaskGraph::from_edges(&durations, &edges).expect("forward edges form a DAG")
}

/// Optimal makespan by trying every order of ready tasks on every processor,
/// each task appended as early as possible. Only usable on tiny graphs.
pub fn brute_force_makespan(graph: &TaskGraph, num_processors: usize) -> Time {
    if graph.is_empty() {
        return 0;
    }
    let mut search = Exhaustive {
        graph,
        placements: vec![None; graph.num_tasks()],
        processor_finish: vec![0; num_processors],
        best: Time::MAX,
    };
    search.run(0);
    search.best
}

struct Exhaustive<'a> {
    graph: &'a TaskGraph,
    placements: Vec<Option<(Time, usize)>>,
    processor_finish: Vec<Time>,
    best: Time,
}

impl Exhaustive<'_> {
    fn run(&mut self, placed: usize) {
        let makespan = self.processor_finish.iter().copied().max().unwrap_or(0);
        if makespan >= self.best {
            return;
        }
        if placed == self.graph.num_tasks() {
            self.best = makespan;
            return;
        }

        for task in 0..self.graph.num_tasks() {
            if !self.is_ready(task) {
                continue;
            }
            for processor in 0..self.processor_finish.len() {
                let start = self.earliest_start(task, processor);
                let previous = self.processor_finish[processor];
                self.processor_finish[processor] = start + self.graph.duration(task);
                self.placements[task] = Some((start, processor));

                self.run(placed + 1);

                self.placements[task] = None;
                self.processor_finish[processor] = previous;
            }
        }
    }

    fn is_ready(&self, task: TaskIdx) -> bool {
        self.placements[task].is_none()
            && self
                .graph
                .parents(task)
                .iter()
                .all(|&p| self.placements[p].is_some())
    }

    fn earliest_start(&self, task: TaskIdx, processor: usize) -> Time {
        let arrival = self
            .graph
            .incoming(task)
            .filter_map(|(parent, cost)| {
                let (start, on) = self.placements[parent]?;
                let finish = start + self.graph.duration(parent);
                Some(if on == processor { finish } else { finish + cost })
            })
            .max()
            .unwrap_or(0);
        self.processor_finish[processor].max(arrival)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_brute_force_small_cases() {
        let independent = TaskGraph::from_edges(&[3, 5], &[]).unwrap();
        assert_eq!(brute_force_makespan(&independent, 2), 5);
        assert_eq!(brute_force_makespan(&independent, 1), 8);

        let chain = TaskGraph::from_edges(&[2, 3], &[(0, 1, 4)]).unwrap();
        assert_eq!(brute_force_makespan(&chain, 2), 5);
    }

    #[test]
    fn test_random_graph_is_seeded() {
        let a = random_graph(&mut StdRng::seed_from_u64(3), 6, 0.5);
        let b = random_graph(&mut StdRng::seed_from_u64(3), 6, 0.5);

        assert_eq!(a.edges().collect::<Vec<_>>(), b.edges().collect::<Vec<_>>());
        assert_eq!(a.num_tasks(), 6);
    }
}
