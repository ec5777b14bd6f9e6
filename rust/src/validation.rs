//! Independent feasibility check for complete schedules.

use thiserror::Error;

use crate::graph::{TaskGraph, Time};
use crate::models::ScheduledTask;
use crate::schedule::{Placement, Schedule};

/// First rule a schedule breaks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleViolation {
    #[error("Schedule has {found} placements for {expected} tasks")]
    WrongTaskCount { expected: usize, found: usize },
    #[error("Schedule places unknown task {0}")]
    UnknownTask(String),
    #[error("Task {0} is placed more than once")]
    DuplicatePlacement(String),
    #[error("Task {0} is not placed")]
    MissingTask(String),
    #[error("Placement {index} is for task {task}")]
    MisplacedTask { index: usize, task: usize },
    #[error("Task {task} is on processor {processor}, only {num_processors} exist")]
    ProcessorOutOfRange {
        task: String,
        processor: usize,
        num_processors: usize,
    },
    #[error("Task {task} runs {start}..{finish} but has duration {duration}")]
    DurationMismatch {
        task: String,
        start: Time,
        finish: Time,
        duration: Time,
    },
    #[error("Task {child} starts at {start} before data from {parent} arrives at {arrival}")]
    PrecedenceViolated {
        parent: String,
        child: String,
        arrival: Time,
        start: Time,
    },
    #[error("Tasks {first} and {second} overlap on processor {processor}")]
    Overlap {
        processor: usize,
        first: String,
        second: String,
    },
    #[error("Reported makespan {reported} but last task finishes at {actual}")]
    MakespanMismatch { reported: Time, actual: Time },
}

/// Rebuild an index-addressed schedule from name-keyed records, taking
/// start, finish and processor as given. The makespan is the latest finish.
pub fn schedule_from_records(
    graph: &TaskGraph,
    records: &[ScheduledTask],
) -> Result<Schedule, ScheduleViolation> {
    let mut placements: Vec<Option<Placement>> = vec![None; graph.num_tasks()];
    for record in records {
        let task = graph
            .index_of(&record.task_id)
            .ok_or_else(|| ScheduleViolation::UnknownTask(record.task_id.clone()))?;
        if placements[task].is_some() {
            return Err(ScheduleViolation::DuplicatePlacement(record.task_id.clone()));
        }
        placements[task] = Some(Placement {
            task,
            start: record.start,
            finish: record.finish,
            processor: record.processor as usize,
        });
    }

    let placements = placements
        .into_iter()
        .enumerate()
        .map(|(task, placement)| {
            placement.ok_or_else(|| ScheduleViolation::MissingTask(graph.name(task).to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let makespan = placements.iter().map(|p| p.finish).max().unwrap_or(0);
    Ok(Schedule {
        placements,
        makespan,
    })
}

/// Check that `schedule` is a feasible schedule of `graph` on
/// `num_processors` processors and that its makespan is reported correctly.
pub fn validate_schedule(
    graph: &TaskGraph,
    schedule: &Schedule,
    num_processors: usize,
) -> Result<(), ScheduleViolation> {
    if schedule.placements.len() != graph.num_tasks() {
        return Err(ScheduleViolation::WrongTaskCount {
            expected: graph.num_tasks(),
            found: schedule.placements.len(),
        });
    }

    for (index, placement) in schedule.placements.iter().enumerate() {
        let task = placement.task;
        if task != index {
            return Err(ScheduleViolation::MisplacedTask { index, task });
        }
        if placement.processor >= num_processors {
            return Err(ScheduleViolation::ProcessorOutOfRange {
                task: graph.name(task).to_string(),
                processor: placement.processor,
                num_processors,
            });
        }
        let duration = graph.duration(task);
        if placement.start.checked_add(duration) != Some(placement.finish) {
            return Err(ScheduleViolation::DurationMismatch {
                task: graph.name(task).to_string(),
                start: placement.start,
                finish: placement.finish,
                duration,
            });
        }
    }

    for (parent, child, cost) in graph.edges() {
        let from = schedule.placement(parent);
        let to = schedule.placement(child);
        let delay = if from.processor == to.processor { 0 } else { cost };
        let arrival = from.finish.saturating_add(delay);
        if to.start < arrival {
            return Err(ScheduleViolation::PrecedenceViolated {
                parent: graph.name(parent).to_string(),
                child: graph.name(child).to_string(),
                arrival,
                start: to.start,
            });
        }
    }

    for (processor, lane) in schedule.by_processor(num_processors).iter().enumerate() {
        let mut previous: Option<&Placement> = None;
        // Zero-length tasks occupy no time and never overlap.
        for placement in lane.iter().filter(|p| p.start < p.finish) {
            if let Some(first) = previous {
                if placement.start < first.finish {
                    return Err(ScheduleViolation::Overlap {
                        processor,
                        first: graph.name(first.task).to_string(),
                        second: graph.name(placement.task).to_string(),
                    });
                }
            }
            previous = Some(placement);
        }
    }

    let actual = schedule.placements.iter().map(|p| p.finish).max().unwrap_or(0);
    if actual != schedule.makespan {
        return Err(ScheduleViolation::MakespanMismatch {
            reported: schedule.makespan,
            actual,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    fn chain() -> TaskGraph {
        TaskGraph::from_tasks(&[Task::new("a", 2), Task::new("b", 3).depends_on("a", 4)]).unwrap()
    }

    #[test]
    fn test_valid_schedules() {
        let graph = chain();
        let local = Schedule::from_assignment(&graph, &[0, 2], &[0, 0]);
        let remote = Schedule::from_assignment(&graph, &[0, 6], &[0, 1]);

        assert_eq!(validate_schedule(&graph, &local, 1), Ok(()));
        assert_eq!(validate_schedule(&graph, &remote, 2), Ok(()));
    }

    #[test]
    fn test_comm_delay_enforced_across_processors() {
        let graph = chain();
        let schedule = Schedule::from_assignment(&graph, &[0, 2], &[0, 1]);

        let err = validate_schedule(&graph, &schedule, 2).unwrap_err();
        assert_eq!(
            err,
            ScheduleViolation::PrecedenceViolated {
                parent: "a".to_string(),
                child: "b".to_string(),
                arrival: 6,
                start: 2,
            }
        );
    }

    #[test]
    fn test_overlap_detected() {
        let graph = TaskGraph::from_edges(&[3, 3], &[]).unwrap();
        let schedule = Schedule::from_assignment(&graph, &[0, 1], &[0, 0]);

        assert!(matches!(
            validate_schedule(&graph, &schedule, 1),
            Err(ScheduleViolation::Overlap { processor: 0, .. })
        ));
    }

    #[test]
    fn test_structural_violations() {
        let graph = chain();
        let good = Schedule::from_assignment(&graph, &[0, 2], &[0, 0]);

        let err = validate_schedule(&graph, &good, 0).unwrap_err();
        assert!(matches!(err, ScheduleViolation::ProcessorOutOfRange { .. }));

        let mut short = good.clone();
        short.placements.pop();
        assert!(matches!(
            validate_schedule(&graph, &short, 1),
            Err(ScheduleViolation::WrongTaskCount { expected: 2, found: 1 })
        ));

        let mut stretched = good.clone();
        stretched.placements[1].finish = 9;
        assert!(matches!(
            validate_schedule(&graph, &stretched, 1),
            Err(ScheduleViolation::DurationMismatch { .. })
        ));

        let mut misreported = good;
        misreported.makespan = 4;
        assert_eq!(
            validate_schedule(&graph, &misreported, 1),
            Err(ScheduleViolation::MakespanMismatch {
                reported: 4,
                actual: 5
            })
        );
    }

    #[test]
    fn test_schedule_from_records() {
        let graph = chain();
        let record = |task_id: &str, start, finish, processor| ScheduledTask {
            task_id: task_id.to_string(),
            start,
            finish,
            processor,
        };

        let schedule =
            schedule_from_records(&graph, &[record("b", 6, 9, 1), record("a", 0, 2, 0)]).unwrap();
        assert_eq!(schedule.makespan, 9);
        assert_eq!(validate_schedule(&graph, &schedule, 2), Ok(()));

        assert_eq!(
            schedule_from_records(&graph, &[record("a", 0, 2, 0)]),
            Err(ScheduleViolation::MissingTask("b".to_string()))
        );
        assert_eq!(
            schedule_from_records(&graph, &[record("z", 0, 2, 0)]),
            Err(ScheduleViolation::UnknownTask("z".to_string()))
        );
        assert_eq!(
            schedule_from_records(&graph, &[record("a", 0, 2, 0), record("a", 2, 4, 0)]),
            Err(ScheduleViolation::DuplicatePlacement("a".to_string()))
        );
    }
}
