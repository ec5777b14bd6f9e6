//! Shared best-schedule record and the progress surface polled by front-ends.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::graph::{TaskGraph, Time};
use crate::schedule::Schedule;

use super::state::ScheduleState;

/// Best complete schedule found so far.
///
/// `bound()` is a lock-free read of the current makespan bound. It may be
/// stale, which only makes pruning less aggressive since the bound never
/// increases. Improvements go through `try_improve`, which re-checks under
/// the lock so concurrent workers can never lose a better schedule.
#[derive(Debug)]
pub struct BestSchedule {
    bound: AtomicU32,
    record: Mutex<Option<Schedule>>,
    changed: AtomicBool,
}

impl BestSchedule {
    /// Start from a bare bound with no schedule behind it.
    pub fn with_bound(bound: Time) -> Self {
        Self {
            bound: AtomicU32::new(bound),
            record: Mutex::new(None),
            changed: AtomicBool::new(false),
        }
    }

    /// Start from a known complete schedule.
    pub fn seeded(schedule: Schedule) -> Self {
        Self {
            bound: AtomicU32::new(schedule.makespan),
            record: Mutex::new(Some(schedule)),
            changed: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn bound(&self) -> Time {
        self.bound.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Schedule>> {
        // Writers only replace the whole value, so a poisoned record is intact.
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `state` if it is complete and strictly beats the current bound.
    pub fn try_improve(&self, graph: &TaskGraph, state: &ScheduleState) -> bool {
        let makespan = state.makespan();
        if !state.is_complete() || makespan >= self.bound() {
            return false;
        }

        let mut record = self.lock();
        // Another worker may have improved the bound since the unlocked check.
        if makespan >= self.bound.load(Ordering::Acquire) {
            return false;
        }

        *record = Some(Schedule::from_state(graph, state));
        self.bound.store(makespan, Ordering::Release);
        self.changed.store(true, Ordering::Release);
        true
    }

    /// Copy of the best complete schedule, if any was found or seeded.
    pub fn snapshot(&self) -> Option<Schedule> {
        self.lock().clone()
    }

    /// True once per improvement; lets pollers skip redrawing unchanged results.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}

/// Live view of a running search, safe to poll from any thread.
#[derive(Debug)]
pub struct SearchProgress {
    best: BestSchedule,
    states_explored: AtomicU64,
    done: AtomicBool,
    cancelled: AtomicBool,
    started_at: DateTime<Utc>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of `SearchProgress`.
#[derive(Clone, Debug)]
pub struct ProgressSnapshot {
    pub states_explored: u64,
    pub best_makespan: Time,
    pub best_schedule: Option<Schedule>,
    pub done: bool,
    pub elapsed: TimeDelta,
}

impl SearchProgress {
    pub fn new(best: BestSchedule) -> Self {
        Self {
            best,
            states_explored: AtomicU64::new(0),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            started_at: Utc::now(),
            finished_at: Mutex::new(None),
        }
    }

    pub fn best(&self) -> &BestSchedule {
        &self.best
    }

    pub fn current_best(&self) -> Time {
        self.best.bound()
    }

    pub fn states_explored(&self) -> u64 {
        self.states_explored.load(Ordering::Relaxed)
    }

    /// Workers count locally and flush in batches.
    pub fn add_states(&self, count: u64) {
        self.states_explored.fetch_add(count, Ordering::Relaxed);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn mark_done(&self) {
        *self.finished_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        self.done.store(true, Ordering::Release);
    }

    /// Ask every worker to stop at its next frame entry.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since the search started, frozen once it finishes.
    pub fn elapsed(&self) -> TimeDelta {
        let finished = *self.finished_at.lock().unwrap_or_else(|e| e.into_inner());
        finished.unwrap_or_else(Utc::now) - self.started_at
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            states_explored: self.states_explored(),
            best_makespan: self.current_best(),
            best_schedule: self.best.snapshot(),
            done: self.is_done(),
            elapsed: self.elapsed(),
        }
    }
}
