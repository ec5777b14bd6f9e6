//! Duplicate-state detection.
//!
//! Different placement orders frequently reach the same partial schedule. The
//! key stored here is the full canonical encoding of the schedule rather than
//! a hash of it, so two keys are equal only when the states are identical up
//! to processor relabelling. Such states have the same reachable futures,
//! which makes pruning on a hit safe.

use rustc_hash::FxHashSet;
use std::sync::{Arc, Mutex};

use super::state::ScheduleState;

/// Canonical encoding of a partial schedule.
///
/// Per used processor: the number of tasks on it followed by `(task, start)`
/// pairs in task order. Processor blocks are sorted, which erases processor
/// identity; idle processors contribute nothing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey(Box<[u32]>);

impl StateKey {
    pub fn of(state: &ScheduleState) -> Self {
        let mut lanes: Vec<Vec<u32>> = vec![Vec::new(); state.num_processors()];
        for (task, start, processor) in state.placed() {
            lanes[processor].push(task as u32);
            lanes[processor].push(start);
        }
        lanes.retain(|lane| !lane.is_empty());
        lanes.sort_unstable();

        let len = lanes.iter().map(|l| l.len() + 1).sum();
        let mut encoded = Vec::with_capacity(len);
        for lane in lanes {
            encoded.push((lane.len() / 2) as u32);
            encoded.extend(lane);
        }
        Self(encoded.into_boxed_slice())
    }
}

/// Membership set of already-explored partial schedules.
pub trait DuplicateFilter {
    fn seen(&self, key: &StateKey) -> bool;

    fn insert(&mut self, key: StateKey);

    /// Record `key`; true if it was not present before. Implementations shared
    /// between threads must do this as one atomic step.
    fn first_visit(&mut self, key: StateKey) -> bool {
        if self.seen(&key) {
            return false;
        }
        self.insert(key);
        true
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<F: DuplicateFilter + ?Sized> DuplicateFilter for &mut F {
    fn seen(&self, key: &StateKey) -> bool {
        (**self).seen(key)
    }

    fn insert(&mut self, key: StateKey) {
        (**self).insert(key)
    }

    fn first_visit(&mut self, key: StateKey) -> bool {
        (**self).first_visit(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Filter owned by a single worker.
#[derive(Debug, Default)]
pub struct LocalFilter {
    seen: FxHashSet<StateKey>,
    capacity: Option<usize>,
}

impl LocalFilter {
    /// `capacity` caps the number of recorded states; once reached, new states
    /// are no longer recorded (the search then only prunes less).
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            seen: FxHashSet::default(),
            capacity,
        }
    }
}

impl DuplicateFilter for LocalFilter {
    fn seen(&self, key: &StateKey) -> bool {
        self.seen.contains(key)
    }

    fn insert(&mut self, key: StateKey) {
        if self.capacity.is_some_and(|cap| self.seen.len() >= cap) {
            return;
        }
        self.seen.insert(key);
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Filter shared by every worker of a parallel search.
#[derive(Debug, Clone, Default)]
pub struct SharedFilter {
    seen: Arc<Mutex<FxHashSet<StateKey>>>,
    capacity: Option<usize>,
}

impl SharedFilter {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            seen: Arc::new(Mutex::new(FxHashSet::default())),
            capacity,
        }
    }

    fn with_set<R>(&self, f: impl FnOnce(&mut FxHashSet<StateKey>) -> R) -> R {
        // A poisoned set is still a valid set of explored states.
        let mut guard = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl DuplicateFilter for SharedFilter {
    fn seen(&self, key: &StateKey) -> bool {
        self.with_set(|set| set.contains(key))
    }

    fn insert(&mut self, key: StateKey) {
        let capacity = self.capacity;
        self.with_set(|set| {
            if capacity.map_or(true, |cap| set.len() < cap) {
                set.insert(key);
            }
        });
    }

    fn first_visit(&mut self, key: StateKey) -> bool {
        let capacity = self.capacity;
        self.with_set(|set| {
            if set.contains(&key) {
                return false;
            }
            if capacity.map_or(true, |cap| set.len() < cap) {
                set.insert(key);
            }
            true
        })
    }

    fn len(&self) -> usize {
        self.with_set(|set| set.len())
    }
}
