//! Exact branch-and-bound search for minimum-makespan schedules.
//!
//! Module structure:
//! - `state`: partial schedule with apply/undo mutations
//! - `filter`: duplicate-state detection
//! - `best`: shared best-schedule record and progress counters
//! - `engine`: the depth-first search itself
//! - `coordinator`: sequential/parallel driver and background handle

mod best;
mod coordinator;
mod engine;
mod filter;
mod state;

pub use best::{BestSchedule, ProgressSnapshot, SearchProgress};
pub use coordinator::{SearchCoordinator, SearchHandle, SearchOutcome, SolverError};
pub use engine::{child_states, ordered_candidates, BranchAndBound, FrameBounds};
pub use filter::{DuplicateFilter, LocalFilter, SharedFilter, StateKey};
pub use state::{DataArrival, PlacementUndo, ReleaseUndo, ScheduleState};
