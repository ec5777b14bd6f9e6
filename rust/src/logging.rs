//! Search diagnostics on stderr, gated by `SolverConfig::verbosity`.
//!
//! Level 1 reports the seed, the start and end of a search, and every new
//! best makespan. Level 2 adds why subtrees were cut: which frame bound hit
//! the best, which processor placement was skipped. Level 3 prints every
//! frame's candidate list and bounds, and is only readable on tiny graphs.
//!
//! A disabled level costs one comparison; the format arguments are not
//! evaluated.

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_PROGRESS: u8 = 1;
pub const VERBOSITY_PRUNING: u8 = 2;
pub const VERBOSITY_TRACE: u8 = 3;

/// True when messages at `level` should be printed.
#[inline]
pub fn enabled(verbosity: u8, level: u8) -> bool {
    level != VERBOSITY_SILENT && verbosity >= level
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:expr, $verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($verbosity, $level) {
            eprintln!($($arg)*);
        }
    };
}

/// Search lifecycle and improvements.
#[macro_export]
macro_rules! log_progress {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::__log_at!($crate::logging::VERBOSITY_PROGRESS, $verbosity, $($arg)*)
    };
}

/// Bound and symmetry cuts.
#[macro_export]
macro_rules! log_pruning {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::__log_at!($crate::logging::VERBOSITY_PRUNING, $verbosity, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_trace {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::__log_at!($crate::logging::VERBOSITY_TRACE, $verbosity, $($arg)*)
    };
}
