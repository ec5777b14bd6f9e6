//! Configuration for the branch-and-bound solver.

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Knobs for a solver run. The processor count is part of the problem, not
/// the configuration, and is passed separately.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    /// Verbosity level: 0=silent, 1=progress, 2=pruning, 3=trace.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub verbosity: u8,
    /// Worker threads; 1 runs the sequential search on the calling thread.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub num_threads: usize,
    /// Caller-supplied makespan bound the result must beat or match.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub upper_bound: Option<u32>,
    /// Wall-clock budget; the best schedule so far is returned when it runs out.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub time_limit_ms: Option<u64>,
    /// Share one duplicate-state set between workers instead of one per worker.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub shared_duplicate_filter: bool,
    /// Stop recording new states once a filter holds this many (None = unbounded).
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub duplicate_filter_capacity: Option<usize>,
    /// Seed the bound with a greedy list schedule before searching.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub use_list_schedule_seed: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            num_threads: 1,
            upper_bound: None,
            time_limit_ms: None,
            shared_duplicate_filter: false,
            duplicate_filter_capacity: None,
            use_list_schedule_seed: true,
        }
    }
}

impl SolverConfig {
    /// Run on `num_threads` workers; other settings unchanged.
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_upper_bound(mut self, upper_bound: u32) -> Self {
        self.upper_bound = Some(upper_bound);
        self
    }

    pub fn with_time_limit_ms(mut self, time_limit_ms: u64) -> Self {
        self.time_limit_ms = Some(time_limit_ms);
        self
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl SolverConfig {
    #[new]
    #[pyo3(signature = (
        verbosity=None,
        num_threads=None,
        upper_bound=None,
        time_limit_ms=None,
        shared_duplicate_filter=None,
        duplicate_filter_capacity=None,
        use_list_schedule_seed=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn py_new(
        verbosity: Option<u8>,
        num_threads: Option<usize>,
        upper_bound: Option<u32>,
        time_limit_ms: Option<u64>,
        shared_duplicate_filter: Option<bool>,
        duplicate_filter_capacity: Option<usize>,
        use_list_schedule_seed: Option<bool>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            num_threads: num_threads.unwrap_or(defaults.num_threads),
            upper_bound,
            time_limit_ms,
            shared_duplicate_filter: shared_duplicate_filter
                .unwrap_or(defaults.shared_duplicate_filter),
            duplicate_filter_capacity,
            use_list_schedule_seed: use_list_schedule_seed
                .unwrap_or(defaults.use_list_schedule_seed),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SolverConfig(num_threads={}, upper_bound={:?}, time_limit_ms={:?}, verbosity={})",
            self.num_threads, self.upper_bound, self.time_limit_ms, self.verbosity
        )
    }
}
