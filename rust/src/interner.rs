//! Task name interning.
//!
//! Task graphs arrive with string names (e.g. DOT node ids); the search works
//! on dense indices so every per-task table is a plain `Vec`.

use rustc_hash::FxHashMap;

/// Dense task index used by every search structure.
pub type TaskIdx = usize;

/// Bidirectional map between task names and dense indices.
#[derive(Debug, Clone, Default)]
pub struct TaskNameInterner {
    to_idx: FxHashMap<String, TaskIdx>,
    names: Vec<String>,
}

impl TaskNameInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_idx: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            names: Vec::with_capacity(capacity),
        }
    }

    /// Register a new name. Returns `None` if the name is already taken.
    pub fn insert_new(&mut self, name: &str) -> Option<TaskIdx> {
        if self.to_idx.contains_key(name) {
            return None;
        }
        let idx = self.names.len();
        self.names.push(name.to_string());
        self.to_idx.insert(name.to_string(), idx);
        Some(idx)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<TaskIdx> {
        self.to_idx.get(name).copied()
    }

    #[inline]
    pub fn resolve(&self, idx: TaskIdx) -> Option<&str> {
        self.names.get(idx).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
