//! Sizing and scheduling knobs for the accumulation table.

use serde::{Deserialize, Serialize};

use crate::error::AccumulationError;

/// Configuration for table sizing and gather scheduling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Entries (and owner-map buckets) reserved up front.
    pub initial_entries: usize,
    /// Per-kind slot reserve for freshly created parameter sets.
    pub initial_slots_per_kind: usize,
    /// Upper bound on parameter sets kept for reuse after `compact`.
    pub max_recycled_sets: usize,

    /// Fan gather batches out over worker threads.
    pub parallel_gather: bool,
    /// Below this many batches the gather runs on the calling thread.
    pub min_parallel_batches: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_entries: 16,
            initial_slots_per_kind: 8,
            max_recycled_sets: 32,
            parallel_gather: true,
            min_parallel_batches: 4,
        }
    }
}

impl Config {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, AccumulationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether `batches` batches should be gathered in parallel.
    #[inline]
    pub fn gather_in_parallel(&self, batches: usize) -> bool {
        self.parallel_gather && batches >= self.min_parallel_batches.max(2)
    }
}
