//! Per-query statistics, replacing the teacher's module-level counters with
//! a struct owned by a single query execution (spec.md §9's "re-architect
//! as a per-query statistics struct" design note).

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Row/byte counters and timing for a single plan node, keyed by node id in
/// [`QueryStats::operators`].
#[derive(Debug, Clone, Default)]
pub struct OperatorStats {
    pub rows_produced: u64,
    pub bytes_produced: u64,
    pub wall_clock: Duration,
}

/// Satisfies spec.md §6.3's `statistics() -> QueryStats` contract: per
/// operator row/byte counts, optimizer flags fired, wall-clock, cache hits.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub operators: HashMap<u32, OperatorStats>,
    pub strategies_fired: Vec<String>,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_strategy_fired(&mut self, name: &str) {
        self.strategies_fired.push(name.to_string());
    }

    pub fn record_morsel(&mut self, node_id: u32, rows: u64, bytes: u64, elapsed: Duration) {
        let entry = self.operators.entry(node_id).or_default();
        entry.rows_produced += rows;
        entry.bytes_produced += bytes;
        entry.wall_clock += elapsed;
    }

    pub fn total_rows(&self) -> u64 {
        self.operators.values().map(|s| s.rows_produced).sum()
    }
}

/// Tiny RAII-style timer: `Stopwatch::start()` then `.elapsed()` at the
/// `next()` return site, mirroring how the teacher's executors wrap a
/// per-call timer around chunk production for its monitoring module.
pub struct Stopwatch(Instant);

impl Stopwatch {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}
