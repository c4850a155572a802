//! The enumerated configuration surface from spec.md §6.5, promoted to a
//! real struct rather than left as free-floating environment variables.

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Row cap for a single morsel produced anywhere in the pipeline.
    pub max_local_buffer_capacity: usize,
    /// Upper bound on cache evictions a single query is allowed to trigger.
    pub max_cache_evictions_per_query: usize,
    /// Name of the catalog provider backing scan resolution (owned by the
    /// out-of-scope binder/catalog collaborator; carried here only so it can
    /// be threaded through to connectors).
    pub data_catalog_provider: String,
    pub data_catalog_connection: String,
    /// Toggles an alternative execution pipeline; unused by this core
    /// (no alternative pipeline ships here) but kept so downstream callers
    /// can probe it without a breaking config change.
    pub experimental_execution_engine: bool,
    /// Plan-emission verbosity: `0` is silent, higher values emit more of
    /// the optimizer's per-strategy debug trace (see spec.md §4.9).
    pub debug: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_local_buffer_capacity: 4096,
            max_cache_evictions_per_query: 32,
            data_catalog_provider: "default".to_string(),
            data_catalog_connection: String::new(),
            experimental_execution_engine: false,
            debug: 0,
        }
    }
}

impl EngineConfig {
    pub fn morsel_capacity(&self) -> usize {
        self.max_local_buffer_capacity
    }

    pub fn is_debug(&self) -> bool {
        self.debug > 0
    }
}
