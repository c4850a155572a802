//! Per-run optimizer bookkeeping: fired-strategy names, warnings, and the
//! connector capability flags pushdown/fusion rules consult.

use std::collections::HashMap;

/// The capability flags a connector exposes (spec.md §6.2). Defaulting to
/// all-`false` is the deliberate choice recorded in DESIGN.md for spec.md
/// §9's third open question: "capability absence should be treated as the
/// safe default" — an unregistered table never gets fused or pushed into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCapabilities {
    pub supports_projection_pushdown: bool,
    pub supports_predicate_pushdown: bool,
    pub supports_aggregate_pushdown: bool,
    pub supports_partition_metadata: bool,
}

/// Mutable state threaded through one full `optimize()` run: the collected
/// predicates a correlated-filter-lifting pass surfaces, the set of strategy
/// names that actually changed a node, and any non-fatal invariant warnings
/// (spec.md §4.2: "Any invariant violation is logged as a warning").
#[derive(Debug, Default)]
pub struct OptimizerContext {
    pub fired: Vec<String>,
    pub warnings: Vec<String>,
    capabilities: HashMap<String, ScanCapabilities>,
}

impl OptimizerContext {
    pub fn record_fired(&mut self, rule_name: &str) {
        tracing::debug!(rule = rule_name, "optimizer strategy fired");
        self.fired.push(rule_name.to_string());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "optimizer invariant warning");
        self.warnings.push(message);
    }

    pub fn set_capabilities(&mut self, table: impl Into<String>, capabilities: ScanCapabilities) {
        self.capabilities.insert(table.into(), capabilities);
    }

    /// Capabilities for `table`, or the all-`false` safe default if the
    /// connector never registered any.
    pub fn capabilities(&self, table: &str) -> ScanCapabilities {
        self.capabilities.get(table).copied().unwrap_or_default()
    }
}
