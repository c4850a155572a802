//! The facade crate: plans a bound query, optimizes it, lowers it to an
//! executor tree, and pulls morsels from it — spec.md §2's "PLANNER ->
//! OPTIMIZER -> EXECUTOR" pipeline end to end.
//!
//! Grounded on the shape of the teacher's own top-level `risingwave_cmd_all`
//! crate: a thin binding crate that wires the lower layers together and
//! owns nothing but the wiring itself. `connector` is the one piece of
//! actual logic this crate carries (the built-in sample tables spec.md §8's
//! scenarios run against); everything else delegates to
//! `opteryx_frontend`/`opteryx_batch`.

pub mod connector;

use opteryx_batch::build::build_executor;
use opteryx_batch::executor::{BoxedExecutor, CancellationToken};
pub use opteryx_common::config::EngineConfig;
use opteryx_common::array::Morsel;
use opteryx_common::error::Result;
pub use opteryx_common::stats::QueryStats;
use opteryx_common::stats::Stopwatch;
pub use opteryx_frontend::explain::{explain, explain_columns};
pub use opteryx_frontend::optimizer::{optimize, optimize_with_context, standard_strategies, OptimizerContext};
pub use opteryx_frontend::plan::{NodeId, Plan, PlanNodeKind};
pub use opteryx_frontend::planner::build_plan;
pub use opteryx_frontend::BoundQuery;
pub use opteryx_common::error::{ErrorCode, OpteryxError};

pub use connector::{Connector, ConnectorRegistry, SampleTableConnector};

/// Default per-operator memory budget (spec.md §5, §3.9): 512 MiB. Large
/// enough that none of spec.md §8's sample-table scenarios come close to
/// it, small enough that a runaway build side still fails fast in tests
/// rather than exhausting the host.
pub const DEFAULT_MEMORY_LIMIT_BYTES: i64 = 512 * 1024 * 1024;

/// Binds and optimizes `ast` into a ready-to-execute [`Plan`]: spec.md
/// §4.1's planner followed by §4.2's fixed 15-strategy optimizer catalog,
/// run once in order (no fixpoint iteration). `registry`'s connectors'
/// [`opteryx_frontend::optimizer::ScanCapabilities`] seed the optimizer
/// context so `PredicatePushdown`/`ProjectionPushdown`/`OperatorFusion`
/// only fuse work into a `Scan` a connector has actually said it will
/// honour (spec.md §6.2).
pub fn plan_query(ast: &BoundQuery, registry: &ConnectorRegistry) -> Result<Plan> {
    let mut plan = build_plan(ast)?;
    let mut ctx = OptimizerContext::default();
    for (table, connector) in registry.iter() {
        ctx.set_capabilities(table.clone(), connector.capabilities());
    }
    optimize_with_context(&mut plan, &standard_strategies(), &mut ctx);
    Ok(plan)
}

/// A running query: the built executor tree plus the [`QueryStats`]
/// accumulating as morsels are pulled (spec.md §6.3's
/// `execute(plan) -> Iterator<Morsel>` plus `statistics() -> QueryStats`,
/// expressed as one pull handle instead of two separate return values since
/// the statistics only exist meaningfully alongside the morsels they
/// describe).
pub struct QueryResult {
    root: BoxedExecutor,
    root_id: NodeId,
    stats: QueryStats,
    cancel: CancellationToken,
}

impl QueryResult {
    /// Pulls the next morsel, recording its row/byte count and wall-clock
    /// against the plan's root node id.
    pub async fn next(&mut self) -> Result<Option<Morsel>> {
        let sw = Stopwatch::start();
        let morsel = self.root.next().await?;
        if let Some(m) = &morsel {
            self.stats.record_morsel(self.root_id.0, m.row_count() as u64, m.approx_byte_size() as u64, sw.elapsed());
        }
        Ok(morsel)
    }

    /// Drains every remaining morsel into one `Vec`, for callers that don't
    /// need to stream (spec.md §8's scenario tests all check a fixed, small
    /// result set).
    pub async fn collect(mut self) -> Result<Vec<Morsel>> {
        let mut out = Vec::new();
        while let Some(morsel) = self.next().await? {
            out.push(morsel);
        }
        Ok(out)
    }

    pub fn statistics(&self) -> &QueryStats {
        &self.stats
    }

    /// A token the caller can flip from another task to cooperatively stop
    /// this query (spec.md §5) — checked at the top of every operator's
    /// `next()`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Lowers `plan`'s root to an executor tree and returns a pull handle over
/// it, using `registry` to resolve `Scan` nodes and `memory_limit_bytes` as
/// the per-operator budget for every memory-bounded operator it builds.
///
/// `plan`'s root must not be `ShowColumns` or `Explain` — those render
/// directly from the `Plan`/`Schema` via [`explain`]/[`explain_columns`]
/// and have no executor form (spec.md §4.9). Callers should check
/// `plan.node(plan.root()).kind` before calling this.
pub async fn execute(plan: &Plan, registry: &ConnectorRegistry, memory_limit_bytes: i64) -> Result<QueryResult> {
    let cancel = CancellationToken::new();
    let root_id = plan.root();
    let root = build_executor(plan, root_id, registry, memory_limit_bytes, &cancel).await?;
    Ok(QueryResult { root, root_id, stats: QueryStats::new(), cancel })
}

/// [`execute`] against [`DEFAULT_MEMORY_LIMIT_BYTES`].
pub async fn execute_default(plan: &Plan, registry: &ConnectorRegistry) -> Result<QueryResult> {
    execute(plan, registry, DEFAULT_MEMORY_LIMIT_BYTES).await
}
