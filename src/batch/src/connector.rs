//! The connector interface this engine consumes (spec.md §6.2): a named
//! table's schema, partition count, capability flags, and a way to open a
//! [`crate::executor::Executor`] reading one partition.
//!
//! The canonical public path for this trait is `opteryx::connector::Connector`
//! (the facade crate re-exports it) — it lives here, one layer below the
//! facade, so `build::build_executor` can depend on it without the facade
//! crate depending back on itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_expr::Expr;
use opteryx_frontend::optimizer::ScanCapabilities;

use crate::executor::BoxedExecutor;

#[async_trait]
pub trait Connector: Send + Sync {
    fn schema(&self) -> &Schema;

    /// Number of independently readable partitions; `1` for anything that
    /// doesn't model partitioning (spec.md §6.2's "capability flags" make
    /// `supports_partition_metadata` the real signal, this is just a count).
    fn partitions(&self) -> usize {
        1
    }

    fn capabilities(&self) -> ScanCapabilities {
        ScanCapabilities::default()
    }

    /// Opens partition `partition` as an [`crate::executor::Executor`].
    /// `projected_columns`/`predicates`/`limit_hint` are pushdown candidates
    /// the connector may honour in full, in part, or not at all — the engine
    /// re-applies whatever it doesn't see reflected in the returned
    /// executor's output (spec.md §6.2).
    async fn read(
        &self,
        partition: usize,
        projected_columns: Option<&[usize]>,
        predicates: &[Expr],
        limit_hint: Option<u64>,
    ) -> Result<BoxedExecutor>;
}

/// The table-name -> connector lookup a [`crate::build::build_executor`]
/// call consults to resolve a `Scan` plan node.
pub type ConnectorRegistry = HashMap<String, Arc<dyn Connector>>;
