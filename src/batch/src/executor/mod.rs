//! The operator framework: a pull-based `next() -> Option<Morsel>` contract
//! every plan node compiles down to (spec.md §4.4).
//!
//! Grounded on the teacher's `risingwave_batch::executor::Executor`
//! (`async_trait`, `fn schema(&self) -> &Schema`), minus its
//! `open`/`close` lifecycle hooks: this engine's executors are ready to pull
//! from as soon as they're constructed, matching spec.md §3.6's unchanged
//! lifecycle description ("built once per query, pulled until exhausted, then
//! dropped").

mod aggregate;
mod distinct;
mod filter;
mod join;
mod limit;
mod order;
mod project;
mod scan;
mod union;
mod unnest;

pub use aggregate::AggregateExecutor;
pub use distinct::DistinctExecutor;
pub use filter::FilterExecutor;
pub use join::{CrossJoinExecutor, HashJoinExecutor, JoinSide, NestedLoopJoinExecutor};
pub use limit::{LimitExecutor, OffsetExecutor};
pub use order::OrderExecutor;
pub use project::ProjectExecutor;
pub use scan::ScanExecutor;
pub use union::UnionExecutor;
pub use unnest::UnnestExecutor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use opteryx_common::array::Morsel;
use opteryx_common::catalog::Schema;
use opteryx_common::error::{ErrorCode, OpteryxError, Result};

/// One operator in the execution tree. `next()` is checked for cancellation
/// at its very top (spec.md §4.4, §5) before any work is done, and returns
/// `Ok(None)` once the operator is exhausted.
#[async_trait]
pub trait Executor: Send {
    async fn next(&mut self) -> Result<Option<Morsel>>;

    fn schema(&self) -> &Schema;

    /// A short operator name for `tracing` spans and `EXPLAIN` cross-checks;
    /// mirrors the teacher's `Executor::identity()`.
    fn name(&self) -> &'static str;
}

pub type BoxedExecutor = Box<dyn Executor>;

/// A query-scoped cooperative cancellation flag. Every executor's `next()`
/// checks it first; a scan collaborator or a caller's timeout task flips it
/// from outside the pull loop (spec.md §5).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(OpteryxError::from(ErrorCode::Cancelled))
        } else {
            Ok(())
        }
    }
}
