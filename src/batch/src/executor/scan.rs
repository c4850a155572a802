//! The `Scan` operator: a thin wrapper around whatever
//! [`crate::connector::Connector::read`] hands back.
//!
//! Projection/predicate/limit hints are the connector's to honour or ignore
//! (spec.md §6.2). When `opteryx_frontend::optimizer::rules::ProjectionPushdown`
//! narrows a scan's `projected_columns`, it narrows the `Scan` node's own
//! reported [`Schema`] to match in the same step, so this executor's
//! declared schema always agrees with whatever shape of morsel a connector
//! that honours the hint will actually return. A connector that ignores the
//! hint and returns full-width morsels anyway is the one still
//! unsupported here — this executor does no re-projection of its own.

use async_trait::async_trait;
use opteryx_common::array::Morsel;
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

pub struct ScanExecutor {
    schema: Schema,
    inner: BoxedExecutor,
    cancel: CancellationToken,
}

impl ScanExecutor {
    pub fn new(schema: Schema, inner: BoxedExecutor, cancel: CancellationToken) -> Self {
        Self { schema, inner, cancel }
    }
}

#[async_trait]
impl Executor for ScanExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        self.inner.next().await
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "Scan"
    }
}
