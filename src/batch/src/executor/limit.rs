//! `Limit`/`Offset`: streaming row-count truncation, no buffering beyond
//! the morsel currently in flight (spec.md §4.7).

use async_trait::async_trait;
use opteryx_common::array::Morsel;
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

pub struct LimitExecutor {
    limit: u64,
    emitted: u64,
    input: BoxedExecutor,
    cancel: CancellationToken,
}

impl LimitExecutor {
    pub fn new(limit: u64, input: BoxedExecutor, cancel: CancellationToken) -> Self {
        Self { limit, emitted: 0, input, cancel }
    }
}

#[async_trait]
impl Executor for LimitExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        if self.emitted >= self.limit {
            return Ok(None);
        }
        let Some(morsel) = self.input.next().await? else { return Ok(None) };
        let remaining = (self.limit - self.emitted) as usize;
        if morsel.row_count() <= remaining {
            self.emitted += morsel.row_count() as u64;
            Ok(Some(morsel))
        } else {
            self.emitted = self.limit;
            let indices: Vec<usize> = (0..remaining).collect();
            Ok(Some(morsel.take(&indices)))
        }
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn name(&self) -> &'static str {
        "Limit"
    }
}

/// Drops the first `offset` rows across however many morsels that takes,
/// then passes everything after through unchanged.
pub struct OffsetExecutor {
    offset: u64,
    skipped: u64,
    input: BoxedExecutor,
    cancel: CancellationToken,
}

impl OffsetExecutor {
    pub fn new(offset: u64, input: BoxedExecutor, cancel: CancellationToken) -> Self {
        Self { offset, skipped: 0, input, cancel }
    }
}

#[async_trait]
impl Executor for OffsetExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        loop {
            self.cancel.check()?;
            let Some(morsel) = self.input.next().await? else { return Ok(None) };
            if self.skipped >= self.offset {
                return Ok(Some(morsel));
            }
            let still_to_skip = (self.offset - self.skipped) as usize;
            if morsel.row_count() <= still_to_skip {
                self.skipped += morsel.row_count() as u64;
                continue;
            }
            self.skipped = self.offset;
            let indices: Vec<usize> = (still_to_skip..morsel.row_count()).collect();
            return Ok(Some(morsel.take(&indices)));
        }
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn name(&self) -> &'static str {
        "Offset"
    }
}
