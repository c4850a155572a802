//! `Order`: a stable full sort over the buffered input (spec.md §4.7).
//!
//! This is a blocking operator by nature — every row must be seen before
//! the first output row can be produced — so unlike every other executor
//! in this crate it drains its child entirely on the first `next()` call,
//! then streams the sorted result back out one morsel at a time. No
//! external/spilling sort is attempted (spec.md's Non-goals exclude
//! disk-backed execution); the whole input is held in memory, tracked
//! against the query's [`opteryx_common::memory::MemoryContext`].

use std::cmp::Ordering;

use async_trait::async_trait;
use opteryx_common::array::Morsel;
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_common::memory::MemoryContext;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

const SORT_OUTPUT_MORSEL_SIZE: usize = 4096;

pub struct OrderExecutor {
    keys: Vec<(usize, bool)>,
    input: BoxedExecutor,
    mem: MemoryContext,
    cancel: CancellationToken,
    sorted: Option<std::vec::IntoIter<Morsel>>,
}

impl OrderExecutor {
    pub fn new(keys: Vec<(usize, bool)>, input: BoxedExecutor, mem: MemoryContext, cancel: CancellationToken) -> Self {
        Self { keys, input, mem, cancel, sorted: None }
    }

    async fn materialise(&mut self) -> Result<()> {
        let mut morsels = Vec::new();
        while let Some(morsel) = self.input.next().await? {
            self.cancel.check()?;
            self.mem.grow_or_oom(morsel.approx_byte_size() as i64, "Order")?;
            morsels.push(morsel);
        }
        if morsels.is_empty() {
            self.sorted = Some(Vec::new().into_iter());
            return Ok(());
        }

        // Flatten to one (morsel_idx, row_idx) index space so the sort
        // compares logical rows without re-gathering columns on every swap.
        let mut rows: Vec<(usize, usize)> = Vec::new();
        for (m, morsel) in morsels.iter().enumerate() {
            rows.extend((0..morsel.row_count()).map(|r| (m, r)));
        }

        let schema = self.input.schema().clone();
        rows.sort_by(|&(lm, lr), &(rm, rr)| {
            for &(col, ascending) in &self.keys {
                let left = morsels[lm].column(col);
                let right = morsels[rm].column(col);
                let ord = left.cmp_at(lr, right, rr);
                let ord = if ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let mut output = Vec::with_capacity(rows.len().div_ceil(SORT_OUTPUT_MORSEL_SIZE));
        for chunk in rows.chunks(SORT_OUTPUT_MORSEL_SIZE) {
            let columns: Vec<_> = (0..schema.len())
                .map(|col| {
                    // Gather per source morsel, then concat, so a chunk that
                    // spans morsel boundaries still yields one contiguous column.
                    let mut by_source: Vec<(usize, Vec<usize>)> = Vec::new();
                    for &(m, r) in chunk {
                        match by_source.last_mut() {
                            Some((last_m, idxs)) if *last_m == m => idxs.push(r),
                            _ => by_source.push((m, vec![r])),
                        }
                    }
                    let parts: Vec<_> =
                        by_source.iter().map(|(m, idxs)| morsels[*m].column(col).take(idxs)).collect();
                    opteryx_common::array::concat_arrays(&parts)
                })
                .collect();
            output.push(Morsel::try_new(schema.clone(), columns)?);
        }
        self.sorted = Some(output.into_iter());
        Ok(())
    }
}

#[async_trait]
impl Executor for OrderExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        if self.sorted.is_none() {
            self.materialise().await?;
        }
        Ok(self.sorted.as_mut().and_then(|it| it.next()))
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn name(&self) -> &'static str {
        "Order"
    }
}
