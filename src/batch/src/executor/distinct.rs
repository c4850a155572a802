//! `Distinct`: hash-based deduplication over `columns` (spec.md §4.7).
//!
//! Grounded on the same build-side shape the hash join and hash aggregate
//! use: an [`opteryx_common::hash::row_hash`] digest picks a bucket, and a
//! true tuple comparison (via [`ArrayImpl::cmp_at`]) resolves collisions —
//! the hash alone is never trusted as identity. Kept rows are streamed out
//! morsel-by-morsel as they're found first; only the already-emitted key
//! columns are retained for future comparisons, not the whole input.

use std::cmp::Ordering;

use async_trait::async_trait;
use opteryx_common::array::{ArrayImpl, Morsel};
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_common::hash::flat_map::FlatHashMap;
use opteryx_common::hash::row_hash::hash_rows;
use opteryx_common::memory::MemoryContext;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

pub struct DistinctExecutor {
    columns: Vec<usize>,
    key_schema: Schema,
    input: BoxedExecutor,
    /// hash -> (index into `stored`, row within that stored morsel)
    seen: FlatHashMap<u64, Vec<(usize, usize)>>,
    stored: Vec<Morsel>,
    mem: MemoryContext,
    cancel: CancellationToken,
}

impl DistinctExecutor {
    pub fn new(columns: Vec<usize>, input: BoxedExecutor, mem: MemoryContext, cancel: CancellationToken) -> Self {
        let key_schema = input.schema().project(&columns);
        Self { columns, key_schema, input, seen: FlatHashMap::new(), stored: Vec::new(), mem, cancel }
    }

    fn key_row_matches(&self, candidate: &Morsel, candidate_row: usize, stored_idx: usize, stored_row: usize) -> bool {
        let stored = &self.stored[stored_idx];
        (0..self.key_schema.len()).all(|col| {
            candidate.column(col).cmp_at(candidate_row, stored.column(col), stored_row) == Ordering::Equal
        })
    }
}

#[async_trait]
impl Executor for DistinctExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        loop {
            self.cancel.check()?;
            let Some(morsel) = self.input.next().await? else { return Ok(None) };

            let key_columns: Vec<&ArrayImpl> = self.columns.iter().map(|&i| morsel.column(i)).collect();
            let hashes = hash_rows(&key_columns, morsel.row_count());
            let key_only = morsel.project(&self.columns, self.key_schema.clone())?;

            let mut keep_rows = Vec::new();
            let mut new_in_morsel: FlatHashMap<u64, Vec<usize>> = FlatHashMap::new();

            for row in 0..morsel.row_count() {
                let h = hashes[row];
                let already_seen = self
                    .seen
                    .get(&h)
                    .map(|entries| entries.iter().any(|&(si, sr)| self.key_row_matches(&key_only, row, si, sr)))
                    .unwrap_or(false)
                    || new_in_morsel
                        .get(&h)
                        .map(|rows| {
                            rows.iter().any(|&other| {
                                (0..self.key_schema.len())
                                    .all(|col| key_only.column(col).cmp_at(row, key_only.column(col), other) == Ordering::Equal)
                            })
                        })
                        .unwrap_or(false);

                if !already_seen {
                    new_in_morsel.get_or_insert_with(h, Vec::new).push(row);
                    keep_rows.push(row);
                }
            }

            if keep_rows.is_empty() {
                continue;
            }

            let kept_full = morsel.take(&keep_rows);
            let kept_key_only = key_only.take(&keep_rows);
            self.mem.grow_or_oom(kept_key_only.approx_byte_size() as i64, "Distinct")?;

            let stored_idx = self.stored.len();
            for (local_row, &original_row) in keep_rows.iter().enumerate() {
                let h = hashes[original_row];
                self.seen.get_or_insert_with(h, Vec::new).push((stored_idx, local_row));
            }
            self.stored.push(kept_key_only);

            return Ok(Some(kept_full));
        }
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn name(&self) -> &'static str {
        "Distinct"
    }
}
