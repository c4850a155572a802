//! `AggregateAndGroup`: hash-based grouping plus one [`Accumulator`] per
//! `(group, aggregate call)` pair (spec.md §4.6).
//!
//! Grouping follows the same build-side shape as the hash join and
//! `DistinctExecutor`: a row-hash picks a bucket, a full tuple comparison
//! over the group-by columns resolves collisions. With no `GROUP BY`
//! (`group_exprs` empty) every row joins one synthetic group, matching
//! spec.md §4.6's "`GROUP BY` absent: a single synthetic group receives all
//! rows" rule — including the empty-input case, where `COUNT` still
//! reports 0 and every other aggregate reports `NULL`.
//!
//! `AggregateCall.distinct` (SQL's `DISTINCT` qualifier, orthogonal to the
//! named `COUNT_DISTINCT` function — see DESIGN.md) is honoured by wrapping
//! that call's accumulator in [`DistinctGuard`], which suppresses any value
//! already seen by this group+call before forwarding to the inner
//! accumulator — so `SUM(DISTINCT x)` and `AVG(DISTINCT x)` work the same
//! way `COUNT(DISTINCT x)` does, without duplicating dedup logic per
//! function.

use async_trait::async_trait;
use opteryx_common::array::{ArrayBuilderImpl, ArrayImpl, Morsel};
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_common::hash::flat_map::FlatHashMap;
use opteryx_common::hash::row_hash::hash_rows;
use opteryx_common::memory::MemoryContext;
use opteryx_common::types::ScalarValue;
use opteryx_expr::agg::{cell_as_scalar, new_accumulator, Accumulator, AggregateFunction};
use opteryx_frontend::plan::AggregateCall;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

/// Wraps an inner accumulator so only the first occurrence of each distinct
/// value (by `ScalarValue` equality) reaches it. Linear containment check,
/// same rationale as `opteryx_expr::agg::CountDistinctAccumulator`: no
/// total `Hash`/`Eq` on `ScalarValue` because of its float variants, and
/// group cardinalities are small enough in practice for O(n^2) to be fine.
#[derive(Debug)]
struct DistinctGuard {
    inner: Box<dyn Accumulator>,
    seen: Vec<ScalarValue>,
}

impl Accumulator for DistinctGuard {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        let value = cell_as_scalar(array, row);
        if self.seen.iter().any(|v| *v == value) {
            return Ok(());
        }
        self.seen.push(value);
        self.inner.update(array, row)
    }

    fn finalize(&self) -> ScalarValue {
        self.inner.finalize()
    }
}

fn make_accumulator(call: &AggregateCall, input_type: &opteryx_common::types::DataType) -> Box<dyn Accumulator> {
    let acc = new_accumulator(call.func, input_type);
    if call.distinct {
        Box::new(DistinctGuard { inner: acc, seen: Vec::new() })
    } else {
        acc
    }
}

struct Group {
    key: Vec<ScalarValue>,
    accumulators: Vec<Box<dyn Accumulator>>,
}

pub struct AggregateExecutor {
    group_exprs: Vec<opteryx_expr::Expr>,
    calls: Vec<AggregateCall>,
    call_input_types: Vec<opteryx_common::types::DataType>,
    schema: Schema,
    input: BoxedExecutor,
    mem: MemoryContext,
    cancel: CancellationToken,
    buckets: FlatHashMap<u64, Vec<usize>>,
    groups: Vec<Group>,
    finished: bool,
}

impl AggregateExecutor {
    pub fn new(
        group_exprs: Vec<opteryx_expr::Expr>,
        calls: Vec<AggregateCall>,
        input_schema: &Schema,
        schema: Schema,
        input: BoxedExecutor,
        mem: MemoryContext,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let call_input_types =
            calls.iter().map(|c| c.arg.return_type(input_schema)).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            group_exprs,
            calls,
            call_input_types,
            schema,
            input,
            mem,
            cancel,
            buckets: FlatHashMap::new(),
            groups: Vec::new(),
            finished: false,
        })
    }

    fn find_or_create_group(&mut self, key: &[ScalarValue], hash: u64) -> usize {
        if let Some(candidates) = self.buckets.get(&hash) {
            for &gi in candidates {
                if self.groups[gi].key == key {
                    return gi;
                }
            }
        }
        let gi = self.groups.len();
        let accumulators =
            self.calls.iter().zip(&self.call_input_types).map(|(c, t)| make_accumulator(c, t)).collect();
        self.groups.push(Group { key: key.to_vec(), accumulators });
        self.buckets.get_or_insert_with(hash, Vec::new).push(gi);
        gi
    }

    async fn consume_input(&mut self) -> Result<()> {
        while let Some(morsel) = self.input.next().await? {
            self.cancel.check()?;
            self.mem.grow_or_oom(morsel.approx_byte_size() as i64, "AggregateAndGroup")?;

            let key_cols: Vec<ArrayImpl> =
                self.group_exprs.iter().map(|e| e.eval(&morsel)).collect::<Result<_>>()?;
            let key_refs: Vec<&ArrayImpl> = key_cols.iter().collect();
            let hashes = hash_rows(&key_refs, morsel.row_count());

            let arg_cols: Vec<ArrayImpl> =
                self.calls.iter().map(|c| c.arg.eval(&morsel)).collect::<Result<_>>()?;

            for row in 0..morsel.row_count() {
                let key: Vec<ScalarValue> = key_cols.iter().map(|c| cell_as_scalar(c, row)).collect();
                let gi = self.find_or_create_group(&key, hashes[row]);
                for (ci, call) in self.calls.iter().enumerate() {
                    let is_count_star = call.func == AggregateFunction::CountStar;
                    if is_count_star || arg_cols[ci].is_valid(row) {
                        self.groups[gi].accumulators[ci].update(&arg_cols[ci], row)?;
                    }
                }
            }
        }

        if self.groups.is_empty() && self.group_exprs.is_empty() {
            // No GROUP BY and zero input rows: one synthetic empty group still
            // reports COUNT = 0 / other aggregates = NULL (spec.md §4.6).
            let accumulators =
                self.calls.iter().zip(&self.call_input_types).map(|(c, t)| make_accumulator(c, t)).collect();
            self.groups.push(Group { key: Vec::new(), accumulators });
        }
        Ok(())
    }

    fn finalize_all(&self) -> Morsel {
        let mut columns: Vec<ArrayImpl> = Vec::with_capacity(self.schema.len());

        for key_idx in 0..self.group_exprs.len() {
            let field = &self.schema[key_idx];
            let mut builder = ArrayBuilderImpl::with_capacity(&field.data_type, self.groups.len());
            for group in &self.groups {
                builder.append_scalar(&group.key[key_idx]);
            }
            columns.push(builder.finish());
        }

        for (call_idx, _) in self.calls.iter().enumerate() {
            let field = &self.schema[self.group_exprs.len() + call_idx];
            let mut builder = ArrayBuilderImpl::with_capacity(&field.data_type, self.groups.len());
            for group in &self.groups {
                builder.append_scalar(&group.accumulators[call_idx].finalize());
            }
            columns.push(builder.finish());
        }

        Morsel::try_new(self.schema.clone(), columns).expect("aggregate output columns match schema")
    }
}

#[async_trait]
impl Executor for AggregateExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        if self.finished {
            return Ok(None);
        }
        self.consume_input().await?;
        self.finished = true;
        Ok(Some(self.finalize_all()))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "AggregateAndGroup"
    }
}
