//! `HashJoinExecutor`: the build/probe hash join shared by every equi-keyed
//! join kind (spec.md §4.5's InnerJoin/Left-Right-Full-Outer/SemiJoin/
//! AntiJoin rows).
//!
//! The smaller side is meant to be the build side; the `JoinOrdering`
//! optimizer rule arranges an `InnerJoin`'s children that way, but nothing
//! downstream of the plan can know relative sizes for the outer or
//! set-membership kinds, so this executor picks a build side per
//! [`JoinSide`] instead: `Inner`/`Right` build the left input, `Left`/
//! `Full`/`Semi`/`Anti` build the right input (matching the "outer side
//! stays streaming, preserving its row order" shape those kinds need, and
//! matching spec.md's own "build `FlatHashSet` of hashes from the right"
//! wording for `Semi`/`Anti`).
//!
//! Rows with a null equi-join key never participate in the hash lookup
//! (spec.md's null-avoidant rule): a null-keyed probe row is treated as
//! having zero candidate matches, and a null-keyed build row is excluded
//! from the bucket table but still tracked for `Full`'s unmatched pass.

use std::cmp::Ordering;
use std::collections::VecDeque;

use async_trait::async_trait;
use opteryx_common::array::{ArrayBuilderImpl, ArrayImpl, Morsel};
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_common::hash::flat_map::FlatHashMap;
use opteryx_common::hash::row_hash::{hash_rows, row_has_null};
use opteryx_common::memory::MemoryContext;
use opteryx_common::types::{DataType, ScalarValue};
use opteryx_expr::agg::cell_as_scalar;
use opteryx_expr::Expr;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

/// Which of the six equi-join shapes this instance computes. Named after
/// the plan node kinds it lowers from, not after internal build/probe
/// roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

impl JoinSide {
    fn build_is_left(self) -> bool {
        matches!(self, JoinSide::Inner | JoinSide::Right)
    }

    fn emits_unmatched_probe(self) -> bool {
        matches!(self, JoinSide::Left | JoinSide::Right | JoinSide::Full)
    }

    fn emits_unmatched_build(self) -> bool {
        matches!(self, JoinSide::Full)
    }

    fn is_set_membership(self) -> bool {
        matches!(self, JoinSide::Semi | JoinSide::Anti)
    }
}

const TRAILING_CHUNK_SIZE: usize = 4096;

struct BuildState {
    morsel: Morsel,
    keys: Vec<usize>,
    buckets: FlatHashMap<u64, Vec<usize>>,
    matched: Vec<bool>,
}

/// Free function rather than a `&self` method on `BuildState`: the result
/// only borrows `morsel`, and keeping that borrow disjoint from `keys` lets
/// callers still mutate `BuildState::matched` while the returned columns
/// are alive.
fn key_columns<'a>(morsel: &'a Morsel, keys: &[usize]) -> Vec<&'a ArrayImpl> {
    keys.iter().map(|&c| morsel.column(c)).collect()
}

enum State {
    NotBuilt { build_input: BoxedExecutor, build_keys: Vec<usize>, probe_input: BoxedExecutor, probe_keys: Vec<usize> },
    Probing { build: BuildState, probe_input: BoxedExecutor, probe_keys: Vec<usize> },
    TrailingUnmatched { build: BuildState, remaining: VecDeque<usize> },
    Done,
}

pub struct HashJoinExecutor {
    side: JoinSide,
    residual: Option<Expr>,
    left_schema: Schema,
    right_schema: Schema,
    schema: Schema,
    mem: MemoryContext,
    cancel: CancellationToken,
    state: State,
}

impl HashJoinExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        side: JoinSide,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        residual: Option<Expr>,
        left: BoxedExecutor,
        right: BoxedExecutor,
        schema: Schema,
        mem: MemoryContext,
        cancel: CancellationToken,
    ) -> Self {
        let left_schema = left.schema().clone();
        let right_schema = right.schema().clone();
        let (build_input, build_keys, probe_input, probe_keys) = if side.build_is_left() {
            (left, left_keys, right, right_keys)
        } else {
            (right, right_keys, left, left_keys)
        };
        let state = State::NotBuilt { build_input, build_keys, probe_input, probe_keys };
        Self { side, residual, left_schema, right_schema, schema, mem, cancel, state }
    }

    fn build_is_left(&self) -> bool {
        self.side.build_is_left()
    }

    async fn materialise_build(&mut self, build_input: &mut BoxedExecutor, keys: Vec<usize>) -> Result<BuildState> {
        let build_schema = build_input.schema().clone();
        let mut morsels = Vec::new();
        loop {
            self.cancel.check()?;
            match build_input.next().await? {
                Some(m) => {
                    self.mem.grow_or_oom(m.approx_byte_size() as i64, "HashJoin build")?;
                    morsels.push(m);
                }
                None => break,
            }
        }

        let row_count: usize = morsels.iter().map(Morsel::row_count).sum();
        let morsel = if morsels.is_empty() {
            Morsel::empty(build_schema)
        } else {
            let mut columns = Vec::with_capacity(build_schema.len());
            for col in 0..build_schema.len() {
                let parts: Vec<ArrayImpl> = morsels.iter().map(|m| m.column(col).clone()).collect();
                columns.push(opteryx_common::array::concat_arrays(&parts));
            }
            Morsel::try_new(build_schema, columns)?
        };

        let mut buckets: FlatHashMap<u64, Vec<usize>> = FlatHashMap::new();
        {
            let key_cols: Vec<&ArrayImpl> = keys.iter().map(|&c| morsel.column(c)).collect();
            let hashes = hash_rows(&key_cols, row_count);
            for row in 0..row_count {
                if row_has_null(&key_cols, row) {
                    continue;
                }
                buckets.get_or_insert_with(hashes[row], Vec::new).push(row);
            }
        }

        Ok(BuildState { morsel, keys, buckets, matched: vec![false; row_count] })
    }

    async fn probe_once(
        &mut self,
        build: &mut BuildState,
        probe_input: &mut BoxedExecutor,
        probe_keys: &[usize],
    ) -> Result<Option<Morsel>> {
        loop {
            self.cancel.check()?;
            let Some(probe_morsel) = probe_input.next().await? else { return Ok(None) };

            let probe_key_cols: Vec<&ArrayImpl> = probe_keys.iter().map(|&c| probe_morsel.column(c)).collect();
            let probe_hashes = hash_rows(&probe_key_cols, probe_morsel.row_count());
            let build_key_cols = key_columns(&build.morsel, &build.keys);

            let mut build_idx: Vec<Option<usize>> = Vec::new();
            let mut probe_idx: Vec<Option<usize>> = Vec::new();
            let mut keep_rows: Vec<usize> = Vec::new();

            for row in 0..probe_morsel.row_count() {
                let candidates: Vec<usize> = if row_has_null(&probe_key_cols, row) {
                    Vec::new()
                } else {
                    build
                        .buckets
                        .get(&probe_hashes[row])
                        .into_iter()
                        .flatten()
                        .copied()
                        .filter(|&b| keys_equal(&build_key_cols, b, &probe_key_cols, row))
                        .collect()
                };

                let accepted: Vec<usize> = if let Some(pred) = &self.residual {
                    let mut out = Vec::new();
                    for b in candidates {
                        if self.residual_passes(pred, build, b, &probe_morsel, row)? {
                            out.push(b);
                        }
                    }
                    out
                } else {
                    candidates
                };

                if self.side.is_set_membership() {
                    let matched = !accepted.is_empty();
                    if matched == (self.side == JoinSide::Semi) {
                        keep_rows.push(row);
                    }
                    continue;
                }

                if accepted.is_empty() {
                    if self.side.emits_unmatched_probe() {
                        build_idx.push(None);
                        probe_idx.push(Some(row));
                    }
                } else {
                    for b in accepted {
                        build.matched[b] = true;
                        build_idx.push(Some(b));
                        probe_idx.push(Some(row));
                    }
                }
            }

            if self.side.is_set_membership() {
                if keep_rows.is_empty() {
                    continue;
                }
                return Ok(Some(probe_morsel.take(&keep_rows)));
            }

            if build_idx.is_empty() {
                continue;
            }
            return Ok(Some(self.assemble(build, &probe_morsel, &build_idx, &probe_idx)));
        }
    }

    fn residual_passes(
        &self,
        pred: &Expr,
        build: &BuildState,
        build_row: usize,
        probe_morsel: &Morsel,
        probe_row: usize,
    ) -> Result<bool> {
        let pair = self.assemble(build, probe_morsel, &[Some(build_row)], &[Some(probe_row)]);
        let mask = pred.eval(&pair)?;
        Ok(mask.is_valid(0) && matches!(&mask, ArrayImpl::Bool(b) if b.value(0)))
    }

    /// Gathers a row-aligned output batch from parallel `build_idx`/
    /// `probe_idx` slots (either may be `None`, meaning "fill with nulls
    /// for this side"), assembling columns via the scalar row path rather
    /// than a specialised nullable-gather kernel — simple, and join batches
    /// are small enough after hash filtering for the per-cell cost not to
    /// matter (see DESIGN.md).
    fn assemble(&self, build: &BuildState, probe_morsel: &Morsel, build_idx: &[Option<usize>], probe_idx: &[Option<usize>]) -> Morsel {
        let (left_idx, right_idx): (&[Option<usize>], &[Option<usize>]) =
            if self.build_is_left() { (build_idx, probe_idx) } else { (probe_idx, build_idx) };
        let (left_src, right_src): (&Morsel, &Morsel) =
            if self.build_is_left() { (&build.morsel, probe_morsel) } else { (probe_morsel, &build.morsel) };

        let mut columns = Vec::with_capacity(self.left_schema.len() + self.right_schema.len());
        for col in 0..self.left_schema.len() {
            columns.push(gather_column(left_src, col, &self.left_schema[col].data_type, left_idx));
        }
        for col in 0..self.right_schema.len() {
            columns.push(gather_column(right_src, col, &self.right_schema[col].data_type, right_idx));
        }
        Morsel::try_new(self.schema.clone(), columns).expect("join output columns match schema")
    }

    fn trailing_batch(&self, build: &BuildState, rows: &[usize]) -> Morsel {
        let build_idx: Vec<Option<usize>> = rows.iter().map(|&r| Some(r)).collect();
        let probe_idx: Vec<Option<usize>> = vec![None; rows.len()];
        // `probe_morsel` is never read when every `probe_idx` slot is
        // `None`; an empty morsel of the probe-side schema is a cheap
        // stand-in.
        let empty_probe = if self.build_is_left() {
            Morsel::empty(self.right_schema.clone())
        } else {
            Morsel::empty(self.left_schema.clone())
        };
        self.assemble(build, &empty_probe, &build_idx, &probe_idx)
    }
}

fn gather_column(source: &Morsel, col: usize, data_type: &DataType, idx: &[Option<usize>]) -> ArrayImpl {
    let mut builder = ArrayBuilderImpl::with_capacity(data_type, idx.len());
    for slot in idx {
        match slot {
            Some(row) => builder.append_scalar(&cell_as_scalar(source.column(col), *row)),
            None => builder.append_scalar(&ScalarValue::Null(data_type.clone())),
        }
    }
    builder.finish()
}

fn keys_equal(build_cols: &[&ArrayImpl], build_row: usize, probe_cols: &[&ArrayImpl], probe_row: usize) -> bool {
    (0..build_cols.len()).all(|i| build_cols[i].cmp_at(build_row, probe_cols[i], probe_row) == Ordering::Equal)
}

#[async_trait]
impl Executor for HashJoinExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::NotBuilt { mut build_input, build_keys, probe_input, probe_keys } => {
                    let build = self.materialise_build(&mut build_input, build_keys).await?;
                    self.state = State::Probing { build, probe_input, probe_keys };
                }
                State::Probing { mut build, mut probe_input, probe_keys } => {
                    match self.probe_once(&mut build, &mut probe_input, &probe_keys).await? {
                        Some(morsel) => {
                            self.state = State::Probing { build, probe_input, probe_keys };
                            return Ok(Some(morsel));
                        }
                        None => {
                            if self.side.emits_unmatched_build() {
                                let remaining: VecDeque<usize> =
                                    (0..build.matched.len()).filter(|&i| !build.matched[i]).collect();
                                self.state = State::TrailingUnmatched { build, remaining };
                            } else {
                                self.state = State::Done;
                                return Ok(None);
                            }
                        }
                    }
                }
                State::TrailingUnmatched { build, mut remaining } => {
                    if remaining.is_empty() {
                        self.state = State::Done;
                        return Ok(None);
                    }
                    let chunk: Vec<usize> = remaining.drain(..remaining.len().min(TRAILING_CHUNK_SIZE)).collect();
                    let morsel = self.trailing_batch(&build, &chunk);
                    self.state = State::TrailingUnmatched { build, remaining };
                    return Ok(Some(morsel));
                }
                State::Done => return Ok(None),
            }
        }
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "HashJoin"
    }
}
