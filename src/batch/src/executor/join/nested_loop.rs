//! `NestedLoopJoinExecutor`: the fallback strategy for a join predicate the
//! planner couldn't lower to equi-keys (spec.md §4.5's "Non-equi" row —
//! `<>, <, <=, >, >=` comparisons between the two sides).
//!
//! The right input is materialised once; every left morsel is then probed
//! against every right row, evaluating `predicate` on a one-row combined
//! morsel per candidate pair. Quadratic in row count by construction — the
//! planner only reaches for this strategy when no equi-key exists to hash
//! on.

use async_trait::async_trait;
use opteryx_common::array::{ArrayImpl, Morsel};
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_common::memory::MemoryContext;
use opteryx_expr::Expr;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

enum State {
    NotBuilt { right_input: BoxedExecutor, left_input: BoxedExecutor },
    Probing { right: Morsel, left_input: BoxedExecutor },
    Done,
}

pub struct NestedLoopJoinExecutor {
    predicate: Expr,
    left_schema: Schema,
    right_schema: Schema,
    pair_schema: Schema,
    schema: Schema,
    mem: MemoryContext,
    cancel: CancellationToken,
    state: State,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        predicate: Expr,
        left: BoxedExecutor,
        right: BoxedExecutor,
        schema: Schema,
        mem: MemoryContext,
        cancel: CancellationToken,
    ) -> Self {
        let left_schema = left.schema().clone();
        let right_schema = right.schema().clone();
        let pair_schema = left_schema.clone().concat(right_schema.clone());
        Self {
            predicate,
            left_schema,
            right_schema,
            pair_schema,
            schema,
            mem,
            cancel,
            state: State::NotBuilt { right_input: right, left_input: left },
        }
    }

    async fn materialise_right(&mut self, right_input: &mut BoxedExecutor) -> Result<Morsel> {
        let right_schema = right_input.schema().clone();
        let mut morsels = Vec::new();
        loop {
            self.cancel.check()?;
            match right_input.next().await? {
                Some(m) => {
                    self.mem.grow_or_oom(m.approx_byte_size() as i64, "NestedLoopJoin build")?;
                    morsels.push(m);
                }
                None => break,
            }
        }
        if morsels.is_empty() {
            return Ok(Morsel::empty(right_schema));
        }
        let mut columns = Vec::with_capacity(right_schema.len());
        for col in 0..right_schema.len() {
            let parts: Vec<ArrayImpl> = morsels.iter().map(|m| m.column(col).clone()).collect();
            columns.push(opteryx_common::array::concat_arrays(&parts));
        }
        Morsel::try_new(right_schema, columns)
    }

    fn combine_pair(&self, left: &Morsel, l: usize, right: &Morsel, r: usize) -> Result<Morsel> {
        let mut columns = Vec::with_capacity(self.pair_schema.len());
        for col in 0..self.left_schema.len() {
            columns.push(left.column(col).slice(l, 1));
        }
        for col in 0..self.right_schema.len() {
            columns.push(right.column(col).slice(r, 1));
        }
        Morsel::try_new(self.pair_schema.clone(), columns)
    }

    fn probe(&self, left_morsel: &Morsel, right: &Morsel) -> Result<Option<Morsel>> {
        let mut left_idx = Vec::new();
        let mut right_idx = Vec::new();
        for l in 0..left_morsel.row_count() {
            for r in 0..right.row_count() {
                let pair = self.combine_pair(left_morsel, l, right, r)?;
                let mask = self.predicate.eval(&pair)?;
                if mask.is_valid(0) && matches!(&mask, ArrayImpl::Bool(b) if b.value(0)) {
                    left_idx.push(l);
                    right_idx.push(r);
                }
            }
        }
        if left_idx.is_empty() {
            return Ok(None);
        }
        let left_part = left_morsel.take(&left_idx);
        let right_part = right.take(&right_idx);
        let columns: Vec<ArrayImpl> = left_part
            .columns()
            .iter()
            .map(|c| (**c).clone())
            .chain(right_part.columns().iter().map(|c| (**c).clone()))
            .collect();
        Ok(Some(Morsel::try_new(self.schema.clone(), columns)?))
    }
}

#[async_trait]
impl Executor for NestedLoopJoinExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::NotBuilt { mut right_input, left_input } => {
                    let right = self.materialise_right(&mut right_input).await?;
                    self.state = State::Probing { right, left_input };
                }
                State::Probing { right, mut left_input } => {
                    self.cancel.check()?;
                    let Some(left_morsel) = left_input.next().await? else {
                        return Ok(None);
                    };
                    let result = self.probe(&left_morsel, &right)?;
                    self.state = State::Probing { right, left_input };
                    if let Some(morsel) = result {
                        return Ok(Some(morsel));
                    }
                }
                State::Done => return Ok(None),
            }
        }
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }
}
