//! `CrossJoinExecutor`: the plain Cartesian product (spec.md §4.5's
//! "CrossJoin" row). The right input is materialised once; each left morsel
//! expands into `left_rows * right_rows` output rows against it.
//!
//! Whether a source can be materialised at all (spec.md's "fatal if one
//! side is unbounded") is a planning-time property of the `Connector` the
//! scan reads from, checked before this executor is ever constructed — by
//! the time a `CrossJoin` plan node reaches here, both sides are known
//! finite.

use async_trait::async_trait;
use opteryx_common::array::{ArrayImpl, Morsel};
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_common::memory::MemoryContext;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

enum State {
    NotBuilt { right_input: BoxedExecutor, left_input: BoxedExecutor },
    Probing { right: Morsel, left_input: BoxedExecutor },
    Done,
}

pub struct CrossJoinExecutor {
    schema: Schema,
    mem: MemoryContext,
    cancel: CancellationToken,
    state: State,
}

impl CrossJoinExecutor {
    pub fn new(left: BoxedExecutor, right: BoxedExecutor, schema: Schema, mem: MemoryContext, cancel: CancellationToken) -> Self {
        Self { schema, mem, cancel, state: State::NotBuilt { right_input: right, left_input: left } }
    }

    async fn materialise_right(&mut self, right_input: &mut BoxedExecutor) -> Result<Morsel> {
        let right_schema = right_input.schema().clone();
        let mut morsels = Vec::new();
        loop {
            self.cancel.check()?;
            match right_input.next().await? {
                Some(m) => {
                    self.mem.grow_or_oom(m.approx_byte_size() as i64, "CrossJoin build")?;
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

    fn expand(&self, left_morsel: &Morsel, right: &Morsel) -> Result<Option<Morsel>> {
        let l_count = left_morsel.row_count();
        let r_count = right.row_count();
        if l_count == 0 || r_count == 0 {
            return Ok(None);
        }
        let mut left_idx = Vec::with_capacity(l_count * r_count);
        let mut right_idx = Vec::with_capacity(l_count * r_count);
        for l in 0..l_count {
            for r in 0..r_count {
                left_idx.push(l);
                right_idx.push(r);
            }
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
impl Executor for CrossJoinExecutor {
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
                    let result = self.expand(&left_morsel, &right)?;
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
        "CrossJoin"
    }
}
