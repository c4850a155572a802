//! `Union`: sequential fan-in over its children — spec.md §4.4 notes this
//! shape is "modeled but not multi-threaded" in this engine, so the
//! children are drained one at a time rather than interleaved by a worker
//! pool the way the teacher's distributed exchange operator would.

use async_trait::async_trait;
use opteryx_common::array::Morsel;
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

pub struct UnionExecutor {
    schema: Schema,
    inputs: Vec<BoxedExecutor>,
    current: usize,
    cancel: CancellationToken,
}

impl UnionExecutor {
    pub fn new(schema: Schema, inputs: Vec<BoxedExecutor>, cancel: CancellationToken) -> Self {
        Self { schema, inputs, current: 0, cancel }
    }
}

#[async_trait]
impl Executor for UnionExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        while self.current < self.inputs.len() {
            if let Some(morsel) = self.inputs[self.current].next().await? {
                return Ok(Some(morsel));
            }
            self.current += 1;
        }
        Ok(None)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "Union"
    }
}
