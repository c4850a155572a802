//! `UnnestFunction`: for each input row and each element of the target
//! array column, emits a row with the array column replaced by the scalar
//! element, sibling columns carried forward verbatim (spec.md §4.7). An
//! attached `IN (value_set)` keeps only elements that match one of the
//! listed scalars.

use async_trait::async_trait;
use opteryx_common::array::{ArrayImpl, Morsel};
use opteryx_common::catalog::Schema;
use opteryx_common::error::{internal_error, Result};
use opteryx_common::types::ScalarValue;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

pub struct UnnestExecutor {
    column: usize,
    in_list: Option<Vec<ScalarValue>>,
    schema: Schema,
    input: BoxedExecutor,
    cancel: CancellationToken,
}

impl UnnestExecutor {
    pub fn new(
        column: usize,
        in_list: Option<Vec<ScalarValue>>,
        schema: Schema,
        input: BoxedExecutor,
        cancel: CancellationToken,
    ) -> Self {
        Self { column, in_list, schema, input, cancel }
    }

    fn expand(&self, morsel: &Morsel) -> Result<Morsel> {
        let ArrayImpl::List(list) = morsel.column(self.column) else {
            return Err(internal_error!("UNNEST target column is not a list"));
        };

        let mut repeat_of = Vec::new();
        let mut elements = Vec::new();
        for row in 0..morsel.row_count() {
            let Some(child) = list.value(row) else { continue };
            for elem in 0..child.len() {
                if let Some(allowed) = &self.in_list {
                    if !allowed.iter().any(|v| child.scalar_eq_at(elem, v)) {
                        continue;
                    }
                }
                repeat_of.push(row);
                elements.push(child.slice(elem, 1));
            }
        }

        let unnested_column = if elements.is_empty() {
            list.child.slice(0, 0)
        } else {
            opteryx_common::array::concat_arrays(&elements)
        };

        let columns: Vec<ArrayImpl> = (0..morsel.schema().len())
            .map(|col| if col == self.column { unnested_column.clone() } else { morsel.column(col).take(&repeat_of) })
            .collect();
        Morsel::try_new(self.schema.clone(), columns)
    }
}

#[async_trait]
impl Executor for UnnestExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        loop {
            self.cancel.check()?;
            let Some(morsel) = self.input.next().await? else { return Ok(None) };
            let expanded = self.expand(&morsel)?;
            if expanded.row_count() > 0 {
                return Ok(Some(expanded));
            }
        }
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "UnnestFunction"
    }
}
