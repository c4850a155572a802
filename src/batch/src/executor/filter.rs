//! The `Filter` operator: keeps rows where every conjunct evaluates to
//! `TRUE` (spec.md's standard three-valued-logic `WHERE` semantics — `NULL`
//! and `FALSE` both drop the row).

use async_trait::async_trait;
use opteryx_common::array::{ArrayImpl, Morsel};
use opteryx_common::catalog::Schema;
use opteryx_common::error::{internal_error, Result};
use opteryx_expr::Expr;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

pub struct FilterExecutor {
    predicates: Vec<Expr>,
    input: BoxedExecutor,
    cancel: CancellationToken,
}

impl FilterExecutor {
    pub fn new(predicates: Vec<Expr>, input: BoxedExecutor, cancel: CancellationToken) -> Self {
        Self { predicates, input, cancel }
    }

    fn mask(&self, morsel: &Morsel) -> Result<Vec<bool>> {
        let mut mask = vec![true; morsel.row_count()];
        for predicate in &self.predicates {
            let ArrayImpl::Bool(values) = predicate.eval(morsel)? else {
                return Err(internal_error!("Filter predicate must evaluate to BOOL"));
            };
            for (row, keep) in mask.iter_mut().enumerate() {
                *keep = *keep && values.get(row).unwrap_or(false);
            }
        }
        Ok(mask)
    }
}

#[async_trait]
impl Executor for FilterExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        loop {
            self.cancel.check()?;
            let Some(morsel) = self.input.next().await? else { return Ok(None) };
            let mask = self.mask(&morsel)?;
            if mask.iter().any(|&keep| keep) {
                return Ok(Some(morsel.filter(&mask)));
            }
        }
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn name(&self) -> &'static str {
        "Filter"
    }
}
