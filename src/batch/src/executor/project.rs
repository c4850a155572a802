//! The `Project` operator: evaluates each output expression against the
//! input morsel, column-at-a-time.

use async_trait::async_trait;
use opteryx_common::array::Morsel;
use opteryx_common::catalog::Schema;
use opteryx_common::error::Result;
use opteryx_expr::Expr;

use crate::executor::{BoxedExecutor, CancellationToken, Executor};

pub struct ProjectExecutor {
    exprs: Vec<Expr>,
    schema: Schema,
    input: Option<BoxedExecutor>,
    /// `None` child means a single synthetic one-row input (a `SELECT`
    /// with no `FROM`, per `opteryx_frontend::planner`'s zero-children
    /// `Project` convention) — emitted exactly once.
    emitted_synthetic_row: bool,
    cancel: CancellationToken,
}

impl ProjectExecutor {
    pub fn new(exprs: Vec<Expr>, schema: Schema, input: Option<BoxedExecutor>, cancel: CancellationToken) -> Self {
        Self { exprs, schema, input, emitted_synthetic_row: false, cancel }
    }
}

#[async_trait]
impl Executor for ProjectExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        let Some(input) = self.input.as_mut() else {
            if self.emitted_synthetic_row {
                return Ok(None);
            }
            self.emitted_synthetic_row = true;
            let single_row = Morsel::single_row();
            let columns = self.exprs.iter().map(|e| e.eval(&single_row)).collect::<Result<Vec<_>>>()?;
            return Ok(Some(Morsel::try_new(self.schema.clone(), columns)?));
        };
        let Some(morsel) = input.next().await? else { return Ok(None) };
        let columns = self.exprs.iter().map(|e| e.eval(&morsel)).collect::<Result<Vec<_>>>()?;
        Ok(Some(Morsel::try_new(self.schema.clone(), columns)?))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "Project"
    }
}
