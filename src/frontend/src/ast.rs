//! The bound AST: the planner's documented input contract.
//!
//! The SQL lexer/parser and the binder that resolves identifiers against
//! catalogs are both out of scope for this crate (spec.md §1 treats them as
//! external collaborators). `BoundQuery` is the shape their output is
//! expected to take by the time it reaches [`crate::planner::build_plan`]:
//! every identifier already resolved to a column position, every function
//! name already resolved to a signature. This mirrors how the teacher's own
//! planner consumes a `Binder`-produced `BoundStatement`
//! (`risingwave_frontend::binder`) rather than raw parser tokens.

use opteryx_common::catalog::Schema;
use opteryx_common::types::ScalarValue;
use opteryx_expr::agg::AggregateFunction;
use opteryx_expr::Expr;

/// A `(start, end)` byte-offset range into the original SQL text, threaded
/// through from the parser collaborator so error messages can point at the
/// offending token (spec.md §7).
pub type SourceSpan = opteryx_common::error::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Semi,
    Anti,
}

/// `FOR date | FOR DATES BETWEEN a AND b | FOR DATES IN range` (spec.md §6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalClause {
    AsOf(String),
    Between(String, String),
    In(Vec<String>),
}

/// Inline table hints (spec.md §6.1): `WITH (NO_CACHE, NO_PARTITION,
/// NO_PUSH_PROJECTION)`. Consulted by the pushdown/fusion optimizer
/// strategies; absence of a hint is always the permissive default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableHints {
    pub no_cache: bool,
    pub no_partition: bool,
    pub no_push_projection: bool,
}

/// A single `FROM` relation, already bound: identifiers within it refer to
/// positions in `schema()`.
#[derive(Debug, Clone)]
pub enum BoundFrom {
    /// A base table scan. `scan_id` is the binder-assigned identifier every
    /// `ColumnRef` in this subtree's expressions is scoped against.
    Scan {
        scan_id: u32,
        table: String,
        schema: Schema,
        time_range: Option<TemporalClause>,
        hints: TableHints,
    },
    Join {
        kind: JoinKind,
        left: Box<BoundFrom>,
        right: Box<BoundFrom>,
        /// `None` for `CrossJoin`; for equi joins the binder has already
        /// split the `ON` clause into the parallel key-column-index lists
        /// expected by the hash join engine plus any residual predicate.
        on: Option<Expr>,
    },
    /// A subquery in `FROM`, aliased for outer reference.
    Subquery { query: Box<BoundQuery>, alias: String },
    /// `UNNEST(arr)` with the optional attached `IN (value_set)` filter
    /// (spec.md §4.1, §4.7).
    Unnest { input: Box<BoundFrom>, column: Expr, in_list: Option<Vec<ScalarValue>> },
    /// A reference to a `WITH` binding; the binder tracks how many times
    /// each CTE name is referenced so the planner can share one subplan
    /// node across all of them.
    CteRef { name: String },
}

impl BoundFrom {
    pub fn schema(&self) -> &Schema {
        match self {
            BoundFrom::Scan { schema, .. } => schema,
            BoundFrom::Join { .. } => unreachable!("join schema is computed by the planner from both sides"),
            BoundFrom::Subquery { .. } => unreachable!("subquery schema is computed by the planner from its body"),
            BoundFrom::Unnest { .. } => unreachable!("unnest schema is computed by the planner from its input"),
            BoundFrom::CteRef { .. } => unreachable!("CTE-ref schema is resolved by the planner against the binding"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundOrderKey {
    pub expr: Expr,
    pub descending: bool,
}

/// A single `WITH name AS (query)` binding.
#[derive(Debug, Clone)]
pub struct BoundCte {
    pub name: String,
    pub query: Box<BoundQuery>,
}

/// The bound form of a `SELECT` (or `EXPLAIN`/`SHOW COLUMNS`) statement.
#[derive(Debug, Clone)]
pub enum BoundQuery {
    Select {
        ctes: Vec<BoundCte>,
        projection: Vec<Expr>,
        output_schema: Schema,
        from: Option<Box<BoundFrom>>,
        filter: Option<Expr>,
        group_by: Vec<Expr>,
        /// `(function, argument, output alias, DISTINCT?)` per aggregate call;
        /// `argument` is ignored by the evaluator for `CountStar`.
        aggregates: Vec<(AggregateFunction, Expr, String, bool)>,
        having: Option<Expr>,
        distinct: bool,
        order_by: Vec<BoundOrderKey>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Explain(Box<BoundQuery>),
    ShowColumns {
        scan_id: u32,
        schema: Schema,
    },
}
