//! Logical plan representation and the cost-aware optimizer.
//!
//! Dependency order places this crate above `opteryx_expr`: the plan nodes
//! carry `opteryx_expr::Expr` payloads (predicates, projection lists,
//! aggregate arguments) but the plan/optimizer layer adds nothing the
//! expression evaluator needs to know about.

pub mod ast;
pub mod explain;
pub mod optimizer;
pub mod plan;
pub mod planner;

pub use ast::BoundQuery;
pub use plan::{NodeId, Plan, PlanNode, PlanNodeKind};
