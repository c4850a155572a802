//! Scalar and aggregate expression trees, and the vectorized evaluators that
//! run them over a [`opteryx_common::array::Morsel`].
//!
//! Grounded on the teacher's `BoxedExpression`/`Expression` split
//! (`risingwave_expr::expr`), simplified to a plain recursive enum instead of
//! the teacher's `#[function]`-macro-generated signature registry: this
//! engine's function set is fixed at compile time, so the registry's runtime
//! lookup by `(PbType, arg count)` buys nothing here (see DESIGN.md).

pub mod agg;
pub mod cast;
pub mod expr;
pub mod kernels;
pub mod like;

pub use expr::{BinaryOp, Expr, UnaryOp};
pub use opteryx_common::error::Result;
