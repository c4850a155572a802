//! Join executors (spec.md §4.5).
//!
//! [`HashJoinExecutor`] covers every equi-keyed join kind — `Inner`,
//! `Left`/`Right`/`Full` outer, and the set-membership `Semi`/`Anti` kinds —
//! behind one [`JoinSide`] tag, since all six share the same build/probe
//! shape: one side is fully materialised into row-hash buckets, the other
//! streams through morsel by morsel. [`NestedLoopJoinExecutor`] handles the
//! one join kind the plan can't lower to an equi-key (`NonEquiJoin`), and
//! [`CrossJoinExecutor`] the plain Cartesian product.

mod cross;
mod hash_join;
mod nested_loop;

pub use cross::CrossJoinExecutor;
pub use hash_join::{HashJoinExecutor, JoinSide};
pub use nested_loop::NestedLoopJoinExecutor;
