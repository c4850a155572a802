//! The morsel execution engine: a pull-based tree of [`executor::Executor`]s
//! built from a [`opteryx_frontend::plan::Plan`], one per logical plan node.
//!
//! Grounded on the teacher's own `rust/batch` crate (`risingwave_batch`):
//! same `async_trait` pull contract, same per-operator module layout under
//! `executor/`. The join engine and scan/connector boundary are this crate's
//! biggest departures from the teacher, since spec.md §4.5 and §6.2 describe
//! a single-node morsel engine rather than the teacher's distributed
//! exchange/stage model.

pub mod build;
pub mod connector;
pub mod executor;
