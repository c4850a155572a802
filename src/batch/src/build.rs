//! Lowers a bound, optimised [`Plan`] into an executable tree of
//! [`Executor`]s (spec.md §4, "PLAN -> EXECUTOR" lowering).
//!
//! [`build_executor`] recurses down the plan's `children`, matching each
//! node's [`PlanNodeKind`] to the executor that implements it. `Subquery`
//! and `CommonTableExpression` nodes are pure relabelling in this planner
//! (spec.md never gives them their own physical operator) so they pass
//! their single child's executor through unchanged. `ShowColumns` and
//! `Explain` are rendered directly from the `Plan`/`Schema` by
//! `opteryx_frontend::explain` and never reach this function in a correctly
//! wired caller — encountering one here is an internal error, not a
//! plan-shape the engine is expected to execute.
//!
//! Recursive `async fn`s can't be written directly in Rust (the resulting
//! future would have infinite size), so each call is boxed via
//! [`futures::future::BoxFuture`], the same pattern the teacher's own
//! stream executor builder uses for its operator tree.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use opteryx_common::error::Result;
use opteryx_common::internal_error;
use opteryx_common::memory::MemoryContext;
use opteryx_expr::Expr;
use opteryx_frontend::plan::{NodeId, Plan, PlanNode, PlanNodeKind};

use crate::connector::ConnectorRegistry;
use crate::executor::{
    AggregateExecutor, BoxedExecutor, CancellationToken, CrossJoinExecutor, DistinctExecutor, Executor,
    FilterExecutor, HashJoinExecutor, JoinSide, LimitExecutor, NestedLoopJoinExecutor, OffsetExecutor,
    OrderExecutor, ProjectExecutor, ScanExecutor, UnionExecutor, UnnestExecutor,
};

/// Builds the executor tree rooted at `node`. `memory_limit_bytes` seeds a
/// fresh [`MemoryContext`] per memory-bounded operator (hash join build
/// sides, `Order`, `Distinct`, `AggregateAndGroup`) rather than sharing one
/// context across the whole plan, so one expensive operator's usage can't
/// starve its siblings of the same budget.
pub fn build_executor<'a>(
    plan: &'a Plan,
    node: NodeId,
    registry: &'a ConnectorRegistry,
    memory_limit_bytes: i64,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<BoxedExecutor>> {
    async move {
        let pn = plan.node(node);
        let schema = pn.schema.clone();

        match &pn.kind {
            PlanNodeKind::Scan { table, projected_columns, pushed_predicates, limit_hint, .. } => {
                let connector = registry
                    .get(table)
                    .ok_or_else(|| internal_error!("no connector registered for table '{table}'"))?
                    .clone();
                build_scan(connector, projected_columns.as_deref(), pushed_predicates, *limit_hint, schema, cancel)
                    .await
            }

            PlanNodeKind::Filter { predicates } => {
                let input = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                Ok(Box::new(FilterExecutor::new(predicates.clone(), input, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::Project { exprs } => {
                let input = match pn.children.first() {
                    Some(_) => Some(child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?),
                    None => None,
                };
                Ok(Box::new(ProjectExecutor::new(exprs.clone(), schema, input, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::Subquery { .. } | PlanNodeKind::CommonTableExpression { .. } => {
                child(plan, pn, 0, registry, memory_limit_bytes, cancel).await
            }

            PlanNodeKind::InnerJoin { left_keys, right_keys, residual } => {
                build_equi_join(
                    plan,
                    pn,
                    JoinSide::Inner,
                    left_keys,
                    right_keys,
                    residual.clone(),
                    schema,
                    registry,
                    memory_limit_bytes,
                    cancel,
                )
                .await
            }
            PlanNodeKind::LeftOuterJoin { left_keys, right_keys, residual } => {
                build_equi_join(
                    plan,
                    pn,
                    JoinSide::Left,
                    left_keys,
                    right_keys,
                    residual.clone(),
                    schema,
                    registry,
                    memory_limit_bytes,
                    cancel,
                )
                .await
            }
            PlanNodeKind::RightOuterJoin { left_keys, right_keys, residual } => {
                build_equi_join(
                    plan,
                    pn,
                    JoinSide::Right,
                    left_keys,
                    right_keys,
                    residual.clone(),
                    schema,
                    registry,
                    memory_limit_bytes,
                    cancel,
                )
                .await
            }
            PlanNodeKind::FullOuterJoin { left_keys, right_keys, residual } => {
                build_equi_join(
                    plan,
                    pn,
                    JoinSide::Full,
                    left_keys,
                    right_keys,
                    residual.clone(),
                    schema,
                    registry,
                    memory_limit_bytes,
                    cancel,
                )
                .await
            }
            PlanNodeKind::SemiJoin { left_keys, right_keys } => {
                build_equi_join(
                    plan,
                    pn,
                    JoinSide::Semi,
                    left_keys,
                    right_keys,
                    None,
                    schema,
                    registry,
                    memory_limit_bytes,
                    cancel,
                )
                .await
            }
            PlanNodeKind::AntiJoin { left_keys, right_keys } => {
                build_equi_join(
                    plan,
                    pn,
                    JoinSide::Anti,
                    left_keys,
                    right_keys,
                    None,
                    schema,
                    registry,
                    memory_limit_bytes,
                    cancel,
                )
                .await
            }

            PlanNodeKind::CrossJoin => {
                let left = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                let right = child(plan, pn, 1, registry, memory_limit_bytes, cancel).await?;
                let mem = MemoryContext::new(memory_limit_bytes);
                Ok(Box::new(CrossJoinExecutor::new(left, right, schema, mem, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::NonEquiJoin { predicate } => {
                let left = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                let right = child(plan, pn, 1, registry, memory_limit_bytes, cancel).await?;
                let mem = MemoryContext::new(memory_limit_bytes);
                Ok(Box::new(NestedLoopJoinExecutor::new(predicate.clone(), left, right, schema, mem, cancel.clone()))
                    as BoxedExecutor)
            }

            PlanNodeKind::Union => {
                let mut inputs = Vec::with_capacity(pn.children.len());
                for i in 0..pn.children.len() {
                    inputs.push(child(plan, pn, i, registry, memory_limit_bytes, cancel).await?);
                }
                Ok(Box::new(UnionExecutor::new(schema, inputs, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::AggregateAndGroup { group_exprs, aggregates } => {
                let input = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                let input_schema = input.schema().clone();
                let mem = MemoryContext::new(memory_limit_bytes);
                let executor = AggregateExecutor::new(
                    group_exprs.clone(),
                    aggregates.clone(),
                    &input_schema,
                    schema,
                    input,
                    mem,
                    cancel.clone(),
                )?;
                Ok(Box::new(executor) as BoxedExecutor)
            }

            PlanNodeKind::Distinct { columns } => {
                let input = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                let mem = MemoryContext::new(memory_limit_bytes);
                Ok(Box::new(DistinctExecutor::new(columns.clone(), input, mem, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::Order { keys } => {
                let input = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                let mem = MemoryContext::new(memory_limit_bytes);
                Ok(Box::new(OrderExecutor::new(keys.clone(), input, mem, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::Limit { limit } => {
                let input = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                Ok(Box::new(LimitExecutor::new(*limit, input, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::Offset { offset } => {
                let input = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                Ok(Box::new(OffsetExecutor::new(*offset, input, cancel.clone())) as BoxedExecutor)
            }

            PlanNodeKind::UnnestFunction { column, in_list } => {
                let input = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
                Ok(Box::new(UnnestExecutor::new(*column, in_list.clone(), schema, input, cancel.clone()))
                    as BoxedExecutor)
            }

            PlanNodeKind::ShowColumns | PlanNodeKind::Explain => Err(internal_error!(
                "{} is rendered directly from the plan and has no executor",
                pn.kind.label()
            )),
        }
    }
    .boxed()
}

/// Builds child `idx` of `pn`. A thin wrapper so call sites read as
/// `child(plan, pn, 0, ...)` instead of repeating `pn.children[idx]`.
fn child<'a>(
    plan: &'a Plan,
    pn: &'a PlanNode,
    idx: usize,
    registry: &'a ConnectorRegistry,
    memory_limit_bytes: i64,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<BoxedExecutor>> {
    build_executor(plan, pn.children[idx], registry, memory_limit_bytes, cancel)
}

async fn build_scan(
    connector: Arc<dyn crate::connector::Connector>,
    projected_columns: Option<&[usize]>,
    pushed_predicates: &[Expr],
    limit_hint: Option<u64>,
    schema: opteryx_common::catalog::Schema,
    cancel: &CancellationToken,
) -> Result<BoxedExecutor> {
    let partition_count = connector.partitions().max(1);
    let mut partitions = Vec::with_capacity(partition_count);
    for partition in 0..partition_count {
        partitions.push(connector.read(partition, projected_columns, pushed_predicates, limit_hint).await?);
    }
    let inner: BoxedExecutor = if partitions.len() == 1 {
        partitions.pop().expect("checked len == 1 above")
    } else {
        Box::new(UnionExecutor::new(schema.clone(), partitions, cancel.clone()))
    };
    Ok(Box::new(ScanExecutor::new(schema, inner, cancel.clone())) as BoxedExecutor)
}

#[allow(clippy::too_many_arguments)]
fn build_equi_join<'a>(
    plan: &'a Plan,
    pn: &'a PlanNode,
    side: JoinSide,
    left_keys: &'a [usize],
    right_keys: &'a [usize],
    residual: Option<Expr>,
    schema: opteryx_common::catalog::Schema,
    registry: &'a ConnectorRegistry,
    memory_limit_bytes: i64,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<BoxedExecutor>> {
    async move {
        let left = child(plan, pn, 0, registry, memory_limit_bytes, cancel).await?;
        let right = child(plan, pn, 1, registry, memory_limit_bytes, cancel).await?;
        let mem = MemoryContext::new(memory_limit_bytes);
        let executor = HashJoinExecutor::new(
            side,
            left_keys.to_vec(),
            right_keys.to_vec(),
            residual,
            left,
            right,
            schema,
            mem,
            cancel.clone(),
        );
        Ok(Box::new(executor) as BoxedExecutor)
    }
    .boxed()
}
