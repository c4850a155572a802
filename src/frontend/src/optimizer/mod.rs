//! The cost-aware optimizer: a fixed, ordered catalog of rewrite strategies,
//! each a [`Rule`] that inspects one plan node (and, for pushdown-style
//! rules, its immediate neighbours) and rewrites the arena in place.
//!
//! Grounded on the teacher's own `Rule::apply(&self, plan: PlanRef) ->
//! Option<PlanRef>` convention (`risingwave_frontend::optimizer::rule`, see
//! e.g. `top_n_on_index_rule.rs`): a rule recognises a shape or declines.
//! This crate's arena-backed [`Plan`] gives every node a stable [`NodeId`],
//! which makes a pure "return my replacement" signature awkward for rules
//! that relocate a predicate across two adjacent nodes (pushing a filter
//! past a join needs to shrink the filter *and* attach a residual to the
//! join in the same step) — so `apply` here takes `&mut Plan` directly and
//! reports whether it changed anything, while [`PlanRef`] remains the
//! read-only inspection handle single-node rules use internally.

pub mod context;
pub mod rules;

use std::fmt;

use crate::plan::{NodeId, Plan, PlanNode, PlanNodeKind};

pub use context::{OptimizerContext, ScanCapabilities};

/// A read-only view of one plan node plus a borrow of the whole arena, so a
/// rule can walk into its children's payloads (e.g. to check whether a
/// `Filter`'s input is a `Scan`) without needing `&mut` itself.
#[derive(Clone, Copy)]
pub struct PlanRef<'a> {
    plan: &'a Plan,
    id: NodeId,
}

impl<'a> PlanRef<'a> {
    pub fn new(plan: &'a Plan, id: NodeId) -> Self {
        Self { plan, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'a PlanNodeKind {
        &self.plan.node(self.id).kind
    }

    pub fn schema(&self) -> &'a opteryx_common::catalog::Schema {
        &self.plan.node(self.id).schema
    }

    pub fn children(&self) -> &'a [NodeId] {
        &self.plan.node(self.id).children
    }

    pub fn child(&self, index: usize) -> PlanRef<'a> {
        PlanRef { plan: self.plan, id: self.children()[index] }
    }
}

/// One optimizer strategy. A rule reasons only about the node it is handed
/// and that node's immediate children (spec.md §4.2: "idempotent and
/// local") and must leave the arena untouched (return `false`) for any
/// shape it does not recognise — recognition failure is never an error
/// (§4.2's failure semantics).
pub trait Rule: fmt::Debug {
    fn name(&self) -> &'static str;
    fn apply(&self, plan: &mut Plan, id: NodeId, ctx: &mut OptimizerContext) -> bool;
}

/// Replaces the node at `plan_ref`'s id with `kind`, keeping its existing
/// children and schema — the common case for rules that only rewrite a
/// node's own expression payload.
fn replace_kind(plan: &mut Plan, id: NodeId, kind: PlanNodeKind) {
    let (children, schema) = {
        let node = plan.node(id);
        (node.children.clone(), node.schema.clone())
    };
    plan.replace(id, PlanNode { id, children, schema, kind });
}

/// The 15 strategies of spec.md §4.2, in their fixed catalog order. The
/// optimizer runs this list exactly once (no fixpoint iteration — spec.md
/// §4.2 notes a second global pass yields diminishing returns), applying
/// each rule to every node in a single bottom-up sweep before moving to the
/// next rule.
pub fn standard_strategies() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(rules::ConstantFolding),
        Box::new(rules::BooleanSimplification),
        Box::new(rules::SplitConjunctivePredicates),
        Box::new(rules::CorrelatedFilterLifting),
        Box::new(rules::PredicateRewrite),
        Box::new(rules::PredicatePushdown),
        Box::new(rules::ProjectionPushdown),
        Box::new(rules::JoinRewrite),
        Box::new(rules::JoinOrdering),
        Box::new(rules::DistinctPushdown),
        Box::new(rules::OperatorFusion),
        Box::new(rules::LimitPushdown),
        Box::new(rules::PredicateOrdering),
        Box::new(rules::RedundantOperationElimination),
        Box::new(rules::ConstantFolding),
    ]
}

/// Runs every strategy in `rules` once, in order, over every node of `plan`
/// in a bottom-up sweep. Each strategy is applied to the whole plan before
/// the next one starts, matching spec.md §4.2's "applies strategies in a
/// fixed order" (as opposed to interleaving strategies node-by-node).
pub fn optimize(plan: &mut Plan, rules: &[Box<dyn Rule>]) -> OptimizerContext {
    let mut ctx = OptimizerContext::default();
    optimize_with_context(plan, rules, &mut ctx);
    ctx
}

/// As [`optimize`], but against a caller-supplied [`OptimizerContext`] —
/// the entry point for callers that need to seed connector capabilities
/// (via [`OptimizerContext::set_capabilities`]) before `PredicatePushdown`
/// and `OperatorFusion` consult them.
pub fn optimize_with_context(plan: &mut Plan, rules: &[Box<dyn Rule>], ctx: &mut OptimizerContext) {
    for rule in rules {
        let ids = plan.post_order();
        for id in ids {
            if id.0 as usize >= plan.len() {
                continue;
            }
            if rule.apply(plan, id, ctx) {
                ctx.record_fired(rule.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use opteryx_common::catalog::Schema;
    use opteryx_common::types::ScalarValue;
    use opteryx_expr::{BinaryOp, Expr};

    use super::*;

    #[test]
    fn optimize_runs_every_strategy_without_losing_the_root() {
        let mut plan = Plan::new();
        let scan = plan.push(PlanNodeKind::scan("t", None), vec![], Schema::empty());
        let filter = plan.push(
            PlanNodeKind::Filter {
                predicates: vec![Expr::Binary {
                    op: BinaryOp::And,
                    left: Box::new(Expr::Literal(ScalarValue::Bool(true))),
                    right: Box::new(Expr::Literal(ScalarValue::Bool(true))),
                }],
            },
            vec![scan],
            Schema::empty(),
        );
        plan.set_root(filter);

        let rules = standard_strategies();
        let ctx = optimize(&mut plan, &rules);
        assert_eq!(plan.root(), filter);
        assert!(!ctx.fired.is_empty(), "constant folding of TRUE AND TRUE should have fired at least once");
    }
}
