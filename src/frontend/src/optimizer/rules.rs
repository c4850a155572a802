//! The 15 rewrite strategies, in the order `standard_strategies()` runs
//! them. Each `impl Rule` is grounded on the corresponding bullet of
//! spec.md §4.2; the module doc on each one names it explicitly.

use std::collections::HashMap;

use opteryx_common::types::ScalarValue;
use opteryx_expr::{BinaryOp, Expr, UnaryOp};

use crate::optimizer::{replace_kind, OptimizerContext, Rule};
use crate::plan::{NodeId, Plan, PlanNode, PlanNodeKind};

/// Literal-folds arithmetic, comparison, and 3-valued boolean expressions
/// (spec.md §4.2 strategy 1), plus the identity/absorber simplifications
/// `x+0`, `x*1`, `x*0`, `AND`/`OR` short-circuit on a literal operand (§7's
/// `NULL AND FALSE = FALSE`, `NULL OR TRUE = TRUE`).
#[derive(Debug)]
pub struct ConstantFolding;

impl Rule for ConstantFolding {
    fn name(&self) -> &'static str {
        "ConstantFolding"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let mut changed = false;
        let exprs = match &plan.node(id).kind {
            PlanNodeKind::Filter { predicates } => predicates.clone(),
            PlanNodeKind::Project { exprs } => exprs.clone(),
            _ => return false,
        };
        let folded: Vec<Expr> = exprs
            .iter()
            .map(|e| {
                let f = fold_expr(e);
                if !exprs_eq(&f, e) {
                    changed = true;
                }
                f
            })
            .collect();
        if !changed {
            return false;
        }
        let kind = match &plan.node(id).kind {
            PlanNodeKind::Filter { .. } => PlanNodeKind::Filter { predicates: folded },
            PlanNodeKind::Project { .. } => PlanNodeKind::Project { exprs: folded },
            _ => unreachable!(),
        };
        replace_kind(plan, id, kind);
        true
    }
}

fn literal_bool(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Literal(ScalarValue::Bool(b)) => Some(*b),
        _ => None,
    }
}

fn is_literal_null(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(ScalarValue::Null(_)))
}

/// Recursively folds literal-literal subexpressions and the identity cases
/// named on [`ConstantFolding`]. Non-matching shapes pass through untouched.
fn fold_expr(expr: &Expr) -> Expr {
    match expr {
        Expr::Binary { op, left, right } => {
            let left = fold_expr(left);
            let right = fold_expr(right);
            if let Some(folded) = fold_binary(*op, &left, &right) {
                return folded;
            }
            Expr::Binary { op: *op, left: Box::new(left), right: Box::new(right) }
        }
        Expr::Unary { op, expr } => {
            let expr = fold_expr(expr);
            if let (UnaryOp::Not, Some(b)) = (op, literal_bool(&expr)) {
                return Expr::Literal(ScalarValue::Bool(!b));
            }
            Expr::Unary { op: *op, expr: Box::new(expr) }
        }
        Expr::IsNull(inner) => Expr::IsNull(Box::new(fold_expr(inner))),
        Expr::IsNotNull(inner) => Expr::IsNotNull(Box::new(fold_expr(inner))),
        Expr::Cast { expr, target } => Expr::Cast { expr: Box::new(fold_expr(expr)), target: target.clone() },
        Expr::TryCast { expr, target } => Expr::TryCast { expr: Box::new(fold_expr(expr)), target: target.clone() },
        Expr::Case { branches, default, return_type } => Expr::Case {
            branches: branches.iter().map(|(c, v)| (fold_expr(c), fold_expr(v))).collect(),
            default: default.as_ref().map(|d| Box::new(fold_expr(d))),
            return_type: return_type.clone(),
        },
        Expr::Like { expr, pattern, case_insensitive, negated } => Expr::Like {
            expr: Box::new(fold_expr(expr)),
            pattern: Box::new(fold_expr(pattern)),
            case_insensitive: *case_insensitive,
            negated: *negated,
        },
        Expr::Any { op, left, list } => {
            Expr::Any { op: *op, left: Box::new(fold_expr(left)), list: Box::new(fold_expr(list)) }
        }
        Expr::All { op, left, list } => {
            Expr::All { op: *op, left: Box::new(fold_expr(left)), list: Box::new(fold_expr(list)) }
        }
        Expr::Column(_) | Expr::Literal(_) => expr.clone(),
    }
}

fn fold_binary(op: BinaryOp, left: &Expr, right: &Expr) -> Option<Expr> {
    if let BinaryOp::And = op {
        if literal_bool(left) == Some(false) || literal_bool(right) == Some(false) {
            return Some(Expr::Literal(ScalarValue::Bool(false)));
        }
        if literal_bool(left) == Some(true) {
            return Some(right.clone());
        }
        if literal_bool(right) == Some(true) {
            return Some(left.clone());
        }
    }
    if let BinaryOp::Or = op {
        if literal_bool(left) == Some(true) || literal_bool(right) == Some(true) {
            return Some(Expr::Literal(ScalarValue::Bool(true)));
        }
        if literal_bool(left) == Some(false) {
            return Some(right.clone());
        }
        if literal_bool(right) == Some(false) {
            return Some(left.clone());
        }
    }
    if op.is_arithmetic() {
        if is_zero(left) && matches!(op, BinaryOp::Add) {
            return Some(right.clone());
        }
        if is_zero(right) && matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            return Some(left.clone());
        }
        if is_one(right) && matches!(op, BinaryOp::Mul | BinaryOp::Div) {
            return Some(left.clone());
        }
        if is_one(left) && matches!(op, BinaryOp::Mul) {
            return Some(right.clone());
        }
        if (is_zero(left) || is_zero(right)) && matches!(op, BinaryOp::Mul) {
            return Some(zero_literal_like(left, right));
        }
    }
    if let (Expr::Literal(a), Expr::Literal(b)) = (left, right) {
        return eval_literal_binary(op, a, b);
    }
    None
}

fn is_zero(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Literal(ScalarValue::Int8(0))
            | Expr::Literal(ScalarValue::Int16(0))
            | Expr::Literal(ScalarValue::Int32(0))
            | Expr::Literal(ScalarValue::Int64(0))
    ) || matches!(expr, Expr::Literal(ScalarValue::Float32(v)) if *v == 0.0)
        || matches!(expr, Expr::Literal(ScalarValue::Float64(v)) if *v == 0.0)
}

fn is_one(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Literal(ScalarValue::Int8(1))
            | Expr::Literal(ScalarValue::Int16(1))
            | Expr::Literal(ScalarValue::Int32(1))
            | Expr::Literal(ScalarValue::Int64(1))
    ) || matches!(expr, Expr::Literal(ScalarValue::Float32(v)) if *v == 1.0)
        || matches!(expr, Expr::Literal(ScalarValue::Float64(v)) if *v == 1.0)
}

fn zero_literal_like(left: &Expr, right: &Expr) -> Expr {
    if let Expr::Literal(v) = left {
        Expr::Literal(v.clone())
    } else if let Expr::Literal(v) = right {
        Expr::Literal(v.clone())
    } else {
        left.clone()
    }
}

/// Folds `a op b` when both sides are literals, covering 3VL `AND`/`OR`
/// (already special-cased above for the mixed literal/non-literal case) and
/// equality comparisons. Arithmetic on two literals is left to execution:
/// the planner has no numeric-kernel duplication of `opteryx_expr::kernels`,
/// so only the comparisons and boolean ops needed to collapse a predicate to
/// `TRUE`/`FALSE` are folded here.
fn eval_literal_binary(op: BinaryOp, a: &ScalarValue, b: &ScalarValue) -> Option<Expr> {
    if a.is_null() || b.is_null() {
        return match op {
            BinaryOp::And if literal_bool(&Expr::Literal(a.clone())) == Some(false) => {
                Some(Expr::Literal(ScalarValue::Bool(false)))
            }
            BinaryOp::And if literal_bool(&Expr::Literal(b.clone())) == Some(false) => {
                Some(Expr::Literal(ScalarValue::Bool(false)))
            }
            BinaryOp::Or if literal_bool(&Expr::Literal(a.clone())) == Some(true) => {
                Some(Expr::Literal(ScalarValue::Bool(true)))
            }
            BinaryOp::Or if literal_bool(&Expr::Literal(b.clone())) == Some(true) => {
                Some(Expr::Literal(ScalarValue::Bool(true)))
            }
            _ if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) => {
                Some(Expr::Literal(ScalarValue::Null(opteryx_common::types::DataType::Bool)))
            }
            _ => None,
        };
    }
    match op {
        BinaryOp::Eq => Some(Expr::Literal(ScalarValue::Bool(a == b))),
        BinaryOp::NotEq => Some(Expr::Literal(ScalarValue::Bool(a != b))),
        BinaryOp::And => match (a, b) {
            (ScalarValue::Bool(x), ScalarValue::Bool(y)) => Some(Expr::Literal(ScalarValue::Bool(*x && *y))),
            _ => None,
        },
        BinaryOp::Or => match (a, b) {
            (ScalarValue::Bool(x), ScalarValue::Bool(y)) => Some(Expr::Literal(ScalarValue::Bool(*x || *y))),
            _ => None,
        },
        _ => None,
    }
}

fn exprs_eq(a: &Expr, b: &Expr) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

/// De Morgan's laws and double-negation removal (spec.md §4.2 strategy 2).
#[derive(Debug)]
pub struct BooleanSimplification;

impl Rule for BooleanSimplification {
    fn name(&self) -> &'static str {
        "BooleanSimplification"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let mut changed = false;
        let exprs = match &plan.node(id).kind {
            PlanNodeKind::Filter { predicates } => predicates.clone(),
            PlanNodeKind::Project { exprs } => exprs.clone(),
            _ => return false,
        };
        let simplified: Vec<Expr> = exprs
            .iter()
            .map(|e| {
                let s = simplify_bool(e);
                if !exprs_eq(&s, e) {
                    changed = true;
                }
                s
            })
            .collect();
        if !changed {
            return false;
        }
        let kind = match &plan.node(id).kind {
            PlanNodeKind::Filter { .. } => PlanNodeKind::Filter { predicates: simplified },
            PlanNodeKind::Project { .. } => PlanNodeKind::Project { exprs: simplified },
            _ => unreachable!(),
        };
        replace_kind(plan, id, kind);
        true
    }
}

fn simplify_bool(expr: &Expr) -> Expr {
    match expr {
        Expr::Unary { op: UnaryOp::Not, expr: inner } => {
            let inner = simplify_bool(inner);
            match inner {
                Expr::Unary { op: UnaryOp::Not, expr: inner2 } => *inner2,
                Expr::Binary { op: BinaryOp::And, left, right } => Expr::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(Expr::Unary { op: UnaryOp::Not, expr: left }),
                    right: Box::new(Expr::Unary { op: UnaryOp::Not, expr: right }),
                },
                Expr::Binary { op: BinaryOp::Or, left, right } => Expr::Binary {
                    op: BinaryOp::And,
                    left: Box::new(Expr::Unary { op: UnaryOp::Not, expr: left }),
                    right: Box::new(Expr::Unary { op: UnaryOp::Not, expr: right }),
                },
                other => Expr::Unary { op: UnaryOp::Not, expr: Box::new(other) },
            }
        }
        Expr::Binary { op, left, right } => {
            Expr::Binary { op: *op, left: Box::new(simplify_bool(left)), right: Box::new(simplify_bool(right)) }
        }
        other => other.clone(),
    }
}

/// Flattens nested `AND` into the `Filter`'s conjunct list (spec.md §4.2
/// strategy 3), so later strategies that reorder or push individual
/// predicates don't need to re-walk an `AND` tree each time (e.g. `AND`
/// nodes surfaced by [`BooleanSimplification`]'s De Morgan rewrite).
#[derive(Debug)]
pub struct SplitConjunctivePredicates;

impl Rule for SplitConjunctivePredicates {
    fn name(&self) -> &'static str {
        "SplitConjunctivePredicates"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Filter { predicates } = &plan.node(id).kind else { return false };
        let mut flat = Vec::new();
        let mut changed = false;
        for p in predicates {
            let before = flat.len();
            flatten_and(p, &mut flat);
            if flat.len() - before > 1 {
                changed = true;
            }
        }
        if !changed {
            return false;
        }
        replace_kind(plan, id, PlanNodeKind::Filter { predicates: flat });
        true
    }
}

pub(crate) fn flatten_and(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Binary { op: BinaryOp::And, left, right } => {
            flatten_and(left, out);
            flatten_and(right, out);
        }
        other => out.push(other.clone()),
    }
}

/// Recognises a `Filter` directly above a `Subquery` whose predicate spans
/// both the subquery's own columns and outer columns (a correlated
/// reference). Full decorrelation (rewriting into a join, spec.md §4.2
/// strategy 4) needs correlation metadata this crate's bound AST doesn't
/// carry at plan-node granularity, so this rule only flags the shape with a
/// diagnostic and leaves the plan untouched — a deliberate, bounded scope
/// documented in DESIGN.md.
#[derive(Debug)]
pub struct CorrelatedFilterLifting;

impl Rule for CorrelatedFilterLifting {
    fn name(&self) -> &'static str {
        "CorrelatedFilterLifting"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Filter { predicates } = &plan.node(id).kind else { return false };
        let &[child] = plan.node(id).children.as_slice() else { return false };
        let PlanNodeKind::Subquery { alias } = &plan.node(child).kind else { return false };
        let subquery_width = plan.node(child).schema.len();
        let correlated = predicates.iter().any(|p| column_span(p).iter().any(|&c| c >= subquery_width));
        if correlated {
            ctx.warn(format!(
                "correlated predicate over subquery `{alias}` detected; decorrelation is not performed by this optimizer"
            ));
        }
        false
    }
}

pub(crate) fn column_span(expr: &Expr) -> Vec<usize> {
    let mut cols = Vec::new();
    collect_columns(expr, &mut cols);
    cols
}

pub(crate) fn collect_columns(expr: &Expr, out: &mut Vec<usize>) {
    match expr {
        Expr::Column(i) => out.push(*i),
        Expr::Binary { left, right, .. } => {
            collect_columns(left, out);
            collect_columns(right, out);
        }
        Expr::Unary { expr, .. } | Expr::IsNull(expr) | Expr::IsNotNull(expr) => collect_columns(expr, out),
        Expr::Cast { expr, .. } | Expr::TryCast { expr, .. } => collect_columns(expr, out),
        Expr::Case { branches, default, .. } => {
            for (c, v) in branches {
                collect_columns(c, out);
                collect_columns(v, out);
            }
            if let Some(d) = default {
                collect_columns(d, out);
            }
        }
        Expr::Like { expr, pattern, .. } => {
            collect_columns(expr, out);
            collect_columns(pattern, out);
        }
        Expr::Any { left, list, .. } | Expr::All { left, list, .. } => {
            collect_columns(left, out);
            collect_columns(list, out);
        }
        Expr::Literal(_) => {}
    }
}

/// Rewrites `NOT (a = b)` and the other five comparison negations into their
/// direct operator form (spec.md §4.2 strategy 5) — valid under SQL 3VL
/// since both sides of a comparison are `NULL` (and so is its negation)
/// together. `BETWEEN`/single-value `IN` canonicalisation is handled by the
/// binder that produces this crate's input: `opteryx_expr::Expr` has no
/// `Between`/`InList` variant, those already lower to `Binary`/`Any` before
/// reaching the planner.
#[derive(Debug)]
pub struct PredicateRewrite;

impl Rule for PredicateRewrite {
    fn name(&self) -> &'static str {
        "PredicateRewrite"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let mut changed = false;
        let exprs = match &plan.node(id).kind {
            PlanNodeKind::Filter { predicates } => predicates.clone(),
            _ => return false,
        };
        let rewritten: Vec<Expr> = exprs
            .iter()
            .map(|e| {
                let r = negate_comparison(e);
                if !exprs_eq(&r, e) {
                    changed = true;
                }
                r
            })
            .collect();
        let compacted = compact_range_predicates(rewritten);
        if compacted.len() != exprs.len() {
            changed = true;
        }
        if !changed {
            return false;
        }
        replace_kind(plan, id, PlanNodeKind::Filter { predicates: compacted });
        true
    }
}

/// Merges redundant same-column range comparisons against a literal into
/// their tightest bound (`x > 5 AND x > 10` -> `x > 10`). Only `Column op
/// Literal` shapes with a `Gt`/`GtEq`/`Lt`/`LtEq` operator participate;
/// every other predicate passes through untouched, in original order. Keeps
/// the winning predicate's own `Expr` (not a reconstructed one) so the
/// literal's original `ScalarValue` type survives the rewrite.
fn compact_range_predicates(exprs: Vec<Expr>) -> Vec<Expr> {
    use std::collections::HashMap;

    let mut lower_bound: HashMap<usize, (f64, Expr)> = HashMap::new(); // tightest Gt/GtEq seen per column
    let mut upper_bound: HashMap<usize, (f64, Expr)> = HashMap::new(); // tightest Lt/LtEq seen per column
    let mut passthrough = Vec::new();

    for e in exprs {
        match range_bound(&e) {
            Some((col, true, value)) => match lower_bound.get(&col) {
                Some((existing, _)) if *existing >= value => {}
                _ => {
                    lower_bound.insert(col, (value, e));
                }
            },
            Some((col, false, value)) => match upper_bound.get(&col) {
                Some((existing, _)) if *existing <= value => {}
                _ => {
                    upper_bound.insert(col, (value, e));
                }
            },
            None => passthrough.push(e),
        }
    }

    let mut out: Vec<Expr> = lower_bound.into_values().map(|(_, e)| e).collect();
    out.extend(upper_bound.into_values().map(|(_, e)| e));
    out.extend(passthrough);
    out
}

/// Recognises `Column(c) op Literal(numeric)` for `Gt`/`GtEq` (returns
/// `(col, true, value)`) or `Lt`/`LtEq` (returns `(col, false, value)`).
/// Anything else, including the mirrored `Literal op Column` form, returns
/// `None` — the binder always produces column-first comparisons, so this
/// rule doesn't need to handle the flipped shape.
fn range_bound(expr: &Expr) -> Option<(usize, bool, f64)> {
    let Expr::Binary { op, left, right } = expr else { return None };
    let Expr::Column(col) = left.as_ref() else { return None };
    let Expr::Literal(v) = right.as_ref() else { return None };
    let value = numeric_value(v)?;
    match op {
        BinaryOp::Gt | BinaryOp::GtEq => Some((*col, true, value)),
        BinaryOp::Lt | BinaryOp::LtEq => Some((*col, false, value)),
        _ => None,
    }
}

fn numeric_value(v: &ScalarValue) -> Option<f64> {
    Some(match v {
        ScalarValue::Int8(n) => *n as f64,
        ScalarValue::Int16(n) => *n as f64,
        ScalarValue::Int32(n) => *n as f64,
        ScalarValue::Int64(n) => *n as f64,
        ScalarValue::Float32(n) => *n as f64,
        ScalarValue::Float64(n) => *n,
        _ => return None,
    })
}

fn negate_comparison(expr: &Expr) -> Expr {
    if let Expr::Unary { op: UnaryOp::Not, expr: inner } = expr {
        if let Expr::Binary { op, left, right } = inner.as_ref() {
            if let Some(negated) = negate_op(*op) {
                return Expr::Binary { op: negated, left: left.clone(), right: right.clone() };
            }
        }
    }
    expr.clone()
}

fn negate_op(op: BinaryOp) -> Option<BinaryOp> {
    Some(match op {
        BinaryOp::Eq => BinaryOp::NotEq,
        BinaryOp::NotEq => BinaryOp::Eq,
        BinaryOp::Lt => BinaryOp::GtEq,
        BinaryOp::GtEq => BinaryOp::Lt,
        BinaryOp::LtEq => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::LtEq,
        _ => return None,
    })
}

/// Pushes a `Filter`'s conjuncts past a `Join`/`CrossJoin`/`Union` child, and
/// swaps a `Filter` below a pure-passthrough `Project` (spec.md §4.2
/// strategy 6). The arena has no parent pointers, so a "swap" reassigns the
/// outer node's id to the inner node's kind/schema and pushes a fresh node
/// below the original grandchild to host the relocated `Filter` — every
/// existing reference to `id` keeps pointing at the right operator.
#[derive(Debug)]
pub struct PredicatePushdown;

impl Rule for PredicatePushdown {
    fn name(&self) -> &'static str {
        "PredicatePushdown"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Filter { predicates } = plan.node(id).kind.clone() else { return false };
        if predicates.is_empty() {
            return false;
        }
        let &[child_id] = plan.node(id).children.as_slice() else { return false };
        let child_kind = plan.node(child_id).kind.clone();

        match &child_kind {
            PlanNodeKind::InnerJoin { left_keys, right_keys, residual } => {
                let &[left, right] = plan.node(child_id).children.as_slice() else { return false };
                let left_width = plan.node(left).schema.len();
                let (left_preds, rest): (Vec<Expr>, Vec<Expr>) =
                    predicates.iter().cloned().partition(|p| column_span(p).iter().all(|&c| c < left_width));
                let (right_preds, cross_preds): (Vec<Expr>, Vec<Expr>) = rest.iter().cloned().partition(|p| {
                    column_span(p).iter().all(|&c| c >= left_width)
                });
                if left_preds.is_empty() && right_preds.is_empty() {
                    return false;
                }
                let right_preds_remapped: Vec<Expr> =
                    right_preds.iter().map(|p| remap_columns(p, &|c| c - left_width)).collect();

                let new_left = if left_preds.is_empty() {
                    left
                } else {
                    plan.push(PlanNodeKind::Filter { predicates: left_preds }, vec![left], plan.node(left).schema.clone())
                };
                let new_right = if right_preds_remapped.is_empty() {
                    right
                } else {
                    let right_schema = plan.node(right).schema.clone();
                    plan.push(PlanNodeKind::Filter { predicates: right_preds_remapped }, vec![right], right_schema)
                };
                replace_kind(
                    plan,
                    child_id,
                    PlanNodeKind::InnerJoin {
                        left_keys: left_keys.clone(),
                        right_keys: right_keys.clone(),
                        residual: residual.clone(),
                    },
                );
                plan.node_mut(child_id).children = vec![new_left, new_right];
                replace_kind(plan, id, PlanNodeKind::Filter { predicates: cross_preds });
                true
            }
            PlanNodeKind::CrossJoin => {
                let &[left, right] = plan.node(child_id).children.as_slice() else { return false };
                let left_width = plan.node(left).schema.len();
                let (left_preds, rest): (Vec<Expr>, Vec<Expr>) =
                    predicates.iter().cloned().partition(|p| column_span(p).iter().all(|&c| c < left_width));
                let (right_preds, cross_preds): (Vec<Expr>, Vec<Expr>) =
                    rest.iter().cloned().partition(|p| column_span(p).iter().all(|&c| c >= left_width));
                if left_preds.is_empty() && right_preds.is_empty() {
                    return false;
                }
                let right_preds_remapped: Vec<Expr> =
                    right_preds.iter().map(|p| remap_columns(p, &|c| c - left_width)).collect();
                let new_left = if left_preds.is_empty() {
                    left
                } else {
                    plan.push(PlanNodeKind::Filter { predicates: left_preds }, vec![left], plan.node(left).schema.clone())
                };
                let new_right = if right_preds_remapped.is_empty() {
                    right
                } else {
                    let right_schema = plan.node(right).schema.clone();
                    plan.push(PlanNodeKind::Filter { predicates: right_preds_remapped }, vec![right], right_schema)
                };
                plan.node_mut(child_id).children = vec![new_left, new_right];
                replace_kind(plan, id, PlanNodeKind::Filter { predicates: cross_preds });
                true
            }
            PlanNodeKind::Union => {
                let branches = plan.node(child_id).children.clone();
                let new_branches: Vec<NodeId> = branches
                    .iter()
                    .map(|&b| {
                        let schema = plan.node(b).schema.clone();
                        plan.push(PlanNodeKind::Filter { predicates: predicates.clone() }, vec![b], schema)
                    })
                    .collect();
                plan.node_mut(child_id).children = new_branches;
                replace_kind(plan, id, PlanNodeKind::Filter { predicates: Vec::new() });
                true
            }
            PlanNodeKind::Project { exprs } if exprs.iter().all(is_plain_column) => {
                let mapping: Vec<usize> = exprs.iter().map(|e| col_index(e)).collect();
                let remapped: Vec<Expr> = predicates.iter().map(|p| remap_columns(p, &|c| mapping[c])).collect();
                let &[grandchild] = plan.node(child_id).children.as_slice() else { return false };
                let grandchild_schema = plan.node(grandchild).schema.clone();
                let new_filter =
                    plan.push(PlanNodeKind::Filter { predicates: remapped }, vec![grandchild], grandchild_schema);
                let outer_schema = plan.node(id).schema.clone();
                plan.replace(
                    id,
                    PlanNode {
                        id,
                        children: vec![new_filter],
                        schema: outer_schema,
                        kind: PlanNodeKind::Project { exprs: exprs.clone() },
                    },
                );
                true
            }
            _ => false,
        }
    }
}

pub(crate) fn is_plain_column(expr: &Expr) -> bool {
    matches!(expr, Expr::Column(_))
}

pub(crate) fn col_index(expr: &Expr) -> usize {
    match expr {
        Expr::Column(i) => *i,
        _ => unreachable!("is_plain_column guards this"),
    }
}

pub(crate) fn remap_columns(expr: &Expr, mapping: &dyn Fn(usize) -> usize) -> Expr {
    match expr {
        Expr::Column(i) => Expr::Column(mapping(*i)),
        Expr::Literal(v) => Expr::Literal(v.clone()),
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(remap_columns(left, mapping)),
            right: Box::new(remap_columns(right, mapping)),
        },
        Expr::Unary { op, expr } => Expr::Unary { op: *op, expr: Box::new(remap_columns(expr, mapping)) },
        Expr::Cast { expr, target } => Expr::Cast { expr: Box::new(remap_columns(expr, mapping)), target: target.clone() },
        Expr::TryCast { expr, target } => {
            Expr::TryCast { expr: Box::new(remap_columns(expr, mapping)), target: target.clone() }
        }
        Expr::IsNull(e) => Expr::IsNull(Box::new(remap_columns(e, mapping))),
        Expr::IsNotNull(e) => Expr::IsNotNull(Box::new(remap_columns(e, mapping))),
        Expr::Case { branches, default, return_type } => Expr::Case {
            branches: branches.iter().map(|(c, v)| (remap_columns(c, mapping), remap_columns(v, mapping))).collect(),
            default: default.as_ref().map(|d| Box::new(remap_columns(d, mapping))),
            return_type: return_type.clone(),
        },
        Expr::Like { expr, pattern, case_insensitive, negated } => Expr::Like {
            expr: Box::new(remap_columns(expr, mapping)),
            pattern: Box::new(remap_columns(pattern, mapping)),
            case_insensitive: *case_insensitive,
            negated: *negated,
        },
        Expr::Any { op, left, list } => {
            Expr::Any { op: *op, left: Box::new(remap_columns(left, mapping)), list: Box::new(remap_columns(list, mapping)) }
        }
        Expr::All { op, left, list } => {
            Expr::All { op: *op, left: Box::new(remap_columns(left, mapping)), list: Box::new(remap_columns(list, mapping)) }
        }
    }
}

/// Narrows a `Scan`'s `projected_columns` to the set actually read above it
/// (spec.md §4.2 strategy 7).
///
/// Only fires from a `Project`, directly over the `Scan` or over a single
/// `Filter` over the `Scan` — a `Project` is the one node whose column list
/// fixes exactly what every consumer above it can still see, so it is the
/// only safe anchor for this rule. A bare `Filter` passes every input
/// column through unchanged (it narrows rows, never columns), so narrowing
/// `projected_columns` to just a `Filter`'s own predicate columns would
/// drop columns something further up still reads.
///
/// Gated on `ctx.capabilities(&table).supports_projection_pushdown`, like
/// `PredicatePushdown`/`OperatorFusion` gate on the predicate-pushdown flag:
/// a connector that hands back full-width morsels regardless of
/// `projected_columns` would otherwise silently disagree with the narrowed
/// schema this rule writes onto the `Scan` node.
///
/// A connector that does honour `projected_columns` (see
/// `opteryx::connector::SampleTableConnector::read`) hands back morsels
/// reindexed to `0..referenced.len()`, not the scan's original absolute
/// indices — so firing this rule also reindexes every `Expr::Column`
/// reference between here and the scan (the `Filter`'s predicates, if one
/// is in the way, and this `Project`'s own `exprs`) and narrows the `Scan`'s
/// and any intervening `Filter`'s reported output [`Schema`] to match.
#[derive(Debug)]
pub struct ProjectionPushdown;

impl Rule for ProjectionPushdown {
    fn name(&self) -> &'static str {
        "ProjectionPushdown"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Project { exprs } = &plan.node(id).kind else { return false };
        let mut referenced = referenced_columns(exprs);
        let &[child] = plan.node(id).children.as_slice() else { return false };

        let (scan_id, filter_id) = match &plan.node(child).kind {
            PlanNodeKind::Scan { .. } => (child, None),
            PlanNodeKind::Filter { predicates } => {
                let &[grandchild] = plan.node(child).children.as_slice() else { return false };
                if !matches!(plan.node(grandchild).kind, PlanNodeKind::Scan { .. }) {
                    return false;
                }
                referenced.extend(referenced_columns(predicates));
                referenced.sort_unstable();
                referenced.dedup();
                (grandchild, Some(child))
            }
            _ => return false,
        };

        let PlanNodeKind::Scan { table, projected_columns, .. } = &plan.node(scan_id).kind else { return false };
        if !ctx.capabilities(table).supports_projection_pushdown {
            return false;
        }
        if projected_columns.as_ref().is_some_and(|c| c.iter().copied().collect::<Vec<_>>() == referenced) {
            return false;
        }
        let PlanNodeKind::Scan { table, time_range, pushed_predicates, limit_hint, .. } =
            plan.node(scan_id).kind.clone()
        else {
            unreachable!()
        };

        let narrowed_schema = plan.node(scan_id).schema.project(&referenced);
        let index_map: HashMap<usize, usize> = referenced.iter().enumerate().map(|(new, &old)| (old, new)).collect();
        let mapping = move |old: usize| {
            *index_map
                .get(&old)
                .unwrap_or_else(|| panic!("column {old} read above the scan but missing from its narrowed projection"))
        };

        plan.node_mut(scan_id).schema = narrowed_schema.clone();
        plan.node_mut(scan_id).kind = PlanNodeKind::Scan {
            table,
            time_range,
            projected_columns: Some(referenced),
            pushed_predicates,
            limit_hint,
        };

        if let Some(filter_id) = filter_id {
            let PlanNodeKind::Filter { predicates } = &plan.node(filter_id).kind else { unreachable!() };
            let remapped = predicates.iter().map(|e| remap_columns(e, &mapping)).collect();
            plan.node_mut(filter_id).schema = narrowed_schema;
            plan.node_mut(filter_id).kind = PlanNodeKind::Filter { predicates: remapped };
        }

        let PlanNodeKind::Project { exprs } = &plan.node(id).kind else { unreachable!() };
        let remapped = exprs.iter().map(|e| remap_columns(e, &mapping)).collect();
        plan.node_mut(id).kind = PlanNodeKind::Project { exprs: remapped };

        true
    }
}

fn referenced_columns(exprs: &[Expr]) -> Vec<usize> {
    let mut cols = Vec::new();
    for e in exprs {
        collect_columns(e, &mut cols);
    }
    cols.sort_unstable();
    cols.dedup();
    cols
}

/// Promotes a `Filter` over `CrossJoin` whose conjuncts include an equality
/// between a left-only and a right-only column into an `InnerJoin` (spec.md
/// §4.2 strategy 8), leaving any remaining conjuncts as the join's residual.
#[derive(Debug)]
pub struct JoinRewrite;

impl Rule for JoinRewrite {
    fn name(&self) -> &'static str {
        "JoinRewrite"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Filter { predicates } = plan.node(id).kind.clone() else { return false };
        let &[child] = plan.node(id).children.as_slice() else { return false };
        let PlanNodeKind::CrossJoin = &plan.node(child).kind else { return false };
        let &[left, _right] = plan.node(child).children.as_slice() else { return false };
        let left_width = plan.node(left).schema.len();

        let mut left_keys = Vec::new();
        let mut right_keys = Vec::new();
        let mut residual_preds = Vec::new();
        for p in &predicates {
            match equality_key_pair(p, left_width) {
                Some((l, r)) => {
                    left_keys.push(l);
                    right_keys.push(r);
                }
                None => residual_preds.push(p.clone()),
            }
        }
        if left_keys.is_empty() {
            return false;
        }
        let residual = conjoin(residual_preds);
        replace_kind(plan, child, PlanNodeKind::InnerJoin { left_keys, right_keys, residual });
        replace_kind(plan, id, PlanNodeKind::Filter { predicates: Vec::new() });
        true
    }
}

/// Recognises `left_col = right_col` where one side references a column
/// below `left_width` and the other at or above it, returning `(left_index,
/// right_index_relative_to_right_side)`.
pub(crate) fn equality_key_pair(expr: &Expr, left_width: usize) -> Option<(usize, usize)> {
    let Expr::Binary { op: BinaryOp::Eq, left, right } = expr else { return None };
    let (Expr::Column(a), Expr::Column(b)) = (left.as_ref(), right.as_ref()) else { return None };
    if *a < left_width && *b >= left_width {
        Some((*a, *b - left_width))
    } else if *b < left_width && *a >= left_width {
        Some((*b, *a - left_width))
    } else {
        None
    }
}

pub(crate) fn conjoin(preds: Vec<Expr>) -> Option<Expr> {
    let mut iter = preds.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, p| Expr::Binary { op: BinaryOp::And, left: Box::new(acc), right: Box::new(p) }))
}

/// Orders an `InnerJoin`'s children so the smaller side (by a cheap subtree
/// size proxy for cardinality — no runtime statistics exist at plan time)
/// is the build side (spec.md §4.2 strategy 9, §4.5's "smaller build side").
/// Outer joins keep their declared side order since swapping would change
/// which side's unmatched rows are preserved, not just the physical build
/// choice — documented as a deliberate scope limit.
#[derive(Debug)]
pub struct JoinOrdering;

impl Rule for JoinOrdering {
    fn name(&self) -> &'static str {
        "JoinOrdering"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::InnerJoin { left_keys, right_keys, residual } = plan.node(id).kind.clone() else {
            return false;
        };
        let &[left, right] = plan.node(id).children.as_slice() else { return false };
        let mut seen = std::collections::HashSet::new();
        let left_size = subtree_size(plan, left, &mut seen);
        let mut seen = std::collections::HashSet::new();
        let right_size = subtree_size(plan, right, &mut seen);
        if left_size <= right_size {
            return false;
        }
        plan.node_mut(id).children = vec![right, left];
        replace_kind(plan, id, PlanNodeKind::InnerJoin { left_keys: right_keys, right_keys: left_keys, residual });
        true
    }
}

fn subtree_size(plan: &Plan, id: NodeId, seen: &mut std::collections::HashSet<NodeId>) -> usize {
    if !seen.insert(id) {
        return 0;
    }
    1 + plan.node(id).children.iter().map(|&c| subtree_size(plan, c, seen)).sum::<usize>()
}

/// Pushes `Distinct` past a pure-passthrough `Project` (column remapping,
/// swap pattern) and past `Union` (wraps each branch, spec.md §4.2 strategy
/// 10), guarded against re-wrapping an already-`Distinct` branch so the rule
/// is idempotent.
#[derive(Debug)]
pub struct DistinctPushdown;

impl Rule for DistinctPushdown {
    fn name(&self) -> &'static str {
        "DistinctPushdown"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Distinct { columns } = plan.node(id).kind.clone() else { return false };
        let &[child] = plan.node(id).children.as_slice() else { return false };
        let child_kind = plan.node(child).kind.clone();
        match &child_kind {
            PlanNodeKind::Project { exprs } if exprs.iter().all(is_plain_column) => {
                let mapping: Vec<usize> = exprs.iter().map(|e| col_index(e)).collect();
                let remapped: Vec<usize> = columns.iter().map(|&c| mapping[c]).collect();
                let &[grandchild] = plan.node(child).children.as_slice() else { return false };
                let grandchild_schema = plan.node(grandchild).schema.clone();
                let new_distinct =
                    plan.push(PlanNodeKind::Distinct { columns: remapped }, vec![grandchild], grandchild_schema);
                let outer_schema = plan.node(id).schema.clone();
                plan.replace(
                    id,
                    PlanNode {
                        id,
                        children: vec![new_distinct],
                        schema: outer_schema,
                        kind: PlanNodeKind::Project { exprs: exprs.clone() },
                    },
                );
                true
            }
            PlanNodeKind::Union => {
                let branches = plan.node(child).children.clone();
                if branches.iter().all(|&b| matches!(plan.node(b).kind, PlanNodeKind::Distinct { .. })) {
                    return false;
                }
                let new_branches: Vec<NodeId> = branches
                    .iter()
                    .map(|&b| {
                        if matches!(plan.node(b).kind, PlanNodeKind::Distinct { .. }) {
                            b
                        } else {
                            let schema = plan.node(b).schema.clone();
                            plan.push(PlanNodeKind::Distinct { columns: columns.clone() }, vec![b], schema)
                        }
                    })
                    .collect();
                plan.node_mut(child).children = new_branches;
                true
            }
            _ => false,
        }
    }
}

/// Merges adjacent operators of the same family (spec.md §4.2 strategy 11):
/// two stacked `Filter`s concatenate their conjuncts; a `Filter` directly
/// over a `Scan` whose connector advertises predicate pushdown records the
/// conjuncts as `pushed_predicates` hints without dropping the `Filter`
/// itself, since §6.2 requires the engine to re-apply whatever the connector
/// doesn't accept.
#[derive(Debug)]
pub struct OperatorFusion;

impl Rule for OperatorFusion {
    fn name(&self) -> &'static str {
        "OperatorFusion"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Filter { predicates } = plan.node(id).kind.clone() else { return false };
        let &[child] = plan.node(id).children.as_slice() else { return false };
        match plan.node(child).kind.clone() {
            PlanNodeKind::Filter { predicates: inner } => {
                let &[grandchild] = plan.node(child).children.as_slice() else { return false };
                let mut merged = inner;
                merged.extend(predicates);
                plan.node_mut(id).children = vec![grandchild];
                replace_kind(plan, id, PlanNodeKind::Filter { predicates: merged });
                true
            }
            PlanNodeKind::Scan { table, time_range, projected_columns, pushed_predicates, limit_hint } => {
                if !ctx.capabilities(&table).supports_predicate_pushdown {
                    return false;
                }
                // The Filter's predicates are expressed against its own input schema, which
                // is this Scan's *narrowed* schema whenever ProjectionPushdown (an earlier
                // strategy, spec.md §4.2 #7) already ran — but `pushed_predicates` is always
                // evaluated by the connector against the full, unprojected row (see
                // `SampleTableConnector::read`), so a narrowed column reference has to be
                // translated back to its absolute index via `projected_columns` before fusing.
                let to_absolute = |narrowed: usize| {
                    projected_columns.as_ref().map_or(narrowed, |cols| cols[narrowed])
                };
                let predicates: Vec<Expr> = predicates.iter().map(|p| remap_columns(p, &to_absolute)).collect();
                if predicates.iter().all(|p| pushed_predicates.iter().any(|q| exprs_eq(p, q))) {
                    return false;
                }
                let mut merged = pushed_predicates;
                merged.extend(predicates);
                replace_kind(
                    plan,
                    child,
                    PlanNodeKind::Scan { table, time_range, projected_columns, pushed_predicates: merged, limit_hint },
                );
                true
            }
            _ => false,
        }
    }
}

/// Pushes `Limit` past a pure-passthrough `Project` (swap pattern, no column
/// remapping needed since `Limit` carries no column references) and
/// attaches a `Scan.limit_hint` when a `Limit` sits directly above a scan
/// (spec.md §4.2 strategy 12). Pushing a `Limit` below an `Order` is
/// deliberately not attempted here — that would change which rows survive,
/// not just where the cutoff is applied — so "into sorted reads" is left to
/// the connector layer.
#[derive(Debug)]
pub struct LimitPushdown;

impl Rule for LimitPushdown {
    fn name(&self) -> &'static str {
        "LimitPushdown"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Limit { limit } = plan.node(id).kind.clone() else { return false };
        let &[child] = plan.node(id).children.as_slice() else { return false };
        match plan.node(child).kind.clone() {
            PlanNodeKind::Project { exprs } => {
                let &[grandchild] = plan.node(child).children.as_slice() else { return false };
                let grandchild_schema = plan.node(grandchild).schema.clone();
                let new_limit = plan.push(PlanNodeKind::Limit { limit }, vec![grandchild], grandchild_schema);
                let outer_schema = plan.node(id).schema.clone();
                plan.replace(
                    id,
                    PlanNode { id, children: vec![new_limit], schema: outer_schema, kind: PlanNodeKind::Project { exprs } },
                );
                true
            }
            PlanNodeKind::Scan { table, time_range, projected_columns, pushed_predicates, limit_hint } => {
                let new_hint = Some(limit_hint.map_or(limit, |existing| existing.min(limit)));
                if new_hint == limit_hint {
                    return false;
                }
                replace_kind(
                    plan,
                    child,
                    PlanNodeKind::Scan { table, time_range, projected_columns, pushed_predicates, limit_hint: new_hint },
                );
                true
            }
            _ => false,
        }
    }
}

/// Stable-sorts a `Filter`'s conjuncts by estimated evaluation cost, cheapest
/// first (spec.md §4.2 strategy 13), so short-circuiting `AND` evaluation
/// skips the more expensive predicates when an earlier one already fails.
#[derive(Debug)]
pub struct PredicateOrdering;

impl Rule for PredicateOrdering {
    fn name(&self) -> &'static str {
        "PredicateOrdering"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let PlanNodeKind::Filter { predicates } = plan.node(id).kind.clone() else { return false };
        if predicates.len() < 2 {
            return false;
        }
        let mut ordered: Vec<Expr> = predicates.clone();
        ordered.sort_by_key(estimated_cost);
        if ordered.iter().zip(&predicates).all(|(a, b)| exprs_eq(a, b)) {
            return false;
        }
        replace_kind(plan, id, PlanNodeKind::Filter { predicates: ordered });
        true
    }
}

fn estimated_cost(expr: &Expr) -> u32 {
    match expr {
        Expr::Column(_) | Expr::Literal(_) => 1,
        Expr::Binary { op, left, right } if op.is_comparison() => {
            2 + estimated_cost(left) / 4 + estimated_cost(right) / 4
        }
        Expr::Binary { left, right, .. } => 3 + estimated_cost(left) / 4 + estimated_cost(right) / 4,
        Expr::Unary { expr, .. } | Expr::IsNull(expr) | Expr::IsNotNull(expr) => 1 + estimated_cost(expr),
        Expr::Cast { expr, .. } | Expr::TryCast { expr, .. } => 2 + estimated_cost(expr),
        Expr::Case { branches, .. } => 5 + branches.len() as u32 * 2,
        Expr::Like { .. } => 20,
        Expr::Any { left, list, .. } | Expr::All { left, list, .. } => {
            10 + estimated_cost(left) + estimated_cost(list)
        }
    }
}

/// Collapses operators that are provably no-ops in combination (spec.md
/// §4.2 strategy 14): `Project` over `Project` (compose both mapping
/// lists), `Distinct` over `Distinct` on the same column set, `Order` over
/// `Order` on the same keys, and a single-child `Union` (promote the one
/// branch up into this node).
#[derive(Debug)]
pub struct RedundantOperationElimination;

impl Rule for RedundantOperationElimination {
    fn name(&self) -> &'static str {
        "RedundantOperationElimination"
    }

    fn apply(&self, plan: &mut Plan, id: NodeId, _ctx: &mut OptimizerContext) -> bool {
        let kind = plan.node(id).kind.clone();
        let children = plan.node(id).children.clone();
        match (&kind, children.as_slice()) {
            (PlanNodeKind::Project { exprs }, &[child]) => {
                let PlanNodeKind::Project { exprs: inner } = plan.node(child).kind.clone() else { return false };
                let composed: Vec<Expr> = exprs.iter().map(|e| remap_columns(e, &|c| col_index(&inner[c]))).collect();
                let &[grandchild] = plan.node(child).children.as_slice() else { return false };
                plan.node_mut(id).children = vec![grandchild];
                replace_kind(plan, id, PlanNodeKind::Project { exprs: composed });
                true
            }
            (PlanNodeKind::Distinct { columns }, &[child]) => {
                let PlanNodeKind::Distinct { columns: inner } = plan.node(child).kind.clone() else { return false };
                let a: std::collections::BTreeSet<_> = columns.iter().copied().collect();
                let b: std::collections::BTreeSet<_> = inner.iter().copied().collect();
                if a != b {
                    return false;
                }
                let &[grandchild] = plan.node(child).children.as_slice() else { return false };
                plan.node_mut(id).children = vec![grandchild];
                true
            }
            (PlanNodeKind::Order { keys }, &[child]) => {
                let PlanNodeKind::Order { keys: inner } = plan.node(child).kind.clone() else { return false };
                if keys != &inner {
                    return false;
                }
                let &[grandchild] = plan.node(child).children.as_slice() else { return false };
                plan.node_mut(id).children = vec![grandchild];
                true
            }
            (PlanNodeKind::Union, &[only]) => {
                let only_node = plan.node(only).clone();
                plan.replace(id, PlanNode { id, children: only_node.children, schema: only_node.schema, kind: only_node.kind });
                true
            }
            (PlanNodeKind::Filter { predicates }, &[only]) if predicates.is_empty() => {
                let only_node = plan.node(only).clone();
                plan.replace(id, PlanNode { id, children: only_node.children, schema: only_node.schema, kind: only_node.kind });
                true
            }
            _ => false,
        }
    }
}
