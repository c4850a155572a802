//! The logical plan: a DAG of [`PlanNode`]s stored in an arena and addressed
//! by [`NodeId`], per spec.md §9's "cyclic plan graph → arena + node-id
//! indirection" design note — CTEs may be referenced more than once, so a
//! `Box<dyn PlanNode>` ownership tree (the teacher's own `PlanRef =
//! Rc<dyn PlanNode>` shape) would need reference counting this crate avoids
//! by storing every node once and letting multiple parents hold the same
//! [`NodeId`].

use opteryx_common::catalog::Schema;
use opteryx_common::types::ScalarValue;
use opteryx_expr::agg::AggregateFunction;
use opteryx_expr::Expr;

use crate::ast::TemporalClause;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// One aggregate computed by an `AggregateAndGroup` node: the function, its
/// single argument expression (ignored for `CountStar`), an optional output
/// alias, and whether `DISTINCT` was requested (`COUNT_DISTINCT`-shaped).
#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub func: AggregateFunction,
    pub arg: Expr,
    pub alias: String,
    pub distinct: bool,
}

/// The kind-specific payload of a plan node. Every kind named in spec.md
/// §3.3 is represented; `Subquery` and `CommonTableExpression` are thin
/// wrappers so CTE multiply-reference bookkeeping (§4.1) has somewhere to
/// live without duplicating the wrapped subplan.
#[derive(Debug, Clone)]
pub enum PlanNodeKind {
    Scan {
        table: String,
        time_range: Option<TemporalClause>,
        /// Columns the optimizer has proven are the only ones read above
        /// this scan (§4.2 strategy 7, "projection pushdown"), as indices
        /// into the table's full original schema; `None` means every column
        /// is read. When this is `Some`, this node's own `schema` (see
        /// `PlanNode`) is narrowed to exactly those columns, reindexed
        /// `0..len`, matching the shape a connector honouring pushdown
        /// returns (`opteryx::connector::SampleTableConnector::read`).
        projected_columns: Option<Vec<usize>>,
        /// Predicates handed to the connector's `read()` call as candidates
        /// for pushdown (§4.2 strategy 6, §6.2), always expressed against
        /// the table's full original column indices regardless of
        /// `projected_columns` — the connector evaluates these before
        /// narrowing by `projected_columns` (see `SampleTableConnector::
        /// read`). The connector may accept a subset; `OperatorFusion`
        /// also leaves the originating `Filter` node in place above this
        /// scan so the engine re-applies whatever a connector didn't.
        pushed_predicates: Vec<Expr>,
        /// A row-count hint pushed down from a `Limit` directly above this
        /// scan (§4.2 strategy 12).
        limit_hint: Option<u64>,
    },
    /// Conjuncts of the filter's predicate, split at `AND` boundaries
    /// (spec.md §4.2 strategy 3) so pushdown and cost-based reordering can
    /// reason about each independently instead of one opaque `Expr` tree.
    Filter {
        predicates: Vec<Expr>,
    },
    Project {
        exprs: Vec<Expr>,
    },
    /// Wraps a subplan produced for a `FROM (SELECT ...)` relation.
    Subquery {
        alias: String,
    },
    InnerJoin {
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        residual: Option<Expr>,
    },
    LeftOuterJoin {
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        residual: Option<Expr>,
    },
    RightOuterJoin {
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        residual: Option<Expr>,
    },
    FullOuterJoin {
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        residual: Option<Expr>,
    },
    CrossJoin,
    SemiJoin {
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
    },
    AntiJoin {
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
    },
    /// Non-equi join predicate, executed by the nested-loop strategy
    /// (spec.md §4.5's "Non-equi" row).
    NonEquiJoin {
        predicate: Expr,
    },
    Union,
    AggregateAndGroup {
        group_exprs: Vec<Expr>,
        aggregates: Vec<AggregateCall>,
    },
    Distinct {
        columns: Vec<usize>,
    },
    Order {
        keys: Vec<(usize, bool)>,
    },
    Limit {
        limit: u64,
    },
    Offset {
        offset: u64,
    },
    UnnestFunction {
        column: usize,
        in_list: Option<Vec<ScalarValue>>,
    },
    ShowColumns,
    Explain,
    CommonTableExpression {
        name: String,
        ref_count: u32,
    },
}

impl PlanNodeKind {
    /// A bare scan with no optimizer-contributed hints yet.
    pub fn scan(table: impl Into<String>, time_range: Option<TemporalClause>) -> Self {
        PlanNodeKind::Scan { table: table.into(), time_range, projected_columns: None, pushed_predicates: Vec::new(), limit_hint: None }
    }

    /// The plan-tree label `explain` renders for this kind.
    pub fn label(&self) -> String {
        match self {
            PlanNodeKind::Scan { table, time_range, projected_columns, .. } => {
                let cols = projected_columns.as_ref().map(|c| format!(", {} cols", c.len())).unwrap_or_default();
                match time_range {
                    Some(_) => format!("Scan({table}) [temporal]{cols}"),
                    None => format!("Scan({table}){cols}"),
                }
            }
            PlanNodeKind::Filter { predicates } => format!("Filter({} conjuncts)", predicates.len()),
            PlanNodeKind::Project { exprs } => format!("Project({} exprs)", exprs.len()),
            PlanNodeKind::Subquery { alias } => format!("Subquery({alias})"),
            PlanNodeKind::InnerJoin { .. } => "InnerJoin".to_string(),
            PlanNodeKind::LeftOuterJoin { .. } => "LeftOuterJoin".to_string(),
            PlanNodeKind::RightOuterJoin { .. } => "RightOuterJoin".to_string(),
            PlanNodeKind::FullOuterJoin { .. } => "FullOuterJoin".to_string(),
            PlanNodeKind::CrossJoin => "CrossJoin".to_string(),
            PlanNodeKind::SemiJoin { .. } => "SemiJoin".to_string(),
            PlanNodeKind::AntiJoin { .. } => "AntiJoin".to_string(),
            PlanNodeKind::NonEquiJoin { .. } => "NonEquiJoin".to_string(),
            PlanNodeKind::Union => "Union".to_string(),
            PlanNodeKind::AggregateAndGroup { group_exprs, aggregates } => {
                format!("AggregateAndGroup(group={}, aggs={})", group_exprs.len(), aggregates.len())
            }
            PlanNodeKind::Distinct { columns } => format!("Distinct({} cols)", columns.len()),
            PlanNodeKind::Order { keys } => format!("Order({} keys)", keys.len()),
            PlanNodeKind::Limit { limit } => format!("Limit({limit})"),
            PlanNodeKind::Offset { offset } => format!("Offset({offset})"),
            PlanNodeKind::UnnestFunction { .. } => "UnnestFunction".to_string(),
            PlanNodeKind::ShowColumns => "ShowColumns".to_string(),
            PlanNodeKind::Explain => "Explain".to_string(),
            PlanNodeKind::CommonTableExpression { name, ref_count } => format!("Cte({name}, refs={ref_count})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanNode {
    pub id: NodeId,
    pub children: Vec<NodeId>,
    pub schema: Schema,
    pub kind: PlanNodeKind,
}

/// The plan DAG: an arena of nodes plus the id of the query's output node.
/// Children are stored as `NodeId`s rather than owned nodes so a CTE's
/// subplan can be referenced by more than one parent without cloning it.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    root: Option<NodeId>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the arena and returns its id. Does not change the root;
    /// callers building bottom-up set the root explicitly once the top node
    /// is pushed (via [`Plan::set_root`]).
    pub fn push(&mut self, kind: PlanNodeKind, children: Vec<NodeId>, schema: Schema) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PlanNode { id, children, schema, kind });
        id
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn root(&self) -> NodeId {
        self.root.expect("plan root is set once the top-level node is pushed")
    }

    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut PlanNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Replaces the node at `id` in place, preserving its id so every
    /// existing parent reference stays valid — this is how optimizer rules
    /// rewrite the DAG without needing to patch every ancestor's child list.
    pub fn replace(&mut self, id: NodeId, mut replacement: PlanNode) {
        replacement.id = id;
        self.nodes[id.0 as usize] = replacement;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in a post-order (children before parents) traversal
    /// starting from the root, visiting a multiply-referenced node (a CTE)
    /// only once.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut seen = vec![false; self.nodes.len()];
        self.post_order_from(self.root(), &mut seen, &mut order);
        order
    }

    fn post_order_from(&self, id: NodeId, seen: &mut [bool], order: &mut Vec<NodeId>) {
        if seen[id.0 as usize] {
            return;
        }
        seen[id.0 as usize] = true;
        for &child in &self.node(id).children {
            self.post_order_from(child, seen, order);
        }
        order.push(id);
    }
}

#[cfg(test)]
mod tests {
    use opteryx_common::catalog::Schema;

    use super::*;

    #[test]
    fn post_order_visits_a_shared_cte_node_once() {
        let mut plan = Plan::new();
        let cte = plan.push(PlanNodeKind::CommonTableExpression { name: "c".into(), ref_count: 2 }, vec![], Schema::empty());
        let left = plan.push(PlanNodeKind::Subquery { alias: "l".into() }, vec![cte], Schema::empty());
        let right = plan.push(PlanNodeKind::Subquery { alias: "r".into() }, vec![cte], Schema::empty());
        let root = plan.push(PlanNodeKind::Union, vec![left, right], Schema::empty());
        plan.set_root(root);

        let order = plan.post_order();
        assert_eq!(order.iter().filter(|&&id| id == cte).count(), 1);
        assert_eq!(*order.last().unwrap(), root);
    }

    #[test]
    fn replace_preserves_node_id_for_existing_parents() {
        let mut plan = Plan::new();
        let scan = plan.push(PlanNodeKind::scan("t", None), vec![], Schema::empty());
        let filter = plan.push(PlanNodeKind::Filter { predicates: vec![Expr::Literal(ScalarValue::Bool(true))] }, vec![scan], Schema::empty());
        plan.set_root(filter);

        plan.replace(scan, PlanNode { id: scan, children: vec![], schema: Schema::empty(), kind: PlanNodeKind::scan("t2", None) });
        assert_eq!(plan.node(filter).children[0], scan);
        let PlanNodeKind::Scan { table, .. } = &plan.node(scan).kind else { panic!() };
        assert_eq!(table, "t2");
    }
}
