//! `build_plan`: lowers a bound AST into a [`Plan`] arena (spec.md §4.1).
//!
//! Mirrors the teacher's own `PlanRoot::gen_optimized_logical_plan_for_*`
//! entry points in shape (one function per statement kind, a `HashMap` of
//! already-built CTE subplans threaded through the `FROM` lowering) without
//! the teacher's separate `Binder` pass — this crate accepts an
//! already-bound [`BoundQuery`] as its input.

use std::collections::HashMap;

use opteryx_common::catalog::Schema;
use opteryx_common::error::{ErrorCode, OpteryxError, Result};
use opteryx_common::types::DataType;
use opteryx_expr::Expr;

use crate::ast::{BoundCte, BoundFrom, BoundQuery, JoinKind};
use crate::optimizer::rules::{col_index, conjoin, equality_key_pair, flatten_and, is_plain_column};
use crate::plan::{AggregateCall, NodeId, Plan, PlanNodeKind};

/// Lowers `ast` into a fresh [`Plan`] with its root set.
pub fn build_plan(ast: &BoundQuery) -> Result<Plan> {
    let mut plan = Plan::new();
    let mut ctes = HashMap::new();
    let root = lower_query(&mut plan, ast, &mut ctes)?;
    plan.set_root(root);
    Ok(plan)
}

fn lower_query(plan: &mut Plan, ast: &BoundQuery, ctes: &mut HashMap<String, (NodeId, Schema)>) -> Result<NodeId> {
    match ast {
        BoundQuery::Explain(inner) => {
            let inner_root = lower_query(plan, inner, ctes)?;
            let schema = plan.node(inner_root).schema.clone();
            Ok(plan.push(PlanNodeKind::Explain, vec![inner_root], schema))
        }
        BoundQuery::ShowColumns { schema, .. } => Ok(plan.push(PlanNodeKind::ShowColumns, vec![], schema.clone())),
        BoundQuery::Select {
            ctes: local_ctes,
            projection,
            output_schema,
            from,
            filter,
            group_by,
            aggregates,
            having,
            distinct,
            order_by,
            limit,
            offset,
        } => {
            for cte in local_ctes {
                lower_cte(plan, cte, from.as_deref(), ctes)?;
            }

            let (mut node, mut schema) = match from {
                Some(from) => lower_from(plan, from, ctes)?,
                None => (plan.push(PlanNodeKind::Project { exprs: projection.clone() }, vec![], output_schema.clone()), output_schema.clone()),
            };

            if let Some(predicate) = filter {
                let mut predicates = Vec::new();
                flatten_and(predicate, &mut predicates);
                node = plan.push(PlanNodeKind::Filter { predicates }, vec![node], schema.clone());
            }

            if !group_by.is_empty() || !aggregates.is_empty() {
                let calls: Vec<AggregateCall> = aggregates
                    .iter()
                    .map(|(func, arg, alias, distinct)| AggregateCall {
                        func: *func,
                        arg: arg.clone(),
                        alias: alias.clone(),
                        distinct: *distinct,
                    })
                    .collect();
                let agg_schema = aggregate_schema(group_by, &calls, &schema)?;
                node = plan.push(
                    PlanNodeKind::AggregateAndGroup { group_exprs: group_by.clone(), aggregates: calls },
                    vec![node],
                    agg_schema.clone(),
                );
                schema = agg_schema;

                if let Some(having) = having {
                    let mut predicates = Vec::new();
                    flatten_and(having, &mut predicates);
                    node = plan.push(PlanNodeKind::Filter { predicates }, vec![node], schema.clone());
                }
            }

            if !projection.is_empty() && from.is_some() {
                node = plan.push(PlanNodeKind::Project { exprs: projection.clone() }, vec![node], output_schema.clone());
                schema = output_schema.clone();
            }

            if *distinct {
                let columns: Vec<usize> = (0..schema.len()).collect();
                node = plan.push(PlanNodeKind::Distinct { columns }, vec![node], schema.clone());
            }

            if !order_by.is_empty() {
                let keys: Vec<(usize, bool)> = order_by
                    .iter()
                    .map(|k| match &k.expr {
                        Expr::Column(i) => Ok((*i, k.descending)),
                        _ => Err(OpteryxError::from(ErrorCode::UnsupportedSyntax(
                            "ORDER BY key must resolve to a projected column".into(),
                        ))),
                    })
                    .collect::<Result<_>>()?;
                node = plan.push(PlanNodeKind::Order { keys }, vec![node], schema.clone());
            }

            if let Some(limit) = limit {
                node = plan.push(PlanNodeKind::Limit { limit: *limit }, vec![node], schema.clone());
            }
            if let Some(offset) = offset {
                node = plan.push(PlanNodeKind::Offset { offset: *offset }, vec![node], schema.clone());
            }

            Ok(node)
        }
    }
}

/// Builds one `WITH name AS (...)` binding's subplan and registers it under
/// a `CommonTableExpression` wrapper so every `CteRef` to the same name
/// shares this one [`NodeId`] instead of cloning the subplan.
fn lower_cte(
    plan: &mut Plan,
    cte: &BoundCte,
    usage_scope: Option<&BoundFrom>,
    ctes: &mut HashMap<String, (NodeId, Schema)>,
) -> Result<()> {
    let subplan_root = lower_query(plan, &cte.query, ctes)?;
    let schema = plan.node(subplan_root).schema.clone();
    let ref_count = usage_scope.map(|f| count_cte_refs(f, &cte.name)).unwrap_or(0);
    let wrapper = plan.push(
        PlanNodeKind::CommonTableExpression { name: cte.name.clone(), ref_count },
        vec![subplan_root],
        schema.clone(),
    );
    ctes.insert(cte.name.clone(), (wrapper, schema));
    Ok(())
}

fn count_cte_refs(from: &BoundFrom, name: &str) -> u32 {
    match from {
        BoundFrom::CteRef { name: n } if n == name => 1,
        BoundFrom::Join { left, right, .. } => count_cte_refs(left, name) + count_cte_refs(right, name),
        BoundFrom::Subquery { .. } | BoundFrom::Scan { .. } | BoundFrom::CteRef { .. } => 0,
        BoundFrom::Unnest { input, .. } => count_cte_refs(input, name),
    }
}

fn lower_from(
    plan: &mut Plan,
    from: &BoundFrom,
    ctes: &mut HashMap<String, (NodeId, Schema)>,
) -> Result<(NodeId, Schema)> {
    match from {
        BoundFrom::Scan { table, schema, time_range, .. } => {
            let node = plan.push(PlanNodeKind::scan(table.clone(), time_range.clone()), vec![], schema.clone());
            Ok((node, schema.clone()))
        }
        BoundFrom::Join { kind, left, right, on } => lower_join(plan, *kind, left, right, on.as_ref(), ctes),
        BoundFrom::Subquery { query, alias } => {
            let inner_root = lower_query(plan, query, ctes)?;
            let schema = plan.node(inner_root).schema.clone();
            let node = plan.push(PlanNodeKind::Subquery { alias: alias.clone() }, vec![inner_root], schema.clone());
            Ok((node, schema))
        }
        BoundFrom::Unnest { input, column, in_list } => {
            let (input_node, input_schema) = lower_from(plan, input, ctes)?;
            let Expr::Column(index) = column else {
                return Err(ErrorCode::UnsupportedSyntax("UNNEST target must be a bound column reference".into()).into());
            };
            let mut fields = input_schema.fields.clone();
            if let DataType::Array(inner) = &fields[*index].data_type {
                fields[*index].data_type = inner.as_ref().clone();
            }
            let schema = Schema::new(fields);
            let node = plan.push(
                PlanNodeKind::UnnestFunction { column: *index, in_list: in_list.clone() },
                vec![input_node],
                schema.clone(),
            );
            Ok((node, schema))
        }
        BoundFrom::CteRef { name } => ctes
            .get(name)
            .cloned()
            .ok_or_else(|| ErrorCode::UnresolvedIdentifier(format!("WITH binding `{name}` not found")).into()),
    }
}

fn lower_join(
    plan: &mut Plan,
    kind: JoinKind,
    left: &BoundFrom,
    right: &BoundFrom,
    on: Option<&Expr>,
    ctes: &mut HashMap<String, (NodeId, Schema)>,
) -> Result<(NodeId, Schema)> {
    let (left_node, left_schema) = lower_from(plan, left, ctes)?;
    let (right_node, right_schema) = lower_from(plan, right, ctes)?;
    let left_width = left_schema.len();
    let schema = left_schema.clone().concat(right_schema.clone());

    if kind == JoinKind::Cross {
        let node = plan.push(PlanNodeKind::CrossJoin, vec![left_node, right_node], schema.clone());
        return Ok((node, schema));
    }

    let on = on.ok_or_else(|| {
        OpteryxError::from(ErrorCode::UnsupportedSyntax(format!("{kind:?} JOIN requires an ON clause")))
    })?;
    let mut conjuncts = Vec::new();
    flatten_and(on, &mut conjuncts);

    let mut left_keys = Vec::new();
    let mut right_keys = Vec::new();
    let mut residual_preds = Vec::new();
    for c in &conjuncts {
        match equality_key_pair(c, left_width) {
            Some((l, r)) => {
                left_keys.push(l);
                right_keys.push(r);
            }
            None => residual_preds.push(c.clone()),
        }
    }
    let residual = conjoin(residual_preds.clone());

    let node_kind = match kind {
        JoinKind::Inner if left_keys.is_empty() => PlanNodeKind::NonEquiJoin { predicate: on.clone() },
        JoinKind::Inner => PlanNodeKind::InnerJoin { left_keys, right_keys, residual },
        JoinKind::Left if !left_keys.is_empty() => PlanNodeKind::LeftOuterJoin { left_keys, right_keys, residual },
        JoinKind::Right if !left_keys.is_empty() => PlanNodeKind::RightOuterJoin { left_keys, right_keys, residual },
        JoinKind::Full if !left_keys.is_empty() => PlanNodeKind::FullOuterJoin { left_keys, right_keys, residual },
        JoinKind::Semi if !left_keys.is_empty() && residual_preds.is_empty() => {
            PlanNodeKind::SemiJoin { left_keys, right_keys }
        }
        JoinKind::Anti if !left_keys.is_empty() && residual_preds.is_empty() => {
            PlanNodeKind::AntiJoin { left_keys, right_keys }
        }
        other => {
            return Err(ErrorCode::UnsupportedSyntax(format!(
                "{other:?} JOIN requires a purely equi-join ON clause in this planner"
            ))
            .into())
        }
    };

    // Semi/Anti joins project only the left side's columns.
    let output_schema = match &node_kind {
        PlanNodeKind::SemiJoin { .. } | PlanNodeKind::AntiJoin { .. } => left_schema,
        _ => schema,
    };
    let node = plan.push(node_kind, vec![left_node, right_node], output_schema.clone());
    Ok((node, output_schema))
}

/// The output schema of an `AggregateAndGroup` node: the grouping columns'
/// types (in `group_exprs` order) followed by each aggregate call's return
/// type (spec.md §4.6).
fn aggregate_schema(group_exprs: &[Expr], calls: &[AggregateCall], input_schema: &Schema) -> Result<Schema> {
    use opteryx_common::catalog::Field;
    let mut fields = Vec::with_capacity(group_exprs.len() + calls.len());
    for (i, g) in group_exprs.iter().enumerate() {
        let data_type = g.return_type(input_schema)?;
        let name = if is_plain_column(g) { input_schema[col_index(g)].name.clone() } else { format!("group_{i}") };
        fields.push(Field::nullable(name, data_type));
    }
    for call in calls {
        let arg_type = call.arg.return_type(input_schema).unwrap_or(DataType::Int64);
        let data_type = call.func.return_type(&arg_type);
        fields.push(Field::nullable(call.alias.clone(), data_type));
    }
    Ok(Schema::new(fields))
}

#[cfg(test)]
mod tests {
    use opteryx_common::catalog::Field;
    use opteryx_common::types::ScalarValue;
    use opteryx_expr::agg::AggregateFunction;
    use opteryx_expr::BinaryOp;

    use super::*;
    use crate::ast::{BoundOrderKey, TableHints};

    fn planets_scan() -> BoundFrom {
        BoundFrom::Scan {
            scan_id: 0,
            table: "planets".into(),
            schema: Schema::new(vec![
                Field::not_null("id", DataType::Int64),
                Field::not_null("name", DataType::String),
            ]),
            time_range: None,
            hints: TableHints::default(),
        }
    }

    #[test]
    fn select_star_with_filter_lowers_to_filter_over_scan() {
        let query = BoundQuery::Select {
            ctes: vec![],
            projection: vec![],
            output_schema: Schema::empty(),
            from: Some(Box::new(planets_scan())),
            filter: Some(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::Column(0)),
                right: Box::new(Expr::Literal(ScalarValue::Int64(1))),
            }),
            group_by: vec![],
            aggregates: vec![],
            having: None,
            distinct: false,
            order_by: vec![],
            limit: None,
            offset: None,
        };
        let plan = build_plan(&query).unwrap();
        assert!(matches!(plan.node(plan.root()).kind, PlanNodeKind::Filter { .. }));
        let &[scan] = plan.node(plan.root()).children.as_slice() else { panic!() };
        assert!(matches!(plan.node(scan).kind, PlanNodeKind::Scan { .. }));
    }

    #[test]
    fn order_by_limit_stack_above_the_scan() {
        let query = BoundQuery::Select {
            ctes: vec![],
            projection: vec![],
            output_schema: Schema::empty(),
            from: Some(Box::new(planets_scan())),
            filter: None,
            group_by: vec![],
            aggregates: vec![],
            having: None,
            distinct: false,
            order_by: vec![BoundOrderKey { expr: Expr::Column(0), descending: true }],
            limit: Some(10),
            offset: None,
        };
        let plan = build_plan(&query).unwrap();
        assert!(matches!(plan.node(plan.root()).kind, PlanNodeKind::Limit { limit: 10 }));
    }

    #[test]
    fn inner_join_with_equi_on_decomposes_into_keys() {
        let mut satellites_fields = vec![Field::not_null("planet_id", DataType::Int64)];
        satellites_fields.push(Field::not_null("name", DataType::String));
        let satellites = BoundFrom::Scan {
            scan_id: 1,
            table: "satellites".into(),
            schema: Schema::new(satellites_fields),
            time_range: None,
            hints: TableHints::default(),
        };
        let join = BoundFrom::Join {
            kind: JoinKind::Inner,
            left: Box::new(planets_scan()),
            right: Box::new(satellites),
            on: Some(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::Column(0)),
                right: Box::new(Expr::Column(2)),
            }),
        };
        let query = BoundQuery::Select {
            ctes: vec![],
            projection: vec![],
            output_schema: Schema::empty(),
            from: Some(Box::new(join)),
            filter: None,
            group_by: vec![],
            aggregates: vec![],
            having: None,
            distinct: false,
            order_by: vec![],
            limit: None,
            offset: None,
        };
        let plan = build_plan(&query).unwrap();
        let PlanNodeKind::InnerJoin { left_keys, right_keys, residual } = &plan.node(plan.root()).kind else {
            panic!("expected InnerJoin, got {:?}", plan.node(plan.root()).kind)
        };
        assert_eq!(left_keys, &vec![0]);
        assert_eq!(right_keys, &vec![0]);
        assert!(residual.is_none());
    }

    #[test]
    fn group_by_with_count_star_produces_aggregate_schema() {
        let query = BoundQuery::Select {
            ctes: vec![],
            projection: vec![],
            output_schema: Schema::empty(),
            from: Some(Box::new(planets_scan())),
            filter: None,
            group_by: vec![Expr::Column(1)],
            aggregates: vec![(AggregateFunction::CountStar, Expr::Literal(ScalarValue::Int64(0)), "n".into(), false)],
            having: None,
            distinct: false,
            order_by: vec![],
            limit: None,
            offset: None,
        };
        let plan = build_plan(&query).unwrap();
        let PlanNodeKind::AggregateAndGroup { aggregates, .. } = &plan.node(plan.root()).kind else {
            panic!("expected AggregateAndGroup")
        };
        assert_eq!(aggregates.len(), 1);
        assert_eq!(plan.node(plan.root()).schema.len(), 2);
    }
}
