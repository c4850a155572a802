//! `EXPLAIN` / `SHOW COLUMNS` rendering (spec.md §4.9, §6.1).
//!
//! Plain string formatting rather than a pretty-printing crate: one
//! indented-tree call site doesn't earn pulling in something like the
//! teacher's `pretty-xmlish` dependency.

use std::fmt::Write as _;

use opteryx_common::catalog::Schema;
use opteryx_common::stats::QueryStats;

use crate::plan::{NodeId, Plan};

/// Renders `plan` as an indented operator tree, one line per node in
/// post-order-reversed (i.e. root-first) form. When `stats` is given, each
/// line is annotated with the node's actual row count if one was recorded.
pub fn explain(plan: &Plan, stats: Option<&QueryStats>) -> String {
    let mut out = String::new();
    render_node(plan, plan.root(), 0, stats, &mut out);
    out
}

fn render_node(plan: &Plan, id: NodeId, depth: usize, stats: Option<&QueryStats>, out: &mut String) {
    let node = plan.node(id);
    let indent = "  ".repeat(depth);
    let rows = stats
        .and_then(|s| s.operators.get(&id.0))
        .map(|op| format!(" (rows={})", op.rows_produced));
    let _ = writeln!(out, "{indent}{}{}", node.kind.label(), rows.unwrap_or_default());
    for &child in &node.children {
        render_node(plan, child, depth + 1, stats, out);
    }
}

/// Renders a `ShowColumns` node's target schema as a `name: TYPE
/// [NOT NULL]` list, executed directly against the [`Schema`] without
/// touching the optimizer (spec.md §4.9).
pub fn explain_columns(schema: &Schema) -> String {
    let mut out = String::new();
    for field in &schema.fields {
        let nullability = if field.nullable { "" } else { " NOT NULL" };
        let _ = writeln!(out, "{}: {}{}", field.name, field.data_type, nullability);
    }
    out
}

#[cfg(test)]
mod tests {
    use opteryx_common::catalog::Schema;
    use opteryx_common::types::ScalarValue;
    use opteryx_expr::Expr;

    use super::*;
    use crate::plan::PlanNodeKind;

    #[test]
    fn explain_renders_a_filter_over_scan_indented() {
        let mut plan = Plan::new();
        let scan = plan.push(PlanNodeKind::scan("planets", None), vec![], Schema::empty());
        let filter = plan.push(
            PlanNodeKind::Filter { predicates: vec![Expr::Literal(ScalarValue::Bool(true))] },
            vec![scan],
            Schema::empty(),
        );
        plan.set_root(filter);

        let rendered = explain(&plan, None);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Filter(1 conjuncts)");
        assert_eq!(lines[1], "  Scan(planets)");
    }

    #[test]
    fn explain_annotates_row_counts_when_stats_are_attached() {
        let mut plan = Plan::new();
        let scan = plan.push(PlanNodeKind::scan("planets", None), vec![], Schema::empty());
        plan.set_root(scan);

        let mut stats = QueryStats::new();
        stats.record_morsel(scan.0, 9, 512, std::time::Duration::ZERO);

        let rendered = explain(&plan, Some(&stats));
        assert!(rendered.contains("rows=9"));
    }

    #[test]
    fn explain_columns_marks_non_nullable_fields() {
        use opteryx_common::catalog::Field;
        use opteryx_common::types::DataType;
        let schema = Schema::new(vec![Field::not_null("id", DataType::Int64), Field::nullable("name", DataType::String)]);
        let rendered = explain_columns(&schema);
        assert!(rendered.contains("id: INT64 NOT NULL"));
        assert!(rendered.contains("name: STRING\n") && !rendered.contains("name: STRING NOT NULL"));
    }
}
