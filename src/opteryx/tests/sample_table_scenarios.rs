//! End-to-end scenarios over the built-in `$planets`/`$satellites` sample
//! tables (spec.md §8), run as one `BoundQuery` -> [`plan_query`] ->
//! [`execute_default`] pipeline per scenario. There is no SQL
//! lexer/parser in scope (spec.md §1 treats one as an external
//! collaborator), so every query below is the already-bound tree a real
//! binder would hand the planner, built by hand in the same style as
//! `opteryx_frontend::planner`'s own unit tests.

use opteryx::{execute_default, plan_query, PlanNodeKind};
use opteryx_common::array::ArrayImpl;
use opteryx_common::types::ScalarValue;
use opteryx_expr::agg::AggregateFunction;
use opteryx_expr::{BinaryOp, Expr};
use opteryx_frontend::ast::{BoundFrom, BoundOrderKey, BoundQuery, JoinKind, TableHints};
use opteryx_frontend::Plan;

fn planets_scan() -> BoundFrom {
    BoundFrom::Scan {
        scan_id: 0,
        table: "$planets".into(),
        schema: opteryx::connector::SampleTableConnector::planets().schema().clone(),
        time_range: None,
        hints: TableHints::default(),
    }
}

fn satellites_scan() -> BoundFrom {
    BoundFrom::Scan {
        scan_id: 1,
        table: "$satellites".into(),
        schema: opteryx::connector::SampleTableConnector::satellites().schema().clone(),
        time_range: None,
        hints: TableHints::default(),
    }
}

/// Collects every row of a single `Int32` column across all morsels.
async fn collect_int32(plan: &Plan, col: usize) -> Vec<Option<i32>> {
    let registry = opteryx::connector::sample_table_registry();
    let morsels = execute_default(plan, &registry).await.unwrap().collect().await.unwrap();
    let mut out = Vec::new();
    for m in &morsels {
        let ArrayImpl::Int32(a) = m.column(col) else { panic!("expected Int32 column") };
        for i in 0..a.len() {
            out.push(a.get(i));
        }
    }
    out
}

async fn collect_utf8(plan: &Plan, col: usize) -> Vec<Option<String>> {
    let registry = opteryx::connector::sample_table_registry();
    let morsels = execute_default(plan, &registry).await.unwrap().collect().await.unwrap();
    let mut out = Vec::new();
    for m in &morsels {
        let ArrayImpl::Utf8(a) = m.column(col) else { panic!("expected Utf8 column") };
        for i in 0..a.len() {
            out.push(a.get(i).map(str::to_string));
        }
    }
    out
}

fn row_count(morsels: &[opteryx_common::array::Morsel]) -> usize {
    morsels.iter().map(|m| m.row_count()).sum()
}

// S1: SELECT name FROM $planets WHERE numberOfMoons = 0 ORDER BY name
#[tokio::test]
async fn s1_moonless_planets_ordered_by_name() {
    let query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![Expr::Column(1)],
        output_schema: opteryx_common::catalog::Schema::new(vec![opteryx_common::catalog::Field::not_null(
            "name",
            opteryx_common::types::DataType::String,
        )]),
        from: Some(Box::new(planets_scan())),
        filter: Some(Expr::Binary {
            op: BinaryOp::Eq,
            left: Box::new(Expr::Column(2)),
            right: Box::new(Expr::Literal(ScalarValue::Int32(0))),
        }),
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: false,
        order_by: vec![BoundOrderKey { expr: Expr::Column(0), descending: false }],
        limit: None,
        offset: None,
    };
    let registry = opteryx::connector::sample_table_registry();
    let plan = plan_query(&query, &registry).unwrap();
    let names = collect_utf8(&plan, 0).await;
    assert_eq!(names, vec![Some("Mercury".to_string()), Some("Venus".to_string())]);
}

// S2: SELECT COUNT(*) FROM $satellites
#[tokio::test]
async fn s2_satellite_count() {
    let query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![],
        output_schema: opteryx_common::catalog::Schema::empty(),
        from: Some(Box::new(satellites_scan())),
        filter: None,
        group_by: vec![],
        aggregates: vec![(AggregateFunction::CountStar, Expr::Literal(ScalarValue::Int64(0)), "count".into(), false)],
        having: None,
        distinct: false,
        order_by: vec![],
        limit: None,
        offset: None,
    };
    let registry = opteryx::connector::sample_table_registry();
    let plan = plan_query(&query, &registry).unwrap();
    let morsels = execute_default(&plan, &registry).await.unwrap().collect().await.unwrap();
    let ArrayImpl::Int64(a) = morsels[0].column(0) else { panic!("expected Int64 count column") };
    assert_eq!(a.value(0), 177);
}

// S3: SELECT DISTINCT planetId FROM $satellites ORDER BY planetId
#[tokio::test]
async fn s3_distinct_planet_ids() {
    let query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![Expr::Column(1)],
        output_schema: opteryx_common::catalog::Schema::new(vec![opteryx_common::catalog::Field::not_null(
            "planetId",
            opteryx_common::types::DataType::Int32,
        )]),
        from: Some(Box::new(satellites_scan())),
        filter: None,
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: true,
        order_by: vec![BoundOrderKey { expr: Expr::Column(0), descending: false }],
        limit: None,
        offset: None,
    };
    let registry = opteryx::connector::sample_table_registry();
    let plan = plan_query(&query, &registry).unwrap();
    let ids = collect_int32(&plan, 0).await;
    assert_eq!(ids, (3..=9).map(Some).collect::<Vec<_>>());
}

// S4: SELECT * FROM $planets WHERE id = -1
#[tokio::test]
async fn s4_no_matching_rows_keeps_full_schema() {
    let query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![],
        output_schema: opteryx_common::catalog::Schema::empty(),
        from: Some(Box::new(planets_scan())),
        filter: Some(Expr::Binary {
            op: BinaryOp::Eq,
            left: Box::new(Expr::Column(0)),
            right: Box::new(Expr::Literal(ScalarValue::Int32(-1))),
        }),
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: false,
        order_by: vec![],
        limit: None,
        offset: None,
    };
    let registry = opteryx::connector::sample_table_registry();
    let plan = plan_query(&query, &registry).unwrap();
    assert_eq!(plan.node(plan.root()).schema.len(), 3);
    let morsels = execute_default(&plan, &registry).await.unwrap().collect().await.unwrap();
    assert_eq!(row_count(&morsels), 0);
}

// S5: SELECT p.name, s.name FROM $planets p LEFT JOIN $satellites s
//     ON p.id = s.planetId WHERE p.id IN (1, 2)
#[tokio::test]
async fn s5_left_join_preserves_unmatched_planets() {
    let join = BoundFrom::Join {
        kind: JoinKind::Left,
        left: Box::new(planets_scan()),
        right: Box::new(satellites_scan()),
        on: Some(Expr::Binary { op: BinaryOp::Eq, left: Box::new(Expr::Column(0)), right: Box::new(Expr::Column(4)) }),
    };
    let query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![Expr::Column(1), Expr::Column(5)],
        output_schema: opteryx_common::catalog::Schema::new(vec![
            opteryx_common::catalog::Field::not_null("name", opteryx_common::types::DataType::String),
            opteryx_common::catalog::Field::nullable("name", opteryx_common::types::DataType::String),
        ]),
        from: Some(Box::new(join)),
        filter: Some(Expr::Any {
            op: BinaryOp::Eq,
            left: Box::new(Expr::Column(0)),
            list: Box::new(Expr::Literal(ScalarValue::Array(vec![ScalarValue::Int32(1), ScalarValue::Int32(2)]))),
        }),
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: false,
        order_by: vec![],
        limit: None,
        offset: None,
    };
    let registry = opteryx::connector::sample_table_registry();
    let plan = plan_query(&query, &registry).unwrap();
    let morsels = execute_default(&plan, &registry).await.unwrap().collect().await.unwrap();
    assert_eq!(row_count(&morsels), 2);
    for m in &morsels {
        let ArrayImpl::Utf8(satellite_names) = m.column(1) else { panic!("expected Utf8 column") };
        for i in 0..satellite_names.len() {
            assert!(!satellite_names.is_valid(i), "Mercury/Venus have no satellites to join against");
        }
    }
}

// S6: SELECT CAST('42' AS INTEGER) + 1; SELECT TRY_CAST('abc' AS INTEGER)
#[tokio::test]
async fn s6_cast_and_try_cast() {
    let cast_query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Cast {
                expr: Box::new(Expr::Literal(ScalarValue::String("42".into()))),
                target: opteryx_common::types::DataType::Int32,
            }),
            right: Box::new(Expr::Literal(ScalarValue::Int32(1))),
        }],
        output_schema: opteryx_common::catalog::Schema::new(vec![opteryx_common::catalog::Field::not_null(
            "col",
            opteryx_common::types::DataType::Int32,
        )]),
        from: None,
        filter: None,
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: false,
        order_by: vec![],
        limit: None,
        offset: None,
    };
    let registry = opteryx::connector::sample_table_registry();
    let plan = plan_query(&cast_query, &registry).unwrap();
    assert_eq!(collect_int32(&plan, 0).await, vec![Some(43)]);

    let try_cast_query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![Expr::TryCast {
            expr: Box::new(Expr::Literal(ScalarValue::String("abc".into()))),
            target: opteryx_common::types::DataType::Int32,
        }],
        output_schema: opteryx_common::catalog::Schema::new(vec![opteryx_common::catalog::Field::nullable(
            "col",
            opteryx_common::types::DataType::Int32,
        )]),
        from: None,
        filter: None,
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: false,
        order_by: vec![],
        limit: None,
        offset: None,
    };
    let plan = plan_query(&try_cast_query, &registry).unwrap();
    assert_eq!(collect_int32(&plan, 0).await, vec![None]);
}

// S7: SELECT NULL AND FALSE, NULL OR TRUE, NULL AND TRUE
#[tokio::test]
async fn s7_three_valued_logic() {
    let null_bool = Expr::Literal(ScalarValue::Null(opteryx_common::types::DataType::Bool));
    let query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![
            Expr::Binary { op: BinaryOp::And, left: Box::new(null_bool.clone()), right: Box::new(Expr::Literal(ScalarValue::Bool(false))) },
            Expr::Binary { op: BinaryOp::Or, left: Box::new(null_bool.clone()), right: Box::new(Expr::Literal(ScalarValue::Bool(true))) },
            Expr::Binary { op: BinaryOp::And, left: Box::new(null_bool), right: Box::new(Expr::Literal(ScalarValue::Bool(true))) },
        ],
        output_schema: opteryx_common::catalog::Schema::new(vec![
            opteryx_common::catalog::Field::nullable("a", opteryx_common::types::DataType::Bool),
            opteryx_common::catalog::Field::nullable("b", opteryx_common::types::DataType::Bool),
            opteryx_common::catalog::Field::nullable("c", opteryx_common::types::DataType::Bool),
        ]),
        from: None,
        filter: None,
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: false,
        order_by: vec![],
        limit: None,
        offset: None,
    };
    let registry = opteryx::connector::sample_table_registry();
    let plan = plan_query(&query, &registry).unwrap();
    let morsels = execute_default(&plan, &registry).await.unwrap().collect().await.unwrap();
    let m = &morsels[0];
    let ArrayImpl::Bool(a) = m.column(0) else { panic!() };
    let ArrayImpl::Bool(b) = m.column(1) else { panic!() };
    let ArrayImpl::Bool(c) = m.column(2) else { panic!() };
    assert_eq!(a.get(0), Some(false));
    assert_eq!(b.get(0), Some(true));
    assert_eq!(c.get(0), None);
}

// S8: WHERE x > 5 AND x > 10 compacts to the single predicate `x > 10`,
// fused into the scan as a `pushed_predicates` hint (OperatorFusion keeps
// the Filter above it too, spec.md §6.2's "the engine re-applies non-accepted
// [predicates]"), and the optimized plan's row set matches the unoptimized
// one.
#[tokio::test]
async fn s8_redundant_range_predicates_compact_to_the_tighter_bound() {
    let query = BoundQuery::Select {
        ctes: vec![],
        projection: vec![],
        output_schema: opteryx_common::catalog::Schema::empty(),
        from: Some(Box::new(planets_scan())),
        filter: Some(Expr::Binary {
            op: BinaryOp::And,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Gt,
                left: Box::new(Expr::Column(0)),
                right: Box::new(Expr::Literal(ScalarValue::Int32(5))),
            }),
            right: Box::new(Expr::Binary {
                op: BinaryOp::Gt,
                left: Box::new(Expr::Column(0)),
                right: Box::new(Expr::Literal(ScalarValue::Int32(10))),
            }),
        }),
        group_by: vec![],
        aggregates: vec![],
        having: None,
        distinct: false,
        order_by: vec![],
        limit: None,
        offset: None,
    };

    let registry = opteryx::connector::sample_table_registry();
    let optimized = plan_query(&query, &registry).unwrap();

    let root = optimized.node(optimized.root());
    let PlanNodeKind::Filter { predicates } = &root.kind else {
        panic!("expected range compaction to leave a single Filter at the root, got {:?}", root.kind)
    };
    assert_eq!(predicates.len(), 1, "x > 5 AND x > 10 should compact to one predicate");

    let &[scan_id] = root.children.as_slice() else { panic!("expected the Filter to sit directly on the Scan") };
    let PlanNodeKind::Scan { pushed_predicates, .. } = &optimized.node(scan_id).kind else {
        panic!("expected the Filter's predicate to also fuse into the Scan's pushed_predicates")
    };
    assert_eq!(pushed_predicates.len(), 1);
    let Expr::Binary { op: BinaryOp::Gt, right, .. } = &pushed_predicates[0] else {
        panic!("expected a single Gt predicate, got {:?}", pushed_predicates[0])
    };
    let Expr::Literal(ScalarValue::Int32(10)) = right.as_ref() else {
        panic!("expected the tighter bound's literal to keep its original Int32 type, got {:?}", right)
    };

    let optimized_morsels = execute_default(&optimized, &registry).await.unwrap().collect().await.unwrap();

    let unoptimized = opteryx_frontend::planner::build_plan(&query).unwrap();
    let unoptimized_morsels = execute_default(&unoptimized, &registry).await.unwrap().collect().await.unwrap();

    assert_eq!(row_count(&optimized_morsels), row_count(&unoptimized_morsels));
    assert_eq!(row_count(&optimized_morsels), 0); // $planets.id only goes up to 9
}
