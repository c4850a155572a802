//! The consumed connector surface (spec.md §6.2, SPEC_FULL.md §6.2).
//!
//! [`Connector`]/[`ConnectorRegistry`] are re-exported from `opteryx_batch`
//! unchanged — they live one layer down so `opteryx_batch::build` can
//! depend on the trait without this crate depending on itself. This module
//! adds the one connector this crate ships: [`SampleTableConnector`],
//! seeding `$planets` and `$satellites` so spec.md §8's scenarios run
//! against real data without an external storage collaborator.

pub use opteryx_batch::connector::{Connector, ConnectorRegistry};

use std::sync::Arc;

use async_trait::async_trait;
use opteryx_batch::executor::{BoxedExecutor, CancellationToken, Executor};
use opteryx_common::array::{ArrayBuilderImpl, ArrayImpl, Morsel};
use opteryx_common::catalog::{Field, Schema};
use opteryx_common::error::Result;
use opteryx_common::internal_error;
use opteryx_common::types::{DataType, ScalarValue};
use opteryx_expr::Expr;
use opteryx_frontend::optimizer::ScanCapabilities;

/// Yields one fixed [`Morsel`] then exhausts. Every built-in sample table is
/// small enough that partitioning or streaming would only add machinery
/// with nothing to show for it.
struct StaticMorselExecutor {
    schema: Schema,
    morsel: Option<Morsel>,
    cancel: CancellationToken,
}

#[async_trait]
impl Executor for StaticMorselExecutor {
    async fn next(&mut self) -> Result<Option<Morsel>> {
        self.cancel.check()?;
        Ok(self.morsel.take())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn name(&self) -> &'static str {
        "SampleTable"
    }
}

/// An in-memory table literal. Reports [`ScanCapabilities::default`] (no
/// pushdown support) so the engine always re-applies projection,
/// predicates, and limit above the scan — the same position any connector
/// with no pushdown support would put it in.
pub struct SampleTableConnector {
    schema: Schema,
    rows: Vec<Vec<ScalarValue>>,
}

impl SampleTableConnector {
    fn from_rows(fields: Vec<Field>, rows: Vec<Vec<ScalarValue>>) -> Self {
        Self { schema: Schema::new(fields), rows }
    }

    fn morsel(&self) -> Morsel {
        let mut columns = Vec::with_capacity(self.schema.len());
        for (col, field) in self.schema.fields.iter().enumerate() {
            let mut builder = ArrayBuilderImpl::with_capacity(&field.data_type, self.rows.len());
            for row in &self.rows {
                builder.append_scalar(&row[col]);
            }
            columns.push(builder.finish());
        }
        Morsel::try_new(self.schema.clone(), columns).expect("sample table columns match its own schema")
    }

    /// `$planets`: 9 rows. `numberOfMoons` is 0 for Mercury and Venus only,
    /// matching spec.md §8 S1's expected `Mercury, Venus` result and S5's
    /// "no satellites" premise for the same two planets.
    pub fn planets() -> Self {
        let fields = vec![
            Field::not_null("id", DataType::Int32),
            Field::not_null("name", DataType::String),
            Field::not_null("numberOfMoons", DataType::Int32),
        ];
        let names = [
            "Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune", "Pluto",
        ];
        let rows = names
            .iter()
            .zip(MOON_COUNTS)
            .enumerate()
            .map(|(i, (name, moons))| {
                vec![
                    ScalarValue::Int32((i + 1) as i32),
                    ScalarValue::String((*name).to_string()),
                    ScalarValue::Int32(moons),
                ]
            })
            .collect();
        Self::from_rows(fields, rows)
    }

    /// `$satellites`: one row per moon counted in [`MOON_COUNTS`], 177 rows
    /// total (spec.md §8 S2), `planetId` foreign-keying into `$planets.id`.
    /// Only planet ids 3 through 9 (Earth through Pluto) have any rows,
    /// matching S3's expected distinct `planetId` list.
    pub fn satellites() -> Self {
        let fields = vec![
            Field::not_null("id", DataType::Int32),
            Field::not_null("planetId", DataType::Int32),
            Field::not_null("name", DataType::String),
        ];
        let mut rows = Vec::with_capacity(177);
        let mut satellite_id = 1i32;
        for (planet_idx, &count) in MOON_COUNTS.iter().enumerate() {
            for moon_idx in 0..count {
                rows.push(vec![
                    ScalarValue::Int32(satellite_id),
                    ScalarValue::Int32((planet_idx + 1) as i32),
                    ScalarValue::String(format!("{}-{}", planet_idx + 1, moon_idx + 1)),
                ]);
                satellite_id += 1;
            }
        }
        Self::from_rows(fields, rows)
    }
}

/// Moon counts for Mercury through Pluto, in `$planets.id` order. Sums to
/// 177, spec.md §8 S2's expected `$satellites` row count.
const MOON_COUNTS: [i32; 9] = [0, 0, 1, 2, 67, 62, 27, 14, 4];

#[async_trait]
impl Connector for SampleTableConnector {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Both projection and predicate pushdown: [`read`](Self::read) applies
    /// `projected_columns` and `predicates` itself rather than handing back
    /// every row, so the optimizer's `ProjectionPushdown`/`OperatorFusion`
    /// strategies are safe to fuse into this connector's `Scan` node without
    /// the engine needing a re-check above it.
    fn capabilities(&self) -> ScanCapabilities {
        ScanCapabilities { supports_projection_pushdown: true, supports_predicate_pushdown: true, ..Default::default() }
    }

    async fn read(
        &self,
        _partition: usize,
        projected_columns: Option<&[usize]>,
        predicates: &[Expr],
        _limit_hint: Option<u64>,
    ) -> Result<BoxedExecutor> {
        let mut full = self.morsel();
        for predicate in predicates {
            let ArrayImpl::Bool(mask) = predicate.eval(&full)? else {
                return Err(internal_error!("pushed predicate `{predicate:?}` must evaluate to Bool"));
            };
            let mask: Vec<bool> = (0..mask.len()).map(|i| mask.get(i).unwrap_or(false)).collect();
            full = full.filter(&mask);
        }
        let (schema, morsel) = match projected_columns {
            Some(cols) => {
                let projected_schema = self.schema.project(cols);
                let projected = full.project(cols, projected_schema.clone())?;
                (projected_schema, projected)
            }
            None => (self.schema.clone(), full),
        };
        Ok(Box::new(StaticMorselExecutor { schema, morsel: Some(morsel), cancel: CancellationToken::new() }))
    }
}

/// Builds the [`ConnectorRegistry`] `opteryx::execute` uses by default:
/// `$planets` and `$satellites` backed by [`SampleTableConnector`]
/// (SPEC_FULL.md §6.2).
pub fn sample_table_registry() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    registry.insert("$planets".to_string(), Arc::new(SampleTableConnector::planets()) as Arc<dyn Connector>);
    registry.insert("$satellites".to_string(), Arc::new(SampleTableConnector::satellites()) as Arc<dyn Connector>);
    registry
}
