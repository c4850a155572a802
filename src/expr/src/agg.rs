//! Aggregate function signatures and their running accumulators.
//!
//! One [`Accumulator`] per group, `update`d with each morsel's contributing
//! rows and `finalize`d once the group is complete — the same shape as the
//! teacher's own streaming aggregate state (see its `bool_or`/`mode`
//! accumulators under `risingwave_expr::agg`), adapted from a streaming,
//! retractable accumulator to a build-once batch one (this engine has no
//! incremental retraction, see DESIGN.md).

use opteryx_common::array::ArrayImpl;
use opteryx_common::error::{internal_error, ErrorCode, OpteryxError, Result};
use opteryx_common::types::{DataType, ScalarValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    CountStar,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    /// `ANY_VALUE`: an arbitrary, implementation-chosen member of the group.
    /// Distinct from `First` only in the name the binder resolves — both
    /// pick whichever row arrives first.
    AnyValue,
    CountDistinct,
    ApproxMedian,
    Stddev,
    Variance,
    Product,
    /// Collects every non-null value of the group into one `Array`.
    List,
    /// Collects `[min, max]` into a two-element `Array`.
    MinMax,
}

impl AggregateFunction {
    pub fn return_type(self, input_type: &DataType) -> DataType {
        match self {
            AggregateFunction::CountStar | AggregateFunction::Count | AggregateFunction::CountDistinct => {
                DataType::Int64
            }
            AggregateFunction::Avg | AggregateFunction::ApproxMedian | AggregateFunction::Stddev | AggregateFunction::Variance => {
                DataType::Float64
            }
            AggregateFunction::Sum
            | AggregateFunction::Min
            | AggregateFunction::Max
            | AggregateFunction::First
            | AggregateFunction::AnyValue
            | AggregateFunction::Product => input_type.clone(),
            AggregateFunction::List | AggregateFunction::MinMax => DataType::Array(Box::new(input_type.clone())),
        }
    }
}

/// Per-group running state. `update` is called once per contributing row;
/// `finalize` converts the accumulated state into the group's output value.
pub trait Accumulator: std::fmt::Debug {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()>;
    fn finalize(&self) -> ScalarValue;
}

pub fn new_accumulator(func: AggregateFunction, input_type: &DataType) -> Box<dyn Accumulator> {
    match func {
        AggregateFunction::CountStar => Box::new(CountAccumulator { count: 0, count_nulls: true }),
        AggregateFunction::Count => Box::new(CountAccumulator { count: 0, count_nulls: false }),
        AggregateFunction::Sum => Box::new(SumAccumulator { sum: 0.0, any: false, data_type: input_type.clone() }),
        AggregateFunction::Avg => Box::new(AvgAccumulator { sum: 0.0, count: 0 }),
        AggregateFunction::Min => Box::new(MinMaxAccumulator { value: None, want_min: true }),
        AggregateFunction::Max => Box::new(MinMaxAccumulator { value: None, want_min: false }),
        AggregateFunction::First | AggregateFunction::AnyValue => Box::new(FirstAccumulator { value: None }),
        AggregateFunction::CountDistinct => Box::new(CountDistinctAccumulator { seen: Vec::new() }),
        AggregateFunction::ApproxMedian => Box::new(ApproxMedianAccumulator { values: Vec::new() }),
        AggregateFunction::Stddev => Box::new(VarianceAccumulator::new(false)),
        AggregateFunction::Variance => Box::new(VarianceAccumulator::new(true)),
        AggregateFunction::Product => Box::new(ProductAccumulator { product: 1.0, any: false, data_type: input_type.clone() }),
        AggregateFunction::List => Box::new(ListAccumulator { values: Vec::new() }),
        AggregateFunction::MinMax => {
            Box::new(MinMaxPairAccumulator { min: None, max: None, element_type: input_type.clone() })
        }
    }
}

fn cell_as_f64(array: &ArrayImpl, row: usize) -> Option<f64> {
    if !array.is_valid(row) {
        return None;
    }
    Some(match array {
        ArrayImpl::Int8(a) => a.value(row) as f64,
        ArrayImpl::Int16(a) => a.value(row) as f64,
        ArrayImpl::Int32(a) => a.value(row) as f64,
        ArrayImpl::Int64(a) => a.value(row) as f64,
        ArrayImpl::Float32(a) => a.value(row) as f64,
        ArrayImpl::Float64(a) => a.value(row),
        _ => return None,
    })
}

/// Extracts row `row` of `array` as a boxed [`ScalarValue`] — public so the
/// batch engine's `DISTINCT`-qualified aggregate wrapper can dedup values
/// the same way [`CountDistinctAccumulator`] does internally.
pub fn cell_as_scalar(array: &ArrayImpl, row: usize) -> ScalarValue {
    if !array.is_valid(row) {
        return ScalarValue::Null(array.data_type());
    }
    match array {
        ArrayImpl::Int8(a) => ScalarValue::Int8(a.value(row)),
        ArrayImpl::Int16(a) => ScalarValue::Int16(a.value(row)),
        ArrayImpl::Int32(a) => ScalarValue::Int32(a.value(row)),
        ArrayImpl::Int64(a) => ScalarValue::Int64(a.value(row)),
        ArrayImpl::Float32(a) => ScalarValue::Float32(a.value(row)),
        ArrayImpl::Float64(a) => ScalarValue::Float64(a.value(row)),
        ArrayImpl::Bool(a) => ScalarValue::Bool(a.value(row)),
        ArrayImpl::Date32(a) => ScalarValue::Date32(a.value(row)),
        ArrayImpl::Timestamp64(a) => ScalarValue::Timestamp64(a.value(row)),
        ArrayImpl::Time32(a) => ScalarValue::Time32(a.value(row)),
        ArrayImpl::Time64(a) => ScalarValue::Time64(a.value(row)),
        ArrayImpl::Interval(a) => ScalarValue::Interval(opteryx_common::types::Interval::new(0, 0, a.value(row))),
        ArrayImpl::Utf8(a) => ScalarValue::String(a.value(row).to_string()),
        ArrayImpl::List(_) | ArrayImpl::NonNative(_) => ScalarValue::Null(array.data_type()),
    }
}

#[derive(Debug)]
struct CountAccumulator {
    count: i64,
    /// `true` for `COUNT(*)`, which counts every row including nulls.
    count_nulls: bool,
}

impl Accumulator for CountAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if self.count_nulls || array.is_valid(row) {
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        ScalarValue::Int64(self.count)
    }
}

#[derive(Debug)]
struct SumAccumulator {
    sum: f64,
    any: bool,
    data_type: DataType,
}

impl Accumulator for SumAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if let Some(v) = cell_as_f64(array, row) {
            self.sum += v;
            self.any = true;
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        if !self.any {
            return ScalarValue::Null(self.data_type.clone());
        }
        match self.data_type {
            DataType::Float32 | DataType::Float64 => ScalarValue::Float64(self.sum),
            _ => ScalarValue::Int64(self.sum as i64),
        }
    }
}

#[derive(Debug)]
struct AvgAccumulator {
    sum: f64,
    count: u64,
}

impl Accumulator for AvgAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if let Some(v) = cell_as_f64(array, row) {
            self.sum += v;
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        if self.count == 0 {
            ScalarValue::Null(DataType::Float64)
        } else {
            ScalarValue::Float64(self.sum / self.count as f64)
        }
    }
}

#[derive(Debug)]
struct MinMaxAccumulator {
    value: Option<ScalarValue>,
    want_min: bool,
}

impl Accumulator for MinMaxAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if !array.is_valid(row) {
            return Ok(());
        }
        let candidate = cell_as_scalar(array, row);
        self.value = Some(match self.value.take() {
            None => candidate,
            Some(current) => {
                let replace = match (cell_as_f64_scalar(&current), cell_as_f64_scalar(&candidate)) {
                    (Some(c), Some(n)) => {
                        if self.want_min {
                            n < c
                        } else {
                            n > c
                        }
                    }
                    _ => string_cmp(&current, &candidate, self.want_min)?,
                };
                if replace {
                    candidate
                } else {
                    current
                }
            }
        });
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        self.value.clone().unwrap_or(ScalarValue::Null(DataType::NonNative))
    }
}

fn cell_as_f64_scalar(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Int8(v) => Some(*v as f64),
        ScalarValue::Int16(v) => Some(*v as f64),
        ScalarValue::Int32(v) => Some(*v as f64),
        ScalarValue::Int64(v) => Some(*v as f64),
        ScalarValue::Float32(v) => Some(*v as f64),
        ScalarValue::Float64(v) => Some(*v),
        ScalarValue::Date32(v) => Some(*v as f64),
        ScalarValue::Timestamp64(v) => Some(*v as f64),
        ScalarValue::Time32(v) => Some(*v as f64),
        ScalarValue::Time64(v) => Some(*v as f64),
        _ => None,
    }
}

fn string_cmp(current: &ScalarValue, candidate: &ScalarValue, want_min: bool) -> Result<bool> {
    match (current, candidate) {
        (ScalarValue::String(c), ScalarValue::String(n)) => Ok(if want_min { n < c } else { n > c }),
        (ScalarValue::Bool(c), ScalarValue::Bool(n)) => Ok(if want_min { n < c } else { n > c }),
        _ => Err(internal_error!("MIN/MAX requires a comparable, consistently-typed column")),
    }
}

#[derive(Debug)]
struct FirstAccumulator {
    value: Option<ScalarValue>,
}

impl Accumulator for FirstAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if self.value.is_none() {
            self.value = Some(cell_as_scalar(array, row));
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        self.value.clone().unwrap_or(ScalarValue::Null(DataType::NonNative))
    }
}

/// Linear containment check rather than a hash set: `ScalarValue` carries
/// floats and so has no total `Eq`/`Hash` impl, and group cardinalities in
/// practice are small enough that O(n^2) is the simpler correct choice here.
#[derive(Debug)]
struct CountDistinctAccumulator {
    seen: Vec<ScalarValue>,
}

impl Accumulator for CountDistinctAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if !array.is_valid(row) {
            return Ok(());
        }
        let candidate = cell_as_scalar(array, row);
        if !self.seen.iter().any(|v| scalar_eq(v, &candidate)) {
            self.seen.push(candidate);
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        ScalarValue::Int64(self.seen.len() as i64)
    }
}

fn scalar_eq(a: &ScalarValue, b: &ScalarValue) -> bool {
    match (cell_as_f64_scalar(a), cell_as_f64_scalar(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (a, b) {
            (ScalarValue::String(x), ScalarValue::String(y)) => x == y,
            (ScalarValue::Bool(x), ScalarValue::Bool(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Full materialisation + sort, not a streaming t-digest: this engine's
/// aggregates build once over an already-batched group (see DESIGN.md), so
/// an exact median is cheaper to reason about than an approximation
/// algorithm this crate has no other use for.
#[derive(Debug)]
struct ApproxMedianAccumulator {
    values: Vec<f64>,
}

impl Accumulator for ApproxMedianAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if let Some(v) = cell_as_f64(array, row) {
            self.values.push(v);
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        if self.values.is_empty() {
            return ScalarValue::Null(DataType::Float64);
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] };
        ScalarValue::Float64(median)
    }
}

/// Welford's online algorithm for numerically stable mean/variance, shared
/// by `STDDEV` and `VARIANCE` (population variant — no Bessel's correction,
/// matching spec.md's silence on sample-vs-population distinction).
#[derive(Debug)]
struct VarianceAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    want_variance: bool,
}

impl VarianceAccumulator {
    fn new(want_variance: bool) -> Self {
        Self { count: 0, mean: 0.0, m2: 0.0, want_variance }
    }
}

impl Accumulator for VarianceAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if let Some(v) = cell_as_f64(array, row) {
            self.count += 1;
            let delta = v - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = v - self.mean;
            self.m2 += delta * delta2;
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        if self.count == 0 {
            return ScalarValue::Null(DataType::Float64);
        }
        let variance = self.m2 / self.count as f64;
        ScalarValue::Float64(if self.want_variance { variance } else { variance.sqrt() })
    }
}

#[derive(Debug)]
struct ProductAccumulator {
    product: f64,
    any: bool,
    data_type: DataType,
}

impl Accumulator for ProductAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if let Some(v) = cell_as_f64(array, row) {
            self.product *= v;
            self.any = true;
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        if !self.any {
            return ScalarValue::Null(self.data_type.clone());
        }
        match self.data_type {
            DataType::Float32 | DataType::Float64 => ScalarValue::Float64(self.product),
            _ => ScalarValue::Int64(self.product as i64),
        }
    }
}

#[derive(Debug)]
struct ListAccumulator {
    values: Vec<ScalarValue>,
}

impl Accumulator for ListAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if array.is_valid(row) {
            self.values.push(cell_as_scalar(array, row));
        }
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        ScalarValue::Array(self.values.clone())
    }
}

#[derive(Debug)]
struct MinMaxPairAccumulator {
    min: Option<ScalarValue>,
    max: Option<ScalarValue>,
    element_type: DataType,
}

impl Accumulator for MinMaxPairAccumulator {
    fn update(&mut self, array: &ArrayImpl, row: usize) -> Result<()> {
        if !array.is_valid(row) {
            return Ok(());
        }
        let candidate = cell_as_scalar(array, row);
        let candidate_f64 = cell_as_f64_scalar(&candidate);
        self.min = Some(pick_extreme(self.min.take(), candidate.clone(), candidate_f64, true));
        self.max = Some(pick_extreme(self.max.take(), candidate, candidate_f64, false));
        Ok(())
    }

    fn finalize(&self) -> ScalarValue {
        let null = ScalarValue::Null(self.element_type.clone());
        ScalarValue::Array(vec![self.min.clone().unwrap_or_else(|| null.clone()), self.max.clone().unwrap_or(null)])
    }
}

fn pick_extreme(current: Option<ScalarValue>, candidate: ScalarValue, candidate_f64: Option<f64>, want_min: bool) -> ScalarValue {
    match current {
        None => candidate,
        Some(current) => {
            let replace = match (cell_as_f64_scalar(&current), candidate_f64) {
                (Some(c), Some(n)) => {
                    if want_min {
                        n < c
                    } else {
                        n > c
                    }
                }
                _ => string_cmp(&current, &candidate, want_min).unwrap_or(false),
            };
            if replace {
                candidate
            } else {
                current
            }
        }
    }
}

/// Resolves a SQL aggregate function name (case-insensitive) to its
/// [`AggregateFunction`], erroring with `UnsupportedSyntax` on anything this
/// engine does not implement.
pub fn resolve(name: &str) -> Result<AggregateFunction> {
    Ok(match name.to_ascii_uppercase().as_str() {
        "COUNT" => AggregateFunction::Count,
        "SUM" => AggregateFunction::Sum,
        "AVG" => AggregateFunction::Avg,
        "MIN" => AggregateFunction::Min,
        "MAX" => AggregateFunction::Max,
        "FIRST" => AggregateFunction::First,
        "ANY_VALUE" => AggregateFunction::AnyValue,
        "COUNT_DISTINCT" => AggregateFunction::CountDistinct,
        "APPROX_MEDIAN" => AggregateFunction::ApproxMedian,
        "STDDEV" => AggregateFunction::Stddev,
        "VARIANCE" => AggregateFunction::Variance,
        "PRODUCT" => AggregateFunction::Product,
        "LIST" => AggregateFunction::List,
        "MIN_MAX" => AggregateFunction::MinMax,
        other => return Err(OpteryxError::from(ErrorCode::UnsupportedSyntax(format!("aggregate function {other}")))),
    })
}

#[cfg(test)]
mod tests {
    use opteryx_common::array::{Bitmap, PrimitiveArray};

    use super::*;

    #[test]
    fn sum_skips_nulls() {
        let valid = [true, false, true];
        let array = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 0, 3], Bitmap::from_bool_slice(&valid).into()));
        let mut acc = new_accumulator(AggregateFunction::Sum, &DataType::Int32);
        for row in 0..3 {
            acc.update(&array, row).unwrap();
        }
        assert_eq!(acc.finalize(), ScalarValue::Int64(4));
    }

    #[test]
    fn avg_of_all_nulls_is_null() {
        let valid = [false, false];
        let array = ArrayImpl::Int32(PrimitiveArray::new(vec![0, 0], Bitmap::from_bool_slice(&valid).into()));
        let mut acc = new_accumulator(AggregateFunction::Avg, &DataType::Int32);
        for row in 0..2 {
            acc.update(&array, row).unwrap();
        }
        assert_eq!(acc.finalize(), ScalarValue::Null(DataType::Float64));
    }

    #[test]
    fn count_star_counts_nulls_count_does_not() {
        let valid = [true, false];
        let array = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 0], Bitmap::from_bool_slice(&valid).into()));
        let mut star = new_accumulator(AggregateFunction::CountStar, &DataType::Int32);
        let mut count = new_accumulator(AggregateFunction::Count, &DataType::Int32);
        for row in 0..2 {
            star.update(&array, row).unwrap();
            count.update(&array, row).unwrap();
        }
        assert_eq!(star.finalize(), ScalarValue::Int64(2));
        assert_eq!(count.finalize(), ScalarValue::Int64(1));
    }

    #[test]
    fn min_max_track_extremes() {
        let array = ArrayImpl::Int32(PrimitiveArray::new(vec![5, 1, 9, 3], Bitmap::all_valid(4).into()));
        let mut min = new_accumulator(AggregateFunction::Min, &DataType::Int32);
        let mut max = new_accumulator(AggregateFunction::Max, &DataType::Int32);
        for row in 0..4 {
            min.update(&array, row).unwrap();
            max.update(&array, row).unwrap();
        }
        assert_eq!(min.finalize(), ScalarValue::Int32(1));
        assert_eq!(max.finalize(), ScalarValue::Int32(9));
    }
}
