//! Semantic column types and scalar literals.
//!
//! These are the *logical* types the engine reasons about, not the Rust
//! types used to store them. `DataType` names a [`crate::array::ArrayImpl`]
//! variant; `ScalarValue` is the literal form the same set of types takes
//! inside an [`crate::expr`]-level `Literal` (kept here, not in `opteryx_expr`,
//! since the planner needs literals for constant folding of predicates
//! before any expression evaluator exists).

use std::fmt;

use chrono::NaiveDate;

/// An interval of months / days / nanoseconds, matching PostgreSQL's
/// three-field interval representation (months and days are kept apart from
/// nanoseconds because a month has no fixed length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub nanos: i64,
}

impl Interval {
    pub const fn new(months: i32, days: i32, nanos: i64) -> Self {
        Self { months, days, nanos }
    }
}

/// Semantic vector element type. Each variant corresponds to exactly one
/// [`crate::array::ArrayImpl`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Date32,
    /// Microseconds since the Unix epoch.
    Timestamp64,
    Time32,
    Time64,
    Interval,
    String,
    /// A list of elements of the given type.
    Array(Box<DataType>),
    /// Opaque fallback for values the engine does not specialise for.
    NonNative,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Float32
                | DataType::Float64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_variable_length(&self) -> bool {
        matches!(self, DataType::String | DataType::Array(_))
    }

    /// Arithmetic type coercion for `a op b`: integer + floating -> floating,
    /// date + interval -> date, timestamp - timestamp -> interval. Returns
    /// `None` when the pair has no defined coercion (the expression
    /// evaluator turns that into a `TypeMismatch`).
    pub fn coerce_arithmetic(lhs: &DataType, rhs: &DataType) -> Option<DataType> {
        use DataType::*;
        match (lhs, rhs) {
            (a, b) if a == b => Some(a.clone()),
            (Date32, Interval) | (Interval, Date32) => Some(Date32),
            (Timestamp64, Interval) | (Interval, Timestamp64) => Some(Timestamp64),
            (Timestamp64, Timestamp64) => Some(Interval),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                if a.is_floating() || b.is_floating() {
                    Some(if widest_float(a, b) == Float64 { Float64 } else { Float32 })
                } else {
                    Some(widest_int(a, b))
                }
            }
            _ => None,
        }
    }
}

fn widest_float(a: &DataType, b: &DataType) -> DataType {
    if *a == DataType::Float64 || *b == DataType::Float64 {
        DataType::Float64
    } else {
        DataType::Float32
    }
}

fn rank_int(t: &DataType) -> u8 {
    match t {
        DataType::Int8 => 0,
        DataType::Int16 => 1,
        DataType::Int32 => 2,
        DataType::Int64 => 3,
        _ => 0,
    }
}

fn widest_int(a: &DataType, b: &DataType) -> DataType {
    if rank_int(a) >= rank_int(b) {
        a.clone()
    } else {
        b.clone()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int8 => write!(f, "INT8"),
            DataType::Int16 => write!(f, "INT16"),
            DataType::Int32 => write!(f, "INT32"),
            DataType::Int64 => write!(f, "INT64"),
            DataType::Float32 => write!(f, "FLOAT32"),
            DataType::Float64 => write!(f, "FLOAT64"),
            DataType::Bool => write!(f, "BOOL"),
            DataType::Date32 => write!(f, "DATE32"),
            DataType::Timestamp64 => write!(f, "TIMESTAMP64"),
            DataType::Time32 => write!(f, "TIME32"),
            DataType::Time64 => write!(f, "TIME64"),
            DataType::Interval => write!(f, "INTERVAL"),
            DataType::String => write!(f, "STRING"),
            DataType::Array(inner) => write!(f, "ARRAY<{inner}>"),
            DataType::NonNative => write!(f, "NONNATIVE"),
        }
    }
}

/// A single scalar literal, tagged with its [`DataType`]. `Null` carries the
/// type it would have held so comparisons and coercion still make sense.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null(DataType),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    /// Days since the Unix epoch.
    Date32(i32),
    Timestamp64(i64),
    Time32(i32),
    Time64(i64),
    Interval(Interval),
    String(String),
    Array(Vec<ScalarValue>),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null(t) => t.clone(),
            ScalarValue::Int8(_) => DataType::Int8,
            ScalarValue::Int16(_) => DataType::Int16,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float32(_) => DataType::Float32,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Bool(_) => DataType::Bool,
            ScalarValue::Date32(_) => DataType::Date32,
            ScalarValue::Timestamp64(_) => DataType::Timestamp64,
            ScalarValue::Time32(_) => DataType::Time32,
            ScalarValue::Time64(_) => DataType::Time64,
            ScalarValue::Interval(_) => DataType::Interval,
            ScalarValue::String(_) => DataType::String,
            ScalarValue::Array(items) => {
                let inner = items.first().map(|v| v.data_type()).unwrap_or(DataType::NonNative);
                DataType::Array(Box::new(inner))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null(_))
    }
}

/// Days-since-epoch helper used by date/interval arithmetic in `opteryx_expr`.
pub fn epoch_days(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32
}
