//! CAST / TRY_CAST: converting one [`ArrayImpl`] to another [`DataType`].
//!
//! `cast` raises `CastError` on the first unrepresentable value; `try_cast`
//! instead maps it to null, matching the teacher's own split between a
//! strict and a "best-effort" cast path (its `ExprError::CastOutOfRange`
//! vs. the `TRY_CAST`-flavoured expression wrapper in
//! `risingwave_expr::expr::expr_unary`).

use opteryx_common::array::builder::ArrayBuilderImpl;
use opteryx_common::array::ArrayImpl;
use opteryx_common::error::{ErrorCode, OpteryxError, Result};
use opteryx_common::types::DataType;

fn cast_err(from: &DataType, to: &DataType, value: impl std::fmt::Display) -> OpteryxError {
    OpteryxError::from(ErrorCode::CastError(format!("cannot cast {value} from {from} to {to}")))
}

/// Casts every value in `array` to `target`, or errs on the first value that
/// cannot be represented.
pub fn cast(array: &ArrayImpl, target: &DataType) -> Result<ArrayImpl> {
    cast_impl(array, target, false)
}

/// As [`cast`], but an unrepresentable value becomes null instead of an
/// error.
pub fn try_cast(array: &ArrayImpl, target: &DataType) -> Result<ArrayImpl> {
    cast_impl(array, target, true)
}

fn cast_impl(array: &ArrayImpl, target: &DataType, lenient: bool) -> Result<ArrayImpl> {
    if &array.data_type() == target {
        return Ok(array.clone());
    }
    let len = array.len();
    let mut builder = ArrayBuilderImpl::with_capacity(target, len);
    for i in 0..len {
        let cell = cast_cell(array, i, target);
        let cell = match cell {
            Ok(c) => c,
            Err(e) if lenient => {
                let _ = e;
                None
            }
            Err(e) => return Err(e),
        };
        append_cell(&mut builder, target, cell)?;
    }
    Ok(builder.finish())
}

/// A cast result as an owned scalar; `None` represents SQL NULL (either the
/// source cell was null, or — for `try_cast` — the value was unrepresentable).
enum Cell {
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
}

fn cast_cell(array: &ArrayImpl, row: usize, target: &DataType) -> Result<Option<Cell>> {
    if !array.is_valid(row) {
        return Ok(None);
    }
    let source = array.data_type();
    let numeric_source = match array {
        ArrayImpl::Int8(a) => Some(a.value(row) as f64),
        ArrayImpl::Int16(a) => Some(a.value(row) as f64),
        ArrayImpl::Int32(a) => Some(a.value(row) as f64),
        ArrayImpl::Int64(a) => Some(a.value(row) as f64),
        ArrayImpl::Date32(a) => Some(a.value(row) as f64),
        ArrayImpl::Time32(a) => Some(a.value(row) as f64),
        ArrayImpl::Float32(a) => Some(a.value(row) as f64),
        ArrayImpl::Float64(a) => Some(a.value(row)),
        ArrayImpl::Timestamp64(a) => Some(a.value(row) as f64),
        ArrayImpl::Time64(a) => Some(a.value(row) as f64),
        ArrayImpl::Interval(a) => Some(a.value(row) as f64),
        _ => None,
    };

    match (target, array) {
        (t, _) if t.is_integer() || matches!(t, DataType::Date32 | DataType::Time32) => {
            if let Some(n) = numeric_source {
                return Ok(Some(Cell::I64(n as i64)));
            }
            if let ArrayImpl::Utf8(a) = array {
                return match a.value(row).trim().parse::<i64>() {
                    Ok(v) => Ok(Some(Cell::I64(v))),
                    Err(_) => Err(cast_err(&source, target, a.value(row))),
                };
            }
            if let ArrayImpl::Bool(a) = array {
                return Ok(Some(Cell::I64(a.value(row) as i64)));
            }
            Err(cast_err(&source, target, "<value>"))
        }
        (t, _) if t.is_floating() || matches!(t, DataType::Timestamp64 | DataType::Time64 | DataType::Interval) => {
            if let Some(n) = numeric_source {
                return Ok(Some(Cell::F64(n)));
            }
            if let ArrayImpl::Utf8(a) = array {
                return match a.value(row).trim().parse::<f64>() {
                    Ok(v) => Ok(Some(Cell::F64(v))),
                    Err(_) => Err(cast_err(&source, target, a.value(row))),
                };
            }
            Err(cast_err(&source, target, "<value>"))
        }
        (DataType::Bool, _) => {
            if let ArrayImpl::Bool(a) = array {
                return Ok(Some(Cell::Bool(a.value(row))));
            }
            if let Some(n) = numeric_source {
                return Ok(Some(Cell::Bool(n != 0.0)));
            }
            if let ArrayImpl::Utf8(a) = array {
                return match a.value(row).trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" | "yes" => Ok(Some(Cell::Bool(true))),
                    "false" | "f" | "0" | "no" => Ok(Some(Cell::Bool(false))),
                    _ => Err(cast_err(&source, target, a.value(row))),
                };
            }
            Err(cast_err(&source, target, "<value>"))
        }
        (DataType::String, ArrayImpl::Utf8(a)) => Ok(Some(Cell::Str(a.value(row).to_string()))),
        (DataType::String, ArrayImpl::Bool(a)) => Ok(Some(Cell::Str(a.value(row).to_string()))),
        (DataType::String, _) => {
            if let Some(n) = numeric_source {
                return Ok(Some(Cell::Str(format_numeric(array, row, n))));
            }
            Err(cast_err(&source, target, "<value>"))
        }
        _ => Err(cast_err(&source, target, "<value>")),
    }
}

fn format_numeric(array: &ArrayImpl, row: usize, n: f64) -> String {
    match array {
        ArrayImpl::Float32(a) => a.value(row).to_string(),
        ArrayImpl::Float64(a) => a.value(row).to_string(),
        _ => (n as i64).to_string(),
    }
}

fn append_cell(builder: &mut ArrayBuilderImpl, target: &DataType, cell: Option<Cell>) -> Result<()> {
    macro_rules! append_int {
        ($b:expr, $t:ty) => {
            $b.append(match &cell {
                Some(Cell::I64(v)) => Some(*v as $t),
                Some(Cell::F64(v)) => Some(*v as $t),
                Some(Cell::Bool(v)) => Some(*v as $t),
                None => None,
                _ => return Err(cast_err(target, target, "<value>")),
            })
        };
    }
    match (builder, target) {
        (ArrayBuilderImpl::Int8(b), _) => append_int!(b, i8),
        (ArrayBuilderImpl::Int16(b), _) => append_int!(b, i16),
        (ArrayBuilderImpl::Int32(b), _) => append_int!(b, i32),
        (ArrayBuilderImpl::Int64(b), _) => append_int!(b, i64),
        (ArrayBuilderImpl::Date32(b), _) => append_int!(b, i32),
        (ArrayBuilderImpl::Time32(b), _) => append_int!(b, i32),
        (ArrayBuilderImpl::Float32(b), _) => b.append(match cell {
            Some(Cell::F64(v)) => Some(v as f32),
            Some(Cell::I64(v)) => Some(v as f32),
            None => None,
            _ => return Err(cast_err(target, target, "<value>")),
        }),
        (ArrayBuilderImpl::Float64(b), _) => b.append(match cell {
            Some(Cell::F64(v)) => Some(v),
            Some(Cell::I64(v)) => Some(v as f64),
            None => None,
            _ => return Err(cast_err(target, target, "<value>")),
        }),
        (ArrayBuilderImpl::Timestamp64(b), _) | (ArrayBuilderImpl::Time64(b), _) | (ArrayBuilderImpl::Interval(b), _) => {
            b.append(match cell {
                Some(Cell::F64(v)) => Some(v as i64),
                Some(Cell::I64(v)) => Some(v),
                None => None,
                _ => return Err(cast_err(target, target, "<value>")),
            })
        }
        (ArrayBuilderImpl::Bool(b), _) => b.append(match cell {
            Some(Cell::Bool(v)) => Some(v),
            None => None,
            _ => return Err(cast_err(target, target, "<value>")),
        }),
        (ArrayBuilderImpl::Utf8(b), _) => match &cell {
            Some(Cell::Str(s)) => b.append(Some(s.as_str())),
            None => b.append(None),
            _ => return Err(cast_err(target, target, "<value>")),
        },
        (b, _) => {
            let _ = b;
            return Err(OpteryxError::from(ErrorCode::UnsupportedType(format!("cannot cast into {target}"))));
        }
    }
    Ok(())
}

/// Fallback used by callers building an empty typed array (e.g. from a
/// constant-folded empty `IN` list).
pub fn empty_of(target: &DataType) -> ArrayImpl {
    opteryx_common::array::empty_array(target)
}
