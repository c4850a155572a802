//! `+ - * / %` over two numeric (or date/interval) columns.

use opteryx_common::array::builder::ArrayBuilderImpl;
use opteryx_common::array::ArrayImpl;
use opteryx_common::error::{internal_error, ErrorCode, OpteryxError, Result};
use opteryx_common::types::DataType;

use crate::cast::cast;
use crate::expr::BinaryOp;

/// `lhs op rhs`, coercing both sides per [`DataType::coerce_arithmetic`].
pub fn eval(op: BinaryOp, lhs: &ArrayImpl, rhs: &ArrayImpl) -> Result<ArrayImpl> {
    let lhs_ty = lhs.data_type();
    let rhs_ty = rhs.data_type();

    if let Some(result) = date_interval_special_case(op, lhs, rhs, &lhs_ty, &rhs_ty)? {
        return Ok(result);
    }

    let result_ty = DataType::coerce_arithmetic(&lhs_ty, &rhs_ty)
        .ok_or_else(|| OpteryxError::from(ErrorCode::TypeMismatch(format!("cannot apply {op:?} to {lhs_ty} and {rhs_ty}"))))?;

    let lhs = cast(lhs, &result_ty)?;
    let rhs = cast(rhs, &result_ty)?;
    numeric_elementwise(op, &lhs, &rhs, &result_ty)
}

/// Handles `date/timestamp +/- interval`, in either argument order. Neither
/// side is a plain numeric type, so the generic coercion-and-cast path below
/// cannot express it: an interval has no fixed numeric magnitude, only a
/// months/days/nanos split.
fn date_interval_special_case(
    op: BinaryOp,
    lhs: &ArrayImpl,
    rhs: &ArrayImpl,
    lhs_ty: &DataType,
    rhs_ty: &DataType,
) -> Result<Option<ArrayImpl>> {
    use DataType::*;
    // `interval + date` commutes to `date + interval`; `interval - date` is
    // not a meaningful operation and is rejected by falling through to the
    // generic numeric path, which will raise a `TypeMismatch`.
    if matches!(lhs_ty, Interval) && matches!(rhs_ty, Date32 | Timestamp64) && op == BinaryOp::Add {
        return date_interval_special_case(op, rhs, lhs, rhs_ty, lhs_ty);
    }
    if !matches!(lhs_ty, Date32 | Timestamp64) || !matches!(rhs_ty, Interval) {
        return Ok(None);
    }
    if !matches!(op, BinaryOp::Add | BinaryOp::Sub) {
        return Ok(None);
    }
    let ArrayImpl::Interval(r) = rhs else { return Ok(None) };
    let is_date = matches!(lhs_ty, Date32);
    let base_values: Vec<i64> = match lhs {
        ArrayImpl::Date32(l) => (0..l.len()).map(|i| l.value(i) as i64).collect(),
        ArrayImpl::Timestamp64(l) => (0..l.len()).map(|i| l.value(i)).collect(),
        _ => return Ok(None),
    };
    if base_values.len() != r.len() {
        return Err(internal_error!("mismatched array lengths in date/interval arithmetic"));
    }
    let mut builder = ArrayBuilderImpl::with_capacity(lhs_ty, base_values.len());
    for i in 0..base_values.len() {
        let value = if lhs.is_valid(i) && r.is_valid(i) {
            let delta = r.value(i);
            let signed = if op == BinaryOp::Sub { -delta } else { delta };
            // `Interval::nanos` is in nanoseconds; dates are in whole days,
            // timestamps in whole microseconds (spec.md §3.2).
            Some(if is_date { base_values[i] + signed / 86_400_000_000_000 } else { base_values[i] + signed / 1_000 })
        } else {
            None
        };
        match &mut builder {
            ArrayBuilderImpl::Date32(b) => b.append(value.map(|v| v as i32)),
            ArrayBuilderImpl::Timestamp64(b) => b.append(value),
            _ => unreachable!(),
        }
    }
    Ok(Some(builder.finish()))
}

fn numeric_elementwise(op: BinaryOp, lhs: &ArrayImpl, rhs: &ArrayImpl, result_ty: &DataType) -> Result<ArrayImpl> {
    let len = lhs.len();
    let mut builder = ArrayBuilderImpl::with_capacity(result_ty, len);

    macro_rules! run_int {
        ($b:expr, $l:expr, $r:expr, $t:ty) => {{
            for i in 0..len {
                let v = if $l.is_valid(i) && $r.is_valid(i) {
                    Some(apply_int(op, $l.value(i) as i64, $r.value(i) as i64)? as $t)
                } else {
                    None
                };
                $b.append(v);
            }
        }};
    }
    macro_rules! run_float {
        ($b:expr, $l:expr, $r:expr, $t:ty) => {{
            for i in 0..len {
                let v = if $l.is_valid(i) && $r.is_valid(i) {
                    Some(apply_float(op, $l.value(i) as f64, $r.value(i) as f64)? as $t)
                } else {
                    None
                };
                $b.append(v);
            }
        }};
    }

    match (&mut builder, lhs, rhs) {
        (ArrayBuilderImpl::Int8(b), ArrayImpl::Int8(l), ArrayImpl::Int8(r)) => run_int!(b, l, r, i8),
        (ArrayBuilderImpl::Int16(b), ArrayImpl::Int16(l), ArrayImpl::Int16(r)) => run_int!(b, l, r, i16),
        (ArrayBuilderImpl::Int32(b), ArrayImpl::Int32(l), ArrayImpl::Int32(r)) => run_int!(b, l, r, i32),
        (ArrayBuilderImpl::Int64(b), ArrayImpl::Int64(l), ArrayImpl::Int64(r)) => run_int!(b, l, r, i64),
        (ArrayBuilderImpl::Float32(b), ArrayImpl::Float32(l), ArrayImpl::Float32(r)) => run_float!(b, l, r, f32),
        (ArrayBuilderImpl::Float64(b), ArrayImpl::Float64(l), ArrayImpl::Float64(r)) => run_float!(b, l, r, f64),
        _ => return Err(internal_error!("unreachable arithmetic type combination after coercion")),
    }
    Ok(builder.finish())
}

fn apply_int(op: BinaryOp, l: i64, r: i64) -> Result<i64> {
    Ok(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div => {
            if r == 0 {
                return Err(OpteryxError::from(ErrorCode::DivisionByZero));
            }
            l / r
        }
        BinaryOp::Mod => {
            if r == 0 {
                return Err(OpteryxError::from(ErrorCode::DivisionByZero));
            }
            l % r
        }
        _ => return Err(internal_error!("{op:?} is not an arithmetic operator")),
    })
}

fn apply_float(op: BinaryOp, l: f64, r: f64) -> Result<f64> {
    Ok(match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return Err(OpteryxError::from(ErrorCode::DivisionByZero));
            }
            l / r
        }
        BinaryOp::Mod => {
            if r == 0.0 {
                return Err(OpteryxError::from(ErrorCode::DivisionByZero));
            }
            l % r
        }
        _ => return Err(internal_error!("{op:?} is not an arithmetic operator")),
    })
}

#[cfg(test)]
mod tests {
    use opteryx_common::array::Bitmap;
    use opteryx_common::array::PrimitiveArray;

    use super::*;

    #[test]
    fn integer_division_by_zero_errs() {
        let lhs = ArrayImpl::Int32(PrimitiveArray::new(vec![10], Bitmap::all_valid(1).into()));
        let rhs = ArrayImpl::Int32(PrimitiveArray::new(vec![0], Bitmap::all_valid(1).into()));
        assert!(eval(BinaryOp::Div, &lhs, &rhs).is_err());
    }

    #[test]
    fn mixed_int_float_coerces_to_float() {
        let lhs = ArrayImpl::Int32(PrimitiveArray::new(vec![2], Bitmap::all_valid(1).into()));
        let rhs = ArrayImpl::Float64(PrimitiveArray::new(vec![0.5], Bitmap::all_valid(1).into()));
        let result = eval(BinaryOp::Add, &lhs, &rhs).unwrap();
        let ArrayImpl::Float64(r) = result else { panic!("expected float64") };
        assert_eq!(r.value(0), 2.5);
    }
}
