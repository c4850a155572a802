//! `= <> < <= > >=` over two columns of the same coerced type, producing a
//! nullable [`opteryx_common::array::vector::BoolArray`].

use opteryx_common::array::{ArrayImpl, BoolArray};
use opteryx_common::error::{internal_error, ErrorCode, OpteryxError, Result};
use opteryx_common::types::DataType;

use crate::cast::cast;
use crate::expr::BinaryOp;

pub fn eval(op: BinaryOp, lhs: &ArrayImpl, rhs: &ArrayImpl) -> Result<ArrayImpl> {
    let lhs_ty = lhs.data_type();
    let rhs_ty = rhs.data_type();

    let (lhs, rhs) = if lhs_ty == rhs_ty {
        (lhs.clone(), rhs.clone())
    } else if let ArrayImpl::Utf8(_) = lhs {
        (lhs.clone(), cast(rhs, &DataType::String)?)
    } else if let ArrayImpl::Utf8(_) = rhs {
        (cast(lhs, &DataType::String)?, rhs.clone())
    } else {
        let result_ty = DataType::coerce_arithmetic(&lhs_ty, &rhs_ty)
            .ok_or_else(|| OpteryxError::from(ErrorCode::TypeMismatch(format!("cannot compare {lhs_ty} and {rhs_ty}"))))?;
        (cast(lhs, &result_ty)?, cast(rhs, &result_ty)?)
    };

    let len = lhs.len();
    let mut values = Vec::with_capacity(len);
    let mut valid = Vec::with_capacity(len);
    for i in 0..len {
        if lhs.is_valid(i) && rhs.is_valid(i) {
            values.push(compare_cell(op, &lhs, &rhs, i)?);
            valid.push(true);
        } else {
            values.push(false);
            valid.push(false);
        }
    }
    Ok(ArrayImpl::Bool(BoolArray::new(values, opteryx_common::array::Bitmap::from_bool_slice(&valid).into())))
}

fn compare_cell(op: BinaryOp, lhs: &ArrayImpl, rhs: &ArrayImpl, i: usize) -> Result<bool> {
    macro_rules! cmp {
        ($l:expr, $r:expr) => {
            match op {
                BinaryOp::Eq => $l == $r,
                BinaryOp::NotEq => $l != $r,
                BinaryOp::Lt => $l < $r,
                BinaryOp::LtEq => $l <= $r,
                BinaryOp::Gt => $l > $r,
                BinaryOp::GtEq => $l >= $r,
                _ => return Err(internal_error!("{op:?} is not a comparison operator")),
            }
        };
    }
    Ok(match (lhs, rhs) {
        (ArrayImpl::Int8(l), ArrayImpl::Int8(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Int16(l), ArrayImpl::Int16(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Int32(l), ArrayImpl::Int32(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Int64(l), ArrayImpl::Int64(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Float32(l), ArrayImpl::Float32(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Float64(l), ArrayImpl::Float64(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Date32(l), ArrayImpl::Date32(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Timestamp64(l), ArrayImpl::Timestamp64(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Time32(l), ArrayImpl::Time32(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Time64(l), ArrayImpl::Time64(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Interval(l), ArrayImpl::Interval(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Bool(l), ArrayImpl::Bool(r)) => cmp!(l.value(i), r.value(i)),
        (ArrayImpl::Utf8(l), ArrayImpl::Utf8(r)) => cmp!(l.value(i), r.value(i)),
        (l, r) => return Err(internal_error!("cannot compare {:?} and {:?}", l.data_type(), r.data_type())),
    })
}

#[cfg(test)]
mod tests {
    use opteryx_common::array::{Bitmap, PrimitiveArray};

    use super::*;

    #[test]
    fn equal_ints() {
        let l = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 2], Bitmap::all_valid(2).into()));
        let r = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 3], Bitmap::all_valid(2).into()));
        let ArrayImpl::Bool(result) = eval(BinaryOp::Eq, &l, &r).unwrap() else { panic!() };
        assert!(result.value(0));
        assert!(!result.value(1));
    }

    #[test]
    fn null_operand_yields_null_result() {
        let valid = [true, false];
        let l = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 2], Bitmap::from_bool_slice(&valid).into()));
        let r = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 2], Bitmap::all_valid(2).into()));
        let ArrayImpl::Bool(result) = eval(BinaryOp::Eq, &l, &r).unwrap() else { panic!() };
        assert!(!result.is_valid(1));
    }
}
