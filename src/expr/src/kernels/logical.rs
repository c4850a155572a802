//! Three-valued boolean logic for `AND`/`OR`/`NOT`.
//!
//! SQL's truth table treats `NULL` as "unknown": `TRUE OR NULL = TRUE` and
//! `FALSE AND NULL = FALSE` are still decidable even though one operand is
//! unknown, so this does not reduce to a simple null-propagating pointwise
//! op the way arithmetic does.

use opteryx_common::array::{ArrayImpl, Bitmap, BoolArray};
use opteryx_common::error::{internal_error, Result};

pub fn and(lhs: &ArrayImpl, rhs: &ArrayImpl) -> Result<ArrayImpl> {
    let (l, r) = as_bool_pair(lhs, rhs)?;
    combine(l, r, |lv, rv| match (lv, rv) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    })
}

pub fn or(lhs: &ArrayImpl, rhs: &ArrayImpl) -> Result<ArrayImpl> {
    let (l, r) = as_bool_pair(lhs, rhs)?;
    combine(l, r, |lv, rv| match (lv, rv) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    })
}

pub fn not(array: &ArrayImpl) -> Result<ArrayImpl> {
    let ArrayImpl::Bool(b) = array else { return Err(internal_error!("NOT requires a boolean operand")) };
    let len = b.len();
    let values: Vec<bool> = (0..len).map(|i| !b.get(i).unwrap_or(false)).collect();
    let valid: Vec<bool> = (0..len).map(|i| b.is_valid(i)).collect();
    Ok(ArrayImpl::Bool(BoolArray::new(values, Bitmap::from_bool_slice(&valid).into())))
}

fn as_bool_pair<'a>(lhs: &'a ArrayImpl, rhs: &'a ArrayImpl) -> Result<(&'a BoolArray, &'a BoolArray)> {
    match (lhs, rhs) {
        (ArrayImpl::Bool(l), ArrayImpl::Bool(r)) => Ok((l, r)),
        _ => Err(internal_error!("AND/OR require boolean operands")),
    }
}

fn combine(l: &BoolArray, r: &BoolArray, f: impl Fn(Option<bool>, Option<bool>) -> Option<bool>) -> Result<ArrayImpl> {
    let len = l.len();
    let mut values = Vec::with_capacity(len);
    let mut valid = Vec::with_capacity(len);
    for i in 0..len {
        match f(l.get(i), r.get(i)) {
            Some(v) => {
                values.push(v);
                valid.push(true);
            }
            None => {
                values.push(false);
                valid.push(false);
            }
        }
    }
    Ok(ArrayImpl::Bool(BoolArray::new(values, Bitmap::from_bool_slice(&valid).into())))
}

#[cfg(test)]
mod tests {
    use opteryx_common::array::Bitmap as Bm;

    use super::*;

    #[test]
    fn false_and_null_is_false() {
        let l = ArrayImpl::Bool(BoolArray::new(vec![false], Bm::all_valid(1).into()));
        let r = ArrayImpl::Bool(BoolArray::new(vec![false], Bm::from_bool_slice(&[false]).into()));
        let ArrayImpl::Bool(result) = and(&l, &r).unwrap() else { panic!() };
        assert!(result.is_valid(0));
        assert!(!result.value(0));
    }

    #[test]
    fn true_or_null_is_true() {
        let l = ArrayImpl::Bool(BoolArray::new(vec![true], Bm::all_valid(1).into()));
        let r = ArrayImpl::Bool(BoolArray::new(vec![false], Bm::from_bool_slice(&[false]).into()));
        let ArrayImpl::Bool(result) = or(&l, &r).unwrap() else { panic!() };
        assert!(result.is_valid(0));
        assert!(result.value(0));
    }
}
