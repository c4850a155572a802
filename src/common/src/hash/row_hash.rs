//! Row hashing for hash join/aggregate build and probe sides (spec.md §4.5).
//!
//! Each column contributes an xxHash3-64 digest of its row's byte
//! representation (or a fixed sentinel for a null cell); the per-column
//! digests are combined with a SplitMix64-style mix seeded with the golden
//! ratio constant `0x9e3779b97f4a7c15`, the same constant the teacher's own
//! key hashing (`common::hash::key_v2`) mixes sub-key hashes with.

use xxhash_rust::xxh3::xxh3_64;

use crate::array::ArrayImpl;

const GOLDEN_RATIO: u64 = 0x9e3779b97f4a7c15;
/// xxHash3-64 of an empty byte slice — the sentinel every null cell hashes
/// to, so two nulls in the same column position always collide (columns are
/// still distinguished by the order they're folded in).
fn null_sentinel() -> u64 {
    xxh3_64(&[])
}

#[inline]
fn mix(acc: u64, next: u64) -> u64 {
    (acc ^ next.wrapping_add(GOLDEN_RATIO).wrapping_add(acc << 6).wrapping_add(acc >> 2))
        .wrapping_mul(GOLDEN_RATIO)
}

fn hash_cell(array: &ArrayImpl, row: usize) -> u64 {
    if !array.is_valid(row) {
        return null_sentinel();
    }
    macro_rules! hash_primitive {
        ($a:expr) => {
            xxh3_64(&$a.value(row).to_le_bytes())
        };
    }
    match array {
        ArrayImpl::Int8(a) => hash_primitive!(a),
        ArrayImpl::Int16(a) => hash_primitive!(a),
        ArrayImpl::Int32(a) => hash_primitive!(a),
        ArrayImpl::Int64(a) => hash_primitive!(a),
        ArrayImpl::Float32(a) => xxh3_64(&(a.value(row) as f64).to_le_bytes()),
        ArrayImpl::Float64(a) => hash_primitive!(a),
        ArrayImpl::Date32(a) => hash_primitive!(a),
        ArrayImpl::Timestamp64(a) => hash_primitive!(a),
        ArrayImpl::Time32(a) => hash_primitive!(a),
        ArrayImpl::Time64(a) => hash_primitive!(a),
        ArrayImpl::Interval(a) => hash_primitive!(a),
        ArrayImpl::Bool(a) => xxh3_64(&[a.value(row) as u8]),
        ArrayImpl::Utf8(a) => xxh3_64(a.value_bytes(row)),
        // Canonical rule (see DESIGN.md): a list hashes as the fold of its
        // element hashes, so two lists differing only by nesting depth of
        // an inner null still hash consistently with element-wise equality.
        ArrayImpl::List(a) => match a.value(row) {
            Some(child) => (0..child.len()).fold(GOLDEN_RATIO, |acc, i| mix(acc, hash_cell(&child, i))),
            None => null_sentinel(),
        },
        ArrayImpl::NonNative(a) => match a.value(row) {
            Some(s) => xxh3_64(s.as_bytes()),
            None => null_sentinel(),
        },
    }
}

/// Hashes row `row` across every column in `columns`, combining per-column
/// digests left to right.
pub fn hash_row(columns: &[&ArrayImpl], row: usize) -> u64 {
    columns.iter().fold(GOLDEN_RATIO, |acc, col| mix(acc, hash_cell(col, row)))
}

/// Hashes every row of a key morsel in one pass, returning one `u64` per row.
pub fn hash_rows(columns: &[&ArrayImpl], row_count: usize) -> Vec<u64> {
    (0..row_count).map(|row| hash_row(columns, row)).collect()
}

/// `true` if any key column is null at `row` — spec.md §4.5's null-avoidant
/// rule: such rows never match in an equi-join build or probe and are
/// skipped before the hash table is built or probed.
pub fn row_has_null(columns: &[&ArrayImpl], row: usize) -> bool {
    columns.iter().any(|c| !c.is_valid(row))
}

/// Row indices from `columns` with no null key column, computed once and
/// reused by both the build and probe sides of an equi-join.
pub fn null_avoidant_indices(columns: &[&ArrayImpl], row_count: usize) -> Vec<usize> {
    (0..row_count).filter(|&row| !row_has_null(columns, row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::bitmap::Bitmap;
    use crate::array::vector::PrimitiveArray;

    #[test]
    fn same_values_hash_equal() {
        let a = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 2, 3], Bitmap::all_valid(3).into()));
        let b = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 2, 3], Bitmap::all_valid(3).into()));
        assert_eq!(hash_row(&[&a], 0), hash_row(&[&b], 0));
        assert_ne!(hash_row(&[&a], 0), hash_row(&[&a], 1));
    }

    #[test]
    fn null_cells_use_sentinel_and_are_detected() {
        let valid = [true, false];
        let a = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 0], Bitmap::from_bool_slice(&valid).into()));
        assert!(!row_has_null(&[&a], 0));
        assert!(row_has_null(&[&a], 1));
        assert_eq!(null_avoidant_indices(&[&a], 2), vec![0]);
    }

    #[test]
    fn column_order_changes_the_combined_hash() {
        let a = ArrayImpl::Int32(PrimitiveArray::new(vec![1], Bitmap::all_valid(1).into()));
        let b = ArrayImpl::Int32(PrimitiveArray::new(vec![2], Bitmap::all_valid(1).into()));
        assert_ne!(hash_row(&[&a, &b], 0), hash_row(&[&b, &a], 0));
    }
}
