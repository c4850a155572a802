//! The morsel: the unit of data movement between operators (spec.md §3.1).

use std::sync::Arc;

use crate::array::vector::ArrayImpl;
use crate::catalog::Schema;
use crate::error::{internal_error, Result};

/// A columnar batch: one [`ArrayImpl`] per field in `schema`, all sharing
/// the same logical length. Immutable once built — downstream operators
/// produce new morsels, optionally sharing vector storage with this one
/// (every `ArrayImpl` variant is `Clone`-cheap via internal `Arc`s).
#[derive(Clone, Debug)]
pub struct Morsel {
    schema: Schema,
    columns: Vec<Arc<ArrayImpl>>,
    row_count: usize,
}

impl Morsel {
    pub fn try_new(schema: Schema, columns: Vec<ArrayImpl>) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(internal_error!(
                "morsel column count {} does not match schema field count {}",
                columns.len(),
                schema.len()
            ));
        }
        let row_count = columns.first().map(|c| c.len()).unwrap_or(0);
        for (field, col) in schema.fields.iter().zip(&columns) {
            if col.len() != row_count {
                return Err(internal_error!(
                    "column '{}' has {} rows, expected {}",
                    field.name,
                    col.len(),
                    row_count
                ));
            }
        }
        Ok(Self { schema, columns: columns.into_iter().map(Arc::new).collect(), row_count })
    }

    pub fn empty(schema: Schema) -> Self {
        Self { schema, columns: Vec::new(), row_count: 0 }
    }

    /// A single logical row with no columns — the input a `SELECT` with no
    /// `FROM` evaluates its (necessarily column-free) projection list
    /// against, so `Expr::Literal`'s `row_count()`-sized fan-out produces
    /// exactly one value per expression.
    pub fn single_row() -> Self {
        Self { schema: Schema::empty(), columns: Vec::new(), row_count: 1 }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column(&self, idx: usize) -> &ArrayImpl {
        &self.columns[idx]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ArrayImpl> {
        self.schema.index_of(name).map(|i| self.column(i))
    }

    pub fn columns(&self) -> &[Arc<ArrayImpl>] {
        &self.columns
    }

    /// Approximate in-memory footprint, used by operators that track a soft
    /// [`crate::memory::MemoryContext`] budget.
    pub fn approx_byte_size(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.len() * 8 + 16) // coarse: 8 bytes/value plus a fixed per-column overhead
            .sum()
    }

    /// Builds a new morsel selecting `indices` from every column — the
    /// shared "gather" operation joins, sorts, and distinct use to
    /// materialise an output batch.
    pub fn take(&self, indices: &[usize]) -> Morsel {
        let columns: Vec<ArrayImpl> = self.columns.iter().map(|c| c.take(indices)).collect();
        Morsel { schema: self.schema.clone(), columns: columns.into_iter().map(Arc::new).collect(), row_count: indices.len() }
    }

    /// Row-wise boolean select, used by the Filter operator.
    pub fn filter(&self, mask: &[bool]) -> Morsel {
        debug_assert_eq!(mask.len(), self.row_count);
        let indices: Vec<usize> = mask.iter().enumerate().filter(|(_, &b)| b).map(|(i, _)| i).collect();
        self.take(&indices)
    }

    /// Projects a subset of columns (and re-orders/renames via `schema`),
    /// used by the Project operator and by projection pushdown.
    pub fn project(&self, indices: &[usize], schema: Schema) -> Result<Morsel> {
        let columns: Vec<ArrayImpl> = indices.iter().map(|&i| self.columns[i].as_ref().clone()).collect();
        Morsel::try_new(schema, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::bitmap::Bitmap;
    use crate::array::vector::PrimitiveArray;
    use crate::catalog::Field;
    use crate::types::DataType;

    fn sample() -> Morsel {
        let schema = Schema::new(vec![Field::not_null("a", DataType::Int32)]);
        let col = ArrayImpl::Int32(PrimitiveArray::new(vec![1, 2, 3], Bitmap::all_valid(3).into()));
        Morsel::try_new(schema, vec![col]).unwrap()
    }

    #[test]
    fn row_count_matches_columns() {
        let m = sample();
        assert_eq!(m.row_count(), 3);
    }

    #[test]
    fn take_gathers_rows() {
        let m = sample();
        let taken = m.take(&[2, 0]);
        let ArrayImpl::Int32(col) = taken.column(0) else { panic!() };
        assert_eq!(col.value(0), 3);
        assert_eq!(col.value(1), 1);
    }

    #[test]
    fn filter_keeps_masked_rows() {
        let m = sample();
        let filtered = m.filter(&[true, false, true]);
        assert_eq!(filtered.row_count(), 2);
    }

    #[test]
    fn mismatched_column_count_is_an_error() {
        let schema = Schema::new(vec![Field::not_null("a", DataType::Int32), Field::not_null("b", DataType::Int32)]);
        let col = ArrayImpl::Int32(PrimitiveArray::new(vec![1], Bitmap::all_valid(1).into()));
        assert!(Morsel::try_new(schema, vec![col]).is_err());
    }
}
