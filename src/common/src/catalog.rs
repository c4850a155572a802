//! The schema of a morsel: an ordered list of named, typed fields.
//!
//! Kept deliberately close to the teacher's own `common::catalog::Schema` /
//! `Field` pair (see `rust/common/src/catalog/schema.rs`), minus the
//! protobuf round-trip methods that pair belongs to a connector-facing
//! catalog, which is out of scope here.

use std::ops::Index;

use crate::types::DataType;

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self { name: name.into(), data_type, nullable }
    }

    pub fn not_null(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, false)
    }

    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, true)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.fields.iter().map(|f| f.data_type.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// The schema produced by projecting `indices` out of `self`, used by
    /// projection-pushdown to compute a node's minimum required columns.
    pub fn project(&self, indices: &[usize]) -> Schema {
        Schema::new(indices.iter().map(|&i| self.fields[i].clone()).collect())
    }

    pub fn concat(mut self, other: Schema) -> Schema {
        self.fields.extend(other.fields);
        self
    }
}

impl Index<usize> for Schema {
    type Output = Field;

    fn index(&self, index: usize) -> &Self::Output {
        &self.fields[index]
    }
}
