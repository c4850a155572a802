//! Incremental array builders, one per [`ArrayImpl`] variant, used by the
//! expression evaluator and by aggregate/group finalisation to assemble an
//! output column row by row.

use crate::array::bitmap::Bitmap;
use crate::array::offsets::Offsets;
use crate::array::vector::{ArrayImpl, BoolArray, ListArray, NonNativeArray, PrimitiveArray, Utf8Array};
use crate::types::{DataType, ScalarValue};

macro_rules! primitive_builder {
    ($name:ident, $t:ty) => {
        #[derive(Default)]
        pub struct $name {
            data: Vec<$t>,
            valid: Vec<bool>,
        }

        impl $name {
            pub fn with_capacity(cap: usize) -> Self {
                Self { data: Vec::with_capacity(cap), valid: Vec::with_capacity(cap) }
            }

            pub fn append(&mut self, value: Option<$t>) {
                match value {
                    Some(v) => {
                        self.data.push(v);
                        self.valid.push(true);
                    }
                    None => {
                        self.data.push(Default::default());
                        self.valid.push(false);
                    }
                }
            }

            pub fn finish(self) -> PrimitiveArray<$t> {
                PrimitiveArray::new(self.data, Bitmap::from_bool_slice(&self.valid).into())
            }
        }
    };
}

primitive_builder!(Int8Builder, i8);
primitive_builder!(Int16Builder, i16);
primitive_builder!(Int32Builder, i32);
primitive_builder!(Int64Builder, i64);
primitive_builder!(Float32Builder, f32);
primitive_builder!(Float64Builder, f64);

#[derive(Default)]
pub struct BoolBuilder {
    data: Vec<bool>,
    valid: Vec<bool>,
}

impl BoolBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { data: Vec::with_capacity(cap), valid: Vec::with_capacity(cap) }
    }

    pub fn append(&mut self, value: Option<bool>) {
        self.data.push(value.unwrap_or(false));
        self.valid.push(value.is_some());
    }

    pub fn finish(self) -> BoolArray {
        BoolArray::new(self.data, Bitmap::from_bool_slice(&self.valid).into())
    }
}

#[derive(Default)]
pub struct Utf8Builder {
    data: Vec<u8>,
    lengths: Vec<i32>,
    valid: Vec<bool>,
}

impl Utf8Builder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { data: Vec::with_capacity(cap * 8), lengths: Vec::with_capacity(cap), valid: Vec::with_capacity(cap) }
    }

    pub fn append(&mut self, value: Option<&str>) {
        match value {
            Some(v) => {
                self.data.extend_from_slice(v.as_bytes());
                self.lengths.push(v.len() as i32);
                self.valid.push(true);
            }
            None => {
                self.lengths.push(0);
                self.valid.push(false);
            }
        }
    }

    pub fn finish(self) -> Utf8Array {
        let offsets = Offsets::from_lengths(self.lengths);
        let mut values = Vec::with_capacity(offsets.len());
        for i in 0..offsets.len() {
            let start = offsets.start(i) as usize;
            let end = offsets.end(i) as usize;
            values.push(std::str::from_utf8(&self.data[start..end]).unwrap_or(""));
        }
        Utf8Array::new(values, Bitmap::from_bool_slice(&self.valid).into())
    }
}

#[derive(Default)]
pub struct NonNativeBuilder {
    values: Vec<Option<String>>,
}

impl NonNativeBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { values: Vec::with_capacity(cap) }
    }

    pub fn append(&mut self, value: Option<String>) {
        self.values.push(value);
    }

    pub fn finish(self) -> NonNativeArray {
        NonNativeArray::new(self.values)
    }
}

/// List builder: each `append` consumes a fully materialised child
/// `ArrayImpl` for that row (callers assemble the element array themselves,
/// matching how UNNEST and list literals already hold a concrete
/// sub-`ArrayImpl`).
pub struct ListBuilder {
    element_type: DataType,
    children: Vec<ArrayImpl>,
    valid: Vec<bool>,
}

impl ListBuilder {
    pub fn new(element_type: DataType) -> Self {
        Self { element_type, children: Vec::new(), valid: Vec::new() }
    }

    pub fn append(&mut self, value: Option<ArrayImpl>) {
        match value {
            Some(v) => {
                self.children.push(v);
                self.valid.push(true);
            }
            None => {
                self.children.push(empty_array(&self.element_type));
                self.valid.push(false);
            }
        }
    }

    pub fn finish(self) -> ListArray {
        let lengths: Vec<i32> = self.children.iter().map(|c| c.len() as i32).collect();
        let merged = if self.children.is_empty() {
            empty_array(&self.element_type)
        } else {
            crate::array::vector::concat_arrays(&self.children)
        };
        ListArray::new(merged, Offsets::from_lengths(lengths), Bitmap::from_bool_slice(&self.valid).into())
    }
}

/// An empty array of the requested semantic type, used to seed builders and
/// as a placeholder child for null list rows.
pub fn empty_array(data_type: &DataType) -> ArrayImpl {
    match data_type {
        DataType::Int8 => ArrayImpl::Int8(PrimitiveArray::new(vec![], None)),
        DataType::Int16 => ArrayImpl::Int16(PrimitiveArray::new(vec![], None)),
        DataType::Int32 => ArrayImpl::Int32(PrimitiveArray::new(vec![], None)),
        DataType::Int64 => ArrayImpl::Int64(PrimitiveArray::new(vec![], None)),
        DataType::Float32 => ArrayImpl::Float32(PrimitiveArray::new(vec![], None)),
        DataType::Float64 => ArrayImpl::Float64(PrimitiveArray::new(vec![], None)),
        DataType::Bool => ArrayImpl::Bool(BoolArray::new(vec![], None)),
        DataType::Date32 => ArrayImpl::Date32(PrimitiveArray::new(vec![], None)),
        DataType::Timestamp64 => ArrayImpl::Timestamp64(PrimitiveArray::new(vec![], None)),
        DataType::Time32 => ArrayImpl::Time32(PrimitiveArray::new(vec![], None)),
        DataType::Time64 => ArrayImpl::Time64(PrimitiveArray::new(vec![], None)),
        DataType::Interval => ArrayImpl::Interval(PrimitiveArray::new(vec![], None)),
        DataType::String => ArrayImpl::Utf8(Utf8Array::new(vec![], None)),
        DataType::Array(inner) => ArrayImpl::List(ListArray::new(empty_array(inner), Offsets::from_lengths(vec![]), None)),
        DataType::NonNative => ArrayImpl::NonNative(NonNativeArray::new(vec![])),
    }
}

/// Dispatch enum mirroring [`ArrayImpl`], used wherever a caller only knows
/// the target `DataType` up front (expression evaluation, aggregate
/// finalisation).
pub enum ArrayBuilderImpl {
    Int8(Int8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Bool(BoolBuilder),
    Date32(Int32Builder),
    Timestamp64(Int64Builder),
    Time32(Int32Builder),
    Time64(Int64Builder),
    Interval(Int64Builder),
    Utf8(Utf8Builder),
    List(ListBuilder),
    NonNative(NonNativeBuilder),
}

impl ArrayBuilderImpl {
    pub fn with_capacity(data_type: &DataType, cap: usize) -> Self {
        match data_type {
            DataType::Int8 => ArrayBuilderImpl::Int8(Int8Builder::with_capacity(cap)),
            DataType::Int16 => ArrayBuilderImpl::Int16(Int16Builder::with_capacity(cap)),
            DataType::Int32 => ArrayBuilderImpl::Int32(Int32Builder::with_capacity(cap)),
            DataType::Int64 => ArrayBuilderImpl::Int64(Int64Builder::with_capacity(cap)),
            DataType::Float32 => ArrayBuilderImpl::Float32(Float32Builder::with_capacity(cap)),
            DataType::Float64 => ArrayBuilderImpl::Float64(Float64Builder::with_capacity(cap)),
            DataType::Bool => ArrayBuilderImpl::Bool(BoolBuilder::with_capacity(cap)),
            DataType::Date32 => ArrayBuilderImpl::Date32(Int32Builder::with_capacity(cap)),
            DataType::Timestamp64 => ArrayBuilderImpl::Timestamp64(Int64Builder::with_capacity(cap)),
            DataType::Time32 => ArrayBuilderImpl::Time32(Int32Builder::with_capacity(cap)),
            DataType::Time64 => ArrayBuilderImpl::Time64(Int64Builder::with_capacity(cap)),
            DataType::Interval => ArrayBuilderImpl::Interval(Int64Builder::with_capacity(cap)),
            DataType::String => ArrayBuilderImpl::Utf8(Utf8Builder::with_capacity(cap)),
            DataType::Array(inner) => ArrayBuilderImpl::List(ListBuilder::new(inner.as_ref().clone())),
            DataType::NonNative => ArrayBuilderImpl::NonNative(NonNativeBuilder::with_capacity(cap)),
        }
    }

    /// Appends one [`ScalarValue`] — the row-at-a-time path both the
    /// expression evaluator's literal arrays and aggregate finalisation
    /// build output columns with.
    pub fn append_scalar(&mut self, value: &ScalarValue) {
        match (self, value) {
            (ArrayBuilderImpl::Int8(b), ScalarValue::Int8(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Int16(b), ScalarValue::Int16(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Int32(b), ScalarValue::Int32(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Int64(b), ScalarValue::Int64(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Float32(b), ScalarValue::Float32(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Float64(b), ScalarValue::Float64(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Bool(b), ScalarValue::Bool(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Date32(b), ScalarValue::Date32(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Timestamp64(b), ScalarValue::Timestamp64(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Time32(b), ScalarValue::Time32(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Time64(b), ScalarValue::Time64(v)) => b.append(Some(*v)),
            (ArrayBuilderImpl::Interval(b), ScalarValue::Interval(v)) => b.append(Some(v.nanos)),
            (ArrayBuilderImpl::Utf8(b), ScalarValue::String(v)) => b.append(Some(v.as_str())),
            (ArrayBuilderImpl::List(b), ScalarValue::Array(items)) => {
                let element_type = b.element_type.clone();
                let mut child = ArrayBuilderImpl::with_capacity(&element_type, items.len());
                for item in items {
                    child.append_scalar(item);
                }
                b.append(Some(child.finish()));
            }
            (ArrayBuilderImpl::List(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::NonNative(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::NonNative(b), other) => b.append(Some(format!("{other:?}"))),
            (ArrayBuilderImpl::Int8(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Int16(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Int32(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Int64(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Float32(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Float64(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Bool(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Date32(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Timestamp64(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Time32(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Time64(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Interval(b), ScalarValue::Null(_)) => b.append(None),
            (ArrayBuilderImpl::Utf8(b), ScalarValue::Null(_)) => b.append(None),
            _ => unreachable!("ScalarValue and ArrayBuilderImpl variant always agree"),
        }
    }

    pub fn finish(self) -> ArrayImpl {
        match self {
            ArrayBuilderImpl::Int8(b) => ArrayImpl::Int8(b.finish()),
            ArrayBuilderImpl::Int16(b) => ArrayImpl::Int16(b.finish()),
            ArrayBuilderImpl::Int32(b) => ArrayImpl::Int32(b.finish()),
            ArrayBuilderImpl::Int64(b) => ArrayImpl::Int64(b.finish()),
            ArrayBuilderImpl::Float32(b) => ArrayImpl::Float32(b.finish()),
            ArrayBuilderImpl::Float64(b) => ArrayImpl::Float64(b.finish()),
            ArrayBuilderImpl::Bool(b) => ArrayImpl::Bool(b.finish()),
            ArrayBuilderImpl::Date32(b) => ArrayImpl::Date32(b.finish()),
            ArrayBuilderImpl::Timestamp64(b) => ArrayImpl::Timestamp64(b.finish()),
            ArrayBuilderImpl::Time32(b) => ArrayImpl::Time32(b.finish()),
            ArrayBuilderImpl::Time64(b) => ArrayImpl::Time64(b.finish()),
            ArrayBuilderImpl::Interval(b) => ArrayImpl::Interval(b.finish()),
            ArrayBuilderImpl::Utf8(b) => ArrayImpl::Utf8(b.finish()),
            ArrayBuilderImpl::List(b) => ArrayImpl::List(b.finish()),
            ArrayBuilderImpl::NonNative(b) => ArrayImpl::NonNative(b.finish()),
        }
    }
}
