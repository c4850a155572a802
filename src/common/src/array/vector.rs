//! The `Vector` primitive from spec.md §3.2: a dispatch enum
//! ([`ArrayImpl`]) over monomorphic arrays, one variant per semantic type.
//!
//! This is the "dynamic typing -> tagged variants" translation spec.md §9
//! calls for: hot loops match on `ArrayImpl` once and then work with a
//! concrete `PrimitiveArray<T>`/`BoolArray`/`Utf8Array`/`ListArray`, instead
//! of paying a dynamic dispatch per element the way the source's duck-typed
//! columns would.

use std::sync::Arc;

use crate::array::bitmap::Bitmap;
use crate::array::offsets::Offsets;
use crate::types::{DataType, ScalarValue};

/// A native fixed-width element type usable in [`PrimitiveArray`].
pub trait NativeType: Copy + PartialEq + PartialOrd + std::fmt::Debug + 'static {
    fn to_le_bytes_vec(self) -> Vec<u8>;
}

macro_rules! impl_native {
    ($($t:ty),*) => {
        $(impl NativeType for $t {
            fn to_le_bytes_vec(self) -> Vec<u8> { self.to_le_bytes().to_vec() }
        })*
    };
}
impl_native!(i8, i16, i32, i64, f32, f64);

#[derive(Clone, Debug)]
pub struct PrimitiveArray<T: NativeType> {
    data: Arc<Vec<T>>,
    validity: Bitmap,
    /// Slice offset into `data`/`validity`, per spec.md §3.2.
    offset: usize,
    len: usize,
}

impl<T: NativeType> PrimitiveArray<T> {
    pub fn new(data: Vec<T>, validity: Option<Bitmap>) -> Self {
        let len = data.len();
        Self {
            validity: validity.unwrap_or_else(|| Bitmap::all_valid(len)),
            data: Arc::new(data),
            offset: 0,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.is_valid(i)
    }

    #[inline]
    pub fn value(&self, i: usize) -> T {
        self.data[self.offset + i]
    }

    pub fn get(&self, i: usize) -> Option<T> {
        self.is_valid(i).then(|| self.value(i))
    }

    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    pub fn slice(&self, start: usize, len: usize) -> Self {
        assert!(start + len <= self.len);
        Self {
            data: self.data.clone(),
            validity: self.validity.slice(start, len),
            offset: self.offset + start,
            len,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        (0..self.len).map(|i| self.get(i))
    }
}

#[derive(Clone, Debug)]
pub struct BoolArray {
    data: Bitmap,
    validity: Bitmap,
}

impl BoolArray {
    pub fn new(values: Vec<bool>, validity: Option<Bitmap>) -> Self {
        let len = values.len();
        Self {
            data: Bitmap::from_bool_slice(&values),
            validity: validity.unwrap_or_else(|| Bitmap::all_valid(len)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.is_valid(i)
    }

    pub fn value(&self, i: usize) -> bool {
        self.data.is_valid(i)
    }

    pub fn get(&self, i: usize) -> Option<bool> {
        self.is_valid(i).then(|| self.value(i))
    }

    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    pub fn slice(&self, start: usize, len: usize) -> Self {
        Self { data: self.data.slice(start, len), validity: self.validity.slice(start, len) }
    }
}

#[derive(Clone, Debug)]
pub struct Utf8Array {
    data: Arc<Vec<u8>>,
    offsets: Offsets,
    validity: Bitmap,
    /// Element-index offset (not byte offset) into `offsets`.
    offset: usize,
    len: usize,
}

impl Utf8Array {
    pub fn new(values: Vec<&str>, validity: Option<Bitmap>) -> Self {
        let mut data = Vec::new();
        let offsets = Offsets::from_lengths(values.iter().map(|v| {
            data.extend_from_slice(v.as_bytes());
            v.len() as i32
        }));
        let len = values.len();
        Self {
            data: Arc::new(data),
            offsets,
            validity: validity.unwrap_or_else(|| Bitmap::all_valid(len)),
            offset: 0,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.is_valid(i)
    }

    #[inline]
    pub fn value(&self, i: usize) -> &str {
        let idx = self.offset + i;
        let start = self.offsets.start(idx) as usize;
        let end = self.offsets.end(idx) as usize;
        std::str::from_utf8(&self.data[start..end]).expect("non-utf8 string payload")
    }

    pub fn value_bytes(&self, i: usize) -> &[u8] {
        let idx = self.offset + i;
        let start = self.offsets.start(idx) as usize;
        let end = self.offsets.end(idx) as usize;
        &self.data[start..end]
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.is_valid(i).then(|| self.value(i))
    }

    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    pub fn slice(&self, start: usize, len: usize) -> Self {
        Self {
            data: self.data.clone(),
            offsets: self.offsets.clone(),
            validity: self.validity.slice(start, len),
            offset: self.offset + start,
            len,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.len).map(|i| self.get(i))
    }
}

/// `Array<T>`: a list-typed column. Elements are themselves `ArrayImpl`
/// slices into one shared child array (the standard nested-list layout).
#[derive(Clone, Debug)]
pub struct ListArray {
    pub child: Arc<ArrayImpl>,
    offsets: Offsets,
    validity: Bitmap,
    offset: usize,
    len: usize,
}

impl ListArray {
    pub fn new(child: ArrayImpl, offsets: Offsets, validity: Option<Bitmap>) -> Self {
        let len = offsets.len();
        Self {
            child: Arc::new(child),
            validity: validity.unwrap_or_else(|| Bitmap::all_valid(len)),
            offsets,
            offset: 0,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.is_valid(i)
    }

    /// The child-array slice backing element `i`, or `None` if the row is
    /// null.
    pub fn value(&self, i: usize) -> Option<ArrayImpl> {
        if !self.is_valid(i) {
            return None;
        }
        let idx = self.offset + i;
        let start = self.offsets.start(idx) as usize;
        let len = self.offsets.value_len(idx) as usize;
        Some(self.child.slice(start, len))
    }

    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    pub fn slice(&self, start: usize, len: usize) -> Self {
        Self {
            child: self.child.clone(),
            offsets: self.offsets.clone(),
            validity: self.validity.slice(start, len),
            offset: self.offset + start,
            len,
        }
    }
}

/// Opaque fallback for values this engine does not specialise, boxed as
/// `Any`-erased debug strings (sufficient for pass-through columns; no
/// arithmetic or comparison kernel ever touches this variant).
#[derive(Clone, Debug)]
pub struct NonNativeArray {
    values: Arc<Vec<Option<String>>>,
    offset: usize,
    len: usize,
}

impl NonNativeArray {
    pub fn new(values: Vec<Option<String>>) -> Self {
        let len = values.len();
        Self { values: Arc::new(values), offset: 0, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self, i: usize) -> bool {
        self.values[self.offset + i].is_some()
    }

    pub fn value(&self, i: usize) -> Option<&str> {
        self.values[self.offset + i].as_deref()
    }

    pub fn slice(&self, start: usize, len: usize) -> Self {
        Self { values: self.values.clone(), offset: self.offset + start, len }
    }
}

/// Dispatch enum over every concrete array kind; exactly the set of
/// semantic types listed in spec.md §3.2.
#[derive(Clone, Debug)]
pub enum ArrayImpl {
    Int8(PrimitiveArray<i8>),
    Int16(PrimitiveArray<i16>),
    Int32(PrimitiveArray<i32>),
    Int64(PrimitiveArray<i64>),
    Float32(PrimitiveArray<f32>),
    Float64(PrimitiveArray<f64>),
    Bool(BoolArray),
    Date32(PrimitiveArray<i32>),
    Timestamp64(PrimitiveArray<i64>),
    Time32(PrimitiveArray<i32>),
    Time64(PrimitiveArray<i64>),
    Interval(PrimitiveArray<i64>),
    Utf8(Utf8Array),
    List(ListArray),
    NonNative(NonNativeArray),
}

impl ArrayImpl {
    pub fn len(&self) -> usize {
        match self {
            ArrayImpl::Int8(a) => a.len(),
            ArrayImpl::Int16(a) => a.len(),
            ArrayImpl::Int32(a) => a.len(),
            ArrayImpl::Int64(a) => a.len(),
            ArrayImpl::Float32(a) => a.len(),
            ArrayImpl::Float64(a) => a.len(),
            ArrayImpl::Bool(a) => a.len(),
            ArrayImpl::Date32(a) => a.len(),
            ArrayImpl::Timestamp64(a) => a.len(),
            ArrayImpl::Time32(a) => a.len(),
            ArrayImpl::Time64(a) => a.len(),
            ArrayImpl::Interval(a) => a.len(),
            ArrayImpl::Utf8(a) => a.len(),
            ArrayImpl::List(a) => a.len(),
            ArrayImpl::NonNative(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_valid(&self, i: usize) -> bool {
        match self {
            ArrayImpl::Int8(a) => a.is_valid(i),
            ArrayImpl::Int16(a) => a.is_valid(i),
            ArrayImpl::Int32(a) => a.is_valid(i),
            ArrayImpl::Int64(a) => a.is_valid(i),
            ArrayImpl::Float32(a) => a.is_valid(i),
            ArrayImpl::Float64(a) => a.is_valid(i),
            ArrayImpl::Bool(a) => a.is_valid(i),
            ArrayImpl::Date32(a) => a.is_valid(i),
            ArrayImpl::Timestamp64(a) => a.is_valid(i),
            ArrayImpl::Time32(a) => a.is_valid(i),
            ArrayImpl::Time64(a) => a.is_valid(i),
            ArrayImpl::Interval(a) => a.is_valid(i),
            ArrayImpl::Utf8(a) => a.is_valid(i),
            ArrayImpl::List(a) => a.is_valid(i),
            ArrayImpl::NonNative(a) => a.is_valid(i),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| !self.is_valid(i)).count()
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ArrayImpl::Int8(_) => DataType::Int8,
            ArrayImpl::Int16(_) => DataType::Int16,
            ArrayImpl::Int32(_) => DataType::Int32,
            ArrayImpl::Int64(_) => DataType::Int64,
            ArrayImpl::Float32(_) => DataType::Float32,
            ArrayImpl::Float64(_) => DataType::Float64,
            ArrayImpl::Bool(_) => DataType::Bool,
            ArrayImpl::Date32(_) => DataType::Date32,
            ArrayImpl::Timestamp64(_) => DataType::Timestamp64,
            ArrayImpl::Time32(_) => DataType::Time32,
            ArrayImpl::Time64(_) => DataType::Time64,
            ArrayImpl::Interval(_) => DataType::Interval,
            ArrayImpl::Utf8(_) => DataType::String,
            ArrayImpl::List(a) => DataType::Array(Box::new(a.child.data_type())),
            ArrayImpl::NonNative(_) => DataType::NonNative,
        }
    }

    pub fn slice(&self, start: usize, len: usize) -> ArrayImpl {
        match self {
            ArrayImpl::Int8(a) => ArrayImpl::Int8(a.slice(start, len)),
            ArrayImpl::Int16(a) => ArrayImpl::Int16(a.slice(start, len)),
            ArrayImpl::Int32(a) => ArrayImpl::Int32(a.slice(start, len)),
            ArrayImpl::Int64(a) => ArrayImpl::Int64(a.slice(start, len)),
            ArrayImpl::Float32(a) => ArrayImpl::Float32(a.slice(start, len)),
            ArrayImpl::Float64(a) => ArrayImpl::Float64(a.slice(start, len)),
            ArrayImpl::Bool(a) => ArrayImpl::Bool(a.slice(start, len)),
            ArrayImpl::Date32(a) => ArrayImpl::Date32(a.slice(start, len)),
            ArrayImpl::Timestamp64(a) => ArrayImpl::Timestamp64(a.slice(start, len)),
            ArrayImpl::Time32(a) => ArrayImpl::Time32(a.slice(start, len)),
            ArrayImpl::Time64(a) => ArrayImpl::Time64(a.slice(start, len)),
            ArrayImpl::Interval(a) => ArrayImpl::Interval(a.slice(start, len)),
            ArrayImpl::Utf8(a) => ArrayImpl::Utf8(a.slice(start, len)),
            ArrayImpl::List(a) => ArrayImpl::List(a.slice(start, len)),
            ArrayImpl::NonNative(a) => ArrayImpl::NonNative(a.slice(start, len)),
        }
    }

    /// Gathers rows at `indices` into a new, compact array — the kernel
    /// every join/sort/distinct operator uses to materialise an output
    /// batch from a set of row indices.
    pub fn take(&self, indices: &[usize]) -> ArrayImpl {
        macro_rules! take_primitive {
            ($a:expr, $variant:ident) => {{
                let data: Vec<_> = indices.iter().map(|&i| $a.value(i)).collect();
                let valid: Vec<bool> = indices.iter().map(|&i| $a.is_valid(i)).collect();
                ArrayImpl::$variant(PrimitiveArray::new(data, Bitmap::from_bool_slice(&valid).into()))
            }};
        }
        match self {
            ArrayImpl::Int8(a) => take_primitive!(a, Int8),
            ArrayImpl::Int16(a) => take_primitive!(a, Int16),
            ArrayImpl::Int32(a) => take_primitive!(a, Int32),
            ArrayImpl::Int64(a) => take_primitive!(a, Int64),
            ArrayImpl::Float32(a) => take_primitive!(a, Float32),
            ArrayImpl::Float64(a) => take_primitive!(a, Float64),
            ArrayImpl::Date32(a) => take_primitive!(a, Date32),
            ArrayImpl::Timestamp64(a) => take_primitive!(a, Timestamp64),
            ArrayImpl::Time32(a) => take_primitive!(a, Time32),
            ArrayImpl::Time64(a) => take_primitive!(a, Time64),
            ArrayImpl::Interval(a) => take_primitive!(a, Interval),
            ArrayImpl::Bool(a) => {
                let values: Vec<bool> = indices.iter().map(|&i| a.value(i)).collect();
                let valid: Vec<bool> = indices.iter().map(|&i| a.is_valid(i)).collect();
                ArrayImpl::Bool(BoolArray::new(values, Bitmap::from_bool_slice(&valid).into()))
            }
            ArrayImpl::Utf8(a) => {
                let values: Vec<&str> = indices.iter().map(|&i| a.get(i).unwrap_or("")).collect();
                let valid: Vec<bool> = indices.iter().map(|&i| a.is_valid(i)).collect();
                ArrayImpl::Utf8(Utf8Array::new(values, Bitmap::from_bool_slice(&valid).into()))
            }
            ArrayImpl::List(a) => {
                // Row-by-row materialisation; lists are rare enough in join/sort
                // keys that a specialised gather kernel is not worth the
                // complexity (see DESIGN.md).
                let children: Vec<ArrayImpl> = indices
                    .iter()
                    .map(|&i| a.value(i).unwrap_or_else(|| a.child.slice(0, 0)))
                    .collect();
                let lengths: Vec<i32> = children.iter().map(|c| c.len() as i32).collect();
                let valid: Vec<bool> = indices.iter().map(|&i| a.is_valid(i)).collect();
                let merged = concat_arrays(&children);
                ArrayImpl::List(ListArray::new(
                    merged,
                    Offsets::from_lengths(lengths),
                    Bitmap::from_bool_slice(&valid).into(),
                ))
            }
            ArrayImpl::NonNative(a) => {
                let values: Vec<Option<String>> =
                    indices.iter().map(|&i| a.value(i).map(|s| s.to_string())).collect();
                ArrayImpl::NonNative(NonNativeArray::new(values))
            }
        }
    }

    /// Compares row `i` of `self` against row `j` of `other`, nulls sorting
    /// last regardless of direction (the caller flips the result for `DESC`).
    /// `self` and `other` are expected to share a variant — the Order and
    /// join-key executors only ever compare columns already unified by the
    /// planner's type coercion, so a variant mismatch falls back to `Equal`
    /// rather than panicking.
    pub fn cmp_at(&self, i: usize, other: &ArrayImpl, j: usize) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        let (left_valid, right_valid) = (self.is_valid(i), other.is_valid(j));
        if !left_valid || !right_valid {
            return match (left_valid, right_valid) {
                (false, false) => Ordering::Equal,
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (true, true) => unreachable!(),
            };
        }

        macro_rules! cmp_primitive {
            ($a:expr, $b:expr) => {
                $a.value(i).partial_cmp(&$b.value(j)).unwrap_or(Ordering::Equal)
            };
        }

        match (self, other) {
            (ArrayImpl::Int8(a), ArrayImpl::Int8(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Int16(a), ArrayImpl::Int16(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Int32(a), ArrayImpl::Int32(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Int64(a), ArrayImpl::Int64(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Float32(a), ArrayImpl::Float32(b)) => a.value(i).total_cmp(&b.value(j)),
            (ArrayImpl::Float64(a), ArrayImpl::Float64(b)) => a.value(i).total_cmp(&b.value(j)),
            (ArrayImpl::Date32(a), ArrayImpl::Date32(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Timestamp64(a), ArrayImpl::Timestamp64(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Time32(a), ArrayImpl::Time32(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Time64(a), ArrayImpl::Time64(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Interval(a), ArrayImpl::Interval(b)) => cmp_primitive!(a, b),
            (ArrayImpl::Bool(a), ArrayImpl::Bool(b)) => a.value(i).cmp(&b.value(j)),
            (ArrayImpl::Utf8(a), ArrayImpl::Utf8(b)) => a.value(i).cmp(b.value(j)),
            _ => Ordering::Equal,
        }
    }

    /// `true` if row `i` equals `scalar` — the element-wise check UNNEST's
    /// attached `IN (value_set)` filter and scalar `IN`-list evaluation use.
    /// A `NULL` scalar only matches a null cell, never equals anything else.
    pub fn scalar_eq_at(&self, i: usize, scalar: &ScalarValue) -> bool {
        if matches!(scalar, ScalarValue::Null(_)) {
            return !self.is_valid(i);
        }
        if !self.is_valid(i) {
            return false;
        }
        match (self, scalar) {
            (ArrayImpl::Int8(a), ScalarValue::Int8(v)) => a.value(i) == *v,
            (ArrayImpl::Int16(a), ScalarValue::Int16(v)) => a.value(i) == *v,
            (ArrayImpl::Int32(a), ScalarValue::Int32(v)) => a.value(i) == *v,
            (ArrayImpl::Int64(a), ScalarValue::Int64(v)) => a.value(i) == *v,
            (ArrayImpl::Float32(a), ScalarValue::Float32(v)) => a.value(i) == *v,
            (ArrayImpl::Float64(a), ScalarValue::Float64(v)) => a.value(i) == *v,
            (ArrayImpl::Bool(a), ScalarValue::Bool(v)) => a.value(i) == *v,
            (ArrayImpl::Date32(a), ScalarValue::Date32(v)) => a.value(i) == *v,
            (ArrayImpl::Timestamp64(a), ScalarValue::Timestamp64(v)) => a.value(i) == *v,
            (ArrayImpl::Time32(a), ScalarValue::Time32(v)) => a.value(i) == *v,
            (ArrayImpl::Time64(a), ScalarValue::Time64(v)) => a.value(i) == *v,
            (ArrayImpl::Utf8(a), ScalarValue::String(v)) => a.value(i) == v.as_str(),
            _ => false,
        }
    }
}

/// Concatenates same-typed arrays into one, used by [`ArrayImpl::take`] for
/// list children and by the UNION operator's fan-in.
pub fn concat_arrays(arrays: &[ArrayImpl]) -> ArrayImpl {
    assert!(!arrays.is_empty(), "concat_arrays requires at least one array");
    if arrays.len() == 1 {
        let len = arrays[0].len();
        return arrays[0].take(&(0..len).collect::<Vec<_>>());
    }

    macro_rules! concat_primitive {
        ($variant:ident) => {{
            let mut data = Vec::new();
            let mut valid = Vec::new();
            for a in arrays {
                let ArrayImpl::$variant(p) = a else { unreachable!("mixed array kinds in concat_arrays") };
                data.extend((0..p.len()).map(|i| p.value(i)));
                valid.extend((0..p.len()).map(|i| p.is_valid(i)));
            }
            ArrayImpl::$variant(PrimitiveArray::new(data, Bitmap::from_bool_slice(&valid).into()))
        }};
    }

    match &arrays[0] {
        ArrayImpl::Int8(_) => concat_primitive!(Int8),
        ArrayImpl::Int16(_) => concat_primitive!(Int16),
        ArrayImpl::Int32(_) => concat_primitive!(Int32),
        ArrayImpl::Int64(_) => concat_primitive!(Int64),
        ArrayImpl::Float32(_) => concat_primitive!(Float32),
        ArrayImpl::Float64(_) => concat_primitive!(Float64),
        ArrayImpl::Date32(_) => concat_primitive!(Date32),
        ArrayImpl::Timestamp64(_) => concat_primitive!(Timestamp64),
        ArrayImpl::Time32(_) => concat_primitive!(Time32),
        ArrayImpl::Time64(_) => concat_primitive!(Time64),
        ArrayImpl::Interval(_) => concat_primitive!(Interval),
        ArrayImpl::Bool(_) => {
            let mut values = Vec::new();
            let mut valid = Vec::new();
            for a in arrays {
                let ArrayImpl::Bool(b) = a else { unreachable!("mixed array kinds in concat_arrays") };
                values.extend((0..b.len()).map(|i| b.value(i)));
                valid.extend((0..b.len()).map(|i| b.is_valid(i)));
            }
            ArrayImpl::Bool(BoolArray::new(values, Bitmap::from_bool_slice(&valid).into()))
        }
        ArrayImpl::Utf8(_) => {
            let mut values = Vec::new();
            let mut valid = Vec::new();
            for a in arrays {
                let ArrayImpl::Utf8(u) = a else { unreachable!("mixed array kinds in concat_arrays") };
                values.extend((0..u.len()).map(|i| u.get(i).unwrap_or("")));
                valid.extend((0..u.len()).map(|i| u.is_valid(i)));
            }
            ArrayImpl::Utf8(Utf8Array::new(values, Bitmap::from_bool_slice(&valid).into()))
        }
        ArrayImpl::List(_) => {
            let mut children = Vec::new();
            let mut lengths = Vec::new();
            let mut valid = Vec::new();
            for a in arrays {
                let ArrayImpl::List(l) = a else { unreachable!("mixed array kinds in concat_arrays") };
                for i in 0..l.len() {
                    let elem = l.value(i).unwrap_or_else(|| l.child.slice(0, 0));
                    lengths.push(elem.len() as i32);
                    children.push(elem);
                    valid.push(l.is_valid(i));
                }
            }
            let merged = concat_arrays(&children);
            ArrayImpl::List(ListArray::new(
                merged,
                Offsets::from_lengths(lengths),
                Bitmap::from_bool_slice(&valid).into(),
            ))
        }
        ArrayImpl::NonNative(_) => {
            let mut values = Vec::new();
            for a in arrays {
                let ArrayImpl::NonNative(n) = a else { unreachable!("mixed array kinds in concat_arrays") };
                values.extend((0..n.len()).map(|i| n.value(i).map(|s| s.to_string())));
            }
            ArrayImpl::NonNative(NonNativeArray::new(values))
        }
    }
}
