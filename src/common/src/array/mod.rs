//! Columnar primitives: the validity bitmap, the variable-length offsets
//! buffer, the per-type `Vector` dispatch enum, and the `Morsel` batch built
//! from them (spec.md §3).

pub mod arrow_interop;
pub mod bitmap;
pub mod builder;
pub mod morsel;
pub mod offsets;
pub mod vector;

pub use arrow_interop::{from_arrow, to_arrow};
pub use bitmap::{Bitmap, BitmapBuilder};
pub use builder::{ArrayBuilderImpl, empty_array};
pub use morsel::Morsel;
pub use offsets::Offsets;
pub use vector::{ArrayImpl, BoolArray, ListArray, NativeType, NonNativeArray, PrimitiveArray, Utf8Array, concat_arrays};
