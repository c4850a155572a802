//! Row hashing and the open-addressed hash containers built on it
//! (spec.md §4.5).

pub mod flat_map;
pub mod row_hash;

pub use flat_map::{FlatHashMap, FlatHashSet};
pub use row_hash::{hash_row, hash_rows, null_avoidant_indices, row_has_null};
