#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

extern crate alloc;

/// Error type shared by the fallible map and table operations.
pub mod error;

/// The byte-sequence hash and the `core::hash` adapters built on it.
pub mod hash;

mod group;

pub mod hash_map;

pub mod hash_table;

pub use error::Error;
pub use hash::FixedState;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_map::Node;
pub use hash_table::HashTable;
