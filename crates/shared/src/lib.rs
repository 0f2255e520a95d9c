//! ProLink Shared Types and Utilities
//!
//! This crate contains the wire types, errors, and durable storage shared
//! across the ProLink client crates.

pub mod error;
pub mod store;
pub mod types;

pub use error::*;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::*;
