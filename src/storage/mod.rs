//! Storage implementations of the query service contract

pub mod in_memory;

pub use in_memory::{InMemoryBackend, InMemoryStore, Row, RowPredicate};
