//! Remote store access.
//!
//! The engine only talks to the store through the `SqlStore` trait, so
//! tests and offline tools can substitute a recorded store.

pub mod cartodb;

pub use cartodb::{execute, CartoDbClient, ExportEndpoint, SqlStore, StoreResponse};
