//! rubricon-store — Typed persistence for rubricon entities.
//!
//! An in-process store with the uniqueness rules the rest of the system
//! leans on, plus JSON snapshot persistence.

pub mod error;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use store::{Store, Upserted};
