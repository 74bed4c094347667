//! User storage for the user-management service
//!
//! This crate provides the storage abstraction for user records. It ships an
//! in-memory backend (for tests and single-process mode) and relational
//! backends for PostgreSQL and SQLite.

mod context;
mod error;
mod memory;
mod sql;
mod store;

pub use context::*;
pub use error::*;
pub use memory::*;
pub use sql::*;
pub use store::*;
