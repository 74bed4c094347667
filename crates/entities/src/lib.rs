//! Core entity definitions for the user-management service.
//!
//! The service manages a single entity, [`User`]. Every layer (storage,
//! manager, transport, client) passes it around by value.

mod user;

pub use user::*;
