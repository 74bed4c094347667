//! JSON-RPC protocol definitions for the user-management service
//!
//! This crate defines the JSON-RPC 2.0 envelope, the method names and their
//! request/response shapes, the wire form of a user record, and the
//! conversions between the wire form and [`entities::User`].

mod convert;
mod error;
mod methods;
mod types;

pub use convert::*;
pub use error::*;
pub use methods::*;
pub use types::*;
