//! Mediators for guest operations.
//!
//! Property access, invocation, function guarding and exception taming. Each
//! consults the grant registry before it touches a value.

pub mod arguments;
pub mod guardian;
pub mod invocation;
pub mod property;
pub mod taming;

pub use taming::{CatchOutcome, TamingPolicy};
