//! The membrane runtime.
//!
//! - [`ds`] holds the guest-visible data model: values, objects, function
//!   wrappers, outer bindings and errors.
//! - [`plugin`] is the host-facing side: grants, configuration, import tables
//!   and the module loader.
//! - [`eval`] holds the mediators every guest operation passes through.
//! - [`emit`] is the scoped markup and style emission sandbox.

pub mod ds;
pub mod emit;
pub mod eval;
pub mod plugin;
