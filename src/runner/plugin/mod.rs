//! Host-facing side of the membrane: grants, configuration, imports and loading.
//!
//! ## Grants
//!
//! A guest can only do what a grant allows. Grants are attached to a host
//! class (and so to its subclasses) or to one particular instance, name a
//! member, and carry a set of capabilities:
//!
//! ```text
//! check_capability(subject, member, capability)
//!      ↓
//! 1. member ends in "__"?          → deny
//! 2. registry instance grant?      → use it
//! 3. grants attached at creation?  → use them
//! 4. class chain, nearest first    → use the first hit
//! 5. plain guest object?           → full rights over its own enumerable members
//! 6. otherwise                     → deny
//! ```
//!
//! The registry is filled in before any module is loaded and is read-only from
//! then on, so a check gives the same answer every time it is asked.
//!
//! ## Loading
//!
//! A [`ModuleLoader`](loader::ModuleLoader) links a
//! [`GuestModule`](types::GuestModule) against an
//! [`ImportTable`](imports::ImportTable) and runs it once in a fresh
//! [`ModuleContext`](types::ModuleContext). Exceptions escaping the body are
//! tamed and handed to the loader's single
//! [`UncaughtExceptionHandler`](loader::UncaughtExceptionHandler).
//!
//! ## Example
//!
//! ```
//! use membrane::runner::ds::object::HostObjectBuilder;
//! use membrane::runner::ds::value::Value;
//! use membrane::runner::plugin::capability::CapabilitySet;
//! use membrane::runner::plugin::imports::ImportSpec;
//! use membrane::runner::plugin::loader::ModuleLoader;
//! use membrane::runner::plugin::registry::{GrantRegistry, Subject};
//! use membrane::runner::plugin::types::{GuestModule, ModuleOutcome};
//!
//! let mut registry = GrantRegistry::new();
//! registry
//!     .grant(Subject::class("Widget"), "title", CapabilitySet::READ)
//!     .unwrap();
//! let loader = ModuleLoader::new(registry);
//!
//! let widget = HostObjectBuilder::new("Widget")
//!     .add_property("title", Value::str("Hello"))
//!     .build();
//!
//! let module = GuestModule::new("reader", |ctx, imports| {
//!     let w = imports.get("widget");
//!     Ok(ModuleOutcome::Value(ctx.read(&w, "title")?))
//! });
//! let loaded = loader
//!     .load_module(&module, vec![ImportSpec::new("widget", Value::Object(widget))])
//!     .unwrap();
//! assert_eq!(loaded.outcome, ModuleOutcome::Value(Value::str("Hello")));
//! ```

pub mod capability;
pub mod config;
pub mod imports;
pub mod loader;
pub mod registry;
pub mod types;

pub use capability::{Capability, CapabilitySet};
pub use config::MembraneConfig;
pub use imports::{ImportSpec, ImportTable};
pub use loader::{LoadedModule, LoggingExceptionHandler, ModuleLoader, UncaughtExceptionHandler};
pub use registry::{GrantRegistry, Subject};
pub use types::{GuestModule, ModuleContext, ModuleOutcome};
