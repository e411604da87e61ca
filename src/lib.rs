//! # membrane - object-capability execution membrane
//!
//! A runtime layer that sits between untrusted guest code and its host and
//! mediates every interaction across the boundary:
//! - property reads, writes, deletes and enumeration
//! - function calls, method calls and construction
//! - exceptions thrown in either direction
//! - module-level ("outer") bindings
//! - document output, through a scoped markup/style emission sandbox
//!
//! Guest code only ever exercises capabilities it was granted. Guest modules
//! are Rust closures that perform every cross-boundary operation through the
//! [`ModuleContext`](runner::plugin::types::ModuleContext) they are handed, the
//! same calls a source-to-source rewriter would insert.
//!
//! ## Quick Start
//!
//! ```
//! use membrane::runner::ds::object::HostObjectBuilder;
//! use membrane::runner::ds::value::Value;
//! use membrane::runner::ds::error::MembraneError;
//! use membrane::runner::plugin::capability::{Capability, CapabilitySet};
//! use membrane::runner::plugin::imports::ImportSpec;
//! use membrane::runner::plugin::loader::ModuleLoader;
//! use membrane::runner::plugin::registry::{GrantRegistry, Subject};
//! use membrane::runner::plugin::types::{GuestModule, ModuleOutcome};
//!
//! let mut registry = GrantRegistry::new();
//! registry
//!     .grant(Subject::class("Document"), "title", CapabilitySet::READ)
//!     .unwrap();
//! let loader = ModuleLoader::new(registry);
//!
//! let document = HostObjectBuilder::new("Document")
//!     .add_property("title", Value::str("Inbox"))
//!     .build();
//!
//! // Reading is granted, writing is not.
//! let module = GuestModule::new("main", |ctx, imports| {
//!     let doc = imports.get("document");
//!     let denied = ctx.write(&doc, "title", Value::str("pwned"));
//!     assert!(matches!(
//!         denied,
//!         Err(MembraneError::CapabilityDenied { capability: Capability::Write, .. })
//!     ));
//!     Ok(ModuleOutcome::Value(ctx.read(&doc, "title")?))
//! });
//! let loaded = loader
//!     .load_module(&module, vec![ImportSpec::new("document", Value::Object(document))])
//!     .unwrap();
//! assert_eq!(loaded.outcome, ModuleOutcome::Value(Value::str("Inbox")));
//! ```
//!
//! ## Scoped Emission
//!
//! Each module instance gets a fresh scoping token. Ids in its markup and every
//! selector in its stylesheet are tied to that token, so output from two
//! modules can share one document without interfering:
//!
//! ```
//! use membrane::runner::plugin::loader::ModuleLoader;
//! use membrane::runner::plugin::registry::GrantRegistry;
//! use membrane::runner::plugin::types::{GuestModule, ModuleOutcome};
//!
//! let loader = ModuleLoader::new(GrantRegistry::new());
//! let module = GuestModule::new("card", |ctx, _| {
//!     let sandbox = ctx.emission_mut();
//!     sandbox.begin_tag("p")?;
//!     sandbox.scoped_id_attribute("intro")?;
//!     sandbox.finish_open_tag(false)?;
//!     sandbox.text("hello")?;
//!     sandbox.end_tag("p")?;
//!     sandbox.emit_style_rules(&[".", " p { color: red }"])?;
//!     Ok(ModuleOutcome::NoResult)
//! });
//! let loaded = loader.load_module(&module, vec![]).unwrap();
//! let output = loaded.output.unwrap();
//! assert!(output.markup.as_str().starts_with("<p id=\"intro-"));
//! assert!(output.stylesheet.contains(output.token.as_str()));
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - pest grammar for emitted stylesheets and markup names
//! - **[`runner`]** - the membrane runtime
//!   - **[`runner::ds`]** - values, objects, function wrappers, outer bindings, errors
//!   - **[`runner::plugin`]** - grant registry, configuration, import tables, module loader
//!   - **[`runner::eval`]** - property and invocation mediators, function guardian, taming
//!   - **[`runner::emit`]** - markup builder, style scoper, scoping tokens

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;
