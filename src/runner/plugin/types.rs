//! Core types shared by the loader and guest module bodies.

use std::rc::Rc;

use crate::runner::ds::env_record::OuterBindingStore;
use crate::runner::ds::error::MembraneError;
use crate::runner::ds::value::Value;
use crate::runner::emit::EmissionSandbox;
use crate::runner::eval::arguments;
use crate::runner::eval::invocation;
use crate::runner::eval::property;
use crate::runner::eval::taming;
use crate::runner::eval::taming::{CatchOutcome, TamingPolicy};
use crate::runner::plugin::imports::{ImportSpec, ImportTable};
use crate::runner::plugin::loader::{LoadedModule, ModuleLoader};
use crate::runner::plugin::registry::GrantRegistry;

/// Body of a guest module, as the rewriter would have produced it: every
/// cross-boundary operation goes through the context it is handed.
pub type ModuleBody =
    Rc<dyn Fn(&mut ModuleContext, &ImportTable) -> Result<ModuleOutcome, MembraneError>>;

/// What a module body produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleOutcome {
    Value(Value),
    /// The body produced nothing, or ended with an uncaught exception.
    NoResult,
}

/// An instantiable guest module. Loading it twice yields two independent instances.
#[derive(Clone)]
pub struct GuestModule {
    id: String,
    body: ModuleBody,
}
impl GuestModule {
    pub fn new<F>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ModuleContext, &ImportTable) -> Result<ModuleOutcome, MembraneError> + 'static,
    {
        GuestModule {
            id: id.into(),
            body: Rc::new(body),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn run(
        &self,
        ctx: &mut ModuleContext,
        imports: &ImportTable,
    ) -> Result<ModuleOutcome, MembraneError> {
        (self.body)(ctx, imports)
    }
}

/// Execution context of one module instance.
///
/// Owns the instance's outer bindings and emission sandbox; shares the grant
/// registry and taming policy with every other instance of the same loader.
pub struct ModuleContext {
    module_id: String,
    line: Option<u32>,
    loader: ModuleLoader,
    outers: OuterBindingStore,
    emission: EmissionSandbox,
}

impl ModuleContext {
    pub(crate) fn new(
        module_id: impl Into<String>,
        loader: ModuleLoader,
        outers: OuterBindingStore,
        emission: EmissionSandbox,
    ) -> Self {
        ModuleContext {
            module_id: module_id.into(),
            line: None,
            loader,
            outers,
            emission,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Records the source line the body is at, for uncaught exception reports.
    pub fn set_line(&mut self, line: u32) {
        self.line = Some(line);
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn registry(&self) -> &GrantRegistry {
        self.loader.registry()
    }

    pub fn taming(&self) -> &TamingPolicy {
        self.loader.taming()
    }

    pub fn outers(&self) -> &OuterBindingStore {
        &self.outers
    }

    pub fn outers_mut(&mut self) -> &mut OuterBindingStore {
        &mut self.outers
    }

    pub fn emission(&self) -> &EmissionSandbox {
        &self.emission
    }

    pub fn emission_mut(&mut self) -> &mut EmissionSandbox {
        &mut self.emission
    }

    pub(crate) fn into_emission(self) -> EmissionSandbox {
        self.emission
    }

    pub fn read(&self, subject: &Value, member: &str) -> Result<Value, MembraneError> {
        property::read(self.registry(), subject, member)
    }

    pub fn write(&self, subject: &Value, member: &str, value: Value) -> Result<(), MembraneError> {
        property::write(self.registry(), subject, member, value)
    }

    pub fn remove(&self, subject: &Value, member: &str) -> Result<bool, MembraneError> {
        property::remove(self.registry(), subject, member)
    }

    pub fn enumerate_own_keys(&self, subject: &Value) -> Result<Vec<String>, MembraneError> {
        property::enumerate_own_keys(self.registry(), subject)
    }

    /// Guest `member in subject`.
    pub fn has_in(&self, member: &str, subject: &Value) -> Result<bool, MembraneError> {
        property::has_capability_for_in(self.registry(), member, subject)
    }

    pub fn call_function(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, MembraneError> {
        invocation::call_function(self, callee, args)
    }

    pub fn call_method(
        &mut self,
        subject: &Value,
        member: &str,
        args: Vec<Value>,
    ) -> Result<Value, MembraneError> {
        invocation::call_method(self, subject, member, args)
    }

    pub fn construct(&mut self, ctor: &Value, args: Vec<Value>) -> Result<Value, MembraneError> {
        invocation::construct(self, ctor, args)
    }

    /// The guest `arguments` object for `args`.
    pub fn arguments(&self, args: &[Value]) -> Value {
        Value::Object(arguments::arguments_object(args))
    }

    pub fn tame(&self, error: &MembraneError) -> Value {
        taming::tame(self.taming(), error)
    }

    /// Guest `try { body } catch (e) { .. }`.
    pub fn catch_guest<F>(&mut self, body: F) -> Result<CatchOutcome, MembraneError>
    where
        F: FnOnce(&mut ModuleContext) -> Result<Value, MembraneError>,
    {
        taming::catch_guest(self, body)
    }

    /// Loads another module from inside this one. The nested instance gets its
    /// own import table, outer bindings and emission sandbox.
    pub fn load_module(
        &mut self,
        module: &GuestModule,
        imports: Vec<ImportSpec>,
    ) -> Result<LoadedModule, MembraneError> {
        let loader = self.loader.clone();
        loader.load_module(module, imports)
    }
}
