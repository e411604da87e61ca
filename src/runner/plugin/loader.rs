//! Module loader: links a guest module against its import table and runs it
//! once inside a fresh context.
//!
//! ```text
//! load_module(module, imports)
//!      ↓
//! 1. Build the import table          → InvalidImport, body never runs
//! 2. Fresh ModuleContext             (outer bindings + sandbox + token)
//! 3. Run the body once
//! 4. Escaping error?                 → tame, report to the handler, NoResult
//! 5. Release emission output         unless the sandbox was aborted
//! ```

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::runner::ds::env_record::OuterBindingStore;
use crate::runner::ds::error::MembraneError;
use crate::runner::ds::value::Value;
use crate::runner::emit::token::{ScopingToken, DEFAULT_TOKEN_PREFIX};
use crate::runner::emit::{EmissionOutput, EmissionSandbox};
use crate::runner::eval::taming::{tame, tamed_message, TamingPolicy};
use crate::runner::plugin::imports::{ImportSpec, ImportTable};
use crate::runner::plugin::registry::GrantRegistry;
use crate::runner::plugin::types::{GuestModule, ModuleContext, ModuleOutcome};

/// Receives every exception that escapes a module body, already tamed.
pub trait UncaughtExceptionHandler {
    fn handle(&self, exception: &Value, module_id: &str, source_line: Option<u32>);
}

/// Default handler: one `module:line: message` log line per exception.
pub struct LoggingExceptionHandler;

impl UncaughtExceptionHandler for LoggingExceptionHandler {
    fn handle(&self, exception: &Value, module_id: &str, source_line: Option<u32>) {
        let line = source_line
            .map(|l| l.to_string())
            .unwrap_or_else(|| "?".to_string());
        error!("{}:{}: {}", module_id, line, tamed_message(exception));
    }
}

/// An exception that ended a module instance.
#[derive(Debug, Clone)]
pub struct UncaughtReport {
    pub exception: Value,
    pub line: Option<u32>,
}

pub struct LoadedModule {
    pub module_id: String,
    pub outcome: ModuleOutcome,
    /// `None` when emission was aborted by a structural violation.
    pub output: Option<EmissionOutput>,
    pub uncaught: Option<UncaughtReport>,
}
impl LoadedModule {
    /// The module's value, or the uncaught exception that ended it.
    pub fn into_result(self) -> Result<ModuleOutcome, MembraneError> {
        match self.uncaught {
            Some(report) => Err(MembraneError::UncaughtGuestException {
                module_id: self.module_id,
                line: report.line,
                message: tamed_message(&report.exception),
            }),
            None => Ok(self.outcome),
        }
    }
}

struct LoaderInner {
    registry: Rc<GrantRegistry>,
    taming: TamingPolicy,
    handler: Rc<dyn UncaughtExceptionHandler>,
    host_bindings: IndexMap<String, Value>,
    token_prefix: String,
}

/// Loads guest modules. Cheap to clone; clones share registry, policy and handler.
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Rc<LoaderInner>,
}

impl ModuleLoader {
    pub fn new(registry: GrantRegistry) -> Self {
        ModuleLoader {
            inner: Rc::new(LoaderInner {
                registry: Rc::new(registry),
                taming: TamingPolicy::new(),
                handler: Rc::new(LoggingExceptionHandler),
                host_bindings: IndexMap::new(),
                token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            }),
        }
    }

    pub fn builder(registry: GrantRegistry) -> ModuleLoaderBuilder {
        ModuleLoaderBuilder::new(registry)
    }

    pub fn registry(&self) -> &GrantRegistry {
        &self.inner.registry
    }

    pub fn shared_registry(&self) -> Rc<GrantRegistry> {
        self.inner.registry.clone()
    }

    pub fn taming(&self) -> &TamingPolicy {
        &self.inner.taming
    }

    pub fn token_prefix(&self) -> &str {
        &self.inner.token_prefix
    }

    /// A fresh context outside any load, for host tooling that drives the
    /// membrane directly.
    pub fn new_context(&self, module_id: &str) -> Result<ModuleContext, MembraneError> {
        let token = ScopingToken::generate(&self.inner.token_prefix)?;
        let outers = OuterBindingStore::with_host_bindings(self.inner.host_bindings.clone());
        Ok(ModuleContext::new(
            module_id,
            self.clone(),
            outers,
            EmissionSandbox::new(token),
        ))
    }

    pub fn load_module(
        &self,
        module: &GuestModule,
        imports: Vec<ImportSpec>,
    ) -> Result<LoadedModule, MembraneError> {
        let table = ImportTable::build(imports)?;
        let mut ctx = self.new_context(module.id())?;
        debug!(
            module = module.id(),
            token = %ctx.emission().scoping_token(),
            imports = table.len(),
            "loading module"
        );

        let result = module.run(&mut ctx, &table);

        let line = ctx.line();
        let mut sandbox = ctx.into_emission();
        let (outcome, uncaught) = match result {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                if let MembraneError::StructuralViolation(reason) = &e {
                    sandbox.abort(reason.clone());
                }
                let exception = tame(&self.inner.taming, &e);
                self.inner.handler.handle(&exception, module.id(), line);
                (ModuleOutcome::NoResult, Some(UncaughtReport { exception, line }))
            }
        };
        let output = match sandbox.finish() {
            Ok(output) => Some(output),
            Err(e) => {
                error!(module = module.id(), error = %e, "emission output withheld");
                None
            }
        };
        Ok(LoadedModule {
            module_id: module.id().to_string(),
            outcome,
            output,
            uncaught,
        })
    }
}

pub struct ModuleLoaderBuilder {
    registry: GrantRegistry,
    taming: TamingPolicy,
    handler: Rc<dyn UncaughtExceptionHandler>,
    host_bindings: IndexMap<String, Value>,
    token_prefix: String,
}

impl ModuleLoaderBuilder {
    pub fn new(registry: GrantRegistry) -> Self {
        ModuleLoaderBuilder {
            registry,
            taming: TamingPolicy::new(),
            handler: Rc::new(LoggingExceptionHandler),
            host_bindings: IndexMap::new(),
            token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
        }
    }

    pub fn taming(mut self, taming: TamingPolicy) -> Self {
        self.taming = taming;
        self
    }

    pub fn handler(mut self, handler: Rc<dyn UncaughtExceptionHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn host_binding(mut self, name: impl Into<String>, value: Value) -> Self {
        self.host_bindings.insert(name.into(), value);
        self
    }

    pub fn host_bindings(mut self, bindings: IndexMap<String, Value>) -> Self {
        self.host_bindings.extend(bindings);
        self
    }

    pub fn token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.token_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<ModuleLoader, MembraneError> {
        // Fails early on a prefix that cannot form a CSS identifier.
        ScopingToken::generate(&self.token_prefix)?;
        Ok(ModuleLoader {
            inner: Rc::new(LoaderInner {
                registry: Rc::new(self.registry),
                taming: self.taming,
                handler: self.handler,
                host_bindings: self.host_bindings,
                token_prefix: self.token_prefix,
            }),
        })
    }
}
