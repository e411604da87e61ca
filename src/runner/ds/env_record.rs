use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Undeclared,
    DeclaredMutable,
    /// Supplied by the host when the store was created; guest code can read it only.
    HostOwned,
}

/// Outer (module-level) bindings of one module instance.
///
/// Host-owned bindings are fixed when the store is created. Guest bindings come
/// into existence through `init_outer` or an assignment, and are held behind a
/// shared cell so that trusted tooling can watch them through a snapshot.
pub struct OuterBindingStore {
    host_owned: IndexMap<String, Value>,
    declared: Rc<RefCell<IndexMap<String, Value>>>,
}
impl OuterBindingStore {
    pub fn new() -> Self {
        OuterBindingStore {
            host_owned: IndexMap::new(),
            declared: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    pub fn with_host_bindings(host_owned: IndexMap<String, Value>) -> Self {
        OuterBindingStore {
            host_owned,
            declared: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    pub fn state(&self, name: &str) -> BindingState {
        if self.host_owned.contains_key(name) {
            BindingState::HostOwned
        } else if self.declared.borrow().contains_key(name) {
            BindingState::DeclaredMutable
        } else {
            BindingState::Undeclared
        }
    }

    /// `typeof`-style guard: never fails.
    pub fn is_declared(&self, name: &str) -> bool {
        self.state(name) != BindingState::Undeclared
    }

    /// Declares `name` as a guest binding holding `undefined`. Declaring twice is
    /// harmless; declaring over a host-owned binding is not.
    pub fn init_outer(&mut self, name: &str) -> Result<(), MembraneError> {
        match self.state(name) {
            BindingState::HostOwned => Err(MembraneError::ImmutableBinding(name.to_string())),
            BindingState::DeclaredMutable => Ok(()),
            BindingState::Undeclared => {
                debug!(name, "outer binding declared");
                self.declared
                    .borrow_mut()
                    .insert(name.to_string(), Value::Undefined);
                Ok(())
            }
        }
    }

    pub fn read(&self, name: &str) -> Result<Value, MembraneError> {
        if let Some(v) = self.host_owned.get(name) {
            return Ok(v.clone());
        }
        self.declared
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| MembraneError::UnboundName(name.to_string()))
    }

    /// Assigns `name`, declaring it first if needed.
    pub fn write(&mut self, name: &str, value: Value) -> Result<(), MembraneError> {
        if self.host_owned.contains_key(name) {
            return Err(MembraneError::ImmutableBinding(name.to_string()));
        }
        let mut declared = self.declared.borrow_mut();
        if !declared.contains_key(name) {
            debug!(name, "outer binding declared by assignment");
        }
        declared.insert(name.to_string(), value);
        Ok(())
    }

    pub fn host_binding_names(&self) -> impl Iterator<Item = &String> {
        self.host_owned.keys()
    }

    /// Live, read-only view of the guest-declared bindings.
    pub fn snapshot(&self) -> OuterSnapshot {
        OuterSnapshot {
            bindings: self.declared.clone(),
        }
    }
}
impl Default for OuterBindingStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only window onto a module's declared outer bindings. Reflects later
/// writes; offers no way to make one.
#[derive(Clone)]
pub struct OuterSnapshot {
    bindings: Rc<RefCell<IndexMap<String, Value>>>,
}
impl OuterSnapshot {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}
