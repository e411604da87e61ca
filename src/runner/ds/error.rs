use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::runner::ds::value::Value;
use crate::runner::plugin::capability::Capability;

pub type MembraneResult<T> = Result<T, MembraneError>;

#[derive(Debug, Clone, Error)]
pub enum MembraneError {
    #[error("capability '{capability}' denied for member '{member}'")]
    CapabilityDenied {
        capability: Capability,
        member: String,
    },

    #[error("'{0}' is not defined")]
    UnboundName(String),

    #[error("'{0}' is a host-owned binding and cannot be assigned")]
    ImmutableBinding(String),

    #[error("'{0}' is immutable")]
    ImmutableField(String),

    #[error("structural violation: {0}")]
    StructuralViolation(String),

    #[error("uncaught exception in module '{module_id}'{}: {message}", .line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    UncaughtGuestException {
        module_id: String,
        line: Option<u32>,
        message: String,
    },

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("'{0}' is not a constructor")]
    NotConstructor(String),

    #[error("cannot access member '{member}' of {kind}")]
    NotAnObject { member: String, kind: String },

    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("invalid import '{name}': {reason}")]
    InvalidImport { name: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// A value thrown by guest code, or an already tamed exception.
    #[error("thrown {0}")]
    Thrown(Value),

    /// A raw exception raised by host code. Must be tamed before guest code sees it.
    #[error("host exception {}: {}", .0.name(), .0.message())]
    Host(Rc<HostException>),
}
impl MembraneError {
    pub fn denied(capability: Capability, member: impl Into<String>) -> Self {
        MembraneError::CapabilityDenied {
            capability,
            member: member.into(),
        }
    }

    pub fn structural(reason: impl Into<String>) -> Self {
        MembraneError::StructuralViolation(reason.into())
    }

    pub fn thrown(value: impl Into<Value>) -> Self {
        MembraneError::Thrown(value.into())
    }

    /// Name of the error kind as guest code sees it after taming.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MembraneError::CapabilityDenied { .. } => "CapabilityDenied",
            MembraneError::UnboundName(_) => "UnboundName",
            MembraneError::ImmutableBinding(_) => "ImmutableBinding",
            MembraneError::ImmutableField(_) => "ImmutableField",
            MembraneError::StructuralViolation(_) => "StructuralViolation",
            MembraneError::UncaughtGuestException { .. } => "UncaughtGuestException",
            MembraneError::NotCallable(_)
            | MembraneError::NotConstructor(_)
            | MembraneError::NotAnObject { .. } => "TypeError",
            MembraneError::InvalidGrant(_) => "InvalidGrant",
            MembraneError::InvalidImport { .. } => "InvalidImport",
            MembraneError::Config(_) => "ConfigError",
            MembraneError::Thrown(_) => "Thrown",
            MembraneError::Host(_) => "HostException",
        }
    }

    /// Whether a guest catch site may observe this error.
    ///
    /// Structural violations mean the runtime contract itself was broken; they
    /// abort the module instead of being handed to guest fallback logic.
    pub fn is_guest_catchable(&self) -> bool {
        !matches!(
            self,
            MembraneError::StructuralViolation(_)
                | MembraneError::UncaughtGuestException { .. }
                | MembraneError::Config(_)
        )
    }
}

/// A raw host-side exception, with whatever diagnostic fields the host attached.
#[derive(Debug)]
pub struct HostException {
    name: String,
    message: String,
    fields: IndexMap<String, Value>,
    tamed: RefCell<Option<Value>>,
}
impl HostException {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        HostException {
            name: name.into(),
            message: message.into(),
            fields: IndexMap::new(),
            tamed: RefCell::new(None),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn into_error(self) -> MembraneError {
        MembraneError::Host(Rc::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub(crate) fn tamed_cache(&self) -> &RefCell<Option<Value>> {
        &self.tamed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_violation_is_not_catchable() {
        assert!(!MembraneError::structural("x").is_guest_catchable());
        assert!(MembraneError::denied(Capability::Write, "x").is_guest_catchable());
        assert!(MembraneError::UnboundName("x".to_string()).is_guest_catchable());
    }

    #[test]
    fn test_messages_name_the_capability() {
        let e = MembraneError::denied(Capability::Call, "bar");
        assert_eq!(e.to_string(), "capability 'call' denied for member 'bar'");
        let e = MembraneError::UncaughtGuestException {
            module_id: "m".to_string(),
            line: Some(3),
            message: "boom".to_string(),
        };
        assert_eq!(e.to_string(), "uncaught exception in module 'm' at line 3: boom");
    }

    #[test]
    fn test_host_exception_keeps_fields() {
        let e = HostException::new("TypeError", "bad")
            .with_field("stack", Value::str("at host.rs:1"));
        assert_eq!(e.fields().len(), 1);
        assert_eq!(e.name(), "TypeError");
        assert!(matches!(e.into_error(), MembraneError::Host(_)));
    }
}
