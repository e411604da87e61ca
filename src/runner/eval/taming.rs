//! Exception boundary. Nothing raised outside guest code reaches a guest catch
//! site without passing through [`tame`].

use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::warn;

use crate::runner::ds::error::{HostException, MembraneError};
use crate::runner::ds::function_object::FunctionObject;
use crate::runner::ds::object::GuestObject;
use crate::runner::ds::object_property::is_reserved_name;
use crate::runner::ds::value::Value;
use crate::runner::plugin::types::ModuleContext;

pub const FIELD_NAME: &str = "name";
pub const FIELD_MESSAGE: &str = "message";

lazy_static! {
    /// Fields that describe where host code was executing. Never guest-visible.
    static ref STACK_INFO_FIELDS: HashSet<&'static str> = [
        "stack",
        "stacktrace",
        "fileName",
        "lineNumber",
        "columnNumber",
        "sourceURL",
        "line",
    ]
    .iter()
    .copied()
    .collect();
}

pub fn is_stack_info_field(name: &str) -> bool {
    STACK_INFO_FIELDS.contains(name)
}

/// Which custom exception fields survive taming, beyond `name` and `message`.
#[derive(Debug, Clone, Default)]
pub struct TamingPolicy {
    allowed_fields: IndexSet<String>,
}
impl TamingPolicy {
    pub fn new() -> Self {
        TamingPolicy {
            allowed_fields: IndexSet::new(),
        }
    }

    /// Stack information and reserved names are dropped from the allow-list.
    pub fn with_allowed_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed_fields = IndexSet::new();
        for field in fields {
            let field = field.into();
            if is_stack_info_field(&field) || is_reserved_name(&field) {
                warn!(%field, "field can never be guest-visible; ignored");
                continue;
            }
            if field == FIELD_NAME || field == FIELD_MESSAGE {
                continue;
            }
            allowed_fields.insert(field);
        }
        TamingPolicy { allowed_fields }
    }

    pub fn allows(&self, field: &str) -> bool {
        self.allowed_fields.contains(field)
    }

    pub fn allowed_fields(&self) -> impl Iterator<Item = &String> {
        self.allowed_fields.iter()
    }
}

/// Whether `value` is a record produced by taming.
pub fn is_tamed(value: &Value) -> bool {
    match value {
        Value::Object(o) => o.borrow().is_tamed(),
        Value::Function(f) => f.is_powerless(),
        _ => false,
    }
}

/// The guest-safe form of `error`. Taming a tamed value returns it unchanged.
pub fn tame(policy: &TamingPolicy, error: &MembraneError) -> Value {
    match error {
        MembraneError::Thrown(value) => tame_thrown(value),
        MembraneError::Host(ex) => tame_host(policy, ex),
        e => tame_membrane(e),
    }
}

fn tame_thrown(value: &Value) -> Value {
    match value {
        Value::Function(f) if !f.is_powerless() => {
            Value::Function(FunctionObject::powerless(&f.debug_name()))
        }
        v => v.clone(),
    }
}

fn tame_host(policy: &TamingPolicy, ex: &HostException) -> Value {
    if let Some(tamed) = ex.tamed_cache().borrow().as_ref() {
        return tamed.clone();
    }
    let mut entries = vec![
        (FIELD_NAME.to_string(), Value::str(ex.name())),
        (FIELD_MESSAGE.to_string(), Value::str(ex.message())),
    ];
    for (field, value) in ex.fields() {
        if policy.allows(field) {
            entries.push((field.clone(), tame_thrown(value)));
        }
    }
    let tamed = Value::Object(GuestObject::new_tamed_record(entries));
    *ex.tamed_cache().borrow_mut() = Some(tamed.clone());
    tamed
}

fn tame_membrane(error: &MembraneError) -> Value {
    let mut entries = vec![
        (FIELD_NAME.to_string(), Value::str(error.kind_name())),
        (FIELD_MESSAGE.to_string(), Value::str(error.to_string())),
    ];
    if let MembraneError::CapabilityDenied { capability, member } = error {
        entries.push(("capability".to_string(), Value::str(capability.name())));
        entries.push(("member".to_string(), Value::str(member.clone())));
    }
    Value::Object(GuestObject::new_tamed_record(entries))
}

/// Human-readable message of a tamed exception, for reports.
pub fn tamed_message(tamed: &Value) -> String {
    match tamed {
        Value::Object(o) => {
            let o = o.borrow();
            match o.get_own_value(FIELD_MESSAGE) {
                Some(m) => m.to_display_string(),
                None => o.to_string(),
            }
        }
        v => v.to_display_string(),
    }
}

/// How a guarded block ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CatchOutcome {
    Completed(Value),
    /// The block raised; this is the tamed exception the catch clause sees.
    Caught(Value),
}

/// Runs `body` as a guest `try` block. Errors the guest may not observe are
/// propagated untouched.
pub fn catch_guest<F>(ctx: &mut ModuleContext, body: F) -> Result<CatchOutcome, MembraneError>
where
    F: FnOnce(&mut ModuleContext) -> Result<Value, MembraneError>,
{
    match body(ctx) {
        Ok(v) => Ok(CatchOutcome::Completed(v)),
        Err(e) if e.is_guest_catchable() => Ok(CatchOutcome::Caught(tame(ctx.taming(), &e))),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::plugin::capability::Capability;

    #[test]
    fn test_primitives_pass_through() {
        let policy = TamingPolicy::new();
        let v = tame(&policy, &MembraneError::thrown("oops"));
        assert_eq!(v, Value::str("oops"));
    }

    #[test]
    fn test_host_exception_cached_and_stripped() {
        let policy = TamingPolicy::with_allowed_fields(vec!["code", "stack"]);
        assert!(!policy.allows("stack"));
        let err = HostException::new("IOError", "disk")
            .with_field("stack", Value::str("host.rs:10"))
            .with_field("code", Value::int(5))
            .into_error();
        let a = tame(&policy, &err);
        let b = tame(&policy, &err);
        assert_eq!(a, b);
        let o = a.as_object().unwrap().borrow();
        assert!(o.is_tamed());
        assert_eq!(o.get_own_value("code"), Some(Value::int(5)));
        assert_eq!(o.get_own_value("stack"), None);
    }

    #[test]
    fn test_denial_record_names_capability() {
        let v = tame(
            &TamingPolicy::new(),
            &MembraneError::denied(Capability::Write, "title"),
        );
        let o = v.as_object().unwrap().borrow();
        assert_eq!(o.get_own_value("name"), Some(Value::str("CapabilityDenied")));
        assert_eq!(o.get_own_value("member"), Some(Value::str("title")));
    }
}
