//! Mediated property access: read, write, remove, enumerate and `in`.
//!
//! Every operation asks the grant registry first. Immutability (frozen objects,
//! fixed slots) is enforced afterwards and independently of grants.

use std::rc::Rc;

use tracing::warn;

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::object::{ObjectBase, ObjectOrigin};
use crate::runner::ds::object_property::is_reserved_name;
use crate::runner::ds::value::Value;
use crate::runner::plugin::capability::Capability;
use crate::runner::plugin::registry::GrantRegistry;

/// Members can only be looked up on objects and functions; other primitives are
/// merely denied, but `undefined` and `null` are a type error.
pub(crate) fn require_object(subject: &Value, member: &str) -> Result<(), MembraneError> {
    match subject {
        Value::Undefined | Value::Null | Value::Missing => Err(MembraneError::NotAnObject {
            member: member.to_string(),
            kind: subject.type_name().to_string(),
        }),
        _ => Ok(()),
    }
}

fn require(
    registry: &GrantRegistry,
    subject: &Value,
    member: &str,
    capability: Capability,
) -> Result<(), MembraneError> {
    if registry.check_capability(subject, member, capability) {
        Ok(())
    } else {
        warn!(member, %capability, subject = subject.type_name(), "capability denied");
        Err(MembraneError::denied(capability, member))
    }
}

/// The value a view ultimately stands for; any other value is its own target.
pub(crate) fn resolve_target(subject: &Value) -> Value {
    let target = match subject {
        Value::Object(o) => match o.borrow().origin() {
            ObjectOrigin::View { target, .. } => Some(target.clone()),
            _ => None,
        },
        _ => None,
    };
    match target {
        Some(t) => resolve_target(&t),
        None => subject.clone(),
    }
}

/// Unmediated own-property lookup, through views.
pub(crate) fn lookup_own(subject: &Value, member: &str) -> Option<Value> {
    match resolve_target(subject) {
        Value::Object(o) => o.borrow().get_own_value(member),
        Value::Function(f) => f
            .base()
            .borrow()
            .get_own(member)
            .map(|slot| slot.value.clone()),
        _ => None,
    }
}

pub fn read(registry: &GrantRegistry, subject: &Value, member: &str) -> Result<Value, MembraneError> {
    require_object(subject, member)?;
    require(registry, subject, member, Capability::Read)?;
    let value = lookup_own(subject, member).unwrap_or(Value::Missing);
    Ok(rewrap_target(subject, value))
}

/// Hands `subject` back in place of `value` when `subject` is a view and
/// `value` is the view's own target, so a restricted view never yields the
/// unrestricted value behind it.
pub(crate) fn rewrap_target(subject: &Value, value: Value) -> Value {
    let is_view = match subject {
        Value::Object(o) => o.borrow().is_view(),
        _ => false,
    };
    if !is_view {
        return value;
    }
    let target = resolve_target(subject);
    let same = match (&value, &target) {
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        _ => false,
    };
    if same {
        subject.clone()
    } else {
        value
    }
}

pub fn write(
    registry: &GrantRegistry,
    subject: &Value,
    member: &str,
    value: Value,
) -> Result<(), MembraneError> {
    require_object(subject, member)?;
    require(registry, subject, member, Capability::Write)?;
    match resolve_target(subject) {
        Value::Object(o) => {
            let mut o = o.borrow_mut();
            let base = o.base_mut();
            if base.is_frozen() || base.get_own(member).map(|s| s.fixed).unwrap_or(false) {
                return Err(MembraneError::ImmutableField(member.to_string()));
            }
            base.set_value(member, value);
            Ok(())
        }
        Value::Function(f) => {
            let mut base = f.base().borrow_mut();
            if base.is_frozen() || base.get_own(member).map(|s| s.fixed).unwrap_or(false) {
                return Err(MembraneError::ImmutableField(member.to_string()));
            }
            base.set_value(member, value);
            Ok(())
        }
        _ => Err(MembraneError::denied(Capability::Write, member)),
    }
}

/// Deletes `member`; returns whether anything was removed.
pub fn remove(registry: &GrantRegistry, subject: &Value, member: &str) -> Result<bool, MembraneError> {
    require_object(subject, member)?;
    require(registry, subject, member, Capability::Delete)?;
    match resolve_target(subject) {
        Value::Object(o) => {
            let mut o = o.borrow_mut();
            remove_from(o.base_mut(), member)
        }
        Value::Function(f) => {
            let mut base = f.base().borrow_mut();
            remove_from(&mut base, member)
        }
        _ => Err(MembraneError::denied(Capability::Delete, member)),
    }
}

fn remove_from(base: &mut ObjectBase, member: &str) -> Result<bool, MembraneError> {
    let fixed = match base.get_own(member) {
        None => return Ok(false),
        Some(slot) => slot.fixed,
    };
    if fixed || base.is_frozen() {
        return Err(MembraneError::ImmutableField(member.to_string()));
    }
    Ok(base.remove(member).is_some())
}

/// Own enumerable members the guest is allowed to enumerate, in insertion order.
pub fn enumerate_own_keys(registry: &GrantRegistry, subject: &Value) -> Result<Vec<String>, MembraneError> {
    require_object(subject, "")?;
    let candidates: Vec<String> = match resolve_target(subject) {
        Value::Object(o) => {
            let o = o.borrow();
            let base = o.base();
            base.keys()
                .filter(|k| base.get_own(k).map(|s| s.enumerable).unwrap_or(false))
                .cloned()
                .collect()
        }
        Value::Function(f) => {
            let base = f.base().borrow();
            base.keys()
                .filter(|k| base.get_own(k).map(|s| s.enumerable).unwrap_or(false))
                .cloned()
                .collect()
        }
        _ => Vec::new(),
    };
    Ok(candidates
        .into_iter()
        .filter(|k| !is_reserved_name(k))
        .filter(|k| registry.check_capability(subject, k, Capability::Enumerate))
        .collect())
}

/// Guest `member in subject`: true when the member exists and is readable or
/// callable. Enumerate grants play no part.
pub fn has_capability_for_in(
    registry: &GrantRegistry,
    member: &str,
    subject: &Value,
) -> Result<bool, MembraneError> {
    require_object(subject, member)?;
    let granted = registry.check_capability(subject, member, Capability::Read)
        || registry.check_capability(subject, member, Capability::Call);
    Ok(granted && lookup_own(subject, member).is_some())
}
