use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::runner::ds::function_object::{FunctionObject, NativeFn};
use crate::runner::ds::guid::ObjectId;
use crate::runner::ds::object_property::PropertySlot;
use crate::runner::ds::value::Value;
use crate::runner::plugin::capability::CapabilitySet;

pub type ObjectRef = Rc<RefCell<GuestObject>>;

/// Grants attached to a host object when it is created. Never mutated afterwards.
pub type AttachedGrants = Rc<HashMap<String, CapabilitySet>>;

pub enum ObjectOrigin {
    /// Plain object created by guest code.
    Guest,
    /// Object created by the host, optionally carrying its own instance grants.
    Host {
        class: String,
        grants: Option<AttachedGrants>,
    },
    /// Restricted view over another value: only `allow` members are reachable.
    View {
        target: Value,
        allow: Rc<IndexSet<String>>,
    },
}

/// Insertion-ordered own properties plus the frozen flag.
pub struct ObjectBase {
    properties: IndexMap<String, PropertySlot>,
    frozen: bool,
}
impl ObjectBase {
    pub fn new() -> Self {
        ObjectBase {
            properties: IndexMap::new(),
            frozen: false,
        }
    }

    pub fn get_own(&self, name: &str) -> Option<&PropertySlot> {
        self.properties.get(name)
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Defines or replaces a property. Callers enforce grants and immutability.
    pub fn insert(&mut self, name: impl Into<String>, slot: PropertySlot) {
        self.properties.insert(name.into(), slot);
    }

    /// Updates the value of an existing property, or adds an enumerable one.
    pub fn set_value(&mut self, name: &str, value: Value) {
        match self.properties.get_mut(name) {
            Some(slot) => slot.value = value,
            None => {
                self.properties
                    .insert(name.to_string(), PropertySlot::new(value));
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertySlot> {
        // shift_remove keeps the insertion order of the remaining keys.
        self.properties.shift_remove(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.properties.keys()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}
impl Default for ObjectBase {
    fn default() -> Self {
        Self::new()
    }
}

pub struct GuestObject {
    id: ObjectId,
    origin: ObjectOrigin,
    base: ObjectBase,
    tamed: bool,
}
impl GuestObject {
    fn with_origin(origin: ObjectOrigin) -> Self {
        GuestObject {
            id: ObjectId::next(),
            origin,
            base: ObjectBase::new(),
            tamed: false,
        }
    }

    pub fn new_plain() -> ObjectRef {
        Rc::new(RefCell::new(Self::with_origin(ObjectOrigin::Guest)))
    }

    /// Plain guest object from `(name, value)` pairs, in order.
    pub fn plain_from<I, K>(entries: I) -> ObjectRef
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut o = Self::with_origin(ObjectOrigin::Guest);
        for (k, v) in entries {
            o.base.insert(k, PropertySlot::new(v));
        }
        Rc::new(RefCell::new(o))
    }

    pub fn new_host(class: impl Into<String>) -> ObjectRef {
        Rc::new(RefCell::new(Self::with_origin(ObjectOrigin::Host {
            class: class.into(),
            grants: None,
        })))
    }

    pub fn new_view<I, S>(target: Value, allow: I) -> ObjectRef
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allow: IndexSet<String> = allow.into_iter().map(Into::into).collect();
        let mut o = Self::with_origin(ObjectOrigin::View {
            target,
            allow: Rc::new(allow),
        });
        o.base.freeze();
        Rc::new(RefCell::new(o))
    }

    /// Frozen guest record already marked as a tamed exception.
    pub(crate) fn new_tamed_record(entries: Vec<(String, Value)>) -> ObjectRef {
        let mut o = Self::with_origin(ObjectOrigin::Guest);
        for (k, v) in entries {
            o.base.insert(k, PropertySlot::new(v));
        }
        o.base.freeze();
        o.tamed = true;
        Rc::new(RefCell::new(o))
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn origin(&self) -> &ObjectOrigin {
        &self.origin
    }

    pub fn class_name(&self) -> Option<&str> {
        match &self.origin {
            ObjectOrigin::Host { class, .. } => Some(class),
            _ => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self.origin, ObjectOrigin::Guest)
    }

    pub fn is_view(&self) -> bool {
        matches!(self.origin, ObjectOrigin::View { .. })
    }

    pub fn is_tamed(&self) -> bool {
        self.tamed
    }

    pub fn base(&self) -> &ObjectBase {
        &self.base
    }

    /// Host-side access that bypasses the membrane. Never hand this to guest code.
    pub fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    pub fn get_own_value(&self, name: &str) -> Option<Value> {
        self.base.get_own(name).map(|slot| slot.value.clone())
    }
}
impl Display for GuestObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.origin {
            ObjectOrigin::Guest => write!(f, "[object Object]"),
            ObjectOrigin::Host { class, .. } => write!(f, "[object {}]", class),
            ObjectOrigin::View { target, .. } => write!(f, "[view of {}]", target.type_name()),
        }
    }
}

/// Builder for host objects, in the manner of a built-in object definition:
/// properties, methods and the grants that go with them are declared together
/// and frozen into the object at creation time.
pub struct HostObjectBuilder {
    class: String,
    properties: Vec<(String, PropertySlot)>,
    grants: HashMap<String, CapabilitySet>,
    frozen: bool,
}
impl HostObjectBuilder {
    pub fn new(class: impl Into<String>) -> Self {
        HostObjectBuilder {
            class: class.into(),
            properties: Vec::new(),
            grants: HashMap::new(),
            frozen: false,
        }
    }

    pub fn add_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.push((name.into(), PropertySlot::new(value)));
        self
    }

    /// Adds an identity-defining property that can never be written or removed.
    pub fn add_fixed_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.push((name.into(), PropertySlot::fixed(value)));
        self
    }

    pub fn add_hidden_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.push((name.into(), PropertySlot::hidden(value)));
        self
    }

    /// Adds a native method. The method is frozen and requires a receiver.
    pub fn add_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        let name = name.into();
        let method = FunctionObject::host_method(name.clone(), func);
        self.properties
            .push((name, PropertySlot::new(Value::Function(method))));
        self
    }

    /// Attaches an instance grant. Instance grants outrank class grants.
    pub fn grant(mut self, member: impl Into<String>, capabilities: CapabilitySet) -> Self {
        self.grants.insert(member.into(), capabilities);
        self
    }

    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn build(self) -> ObjectRef {
        let grants = if self.grants.is_empty() {
            None
        } else {
            Some(Rc::new(self.grants))
        };
        let mut o = GuestObject::with_origin(ObjectOrigin::Host {
            class: self.class,
            grants,
        });
        for (name, slot) in self.properties {
            o.base.insert(name, slot);
        }
        if self.frozen {
            o.base.freeze();
        }
        Rc::new(RefCell::new(o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_base_keeps_insertion_order() {
        let mut base = ObjectBase::new();
        base.set_value("b", Value::int(1));
        base.set_value("a", Value::int(2));
        base.set_value("c", Value::int(3));
        base.remove("a");
        let keys: Vec<&String> = base.keys().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_host_builder_attaches_grants() {
        let o = HostObjectBuilder::new("Widget")
            .add_fixed_property("id", Value::str("w1"))
            .grant("id", CapabilitySet::READ)
            .build();
        let o = o.borrow();
        assert_eq!(o.class_name(), Some("Widget"));
        assert!(o.base().get_own("id").map(|s| s.fixed).unwrap_or(false));
        match o.origin() {
            ObjectOrigin::Host { grants: Some(g), .. } => {
                assert_eq!(g.get("id"), Some(&CapabilitySet::READ))
            }
            _ => panic!("expected attached grants"),
        }
    }

    #[test]
    fn test_view_is_frozen() {
        let target = GuestObject::new_plain();
        let view = GuestObject::new_view(Value::Object(target), vec!["foo"]);
        assert!(view.borrow().is_view());
        assert!(view.borrow().base().is_frozen());
    }
}
