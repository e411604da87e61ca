//! Grant registry: which members of which subjects a guest may touch, and how.

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};

use tracing::debug;

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::function_object::FunctionOrigin;
use crate::runner::ds::guid::ObjectId;
use crate::runner::ds::object::ObjectOrigin;
use crate::runner::ds::object_property::{is_reserved_name, PropertySlot};
use crate::runner::ds::value::Value;
use crate::runner::plugin::capability::{Capability, CapabilitySet};

/// What a grant is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Every instance of a host class, and of its subclasses.
    Class(String),
    /// One particular object or function.
    Instance(ObjectId),
}
impl Subject {
    pub fn class(name: impl Into<String>) -> Self {
        Subject::Class(name.into())
    }

    /// Instance subject for an object or function value.
    pub fn instance_of(value: &Value) -> Option<Self> {
        match value {
            Value::Object(o) => Some(Subject::Instance(o.borrow().id())),
            Value::Function(f) => Some(Subject::Instance(f.id())),
            _ => None,
        }
    }
}
impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Class(c) => write!(f, "class {}", c),
            Subject::Instance(id) => write!(f, "instance #{}", id),
        }
    }
}

/// A single (subject, member, capabilities) record.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub subject: Subject,
    pub member: String,
    pub capabilities: CapabilitySet,
}

/// Registry of explicit grants.
///
/// Populated before any module is loaded, then shared read-only. Lookups never
/// mutate state, so two checks of the same triple always agree.
pub struct GrantRegistry {
    class_grants: HashMap<String, HashMap<String, CapabilitySet>>,
    instance_grants: HashMap<ObjectId, HashMap<String, CapabilitySet>>,
    class_parents: HashMap<String, String>,
}

impl GrantRegistry {
    pub fn new() -> Self {
        GrantRegistry {
            class_grants: HashMap::new(),
            instance_grants: HashMap::new(),
            class_parents: HashMap::new(),
        }
    }

    /// Declare `class` as a subclass of `parent`; class grants of the parent then
    /// apply to instances of `class` unless `class` grants the member itself.
    pub fn declare_class(
        &mut self,
        class: impl Into<String>,
        parent: impl Into<String>,
    ) -> Result<(), MembraneError> {
        let class = class.into();
        let parent = parent.into();
        if self.class_chain(&parent).iter().any(|c| *c == class) {
            return Err(MembraneError::InvalidGrant(format!(
                "class '{}' cannot extend '{}': circular hierarchy",
                class, parent
            )));
        }
        if let Some(existing) = self.class_parents.get(&class) {
            if *existing != parent {
                return Err(MembraneError::InvalidGrant(format!(
                    "class '{}' already extends '{}'",
                    class, existing
                )));
            }
        }
        debug!(%class, %parent, "declared class");
        self.class_parents.insert(class, parent);
        Ok(())
    }

    /// Attach a grant. A grant, once attached, never changes: repeating it is a
    /// no-op, contradicting it is an error.
    pub fn grant(
        &mut self,
        subject: Subject,
        member: &str,
        capabilities: CapabilitySet,
    ) -> Result<(), MembraneError> {
        validate_grant(member, capabilities)?;
        let table = match &subject {
            Subject::Class(c) => self.class_grants.entry(c.clone()).or_default(),
            Subject::Instance(id) => self.instance_grants.entry(*id).or_default(),
        };
        match table.get(member) {
            Some(existing) if *existing == capabilities => Ok(()),
            Some(existing) => Err(MembraneError::InvalidGrant(format!(
                "{} already grants {} on '{}'",
                subject, existing, member
            ))),
            None => {
                debug!(%subject, member, %capabilities, "grant attached");
                table.insert(member.to_string(), capabilities);
                Ok(())
            }
        }
    }

    pub fn grant_all<I, S>(
        &mut self,
        subject: Subject,
        members: I,
        capabilities: CapabilitySet,
    ) -> Result<(), MembraneError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for member in members {
            self.grant(subject.clone(), member.as_ref(), capabilities)?;
        }
        Ok(())
    }

    /// `class` followed by its ancestors, nearest first.
    pub fn class_chain<'a>(&'a self, class: &'a str) -> Vec<&'a str> {
        let mut chain = vec![class];
        let mut current = class;
        while let Some(parent) = self.class_parents.get(current) {
            if chain.contains(&parent.as_str()) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn class_grant(&self, class: &str, member: &str) -> Option<CapabilitySet> {
        self.class_chain(class)
            .into_iter()
            .find_map(|c| self.class_grants.get(c).and_then(|t| t.get(member)).copied())
    }

    fn instance_grant(&self, id: ObjectId, member: &str) -> Option<CapabilitySet> {
        self.instance_grants
            .get(&id)
            .and_then(|t| t.get(member))
            .copied()
    }

    /// Whether a constructor capability is granted on a host class.
    pub fn class_allows(&self, class: &str, member: &str, capability: Capability) -> bool {
        self.class_grant(class, member)
            .map(|set| set.contains(capability))
            .unwrap_or(false)
    }

    /// Capabilities the most specific applicable grant gives on `subject.member`.
    pub fn effective_capabilities(&self, subject: &Value, member: &str) -> CapabilitySet {
        if is_reserved_name(member) {
            return CapabilitySet::EMPTY;
        }
        match subject {
            Value::Object(o) => {
                let o = o.borrow();
                if let Some(set) = self.instance_grant(o.id(), member) {
                    return set;
                }
                match o.origin() {
                    ObjectOrigin::View { target, allow } => {
                        if allow.contains(member) {
                            self.effective_capabilities(target, member)
                        } else {
                            CapabilitySet::EMPTY
                        }
                    }
                    ObjectOrigin::Host { class, grants } => grants
                        .as_ref()
                        .and_then(|g| g.get(member).copied())
                        .or_else(|| self.class_grant(class, member))
                        .unwrap_or(CapabilitySet::EMPTY),
                    ObjectOrigin::Guest => plain_self_capabilities(o.base().get_own(member)),
                }
            }
            Value::Function(f) => {
                if let Some(set) = self.instance_grant(f.id(), member) {
                    return set;
                }
                match f.origin() {
                    FunctionOrigin::Guest => {
                        plain_self_capabilities(f.base().borrow().get_own(member))
                    }
                    FunctionOrigin::Host => CapabilitySet::EMPTY,
                }
            }
            _ => CapabilitySet::EMPTY,
        }
    }

    pub fn check_capability(&self, subject: &Value, member: &str, capability: Capability) -> bool {
        self.effective_capabilities(subject, member)
            .contains(capability)
    }

    /// Every explicit grant, sorted for stable listing.
    pub fn grants(&self) -> Vec<Grant> {
        let mut out: Vec<Grant> = Vec::new();
        for (class, table) in &self.class_grants {
            for (member, caps) in table {
                out.push(Grant {
                    subject: Subject::Class(class.clone()),
                    member: member.clone(),
                    capabilities: *caps,
                });
            }
        }
        for (id, table) in &self.instance_grants {
            for (member, caps) in table {
                out.push(Grant {
                    subject: Subject::Instance(*id),
                    member: member.clone(),
                    capabilities: *caps,
                });
            }
        }
        out.sort_by(|a, b| {
            a.subject
                .to_string()
                .cmp(&b.subject.to_string())
                .then_with(|| a.member.cmp(&b.member))
        });
        out
    }

    pub fn class_parents(&self) -> &HashMap<String, String> {
        &self.class_parents
    }
}

impl Default for GrantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The one implicit rule: guest-defined plain objects own their enumerable
/// properties outright, and may grow new ones.
fn plain_self_capabilities(slot: Option<&PropertySlot>) -> CapabilitySet {
    match slot {
        Some(slot) if !slot.enumerable => CapabilitySet::EMPTY,
        _ => CapabilitySet::ALL,
    }
}

fn validate_grant(member: &str, capabilities: CapabilitySet) -> Result<(), MembraneError> {
    if is_reserved_name(member) {
        return Err(MembraneError::InvalidGrant(format!(
            "'{}' is reserved for the membrane",
            member
        )));
    }
    if capabilities.contains(Capability::Write) && capabilities.contains(Capability::Call) {
        return Err(MembraneError::InvalidGrant(format!(
            "'{}' cannot be both callable and writable",
            member
        )));
    }
    Ok(())
}
