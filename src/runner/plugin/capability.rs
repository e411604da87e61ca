//! Capability kinds and the bitset that stores a grant's capability set.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::iter::FromIterator;
use std::ops::BitOr;

use serde::Deserialize;

use crate::runner::ds::error::MembraneError;

/// One kind of access a guest may be granted on a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Delete,
    Enumerate,
    Call,
    Construct,
}
impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Read,
        Capability::Write,
        Capability::Delete,
        Capability::Enumerate,
        Capability::Call,
        Capability::Construct,
    ];

    const fn bit(self) -> u8 {
        match self {
            Capability::Read => 1,
            Capability::Write => 1 << 1,
            Capability::Delete => 1 << 2,
            Capability::Enumerate => 1 << 3,
            Capability::Call => 1 << 4,
            Capability::Construct => 1 << 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Delete => "delete",
            Capability::Enumerate => "enumerate",
            Capability::Call => "call",
            Capability::Construct => "construct",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Capability::ALL.iter().copied().find(|c| c.name() == name)
    }
}
impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of capabilities, one bit per [`Capability`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);
    pub const READ: CapabilitySet = CapabilitySet(Capability::Read.bit());
    pub const WRITE: CapabilitySet = CapabilitySet(Capability::Write.bit());
    pub const DELETE: CapabilitySet = CapabilitySet(Capability::Delete.bit());
    pub const ENUMERATE: CapabilitySet = CapabilitySet(Capability::Enumerate.bit());
    pub const CALL: CapabilitySet = CapabilitySet(Capability::Call.bit());
    pub const CONSTRUCT: CapabilitySet = CapabilitySet(Capability::Construct.bit());
    pub const ALL: CapabilitySet = CapabilitySet(0b11_1111);

    pub const fn union(self, other: CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 | other.0)
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn with(self, capability: Capability) -> CapabilitySet {
        CapabilitySet(self.0 | capability.bit())
    }

    pub fn without(self, capability: Capability) -> CapabilitySet {
        CapabilitySet(self.0 & !capability.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(move |c| self.contains(*c))
    }

    /// Parses capability names as written in configuration files.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, MembraneError> {
        names.iter().try_fold(CapabilitySet::EMPTY, |set, name| {
            Capability::parse(name.as_ref())
                .map(|c| set.with(c))
                .ok_or_else(|| {
                    MembraneError::Config(format!("unknown capability '{}'", name.as_ref()))
                })
        })
    }
}
impl BitOr for CapabilitySet {
    type Output = CapabilitySet;

    fn bitor(self, rhs: CapabilitySet) -> CapabilitySet {
        self.union(rhs)
    }
}
impl From<Capability> for CapabilitySet {
    fn from(c: Capability) -> Self {
        CapabilitySet(c.bit())
    }
}
impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CapabilitySet::EMPTY, |set, c| set.with(c))
    }
}
impl Display for CapabilitySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Capability::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilitySet{}", self)
    }
}
