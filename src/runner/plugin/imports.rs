//! Capability import table: the only names a module body is linked against.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::object::{GuestObject, HostObjectBuilder, ObjectRef};
use crate::runner::ds::object_property::is_reserved_name;
use crate::runner::ds::value::Value;
use crate::runner::plugin::capability::CapabilitySet;

pub const IMPORTS_CLASS: &str = "Imports";

/// One `(name, value, allow-list)` import triple.
#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub name: String,
    pub value: Value,
    /// When present, the module sees a view exposing only these members.
    pub allow: Option<Vec<String>>,
}
impl ImportSpec {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        ImportSpec {
            name: name.into(),
            value,
            allow: None,
        }
    }

    pub fn restricted<I, S>(name: impl Into<String>, value: Value, allow: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ImportSpec {
            name: name.into(),
            value,
            allow: Some(allow.into_iter().map(Into::into).collect()),
        }
    }
}

/// Name to capability mapping, fixed for the lifetime of a module instance.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    entries: IndexMap<String, Value>,
}

impl ImportTable {
    pub fn build(specs: Vec<ImportSpec>) -> Result<Self, MembraneError> {
        let mut entries = IndexMap::new();
        for spec in specs {
            let invalid = |reason: &str| MembraneError::InvalidImport {
                name: spec.name.clone(),
                reason: reason.to_string(),
            };
            if is_reserved_name(&spec.name) {
                return Err(invalid("name is reserved"));
            }
            if entries.contains_key(&spec.name) {
                return Err(invalid("imported more than once"));
            }
            let value = match &spec.allow {
                None => spec.value.clone(),
                Some(allow) => {
                    if !matches!(spec.value, Value::Object(_) | Value::Function(_)) {
                        return Err(invalid("only objects and functions can be restricted"));
                    }
                    if allow.iter().any(|m| is_reserved_name(m)) {
                        return Err(invalid("allow-list names a reserved member"));
                    }
                    Value::Object(GuestObject::new_view(spec.value.clone(), allow.clone()))
                }
            };
            entries.insert(spec.name.clone(), value);
        }
        debug!(imports = entries.len(), "import table built");
        Ok(ImportTable { entries })
    }

    /// The imported value, or `undefined` with a linkage warning when the module
    /// asks for something it was not given.
    pub fn get(&self, name: &str) -> Value {
        match self.entries.get(name) {
            Some(v) => v.clone(),
            None => {
                warn!(name, "linkage warning: import not provided");
                Value::Undefined
            }
        }
    }

    pub fn try_get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The table as a frozen guest-visible object: every import readable and
    /// enumerable, nothing else.
    pub fn to_object(&self) -> ObjectRef {
        let mut builder = HostObjectBuilder::new(IMPORTS_CLASS);
        for (name, value) in &self.entries {
            builder = builder
                .add_fixed_property(name.clone(), value.clone())
                .grant(name.clone(), CapabilitySet::READ | CapabilitySet::ENUMERATE);
        }
        builder.frozen().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_import_rejected() {
        let result = ImportTable::build(vec![
            ImportSpec::new("a", Value::int(1)),
            ImportSpec::new("a", Value::int(2)),
        ]);
        assert!(matches!(result, Err(MembraneError::InvalidImport { .. })));
    }

    #[test]
    fn test_restricting_a_primitive_rejected() {
        let result = ImportTable::build(vec![ImportSpec::restricted(
            "n",
            Value::int(1),
            vec!["x"],
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_import_is_undefined() {
        let table = ImportTable::build(vec![ImportSpec::new("a", Value::int(1))]).unwrap();
        assert_eq!(table.get("a"), Value::int(1));
        assert_eq!(table.get("b"), Value::Undefined);
    }
}
