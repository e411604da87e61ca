//! Membrane configuration file parsing.
//!
//! Expected format:
//! ```toml
//! [membrane]
//! token_prefix = "guest"
//!
//! [taming]
//! allowed_fields = ["code"]
//!
//! [[classes]]
//! name = "Button"
//! parent = "Widget"
//!
//! [[grants]]
//! class = "Widget"
//! member = "title"
//! capabilities = ["read", "enumerate"]
//!
//! [host_bindings]
//! VERSION = "1.0"
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::value::Value;
use crate::runner::emit::token::DEFAULT_TOKEN_PREFIX;
use crate::runner::eval::taming::TamingPolicy;
use crate::runner::plugin::capability::{Capability, CapabilitySet};
use crate::runner::plugin::loader::{ModuleLoader, ModuleLoaderBuilder};
use crate::runner::plugin::registry::{GrantRegistry, Subject};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MembraneConfig {
    #[serde(default)]
    pub membrane: MembraneSection,
    #[serde(default)]
    pub taming: TamingSection,
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
    #[serde(default)]
    pub host_bindings: IndexMap<String, toml::Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MembraneSection {
    /// Prefix of every scoping token; must be a CSS identifier.
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,
}
impl Default for MembraneSection {
    fn default() -> Self {
        MembraneSection {
            token_prefix: default_token_prefix(),
        }
    }
}

fn default_token_prefix() -> String {
    DEFAULT_TOKEN_PREFIX.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TamingSection {
    /// Custom exception fields guest code may see.
    #[serde(default)]
    pub allowed_fields: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassConfig {
    pub name: String,
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrantConfig {
    pub class: String,
    pub member: String,
    pub capabilities: Vec<Capability>,
}

impl MembraneConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MembraneError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MembraneError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, MembraneError> {
        toml::from_str(content).map_err(|e| MembraneError::Config(e.to_string()))
    }

    pub fn build_registry(&self) -> Result<GrantRegistry, MembraneError> {
        let mut registry = GrantRegistry::new();
        for class in &self.classes {
            if let Some(parent) = &class.parent {
                registry.declare_class(class.name.clone(), parent.clone())?;
            }
        }
        for grant in &self.grants {
            let capabilities: CapabilitySet = grant.capabilities.iter().copied().collect();
            registry.grant(Subject::class(grant.class.clone()), &grant.member, capabilities)?;
        }
        Ok(registry)
    }

    pub fn taming_policy(&self) -> TamingPolicy {
        TamingPolicy::with_allowed_fields(self.taming.allowed_fields.iter().cloned())
    }

    pub fn host_bindings(&self) -> Result<IndexMap<String, Value>, MembraneError> {
        let mut bindings = IndexMap::new();
        for (name, value) in &self.host_bindings {
            let value = match value {
                toml::Value::String(s) => Value::str(s.clone()),
                toml::Value::Integer(i) => Value::int(*i),
                toml::Value::Float(f) => Value::from(*f),
                toml::Value::Boolean(b) => Value::Boolean(*b),
                other => {
                    return Err(MembraneError::Config(format!(
                        "host binding '{}' has unsupported type {}",
                        name,
                        other.type_str()
                    )))
                }
            };
            bindings.insert(name.clone(), value);
        }
        Ok(bindings)
    }

    /// Loader builder carrying everything this configuration describes.
    pub fn loader_builder(&self) -> Result<ModuleLoaderBuilder, MembraneError> {
        Ok(ModuleLoader::builder(self.build_registry()?)
            .taming(self.taming_policy())
            .host_bindings(self.host_bindings()?)
            .token_prefix(self.membrane.token_prefix.clone()))
    }
}
