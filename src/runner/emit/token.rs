use std::fmt;
use std::fmt::{Display, Formatter};

use crate::parser::is_css_identifier;
use crate::runner::ds::error::MembraneError;
use crate::runner::ds::guid::Guid;

pub const DEFAULT_TOKEN_PREFIX: &str = "guest";

/// Process-unique identifier namespacing one module instance's output. Always a
/// valid CSS identifier, so it can be used as a class name and as an id suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopingToken(String);

impl ScopingToken {
    pub fn generate(prefix: &str) -> Result<Self, MembraneError> {
        if !is_css_identifier(prefix) {
            return Err(MembraneError::Config(format!(
                "token prefix '{}' is not a CSS identifier",
                prefix
            )));
        }
        Ok(ScopingToken(format!(
            "{}-{}",
            prefix,
            Guid::new().to_simple_string()
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Document-wide id for a module-local one.
    pub fn scoped_id(&self, local: &str) -> String {
        format!("{}-{}", local, self.0)
    }
}
impl Display for ScopingToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
