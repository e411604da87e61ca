use crate::runner::ds::value::Value;

/// Suffix reserved for the membrane's own bookkeeping names.
pub const RESERVED_SUFFIX: &str = "__";

pub fn is_reserved_name(name: &str) -> bool {
    name.ends_with(RESERVED_SUFFIX)
}

/// One own property of an object or function.
///
/// `fixed` marks identity-defining fields: they can be neither overwritten nor
/// removed, whatever the grants say.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySlot {
    pub value: Value,
    pub enumerable: bool,
    pub fixed: bool,
}
impl PropertySlot {
    pub fn new(value: Value) -> Self {
        PropertySlot {
            value,
            enumerable: true,
            fixed: false,
        }
    }

    pub fn hidden(value: Value) -> Self {
        PropertySlot {
            value,
            enumerable: false,
            fixed: false,
        }
    }

    pub fn fixed(value: Value) -> Self {
        PropertySlot {
            value,
            enumerable: true,
            fixed: true,
        }
    }
}
