use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::runner::ds::function_object::FunctionRef;
use crate::runner::ds::object::ObjectRef;

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_MISSING: &str = "missing";

/// A value as seen from guest code.
///
/// `Missing` is what a granted read of an absent property yields. It is distinct
/// from `Undefined` so that host tooling can tell "no such property" apart from a
/// property that holds `undefined`.
pub enum Value {
    Undefined,
    Null,
    Missing,
    Boolean(bool),
    Number(NumberType),
    String(String),
    Object(ObjectRef),
    Function(FunctionRef),
}
impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn int(i: i64) -> Self {
        Value::Number(NumberType::Integer(i))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's kind, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => TYPE_STR_UNDEFINED,
            Value::Null => TYPE_STR_NULL,
            Value::Missing => TYPE_STR_MISSING,
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Best-effort string form, the way a guest `String(x)` would render it.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            v => v.to_string(),
        }
    }
}
impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Undefined => Value::Undefined,
            Value::Null => Value::Null,
            Value::Missing => Value::Missing,
            Value::Boolean(d) => Value::Boolean(*d),
            Value::Number(d) => Value::Number(d.clone()),
            Value::String(d) => Value::String(d.to_string()),
            Value::Object(o) => Value::Object(o.clone()),
            Value::Function(f) => Value::Function(f.clone()),
        }
    }
}
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "{}", TYPE_STR_UNDEFINED),
            Value::Null => write!(f, "{}", TYPE_STR_NULL),
            Value::Missing => write!(f, "{}", TYPE_STR_MISSING),
            Value::Boolean(b) => write!(f, "bool({})", b),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Object(o) => match o.try_borrow() {
                Ok(o) => write!(f, "{}", o),
                // Formatting must not panic while a mediator holds the object.
                Err(_) => write!(f, "[object]"),
            },
            Value::Function(func) => write!(f, "{}", func),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Value::Undefined"),
            Value::Null => write!(f, "Value::Null"),
            Value::Missing => write!(f, "Value::Missing"),
            Value::Boolean(b) => write!(f, "Value::Boolean({})", b),
            Value::String(s) => write!(f, "Value::String({:?})", s),
            Value::Number(n) => write!(f, "Value::Number({:?})", n),
            Value::Object(o) => match o.try_borrow() {
                Ok(o) => write!(f, "Value::Object(#{})", o.id()),
                Err(_) => write!(f, "Value::Object(<borrowed>)"),
            },
            Value::Function(func) => write!(f, "Value::Function({})", func.guid()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Missing, Value::Missing) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            // Wrappers sharing a guid are interchangeable.
            (Value::Function(a), Value::Function(b)) => a.guid() == b.guid(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(NumberType::Integer(i))
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(NumberType::Float(n))
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}
impl From<FunctionRef> for Value {
    fn from(f: FunctionRef) -> Self {
        Value::Function(f)
    }
}

#[derive(Debug)]
pub enum NumberType {
    Integer(i64),
    Float(f64),
}
impl Display for NumberType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NumberType::Integer(i) => write!(f, "{}", i),
            NumberType::Float(nf) => write!(f, "{}", nf),
        }
    }
}
impl Clone for NumberType {
    fn clone(&self) -> Self {
        match self {
            NumberType::Integer(i) => NumberType::Integer(*i),
            NumberType::Float(nf) => NumberType::Float(*nf),
        }
    }
}
impl PartialEq for NumberType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NumberType::Integer(a), NumberType::Integer(b)) => a == b,
            (NumberType::Float(a), NumberType::Float(b)) => a == b,
            (NumberType::Integer(a), NumberType::Float(b))
            | (NumberType::Float(b), NumberType::Integer(a)) => (*a as f64) == *b,
        }
    }
}

/// The receiver threaded explicitly into an invocation.
///
/// There is no ambient receiver: a call site either names one or passes
/// `Disposition::None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    None,
    Receiver(Value),
}
impl Disposition {
    pub fn receiver(&self) -> Option<&Value> {
        match self {
            Disposition::None => None,
            Disposition::Receiver(v) => Some(v),
        }
    }

    /// The receiver as a value, `Undefined` when there is none.
    pub fn to_value(&self) -> Value {
        match self {
            Disposition::None => Value::Undefined,
            Disposition::Receiver(v) => v.clone(),
        }
    }
}
