//! Argument normalization. Every mediated call funnels its arguments through here.

use crate::runner::ds::object::{HostObjectBuilder, ObjectRef};
use crate::runner::ds::value::Value;
use crate::runner::plugin::capability::CapabilitySet;

pub const ARGUMENTS_CLASS: &str = "Arguments";
pub const ARGUMENTS_LENGTH_PROP: &str = "length";

/// Collects any argument source into the plain vector mediated calls take.
pub fn normalize_args<I>(args: I) -> Vec<Value>
where
    I: IntoIterator<Item = Value>,
{
    args.into_iter()
        .map(|a| match a {
            // An absent property read never travels as an argument.
            Value::Missing => Value::Undefined,
            a => a,
        })
        .collect()
}

/// Argument `index`, or `undefined` when the caller passed fewer.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Arguments after the first `n`, as wrapped handlers forward them.
pub fn rest_after(args: &[Value], n: usize) -> Vec<Value> {
    if n >= args.len() {
        Vec::new()
    } else {
        normalize_args(args[n..].iter().cloned())
    }
}

/// Frozen, index-keyed `arguments` object. Indices are readable and
/// enumerable, `length` is readable but hidden from enumeration.
pub fn arguments_object(args: &[Value]) -> ObjectRef {
    let mut builder = HostObjectBuilder::new(ARGUMENTS_CLASS);
    for (i, v) in args.iter().enumerate() {
        builder = builder
            .add_fixed_property(i.to_string(), v.clone())
            .grant(i.to_string(), CapabilitySet::READ | CapabilitySet::ENUMERATE);
    }
    builder
        .add_hidden_property(ARGUMENTS_LENGTH_PROP, Value::int(args.len() as i64))
        .grant(ARGUMENTS_LENGTH_PROP, CapabilitySet::READ)
        .frozen()
        .build()
}
