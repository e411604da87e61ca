//! Function guardian: freezing, naming and disposition binding of function
//! wrappers, plus the guid-keyed handler list built on top of them.

use tracing::debug;

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::function_object::{FunctionObject, FunctionRef};
use crate::runner::ds::guid::Guid;
use crate::runner::ds::object::ObjectRef;
use crate::runner::ds::value::{Disposition, Value};
use crate::runner::eval::{arguments, invocation};
use crate::runner::plugin::types::ModuleContext;

/// Freezes `f` in place. Idempotent; returns the same wrapper.
pub fn freeze(f: &FunctionRef) -> FunctionRef {
    if !f.is_frozen() {
        f.freeze();
    }
    f.clone()
}

pub fn freeze_object(o: &ObjectRef) -> ObjectRef {
    o.borrow_mut().base_mut().freeze();
    o.clone()
}

/// Sets the debug name. A frozen function only accepts its current name again.
pub fn tag_name(f: &FunctionRef, name: &str) -> Result<(), MembraneError> {
    if f.is_frozen() {
        return match f.name() {
            Some(current) if current == name => Ok(()),
            _ => Err(MembraneError::ImmutableField(format!(
                "name of frozen function {}",
                f.debug_name()
            ))),
        };
    }
    f.set_name(name.to_string());
    Ok(())
}

/// Definition-time path for guest functions: name, then freeze.
pub fn mark_func_freeze(f: &FunctionRef, name: &str) -> Result<FunctionRef, MembraneError> {
    tag_name(f, name)?;
    Ok(freeze(f))
}

/// A new frozen wrapper that always runs `f` with `this_arg` as its receiver,
/// whatever receiver its caller supplies.
pub fn bind_disposition(f: &FunctionRef, this_arg: Value, guid: Option<Guid>) -> FunctionRef {
    let guid = guid.unwrap_or_default();
    debug!(function = %f.debug_name(), %guid, "disposition bound");
    FunctionObject::bound(f.clone(), this_arg, guid)
}

/// Registered handlers, de-duplicated by guid. A wrapper produced by
/// `bind_disposition` with a handler's guid counts as that handler.
#[derive(Default)]
pub struct HandlerList {
    handlers: Vec<FunctionRef>,
}
impl HandlerList {
    pub fn new() -> Self {
        HandlerList {
            handlers: Vec::new(),
        }
    }

    /// Returns false if a handler with the same guid is already present.
    pub fn add(&mut self, handler: FunctionRef) -> bool {
        if self.contains(&handler) {
            return false;
        }
        self.handlers.push(handler);
        true
    }

    pub fn remove(&mut self, handler: &FunctionRef) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.guid() != handler.guid());
        self.handlers.len() != before
    }

    pub fn contains(&self, handler: &FunctionRef) -> bool {
        self.handlers.iter().any(|h| h.guid() == handler.guid())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatches to every handler in registration order. `args[0]` is the
    /// object the event fired on and becomes each handler's receiver; the rest
    /// are forwarded as the handler's arguments.
    pub fn fire(&self, ctx: &mut ModuleContext, args: &[Value]) -> Result<(), MembraneError> {
        let receiver = arguments::arg(args, 0);
        let forwarded = arguments::rest_after(args, 1);
        let handlers = self.handlers.clone();
        debug!(handlers = handlers.len(), "firing handlers");
        for h in handlers {
            invocation::invoke(
                ctx,
                &h,
                Disposition::Receiver(receiver.clone()),
                forwarded.clone(),
            )?;
        }
        Ok(())
    }
}
