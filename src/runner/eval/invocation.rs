//! Mediated calls, method calls and construction.
//!
//! All capability checks complete before any function body runs.

use tracing::warn;

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::function_object::{FunctionBody, FunctionKind, FunctionOrigin, FunctionRef};
use crate::runner::ds::object::GuestObject;
use crate::runner::ds::value::{Disposition, Value};
use crate::runner::eval::arguments::normalize_args;
use crate::runner::eval::property::{lookup_own, require_object, resolve_target, rewrap_target};
use crate::runner::eval::taming::tame;
use crate::runner::plugin::capability::Capability;
use crate::runner::plugin::types::ModuleContext;

/// Member a host class grants `construct` on to allow `new`.
pub const CONSTRUCTOR_MEMBER: &str = "constructor";

/// Calls `callee` with no receiver.
pub fn call_function(
    ctx: &mut ModuleContext,
    callee: &Value,
    args: Vec<Value>,
) -> Result<Value, MembraneError> {
    match callee {
        Value::Function(f) => invoke(ctx, f, Disposition::None, args),
        other => Err(MembraneError::NotCallable(other.type_name().to_string())),
    }
}

/// Looks `member` up under the `call` capability and runs it with `subject` as
/// its receiver.
pub fn call_method(
    ctx: &mut ModuleContext,
    subject: &Value,
    member: &str,
    args: Vec<Value>,
) -> Result<Value, MembraneError> {
    require_object(subject, member)?;
    if !ctx
        .registry()
        .check_capability(subject, member, Capability::Call)
    {
        warn!(member, "call denied");
        return Err(MembraneError::denied(Capability::Call, member));
    }
    let method = match lookup_own(subject, member) {
        Some(Value::Function(f)) => f,
        _ => return Err(MembraneError::NotCallable(member.to_string())),
    };
    let receiver = resolve_target(subject);
    let result = invoke(ctx, &method, Disposition::Receiver(receiver), args)?;
    // A view's target never escapes through its own methods.
    Ok(rewrap_target(subject, result))
}

/// Runs `f` with an explicit disposition, enforcing its kind.
pub fn invoke(
    ctx: &mut ModuleContext,
    f: &FunctionRef,
    disposition: Disposition,
    args: Vec<Value>,
) -> Result<Value, MembraneError> {
    match (f.kind(), &disposition) {
        (FunctionKind::Constructor { .. }, _) => {
            return Err(MembraneError::NotCallable(f.debug_name()))
        }
        (FunctionKind::Method, Disposition::None) => {
            return Err(MembraneError::NotCallable(f.debug_name()))
        }
        _ => {}
    }
    run_body(ctx, f, disposition, normalize_args(args))
}

/// `new ctor(args)`.
pub fn construct(
    ctx: &mut ModuleContext,
    ctor: &Value,
    args: Vec<Value>,
) -> Result<Value, MembraneError> {
    let f = match ctor {
        Value::Function(f) => f,
        other => return Err(MembraneError::NotConstructor(other.type_name().to_string())),
    };
    let class = match f.kind() {
        FunctionKind::Constructor { class } => class.clone(),
        _ => return Err(MembraneError::NotConstructor(f.debug_name())),
    };
    let instance = match &class {
        Some(class) => {
            let allowed = ctx
                .registry()
                .class_allows(class, CONSTRUCTOR_MEMBER, Capability::Construct)
                || ctx
                    .registry()
                    .check_capability(ctor, CONSTRUCTOR_MEMBER, Capability::Construct);
            if !allowed {
                warn!(%class, "construct denied");
                return Err(MembraneError::denied(Capability::Construct, CONSTRUCTOR_MEMBER));
            }
            GuestObject::new_host(class.clone())
        }
        None => GuestObject::new_plain(),
    };
    let instance = Value::Object(instance);
    // `new` on a bound wrapper ignores the bound receiver.
    let target = unbound_target(f);
    let result = run_body(
        ctx,
        &target,
        Disposition::Receiver(instance.clone()),
        normalize_args(args),
    )?;
    Ok(match result {
        Value::Object(_) | Value::Function(_) => result,
        _ => instance,
    })
}

fn unbound_target(f: &FunctionRef) -> FunctionRef {
    match f.body() {
        FunctionBody::Bound { target, .. } => unbound_target(target),
        _ => f.clone(),
    }
}

fn run_body(
    ctx: &mut ModuleContext,
    f: &FunctionRef,
    disposition: Disposition,
    args: Vec<Value>,
) -> Result<Value, MembraneError> {
    let result = match f.body() {
        FunctionBody::Native(func) => func(ctx, disposition, args),
        FunctionBody::Closure(c) => {
            let c = c.clone();
            c(ctx, disposition, args)
        }
        FunctionBody::Bound {
            target,
            disposition: bound,
        } => run_body(ctx, target, Disposition::Receiver(bound.clone()), args),
    };
    match (f.origin(), result) {
        (FunctionOrigin::Host, Err(e @ MembraneError::Host(_))) => {
            Err(MembraneError::Thrown(tame(ctx.taming(), &e)))
        }
        (_, result) => result,
    }
}
