use std::cell::RefCell;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::runner::ds::error::MembraneError;
use crate::runner::ds::guid::{Guid, ObjectId};
use crate::runner::ds::object::ObjectBase;
use crate::runner::ds::value::{Disposition, Value};
use crate::runner::plugin::types::ModuleContext;

/// Function signature for compiled-in host functions.
/// Native functions receive the module context, the explicit disposition, and arguments.
pub type NativeFn = fn(
    ctx: &mut ModuleContext,
    disposition: Disposition,
    args: Vec<Value>,
) -> Result<Value, MembraneError>;

/// Closure form, used for guest-defined functions and for host functions that capture state.
pub type ClosureFn = Rc<dyn Fn(&mut ModuleContext, Disposition, Vec<Value>) -> Result<Value, MembraneError>>;

pub type FunctionRef = Rc<FunctionObject>;

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionKind {
    /// Callable without a receiver.
    Simple,
    /// Runs only with an explicit receiver.
    Method,
    /// Runs only through construction. `class` names the host class of the instances,
    /// `None` for guest-defined constructors producing plain objects.
    Constructor { class: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOrigin {
    Guest,
    Host,
}

pub enum FunctionBody {
    /// Direct function pointer for compiled-in host functions.
    Native(NativeFn),
    /// Boxed closure.
    Closure(ClosureFn),
    /// Wrapper that always runs `target` with `disposition` as receiver.
    Bound {
        target: FunctionRef,
        disposition: Value,
    },
}

pub struct FunctionObject {
    id: ObjectId,
    guid: Guid,
    name: RefCell<Option<String>>,
    kind: FunctionKind,
    origin: FunctionOrigin,
    body: FunctionBody,
    base: RefCell<ObjectBase>,
    powerless: bool,
}
impl FunctionObject {
    fn build(
        name: Option<String>,
        kind: FunctionKind,
        origin: FunctionOrigin,
        body: FunctionBody,
        guid: Guid,
    ) -> FunctionRef {
        Rc::new(FunctionObject {
            id: ObjectId::next(),
            guid,
            name: RefCell::new(name),
            kind,
            origin,
            body,
            base: RefCell::new(ObjectBase::new()),
            powerless: false,
        })
    }

    /// Guest function, not yet frozen. Guest code is expected to run it through
    /// the function guardian at its definition site.
    pub fn guest<F>(name: Option<&str>, kind: FunctionKind, f: F) -> FunctionRef
    where
        F: Fn(&mut ModuleContext, Disposition, Vec<Value>) -> Result<Value, MembraneError> + 'static,
    {
        Self::build(
            name.map(str::to_string),
            kind,
            FunctionOrigin::Guest,
            FunctionBody::Closure(Rc::new(f)),
            Guid::new(),
        )
    }

    pub fn guest_simple<F>(name: &str, f: F) -> FunctionRef
    where
        F: Fn(&mut ModuleContext, Disposition, Vec<Value>) -> Result<Value, MembraneError> + 'static,
    {
        Self::guest(Some(name), FunctionKind::Simple, f)
    }

    /// Host function callable without a receiver. Host functions are frozen at birth.
    pub fn host_simple(name: impl Into<String>, func: NativeFn) -> FunctionRef {
        let f = Self::build(
            Some(name.into()),
            FunctionKind::Simple,
            FunctionOrigin::Host,
            FunctionBody::Native(func),
            Guid::new(),
        );
        f.freeze();
        f
    }

    pub fn host_method(name: impl Into<String>, func: NativeFn) -> FunctionRef {
        let f = Self::build(
            Some(name.into()),
            FunctionKind::Method,
            FunctionOrigin::Host,
            FunctionBody::Native(func),
            Guid::new(),
        );
        f.freeze();
        f
    }

    /// Host constructor for instances of `class`.
    pub fn host_constructor(class: impl Into<String>, func: NativeFn) -> FunctionRef {
        let class = class.into();
        let f = Self::build(
            Some(class.clone()),
            FunctionKind::Constructor { class: Some(class) },
            FunctionOrigin::Host,
            FunctionBody::Native(func),
            Guid::new(),
        );
        f.freeze();
        f
    }

    /// Host function backed by a closure, for host capabilities that carry state.
    pub fn host_closure<F>(name: impl Into<String>, kind: FunctionKind, f: F) -> FunctionRef
    where
        F: Fn(&mut ModuleContext, Disposition, Vec<Value>) -> Result<Value, MembraneError> + 'static,
    {
        let func = Self::build(
            Some(name.into()),
            kind,
            FunctionOrigin::Host,
            FunctionBody::Closure(Rc::new(f)),
            Guid::new(),
        );
        func.freeze();
        func
    }

    /// Frozen stand-in for a function that was thrown across the boundary. It
    /// holds no reference to the original and only reports what it replaced.
    pub(crate) fn powerless(replaced: &str) -> FunctionRef {
        let message = format!("In lieu of thrown function: {}", replaced);
        let f = Rc::new(FunctionObject {
            id: ObjectId::next(),
            guid: Guid::new(),
            name: RefCell::new(Some(replaced.to_string())),
            kind: FunctionKind::Simple,
            origin: FunctionOrigin::Host,
            body: FunctionBody::Closure(Rc::new(
                move |_: &mut ModuleContext,
                      _: Disposition,
                      _: Vec<Value>|
                      -> Result<Value, MembraneError> { Ok(Value::str(message.clone())) },
            )),
            base: RefCell::new(ObjectBase::new()),
            powerless: true,
        });
        f.freeze();
        f
    }

    pub(crate) fn bound(target: FunctionRef, disposition: Value, guid: Guid) -> FunctionRef {
        let name = target.name().map(|n| format!("bound {}", n));
        let kind = match target.kind() {
            // A bound wrapper supplies its own receiver, so it is callable plainly.
            FunctionKind::Method => FunctionKind::Simple,
            k => k.clone(),
        };
        let origin = target.origin();
        let f = Self::build(
            name,
            kind,
            origin,
            FunctionBody::Bound {
                target,
                disposition,
            },
            guid,
        );
        f.freeze();
        f
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.borrow_mut() = Some(name);
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    pub fn origin(&self) -> FunctionOrigin {
        self.origin
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    pub fn is_powerless(&self) -> bool {
        self.powerless
    }

    pub fn is_frozen(&self) -> bool {
        self.base.borrow().is_frozen()
    }

    pub(crate) fn freeze(&self) {
        self.base.borrow_mut().freeze();
    }

    /// Static members of the function.
    pub fn base(&self) -> &RefCell<ObjectBase> {
        &self.base
    }

    /// Name used in diagnostics.
    pub fn debug_name(&self) -> String {
        self.name().unwrap_or_else(|| "anonymous".to_string())
    }
}
impl Display for FunctionObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "function {}() {{ [membrane] }}", self.debug_name())
    }
}
