//! Tagged coroutine factories
//!
//! `mark` turns a closure that builds coroutines into a [`CoroutineFn`].
//! Every instance it produces shares the factory's [`Prototype`], which is
//! how an instance can later be traced back to the function that made it.

use crate::prelude::*;
use crate::runtime::{Coroutine, CoroutineBuilder};
use crate::value::{CheapClone, Function, Value};

struct PrototypeData {
    name: Rc<str>,
}

/// Shared identity of every instance made by one factory
///
/// Two prototypes are equal only if they are the same allocation.
#[derive(Clone)]
pub struct Prototype(Rc<PrototypeData>);

impl CheapClone for Prototype {}

impl Prototype {
    fn new(name: &str) -> Self {
        Prototype(Rc::new(PrototypeData { name: name.into() }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl PartialEq for Prototype {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Prototype {}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prototype({})", self.0.name)
    }
}

type Factory = dyn Fn(&[Value]) -> CoroutineBuilder;

/// A function recognizable as a coroutine factory
#[derive(Clone)]
pub struct CoroutineFn {
    prototype: Prototype,
    factory: Rc<Factory>,
}

impl CheapClone for CoroutineFn {}

impl CoroutineFn {
    pub fn name(&self) -> &str {
        self.prototype.name()
    }

    pub fn prototype(&self) -> &Prototype {
        &self.prototype
    }

    /// Create a new instance. It starts `NotStarted`; the body does not run
    /// until the first resume.
    pub fn call(&self, args: &[Value]) -> Coroutine {
        self.instantiate((self.factory)(args))
    }

    /// Like `call`, with a receiver the body sees as `Context::this`
    pub fn call_with_this(&self, this: Value, args: &[Value]) -> Coroutine {
        self.instantiate((self.factory)(args).this(this))
    }

    /// Whether `coroutine` was produced by this factory
    pub fn is_instance(&self, coroutine: &Coroutine) -> bool {
        coroutine.prototype() == Some(&self.prototype)
    }

    pub(crate) fn ptr_eq(&self, other: &CoroutineFn) -> bool {
        self.prototype == other.prototype
    }

    fn instantiate(&self, builder: CoroutineBuilder) -> Coroutine {
        let builder = if builder.has_name() {
            builder
        } else {
            builder.name(self.name())
        };
        builder.prototype(self.prototype.cheap_clone()).build()
    }
}

impl fmt::Debug for CoroutineFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoroutineFn({})", self.name())
    }
}

/// Tag `factory` as a coroutine factory named `name`
///
/// ```
/// use stepgen::{mark, is_coroutine_fn, Context, Coroutine, Step, Value};
///
/// let count = mark("count", |_args| {
///     Coroutine::builder(|cx: &mut Context| cx.stop().map(Step::Value))
/// });
/// let instance = count.call(&[]);
/// assert!(count.is_instance(&instance));
/// assert!(is_coroutine_fn(&Value::from(count)));
/// ```
pub fn mark<F>(name: &str, factory: F) -> CoroutineFn
where
    F: Fn(&[Value]) -> CoroutineBuilder + 'static,
{
    CoroutineFn {
        prototype: Prototype::new(name),
        factory: Rc::new(factory),
    }
}

/// Whether `value` is a function tagged with `mark`
pub fn is_coroutine_fn(value: &Value) -> bool {
    matches!(value, Value::Function(Function::Coroutine(_)))
}
