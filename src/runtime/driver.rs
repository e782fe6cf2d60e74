//! State machine driver
//!
//! A [`Coroutine`] owns a step function and its [`Context`]. Each call to
//! `resume` or `resume_with_error` re-enters the step function, as many times
//! as it asks for with `Step::Continue`, until it hands back a value or
//! raises.
//!
//! ## Visible state
//!
//! ```text
//! NotStarted ──► Suspended ◄──► Executing ──► Completed
//! ```
//!
//! The state is never exposed directly; callers observe it through which
//! calls succeed.

use super::context::{Context, Step};
use super::delegate::{Resumable, Throwable};
use super::region::RegionSpec;
use crate::config::CoroutineOptions;
use crate::error::RuntimeError;
use crate::prelude::*;
use crate::tag::Prototype;
use crate::value::{CheapClone, Value};
use tracing::{debug, trace, trace_span};

/// Lifecycle of a coroutine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CoroutineState {
    NotStarted,
    Suspended,
    Executing,
    Completed,
}

/// How the coroutine is being resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Next,
    Throw,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Next => write!(f, "next"),
            Method::Throw => write!(f, "throw"),
        }
    }
}

/// Result of one resume: `{ value, done }`
#[derive(Debug, Clone, PartialEq)]
pub struct IterResult {
    pub value: Value,
    pub done: bool,
}

impl IterResult {
    pub fn new(value: Value, done: bool) -> Self {
        IterResult { value, done }
    }

    /// A value produced at a suspension point
    pub fn suspended(value: Value) -> Self {
        IterResult { value, done: false }
    }

    /// The final value of a completed coroutine
    pub fn finished(value: Value) -> Self {
        IterResult { value, done: true }
    }
}

/// A lowered function body
pub trait StepFn {
    /// Run from `cx.next_loc()` until the next suspension point, the end of
    /// the body, or an abrupt completion that needs the driver to loop.
    fn step(&mut self, cx: &mut Context) -> Result<Step, RuntimeError>;
}

impl<F> StepFn for F
where
    F: FnMut(&mut Context) -> Result<Step, RuntimeError>,
{
    fn step(&mut self, cx: &mut Context) -> Result<Step, RuntimeError> {
        self(cx)
    }
}

struct Inner {
    state: Cell<CoroutineState>,
    /// Held while another coroutine delegates to this one
    leased: Cell<bool>,
    body: RefCell<Box<dyn StepFn>>,
    context: RefCell<Context>,
    prototype: Option<Prototype>,
    options: CoroutineOptions,
}

/// A resumable instance of a lowered function
///
/// Cloning produces another handle to the same instance.
#[derive(Clone)]
pub struct Coroutine {
    inner: Rc<Inner>,
}

impl CheapClone for Coroutine {}

impl Coroutine {
    /// Start building a coroutine around a step function
    pub fn builder<S>(body: S) -> CoroutineBuilder
    where
        S: StepFn + 'static,
    {
        CoroutineBuilder {
            body: Box::new(body),
            regions: Vec::new(),
            this: Value::Undefined,
            prototype: None,
            options: CoroutineOptions::default(),
        }
    }

    /// Resume with a sent value.
    ///
    /// The very first call must send `Value::Undefined`.
    pub fn resume(&self, value: Value) -> Result<IterResult, RuntimeError> {
        self.invoke(Method::Next, value)
    }

    /// Resume by raising `error` at the current suspension point.
    ///
    /// If the body does not catch it, the same error is returned here and
    /// the coroutine is finished.
    pub fn resume_with_error(&self, error: Value) -> Result<IterResult, RuntimeError> {
        self.invoke(Method::Throw, error)
    }

    /// Iterate over the values this coroutine yields.
    ///
    /// The final return value is not produced. An error ends the iteration
    /// after being produced once.
    pub fn iter(&self) -> Iter {
        Iter {
            coroutine: self.cheap_clone(),
            finished: false,
        }
    }

    /// Prototype shared with every instance from the same tagged factory
    pub fn prototype(&self) -> Option<&Prototype> {
        self.inner.prototype.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.options.name.as_deref()
    }

    pub(crate) fn state(&self) -> CoroutineState {
        self.inner.state.get()
    }

    pub(crate) fn ptr_eq(&self, other: &Coroutine) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reserve this instance for a delegating coroutine. Fails if another
    /// delegation already holds it.
    pub(crate) fn try_lease(&self) -> bool {
        !self.inner.leased.replace(true)
    }

    pub(crate) fn release_lease(&self) {
        self.inner.leased.set(false);
    }

    #[cfg(test)]
    pub(crate) fn is_leased(&self) -> bool {
        self.inner.leased.get()
    }

    /// Resume on behalf of the delegation holding the lease
    pub(crate) fn resume_as_delegate(
        &self,
        method: Method,
        arg: Value,
    ) -> Result<IterResult, RuntimeError> {
        self.drive(method, arg)
    }

    fn invoke(&self, method: Method, arg: Value) -> Result<IterResult, RuntimeError> {
        if self.inner.leased.get() {
            return Err(RuntimeError::invalid_state(
                "coroutine is being driven by a delegating coroutine",
            ));
        }
        self.drive(method, arg)
    }

    fn drive(&self, mut method: Method, mut arg: Value) -> Result<IterResult, RuntimeError> {
        let inner = &*self.inner;
        let span = trace_span!(
            "resume",
            coroutine = inner.options.name.as_deref().unwrap_or("<anonymous>"),
            %method
        );
        let _entered = span.enter();

        match inner.state.get() {
            CoroutineState::Executing => {
                return Err(RuntimeError::invalid_state("coroutine is already running"));
            }
            CoroutineState::Completed => {
                return Err(RuntimeError::invalid_state("coroutine has already finished"));
            }
            CoroutineState::NotStarted | CoroutineState::Suspended => {}
        }

        let mut turns: u64 = 0;
        loop {
            let delegate = inner.context.borrow_mut().delegate.take();
            if let Some(delegate) = delegate {
                // Busy while the delegate runs
                let resting = inner.state.get();
                inner.state.set(CoroutineState::Executing);
                let forwarded = delegate.forward(method, arg);
                inner.state.set(resting);

                match forwarded {
                    Ok(result) if result.done => {
                        debug!(result_field = %delegate.result_field, "delegate finished");
                        let mut cx = inner.context.borrow_mut();
                        cx.set(delegate.result_field.clone(), result.value);
                        cx.goto(delegate.next_loc);
                    }
                    Ok(result) => {
                        inner.context.borrow_mut().delegate = Some(delegate);
                        inner.state.set(CoroutineState::Suspended);
                        return Ok(result);
                    }
                    Err(RuntimeError::Thrown(error)) => {
                        debug!("delegate raised, rethrowing into the outer coroutine");
                        method = Method::Throw;
                        arg = error;
                        continue;
                    }
                    Err(other) => {
                        inner.state.set(CoroutineState::Completed);
                        return Err(other);
                    }
                }

                // The delegate handled whatever it was given
                method = Method::Next;
                arg = Value::Undefined;
            }

            match method {
                Method::Next => {
                    let state = inner.state.get();
                    if state == CoroutineState::NotStarted && !arg.is_undefined() {
                        return Err(RuntimeError::invalid_argument(format!(
                            "attempt to send {:?} to a coroutine that has not started",
                            arg
                        )));
                    }
                    let sent = if state == CoroutineState::Suspended {
                        arg.cheap_clone()
                    } else {
                        Value::Undefined
                    };
                    inner.context.borrow_mut().set_sent(sent);
                }
                Method::Throw => {
                    if inner.state.get() == CoroutineState::NotStarted {
                        debug!("error injected before start");
                        inner.state.set(CoroutineState::Completed);
                        return Err(RuntimeError::Thrown(arg));
                    }
                    let dispatched = inner
                        .context
                        .borrow_mut()
                        .dispatch_exception(arg.cheap_clone());
                    if let Err(e) = dispatched {
                        inner.state.set(CoroutineState::Completed);
                        return Err(e);
                    }
                    // The error is routed; the body resumes normally from here and
                    // a rethrow from `finish` comes back as a raise
                    method = Method::Next;
                    arg = Value::Undefined;
                }
            }

            turns += 1;
            if let Some(limit) = inner.options.step_budget {
                if turns > limit {
                    inner.state.set(CoroutineState::Completed);
                    return Err(RuntimeError::StepBudgetExceeded { limit });
                }
            }

            inner.state.set(CoroutineState::Executing);
            let (outcome, done, delegating) = {
                let mut body = inner.body.borrow_mut();
                let mut cx = inner.context.borrow_mut();
                trace!(turn = turns, at = %cx.next_loc(), "entering step function");
                let outcome = body.step(&mut cx);
                (outcome, cx.is_done(), cx.has_delegate())
            };

            match outcome {
                Ok(Step::Continue) => {
                    inner.state.set(if done {
                        CoroutineState::Completed
                    } else {
                        CoroutineState::Suspended
                    });
                    // A fresh delegate must not receive the value sent to us
                    if delegating {
                        arg = Value::Undefined;
                    }
                }
                Ok(Step::Value(value)) => {
                    if done {
                        debug!("coroutine completed");
                        inner.state.set(CoroutineState::Completed);
                    } else {
                        inner.state.set(CoroutineState::Suspended);
                    }
                    return Ok(IterResult { value, done });
                }
                Err(RuntimeError::Thrown(error)) => {
                    inner.state.set(CoroutineState::Completed);
                    // Give regions around the raise point a chance to catch it
                    inner.context.borrow_mut().dispatch_exception(error)?;
                }
                Err(other) => {
                    inner.state.set(CoroutineState::Completed);
                    return Err(other);
                }
            }
        }
    }
}

impl Resumable for Coroutine {
    fn resume(&self, value: Value) -> Result<IterResult, RuntimeError> {
        self.invoke(Method::Next, value)
    }

    fn as_throwable(&self) -> Option<&dyn Throwable> {
        Some(self)
    }

    fn as_coroutine(&self) -> Option<&Coroutine> {
        Some(self)
    }
}

impl Throwable for Coroutine {
    fn resume_with_error(&self, error: Value) -> Result<IterResult, RuntimeError> {
        self.invoke(Method::Throw, error)
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for a [`Coroutine`]
pub struct CoroutineBuilder {
    body: Box<dyn StepFn>,
    regions: Vec<RegionSpec>,
    this: Value,
    prototype: Option<Prototype>,
    options: CoroutineOptions,
}

impl CoroutineBuilder {
    /// Protected regions of the body, outermost first
    pub fn regions(mut self, regions: impl IntoIterator<Item = RegionSpec>) -> Self {
        self.regions.extend(regions);
        self
    }

    /// Receiver visible to the body through `Context::this`
    pub fn this(mut self, this: Value) -> Self {
        self.this = this;
        self
    }

    pub fn prototype(mut self, prototype: Prototype) -> Self {
        self.prototype = Some(prototype);
        self
    }

    pub fn options(mut self, options: CoroutineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub(crate) fn has_name(&self) -> bool {
        self.options.name.is_some()
    }

    pub fn build(self) -> Coroutine {
        let context = Context::with_options(&self.regions, self.this, self.options.temp_slots);
        Coroutine {
            inner: Rc::new(Inner {
                state: Cell::new(CoroutineState::NotStarted),
                leased: Cell::new(false),
                body: RefCell::new(self.body),
                context: RefCell::new(context),
                prototype: self.prototype,
                options: self.options,
            }),
        }
    }
}

/// Iterator returned by [`Coroutine::iter`]
pub struct Iter {
    coroutine: Coroutine,
    finished: bool,
}

impl Iterator for Iter {
    type Item = Result<Value, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.coroutine.resume(Value::Undefined) {
            Ok(IterResult { done: true, .. }) => {
                self.finished = true;
                None
            }
            Ok(IterResult { value, .. }) => Some(Ok(value)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
