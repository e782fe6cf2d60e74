//! Delegation to inner resumables (`yield*`)
//!
//! Anything a coroutine can delegate to implements [`Resumable`]. Error
//! injection is a separate capability, [`Throwable`], discovered through
//! [`Resumable::as_throwable`]; a delegate without it answers an injected
//! error by raising that same error, which the outer coroutine then handles
//! as its own exception.
//!
//! An inner [`Coroutine`] is leased for as long as the delegation lasts:
//! only the delegating coroutine may resume it until the lease is dropped.

use super::completion::Loc;
use super::driver::{Coroutine, IterResult, Method};
use crate::error::RuntimeError;
use crate::prelude::*;
use crate::value::Value;

/// Something that produces values one resume at a time
pub trait Resumable {
    /// Resume with a sent value, getting the next `{ value, done }`
    fn resume(&self, value: Value) -> Result<IterResult, RuntimeError>;

    /// The error-injection capability, if this resumable has it
    fn as_throwable(&self) -> Option<&dyn Throwable> {
        None
    }

    /// The coroutine behind this resumable, if it is one
    fn as_coroutine(&self) -> Option<&Coroutine> {
        None
    }
}

/// A resumable that can also receive an injected error
pub trait Throwable: Resumable {
    fn resume_with_error(&self, error: Value) -> Result<IterResult, RuntimeError>;
}

impl<R: Resumable + ?Sized> Resumable for Box<R> {
    fn resume(&self, value: Value) -> Result<IterResult, RuntimeError> {
        (**self).resume(value)
    }

    fn as_throwable(&self) -> Option<&dyn Throwable> {
        (**self).as_throwable()
    }

    fn as_coroutine(&self) -> Option<&Coroutine> {
        (**self).as_coroutine()
    }
}

/// An active delegation, owned by the outer coroutine's context
pub(crate) struct Delegate {
    pub(crate) inner: Box<dyn Resumable>,
    /// Context field receiving the delegate's final value
    pub(crate) result_field: String,
    /// Where the outer coroutine continues once the delegate is done
    pub(crate) next_loc: Loc,
    /// Whether this delegation holds the inner coroutine's lease
    leased: bool,
}

impl Delegate {
    pub(crate) fn new(inner: Box<dyn Resumable>, result_field: String, next_loc: Loc) -> Self {
        let leased = inner.as_coroutine().is_some_and(Coroutine::try_lease);
        Delegate {
            inner,
            result_field,
            next_loc,
            leased,
        }
    }

    /// Forward one resume call to the inner resumable
    pub(crate) fn forward(&self, method: Method, arg: Value) -> Result<IterResult, RuntimeError> {
        if let Some(coroutine) = self.inner.as_coroutine().filter(|_| self.leased) {
            return coroutine.resume_as_delegate(method, arg);
        }
        // Without the lease a coroutine goes through its public guard
        match method {
            Method::Next => self.inner.resume(arg),
            Method::Throw => match self.inner.as_throwable() {
                Some(throwable) => throwable.resume_with_error(arg),
                None => Err(RuntimeError::Thrown(arg)),
            },
        }
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("result_field", &self.result_field)
            .field("next_loc", &self.next_loc)
            .field("throwable", &self.inner.as_throwable().is_some())
            .field("leased", &self.leased)
            .finish()
    }
}

impl Drop for Delegate {
    fn drop(&mut self) {
        if let Some(coroutine) = self.inner.as_coroutine().filter(|_| self.leased) {
            coroutine.release_lease();
        }
    }
}

/* ===================== Iterator adapter ===================== */

/// A plain Rust iterator exposed as a [`Resumable`].
///
/// Sent values are ignored, and the final result carries `undefined`.
pub struct FromIter<I> {
    iter: RefCell<I>,
}

/// Wrap an iterator of values so a coroutine can delegate to it
pub fn from_iter<I>(iter: I) -> FromIter<I::IntoIter>
where
    I: IntoIterator<Item = Value>,
{
    FromIter {
        iter: RefCell::new(iter.into_iter()),
    }
}

impl<I: Iterator<Item = Value>> Resumable for FromIter<I> {
    fn resume(&self, _value: Value) -> Result<IterResult, RuntimeError> {
        let next = self.iter.borrow_mut().next();
        Ok(match next {
            Some(value) => IterResult::suspended(value),
            None => IterResult::finished(Value::Undefined),
        })
    }
}
