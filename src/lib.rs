//! Resumable generator runtime for lowered step functions
//!
//! A generator body is compiled ahead of time into a step function: a
//! `match` over an explicit position cursor that runs until it suspends,
//! finishes, or raises. This crate supplies everything that function runs
//! against: the resume loop, the per-instance [`Context`], try/catch/finally
//! routing through protected regions, and delegation to inner generators.
//!
//! # Example
//!
//! ```
//! use stepgen::{Context, IterResult, Loc, RegionSpec, Step, Value};
//!
//! // try { yield 1 } catch (e) { yield e } ; return "done"
//! let co = stepgen::wrap(
//!     |cx: &mut Context| match cx.advance() {
//!         Loc::At(0) => Ok(cx.suspend(3, Value::from(1))),
//!         Loc::At(3) => {
//!             cx.goto(8);
//!             Ok(Step::Continue)
//!         }
//!         Loc::At(5) => {
//!             let e = cx.catch(0)?;
//!             Ok(cx.suspend(8, e))
//!         }
//!         Loc::At(8) => cx.abrupt_return(Value::from("done")),
//!         _ => cx.stop().map(Step::Value),
//!     },
//!     &[RegionSpec::try_catch(0, 5)],
//! );
//!
//! assert_eq!(co.resume(Value::Undefined).unwrap(), IterResult::suspended(Value::from(1)));
//! assert_eq!(
//!     co.resume_with_error(Value::from("oops")).unwrap(),
//!     IterResult::suspended(Value::from("oops"))
//! );
//! assert_eq!(co.resume(Value::Undefined).unwrap(), IterResult::finished(Value::from("done")));
//! ```

pub mod config;
pub mod error;
pub mod prelude;
pub mod runtime;
pub mod tag;
pub mod value;

pub use config::CoroutineOptions;
pub use error::RuntimeError;
pub use runtime::{
    Completion, Context, Coroutine, CoroutineBuilder, DEFAULT_TEMP_SLOTS, ForInKeys, FromIter,
    Iter, IterResult, Loc, RegionSpec, Resumable, Step, StepFn, Throwable, from_iter,
};
pub use tag::{CoroutineFn, Prototype, is_coroutine_fn, mark};
pub use value::{CheapClone, Function, NativeFn, Value};

/// Wrap a step function and its region layout into a fresh coroutine
pub fn wrap<S>(body: S, regions: &[RegionSpec]) -> Coroutine
where
    S: StepFn + 'static,
{
    Coroutine::builder(body)
        .regions(regions.iter().copied())
        .build()
}
