//! Execution context
//!
//! One `Context` exists per coroutine instance. The step function reads and
//! moves the cursor through it, and calls back into it for everything that
//! needs the protected region table: routing exceptions, leaving through
//! finally blocks, fetching a caught exception and stopping.
//!
//! A lowered step function matches on the cursor, and the driver calls it
//! again whenever it returns `Step::Continue`:
//!
//! ```
//! use stepgen::{Context, Loc, RuntimeError, Step, Value};
//!
//! fn body(cx: &mut Context) -> Result<Step, RuntimeError> {
//!     match cx.advance() {
//!         Loc::At(0) => Ok(cx.suspend(2, Value::from(1))),
//!         Loc::At(2) => cx.abrupt_return(Value::from("done")),
//!         _ => cx.stop().map(Step::Value),
//!     }
//! }
//! # let _ = body;
//! ```

use super::completion::{Completion, Loc};
use super::delegate::{Delegate, Resumable};
use super::region::{RegionId, RegionSpec, RegionTable};
use crate::error::RuntimeError;
use crate::prelude::*;
use crate::value::{ArrayRef, CheapClone, ObjectRef, Value};
use tracing::debug;

/// Default number of `t0..tN` temporaries created on reset
pub const DEFAULT_TEMP_SLOTS: usize = 20;

/// What a step function hands back to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A value for the caller; `done` is read from the context
    Value(Value),
    /// Keep looping without returning to the caller
    Continue,
}

/// Cursor state and protected regions of one coroutine instance
pub struct Context {
    regions: RegionTable,
    /// Position of the block currently executing
    prev: Loc,
    /// Position to run on the next turn
    next: Loc,
    /// Value passed in by the most recent `resume`
    sent: Value,
    done: bool,
    return_value: Value,
    pub(crate) delegate: Option<Delegate>,
    fields: FxHashMap<String, Value>,
    this: Value,
    temp_slots: usize,
}

impl Context {
    /// Create a context for the given region layout, reset and ready to start
    pub fn new(regions: &[RegionSpec]) -> Self {
        Self::with_options(regions, Value::Undefined, DEFAULT_TEMP_SLOTS)
    }

    pub(crate) fn with_options(regions: &[RegionSpec], this: Value, temp_slots: usize) -> Self {
        let mut cx = Context {
            regions: RegionTable::new(regions),
            prev: Loc::START,
            next: Loc::START,
            sent: Value::Undefined,
            done: false,
            return_value: Value::Undefined,
            delegate: None,
            fields: FxHashMap::default(),
            this,
            temp_slots,
        };
        cx.reset();
        cx
    }

    /// Return to the initial state: cursor at the start, no pending
    /// completions, no delegate, temporaries `t0..tN` set to `null`.
    pub fn reset(&mut self) {
        self.prev = Loc::START;
        self.next = Loc::START;
        self.sent = Value::Undefined;
        self.done = false;
        self.return_value = Value::Undefined;
        self.delegate = None;
        self.regions.reset();

        self.fields.clear();
        for i in 0..self.temp_slots {
            self.fields.insert(format!("t{}", i), Value::Null);
        }
    }

    /* ===================== Cursor ===================== */

    /// Enter the block at `next`, making it the current position
    pub fn advance(&mut self) -> Loc {
        self.prev = self.next;
        self.prev
    }

    pub fn prev(&self) -> Loc {
        self.prev
    }

    /// Move the current position without leaving the block, e.g. where a try
    /// block starts in the middle of one
    pub fn set_prev(&mut self, loc: impl Into<Loc>) {
        self.prev = loc.into();
    }

    pub fn next_loc(&self) -> Loc {
        self.next
    }

    /// Set the position to run on the next turn
    pub fn goto(&mut self, loc: impl Into<Loc>) {
        self.next = loc.into();
    }

    /// Suspend with `value`, resuming at `resume_at`
    pub fn suspend(&mut self, resume_at: impl Into<Loc>, value: Value) -> Step {
        self.next = resume_at.into();
        Step::Value(value)
    }

    /// The value sent by the last `resume`
    pub fn sent(&self) -> &Value {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Value {
        std::mem::take(&mut self.sent)
    }

    pub(crate) fn set_sent(&mut self, value: Value) {
        self.sent = value;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    /// The receiver bound when the coroutine was created
    pub fn this(&self) -> &Value {
        &self.this
    }

    /* ===================== Fields ===================== */

    /// Read a named field; missing fields read as `undefined`
    pub fn get(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::Undefined)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn take(&mut self, name: &str) -> Value {
        self.fields.remove(name).unwrap_or_default()
    }

    /* ===================== Exceptions ===================== */

    /// Route an exception to the innermost region able to see it.
    ///
    /// Returns `Ok(true)` when a catch block will receive it, `Ok(false)` when
    /// it was routed to a finally block (which may still rethrow) or to the
    /// end of the function, where `stop` rethrows it.
    pub fn dispatch_exception(&mut self, error: Value) -> Result<bool, RuntimeError> {
        if self.done {
            return Err(RuntimeError::Thrown(error));
        }

        let prev = self.prev;
        let mut target = None;
        for (id, region) in self.regions.innermost_first() {
            if region.try_loc > prev {
                continue;
            }
            let routed = match (region.catch_loc, region.finally_loc) {
                (Some(catch_loc), Some(finally_loc)) => {
                    if prev < catch_loc {
                        Some((catch_loc, true))
                    } else if prev < finally_loc {
                        Some((finally_loc, false))
                    } else {
                        None
                    }
                }
                (Some(catch_loc), None) => (prev < catch_loc).then_some((catch_loc, true)),
                (None, Some(finally_loc)) => (prev < finally_loc).then_some((finally_loc, false)),
                (None, None) => {
                    return Err(RuntimeError::MalformedRegion {
                        try_loc: region.try_loc,
                    });
                }
            };
            if let Some((loc, caught)) = routed {
                target = Some((id, loc, caught));
                break;
            }
        }

        // Nothing encloses prev: record on the root and run to the end
        let (id, loc, caught) = target.unwrap_or((RegionId::ROOT, Loc::End, false));
        debug!(from = %prev, to = %loc, caught, "dispatching exception");
        self.regions.set_completion(id, Completion::Throw(error));
        self.next = loc;
        Ok(caught)
    }

    /// Take the pending exception of the region whose try block starts at
    /// `try_loc`. Called on entry to that region's catch block.
    pub fn catch(&mut self, try_loc: impl Into<Loc>) -> Result<Value, RuntimeError> {
        let try_loc = try_loc.into();
        let Some(id) = self
            .regions
            .innermost_first()
            .find(|(_, region)| region.try_loc == try_loc)
            .map(|(id, _)| id)
        else {
            return Err(RuntimeError::IllegalCatch { try_loc });
        };

        match self.regions.take_completion(id) {
            Completion::Throw(error) => Ok(error),
            other => {
                self.regions.set_completion(id, other);
                Err(RuntimeError::IllegalCatch { try_loc })
            }
        }
    }

    /* ===================== Abrupt completion ===================== */

    /// Innermost region whose finally block encloses the current position,
    /// or owns `finally_loc` when one is given
    fn find_finally_region(&self, finally_loc: Option<Loc>) -> Option<(RegionId, Loc)> {
        let prev = self.prev;
        self.regions.innermost_first().find_map(|(id, region)| {
            let loc = region.finally_loc?;
            let encloses = region.try_loc <= prev && (Some(loc) == finally_loc || prev < loc);
            encloses.then_some((id, loc))
        })
    }

    /// Leave the current block abruptly.
    ///
    /// If a finally block encloses the current position the record is parked
    /// in its region and control moves there; `finish` replays it afterwards.
    /// Otherwise the record takes effect immediately.
    pub fn abrupt(&mut self, record: Completion) -> Result<Step, RuntimeError> {
        match self.find_finally_region(None) {
            Some((id, finally_loc)) => {
                self.regions.set_completion(id, record);
                self.next = finally_loc;
                Ok(Step::Continue)
            }
            None => self.complete(record),
        }
    }

    pub fn abrupt_return(&mut self, value: Value) -> Result<Step, RuntimeError> {
        self.abrupt(Completion::Return(value))
    }

    pub fn abrupt_break(&mut self, target: impl Into<Loc>) -> Result<Step, RuntimeError> {
        self.abrupt(Completion::Break(target.into()))
    }

    pub fn abrupt_continue(&mut self, target: impl Into<Loc>) -> Result<Step, RuntimeError> {
        self.abrupt(Completion::Continue(target.into()))
    }

    pub fn abrupt_throw(&mut self, error: Value) -> Result<Step, RuntimeError> {
        self.abrupt(Completion::Throw(error))
    }

    /// Apply a completion record right away
    pub fn complete(&mut self, record: Completion) -> Result<Step, RuntimeError> {
        match record {
            Completion::Throw(error) => return Err(RuntimeError::Thrown(error)),
            Completion::Break(target) | Completion::Continue(target) => self.next = target,
            Completion::Return(value) => {
                self.return_value = value;
                self.next = Loc::End;
            }
            Completion::Normal => {}
        }
        Ok(Step::Continue)
    }

    /// End of the finally block at `finally_loc`: replay whatever completion
    /// sent control into it.
    ///
    /// A finally block entered by falling out of its try or catch block has a
    /// `Normal` record, which leaves `next` untouched, so the step function
    /// sets `next` to the code after the try statement before calling this.
    pub fn finish(&mut self, finally_loc: impl Into<Loc>) -> Result<Step, RuntimeError> {
        let finally_loc = finally_loc.into();
        let (id, _) = self
            .find_finally_region(Some(finally_loc))
            .ok_or(RuntimeError::IllegalFinish { finally_loc })?;
        let record = self.regions.take_completion(id);
        self.complete(record)
    }

    /// Mark the coroutine done and produce its result: the return value, or
    /// the exception that reached the root region. Safe to call repeatedly.
    pub fn stop(&mut self) -> Result<Value, RuntimeError> {
        self.done = true;
        match self.regions.root() {
            Completion::Throw(error) => Err(RuntimeError::Thrown(error.clone())),
            _ => Ok(self.return_value.clone()),
        }
    }

    /* ===================== Delegation ===================== */

    /// Hand resume calls over to `inner` until it completes; its final value
    /// is stored in the field `result_field` and execution continues at
    /// `next_loc`.
    pub fn delegate_yield<R>(
        &mut self,
        inner: R,
        result_field: impl Into<String>,
        next_loc: impl Into<Loc>,
    ) -> Step
    where
        R: Resumable + 'static,
    {
        let delegate = Delegate::new(Box::new(inner), result_field.into(), next_loc.into());
        debug!(result_field = %delegate.result_field, next_loc = %delegate.next_loc, "delegating");
        self.delegate = Some(delegate);
        Step::Continue
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    /* ===================== for-in ===================== */

    /// Snapshot the keys of an object (or indices of an array) for a for-in
    /// loop. Keys removed before the loop reaches them are skipped.
    pub fn keys(object: &Value) -> ForInKeys {
        let (source, keys) = match object {
            Value::Object(props) => (
                KeySource::Object(props.cheap_clone()),
                props.borrow().keys().cloned().collect(),
            ),
            Value::Array(items) => (
                KeySource::Array(items.cheap_clone()),
                (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            ),
            _ => (KeySource::Empty, Vec::new()),
        };
        ForInKeys {
            source,
            keys: keys.into_iter(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("prev", &self.prev)
            .field("next", &self.next)
            .field("sent", &self.sent)
            .field("done", &self.done)
            .field("return_value", &self.return_value)
            .field("delegate", &self.delegate)
            .field("regions", &self.regions)
            .finish_non_exhaustive()
    }
}

enum KeySource {
    Object(ObjectRef),
    Array(ArrayRef),
    Empty,
}

impl KeySource {
    fn contains(&self, key: &str) -> bool {
        match self {
            KeySource::Object(props) => props.borrow().contains_key(key),
            KeySource::Array(items) => key
                .parse::<usize>()
                .is_ok_and(|i| i < items.borrow().len()),
            KeySource::Empty => false,
        }
    }
}

/// Iterator returned by [`Context::keys`]
pub struct ForInKeys {
    source: KeySource,
    keys: std::vec::IntoIter<String>,
}

impl Iterator for ForInKeys {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.keys.by_ref().find(|key| self.source.contains(key))
    }
}
