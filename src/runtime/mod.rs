//! Coroutine runtime
//!
//! The pieces a lowered function body runs against:
//! - `completion` - positions and completion records
//! - `region` - protected regions and their completion slots
//! - `context` - per-instance cursor, fields and abrupt completion handling
//! - `delegate` - delegation to inner resumables
//! - `driver` - the resume loop around a step function

mod completion;
mod context;
mod delegate;
mod driver;
mod region;

pub use completion::{Completion, Loc};
pub use context::{Context, DEFAULT_TEMP_SLOTS, ForInKeys, Step};
pub use delegate::{FromIter, Resumable, Throwable, from_iter};
pub use driver::{Coroutine, CoroutineBuilder, IterResult, Iter, StepFn};
pub use region::RegionSpec;
