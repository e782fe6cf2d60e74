//! Positions and completion records

use crate::prelude::*;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A position in a lowered step function
///
/// `End` is the reserved location every step function routes to when it
/// has nothing left to run; it orders after every numbered position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Loc {
    At(u32),
    End,
}

impl Loc {
    /// The position where every step function starts
    pub const START: Loc = Loc::At(0);
}

impl From<u32> for Loc {
    fn from(n: u32) -> Self {
        Loc::At(n)
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::At(n) => write!(f, "{}", n),
            Loc::End => write!(f, "end"),
        }
    }
}

/// How a block of lowered code is leaving
///
/// Recorded into a region's completion slot when control has to run a
/// finally block first, and replayed by `Context::finish` afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Completion {
    #[default]
    Normal,
    /// Rethrow this exception
    Throw(Value),
    /// Jump to the break target
    Break(Loc),
    /// Jump to the continue target
    Continue(Loc),
    /// Return this value from the coroutine
    Return(Value),
}

impl Completion {
    pub fn is_throw(&self) -> bool {
        matches!(self, Completion::Throw(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Completion::Normal => "normal",
            Completion::Throw(_) => "throw",
            Completion::Break(_) => "break",
            Completion::Continue(_) => "continue",
            Completion::Return(_) => "return",
        }
    }
}
