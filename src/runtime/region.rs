//! Protected region table
//!
//! A protected region is the lowered form of one `try` statement: the
//! position where its try block starts plus the optional positions of its
//! catch and finally blocks. Regions are listed outermost-first, which is the
//! order a lowering pass discovers them in, and searched innermost-first.
//!
//! No region stores where it ends. Whether the cursor is inside a region is
//! decided from `try_loc <= prev` together with how `prev` compares to the
//! catch/finally targets, which is enough because nested regions are laid
//! out contiguously.

use super::completion::{Completion, Loc};
use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};

/// Static layout of one try statement
///
/// Serialized as the compact `[try, catch?, finally?]` array form, e.g.
/// `[0, 11]` for try/catch or `[3, null, 9]` for try/finally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Option<u32>>", into = "Vec<Option<u32>>")]
pub struct RegionSpec {
    pub try_loc: Loc,
    pub catch_loc: Option<Loc>,
    pub finally_loc: Option<Loc>,
}

impl RegionSpec {
    pub fn new(try_loc: u32, catch_loc: Option<u32>, finally_loc: Option<u32>) -> Self {
        RegionSpec {
            try_loc: Loc::At(try_loc),
            catch_loc: catch_loc.map(Loc::At),
            finally_loc: finally_loc.map(Loc::At),
        }
    }

    pub fn try_catch(try_loc: u32, catch_loc: u32) -> Self {
        Self::new(try_loc, Some(catch_loc), None)
    }

    pub fn try_finally(try_loc: u32, finally_loc: u32) -> Self {
        Self::new(try_loc, None, Some(finally_loc))
    }

    pub fn try_catch_finally(try_loc: u32, catch_loc: u32, finally_loc: u32) -> Self {
        Self::new(try_loc, Some(catch_loc), Some(finally_loc))
    }

    /// Parse a whole region layout, e.g. `[[0, 11], [3, null, 9]]`
    pub fn list_from_json(json: &str) -> Result<Vec<RegionSpec>, RuntimeError> {
        serde_json::from_str(json).map_err(|e| RuntimeError::invalid_region_spec(e.to_string()))
    }
}

fn loc_number(loc: Loc) -> Option<u32> {
    match loc {
        Loc::At(n) => Some(n),
        Loc::End => None,
    }
}

impl TryFrom<Vec<Option<u32>>> for RegionSpec {
    type Error = RuntimeError;

    fn try_from(triple: Vec<Option<u32>>) -> Result<Self, Self::Error> {
        match triple.as_slice() {
            [Some(try_loc)] => Ok(RegionSpec::new(*try_loc, None, None)),
            [Some(try_loc), catch_loc] => Ok(RegionSpec::new(*try_loc, *catch_loc, None)),
            [Some(try_loc), catch_loc, finally_loc] => {
                Ok(RegionSpec::new(*try_loc, *catch_loc, *finally_loc))
            }
            [None, ..] => Err(RuntimeError::invalid_region_spec(
                "try location must be a number",
            )),
            other => Err(RuntimeError::invalid_region_spec(format!(
                "expected [try, catch?, finally?], got {} entries",
                other.len()
            ))),
        }
    }
}

impl From<RegionSpec> for Vec<Option<u32>> {
    fn from(spec: RegionSpec) -> Self {
        let mut triple = vec![loc_number(spec.try_loc)];
        match (spec.catch_loc, spec.finally_loc) {
            (catch_loc, Some(finally_loc)) => {
                triple.push(catch_loc.and_then(loc_number));
                triple.push(loc_number(finally_loc));
            }
            (Some(catch_loc), None) => triple.push(loc_number(catch_loc)),
            (None, None) => {}
        }
        triple
    }
}

/// Index of a completion slot. Slot 0 belongs to the root region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegionId(usize);

impl RegionId {
    pub(crate) const ROOT: RegionId = RegionId(0);
}

/// The regions of one coroutine plus one owned completion slot per region
#[derive(Debug)]
pub(crate) struct RegionTable {
    entries: Box<[RegionSpec]>,
    completions: Box<[Completion]>,
}

impl RegionTable {
    pub(crate) fn new(specs: &[RegionSpec]) -> Self {
        RegionTable {
            entries: specs.into(),
            completions: vec![Completion::Normal; specs.len() + 1].into_boxed_slice(),
        }
    }

    /// Clear every completion slot, root included
    pub(crate) fn reset(&mut self) {
        for slot in self.completions.iter_mut() {
            *slot = Completion::Normal;
        }
    }

    /// Non-root regions, innermost (last declared) first
    pub(crate) fn innermost_first(&self) -> impl Iterator<Item = (RegionId, &RegionSpec)> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .map(|(i, spec)| (RegionId(i + 1), spec))
    }

    #[cfg(test)]
    fn completion(&self, id: RegionId) -> Option<&Completion> {
        self.completions.get(id.0)
    }

    pub(crate) fn set_completion(&mut self, id: RegionId, record: Completion) {
        if let Some(slot) = self.completions.get_mut(id.0) {
            *slot = record;
        }
    }

    /// Take a slot's record, leaving it `Normal`
    pub(crate) fn take_completion(&mut self, id: RegionId) -> Completion {
        self.completions
            .get_mut(id.0)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub(crate) fn root(&self) -> &Completion {
        self.completions.first().unwrap_or(&Completion::Normal)
    }
}
