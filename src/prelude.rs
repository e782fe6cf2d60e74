//! Shared collection aliases.
//!
//! The runtime hashes short string keys (context fields, object properties),
//! so every map uses `FxHasher` from `rustc-hash`.

pub use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

pub use rustc_hash::FxHashMap;

// ═══════════════════════════════════════════════════════════════════════════════
// IndexMap - insertion ordered, backed by FxHasher
// ═══════════════════════════════════════════════════════════════════════════════

pub type IndexMap<K, V> =
    indexmap::IndexMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V>
where
    K: core::hash::Hash + Eq,
{
    indexmap::IndexMap::with_hasher(Default::default())
}
