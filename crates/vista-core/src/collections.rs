//! Map types shared by the registries and the render cache.
//!
//! `hashbrown` backs them by default; the `std-hash` feature switches to
//! the standard library maps.

#[cfg(feature = "std-hash")]
pub(crate) use std::collections::HashMap;

#[cfg(not(feature = "std-hash"))]
pub(crate) use hashbrown::HashMap;

/// Insertion-ordered map keyed by viewport or instance id.
pub type IdMap<V> = indexmap::IndexMap<String, V>;
