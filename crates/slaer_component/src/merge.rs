//! Map combinators shared by the stores.
//!
//! The two rules differ:
//!
//! - [`merge`] overwrites (left to right): incoming keys win. Used when a name
//!   that already exists is registered again.
//! - [`extend`] fills gaps: keys already in `out` are preserved, and among the
//!   sources the right-most one wins. Used when deriving a new instance from a
//!   template or cloning one.

use indexmap::IndexMap;

/// Copy keys missing from `out` out of `sources`, right-most source first.
pub fn extend<V: Clone>(out: &mut IndexMap<String, V>, sources: &[&IndexMap<String, V>]) {
    for source in sources.iter().rev() {
        for (key, value) in source.iter() {
            if !out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Copy every key of `sources` into `out`, left to right, overwriting.
pub fn merge<V: Clone>(out: &mut IndexMap<String, V>, sources: &[&IndexMap<String, V>]) {
    for source in sources {
        for (key, value) in source.iter() {
            out.insert(key.clone(), value.clone());
        }
    }
}

/// Merge `sources` into a fresh map, then extend `out` with the result.
pub fn merge_extend<V: Clone>(out: &mut IndexMap<String, V>, sources: &[&IndexMap<String, V>]) {
    let mut merged = IndexMap::new();
    merge(&mut merged, sources);
    extend(out, &[&merged]);
}
