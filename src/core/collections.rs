//! Collection aliases for the construction and query hot paths.
//!
//! Keys are small integers (vertex/tetrahedron indices), so the FxHasher's
//! speed matters more than DoS resistance here.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Fast hash map keyed by small plain data.
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// Fast hash set of small plain data.
pub type FastHashSet<T> = FxHashSet<T>;

/// Stack-first buffer; spills to the heap past `N` elements.
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Canonical facet key: the three vertex indices of a triangular facet,
/// sorted ascending so the two tetrahedra sharing the facet produce the
/// same key.
pub type FacetKey = [usize; 3];

/// Builds the canonical key of the facet opposite vertex `omit` of a
/// tetrahedron.
#[inline]
pub fn facet_key(tetra: &[usize; 4], omit: usize) -> FacetKey {
    let mut key = [0usize; 3];
    let mut n = 0;
    for (i, &v) in tetra.iter().enumerate() {
        if i != omit {
            key[n] = v;
            n += 1;
        }
    }
    key.sort_unstable();
    key
}
