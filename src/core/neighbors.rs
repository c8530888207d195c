//! Facet-matched neighbor table over a tetrahedra list.
//!
//! Slot `f` of a tetrahedron's entry holds the tetrahedron across the facet
//! opposite vertex `f`, or `None` when that facet lies on the hull boundary.
//! Symmetry holds by construction: both sides of a shared facet are written
//! from the same map entry.

use serde::{Deserialize, Serialize};

use crate::core::collections::{facet_key, FacetKey, FastHashMap, SmallBuffer};
use crate::core::mesh::{MeshError, Tetra};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborTable {
    neighbors: Vec<[Option<usize>; 4]>,
    first_interior: usize,
}

impl NeighborTable {
    /// Builds the table, failing if any facet is shared by more than two
    /// tetrahedra (corrupt connectivity).
    pub fn build(tetrahedra: &[Tetra]) -> Result<Self, MeshError> {
        let mut by_facet: FastHashMap<FacetKey, SmallBuffer<(usize, usize), 2>> =
            FastHashMap::default();
        for (t, tet) in tetrahedra.iter().enumerate() {
            for omit in 0..4 {
                by_facet
                    .entry(facet_key(tet, omit))
                    .or_default()
                    .push((t, omit));
            }
        }

        let mut neighbors = vec![[None; 4]; tetrahedra.len()];
        for (facet, incident) in by_facet {
            match incident.as_slice() {
                [_] => {}
                [(t1, f1), (t2, f2)] => {
                    neighbors[*t1][*f1] = Some(*t2);
                    neighbors[*t2][*f2] = Some(*t1);
                }
                more => {
                    return Err(MeshError::NonManifoldFacet {
                        facet,
                        count: more.len(),
                    });
                }
            }
        }

        // Walks restarting after a cache invalidation seed here: an interior
        // tetrahedron can reach any target without leaving the mesh first.
        // Thin meshes may have none, in which case index 0 serves.
        let first_interior = neighbors
            .iter()
            .position(|slots| slots.iter().all(Option::is_some))
            .unwrap_or(0);

        Ok(Self {
            neighbors,
            first_interior,
        })
    }

    /// The tetrahedron across the facet opposite vertex `facet` of `tetra`.
    #[inline]
    pub fn neighbor(&self, tetra: usize, facet: usize) -> Option<usize> {
        self.neighbors[tetra][facet]
    }

    /// Lowest-index tetrahedron with all four facets shared, or 0.
    #[inline]
    pub fn first_interior(&self) -> usize {
        self.first_interior
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
