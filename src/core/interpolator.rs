//! Tetrahedral field interpolator: cached-walk point location and
//! barycentric evaluation.

use std::cell::Cell;
use std::path::Path;

use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::core::collections::FastHashSet;
use crate::core::mesh::{self, LoadError, MeshError, TetMesh, Tetra};
use crate::core::neighbors::NeighborTable;
use crate::geometry::barycentric::{BarycentricTransform, BARY_TOL};
use crate::geometry::point::Point3;

/// Outcome of point location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    /// The point lies in `tetra` with the given barycentric coordinates.
    Inside { tetra: usize, bary: [f64; 4] },
    /// The point lies outside the mesh's convex hull.
    Outside,
}

/// Cross-query locate state.
///
/// `Cell` keeps the query API `&self` while making the type `!Sync`, which
/// is the intended discipline: one interpolator instance per worker thread,
/// cloned, never shared. Cloning copies the cache, after which the clone is
/// fully independent.
#[derive(Debug, Clone)]
struct QueryCache {
    /// Tetrahedron that answered the previous successful query.
    tetra: Cell<usize>,
    /// Set when no previous answer exists (fresh build, replaced values).
    stale: Cell<bool>,
    /// Gradient of the last tetrahedron it was computed for.
    gradient: Cell<Option<(usize, Vector3<f64>)>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self {
            tetra: Cell::new(0),
            stale: Cell::new(true),
            gradient: Cell::new(None),
        }
    }
}

/// Linear interpolator over a tetrahedral mesh of scattered samples.
///
/// Queries walk tetrahedron-to-tetrahedron from the previous query's
/// location, so successive nearby queries (the common access pattern when
/// tracking a particle) cost a handful of barycentric evaluations each.
#[derive(Debug, Clone)]
pub struct TetrahedralInterpolator {
    mesh: TetMesh,
    neighbors: NeighborTable,
    transforms: Vec<BarycentricTransform>,
    cache: QueryCache,
}

impl TetrahedralInterpolator {
    /// Builds from a validated mesh: neighbor table plus one barycentric
    /// transform per tetrahedron.
    pub fn from_mesh(mesh: TetMesh) -> Result<Self, MeshError> {
        let neighbors = NeighborTable::build(mesh.tetrahedra())?;
        let mut transforms = Vec::with_capacity(mesh.tetrahedra().len());
        for t in 0..mesh.tetrahedra().len() {
            let [a, b, c, d] = mesh.tetra_vertices(t);
            let frame = BarycentricTransform::new(a, b, c, d)
                .ok_or(MeshError::FlatTetrahedron { tetra: t })?;
            transforms.push(frame);
        }
        Ok(Self {
            mesh,
            neighbors,
            transforms,
            cache: QueryCache::default(),
        })
    }

    /// Triangulates scattered samples, then builds the interpolator.
    pub fn from_scattered(points: Vec<Point3>, values: Vec<f64>) -> Result<Self, MeshError> {
        Self::from_mesh(TetMesh::triangulated(points, values)?)
    }

    /// Builds from pre-supplied connectivity, skipping triangulation.
    pub fn with_connectivity(
        points: Vec<Point3>,
        values: Vec<f64>,
        tetrahedra: Vec<Tetra>,
    ) -> Result<Self, MeshError> {
        Self::from_mesh(TetMesh::new(points, values, tetrahedra)?)
    }

    /// Loads scattered `x y z value` records from a text file and
    /// triangulates them.
    pub fn load_scattered<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let (points, values) = mesh::load_scattered(path)?;
        Ok(Self::from_scattered(points, values)?)
    }

    #[inline]
    pub fn mesh(&self) -> &TetMesh {
        &self.mesh
    }

    #[inline]
    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// Replaces the sampled values without rebuilding geometry, for solvers
    /// that iterate field configurations over a fixed mesh. Invalidates the
    /// locate and gradient caches.
    pub fn replace_values(&mut self, values: Vec<f64>) -> Result<(), MeshError> {
        self.mesh.replace_values(values)?;
        self.cache.stale.set(true);
        self.cache.gradient.set(None);
        Ok(())
    }

    /// Locates `point`, starting from the cached tetrahedron and walking
    /// across the facet of the most negative barycentric coordinate.
    ///
    /// The cache is updated only on success, so an outside query does not
    /// degrade the starting position of the next one. `quiet` suppresses
    /// the outside-hull diagnostic.
    pub fn locate(&self, point: &[f64; 3], quiet: bool) -> Location {
        let p = Vector3::new(point[0], point[1], point[2]);
        let start = if self.cache.stale.get() {
            self.neighbors.first_interior()
        } else {
            self.cache.tetra.get()
        };

        let mut t = start;
        let mut visited: FastHashSet<usize> = FastHashSet::default();
        visited.insert(t);

        // Each hop leaves one tetrahedron behind; more hops than tetrahedra
        // means the walk is cycling on roundoff.
        for _ in 0..self.transforms.len() {
            let bary = self.transforms[t].barycentric(p);
            if bary.iter().all(|&l| l >= -BARY_TOL) {
                self.cache.tetra.set(t);
                self.cache.stale.set(false);
                return Location::Inside { tetra: t, bary };
            }
            match self.neighbors.neighbor(t, exit_facet(&bary)) {
                None => {
                    if !quiet {
                        warn!(
                            x = point[0],
                            y = point[1],
                            z = point[2],
                            "query point outside mesh hull"
                        );
                    }
                    return Location::Outside;
                }
                Some(next) => {
                    if !visited.insert(next) {
                        break;
                    }
                    t = next;
                }
            }
        }

        debug!(
            start,
            x = point[0],
            y = point[1],
            z = point[2],
            "walk lost, falling back to exhaustive scan"
        );
        self.locate_exhaustive(p, point, quiet)
    }

    /// Linear scan over every tetrahedron; the walk's backstop.
    fn locate_exhaustive(&self, p: Vector3<f64>, point: &[f64; 3], quiet: bool) -> Location {
        for (t, frame) in self.transforms.iter().enumerate() {
            let bary = frame.barycentric(p);
            if bary.iter().all(|&l| l >= -BARY_TOL) {
                self.cache.tetra.set(t);
                self.cache.stale.set(false);
                return Location::Inside { tetra: t, bary };
            }
        }
        if !quiet {
            warn!(
                x = point[0],
                y = point[1],
                z = point[2],
                "query point outside mesh hull"
            );
        }
        Location::Outside
    }

    /// Field value at `point`, or `None` outside the hull.
    pub fn value(&self, point: &[f64; 3], quiet: bool) -> Option<f64> {
        match self.locate(point, quiet) {
            Location::Inside { tetra, bary } => {
                let values = self.mesh.tetra_values(tetra);
                Some(
                    bary.iter()
                        .zip(values.iter())
                        .map(|(l, v)| l * v)
                        .sum::<f64>(),
                )
            }
            Location::Outside => None,
        }
    }

    /// Field gradient at `point`, or `None` outside the hull.
    ///
    /// The gradient is constant per tetrahedron, so repeat queries in the
    /// same tetrahedron reuse the cached vector.
    pub fn gradient(&self, point: &[f64; 3], quiet: bool) -> Option<Vector3<f64>> {
        match self.locate(point, quiet) {
            Location::Inside { tetra, .. } => {
                if let Some((cached_tetra, g)) = self.cache.gradient.get() {
                    if cached_tetra == tetra {
                        return Some(g);
                    }
                }
                let g = self.transforms[tetra].gradient(&self.mesh.tetra_values(tetra));
                self.cache.gradient.set(Some((tetra, g)));
                Some(g)
            }
            Location::Outside => None,
        }
    }

    /// Dumps the mesh as `<stem>_points.dat` and `<stem>_tetra.dat` under
    /// `dir`, reloadable via [`TetMesh::load_points`] /
    /// [`TetMesh::load_tetra`].
    pub fn save<P: AsRef<Path>>(&self, dir: P, stem: &str) -> Result<(), std::io::Error> {
        let dir = dir.as_ref();
        self.mesh.save_points(dir.join(format!("{stem}_points.dat")))?;
        self.mesh.save_tetra(dir.join(format!("{stem}_tetra.dat")))
    }
}

/// Facet to exit through: the one opposite the most negative barycentric
/// coordinate. Ties resolve to the lowest facet index (strict `<` keeps the
/// first minimum), so the walk is deterministic.
#[inline]
pub(crate) fn exit_facet(bary: &[f64; 4]) -> usize {
    let mut facet = 0;
    let mut min = bary[0];
    for (i, &l) in bary.iter().enumerate().skip(1) {
        if l < min {
            min = l;
            facet = i;
        }
    }
    facet
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_tetra() -> TetrahedralInterpolator {
        TetrahedralInterpolator::with_connectivity(
            vec![
                Point3::new([0.0, 0.0, 0.0]),
                Point3::new([1.0, 0.0, 0.0]),
                Point3::new([0.0, 1.0, 0.0]),
                Point3::new([0.0, 0.0, 1.0]),
            ],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![[0, 1, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn exit_facet_picks_most_negative() {
        assert_eq!(exit_facet(&[0.5, -0.2, 0.4, 0.3]), 1);
        assert_eq!(exit_facet(&[-0.1, 0.2, -0.5, 1.4]), 2);
    }

    #[test]
    fn exit_facet_ties_resolve_to_lowest_index() {
        assert_eq!(exit_facet(&[-0.5, -0.5, 1.0, 1.0]), 0);
        assert_eq!(exit_facet(&[0.5, -0.25, -0.25, 1.0]), 1);
        assert_eq!(exit_facet(&[0.25, 0.25, 0.25, 0.25]), 0);
    }

    #[test]
    fn inside_query_updates_cache() {
        let interp = unit_tetra();
        assert!(interp.cache.stale.get());
        let loc = interp.locate(&[0.2, 0.2, 0.2], false);
        assert!(matches!(loc, Location::Inside { tetra: 0, .. }));
        assert!(!interp.cache.stale.get());
        assert_eq!(interp.cache.tetra.get(), 0);
    }

    #[test]
    fn outside_query_leaves_cache_untouched() {
        let interp = unit_tetra();
        interp.locate(&[0.2, 0.2, 0.2], false);
        assert!(!interp.cache.stale.get());
        assert_eq!(interp.locate(&[5.0, 5.0, 5.0], true), Location::Outside);
        // Still seeded from the earlier success.
        assert!(!interp.cache.stale.get());
        assert_eq!(interp.cache.tetra.get(), 0);
    }

    #[test]
    fn value_is_barycentric_blend() {
        let interp = unit_tetra();
        let v = interp.value(&[0.25, 0.0, 0.0], false).unwrap();
        assert_relative_eq!(v, 0.25, epsilon = 1e-12);
        assert_eq!(interp.value(&[3.0, 0.0, 0.0], true), None);
    }

    #[test]
    fn gradient_is_cached_per_tetrahedron() {
        let interp = unit_tetra();
        let g1 = interp.gradient(&[0.2, 0.2, 0.2], false).unwrap();
        assert!(interp.cache.gradient.get().is_some());
        let g2 = interp.gradient(&[0.1, 0.1, 0.1], false).unwrap();
        assert_eq!(g1, g2);
        assert_relative_eq!(g1.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(g1.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn replace_values_invalidates_caches() {
        let mut interp = unit_tetra();
        interp.gradient(&[0.2, 0.2, 0.2], false).unwrap();
        interp.replace_values(vec![0.0, 2.0, 0.0, 0.0]).unwrap();
        assert!(interp.cache.stale.get());
        assert!(interp.cache.gradient.get().is_none());
        let g = interp.gradient(&[0.2, 0.2, 0.2], false).unwrap();
        assert_relative_eq!(g.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn clone_has_independent_cache() {
        let original = unit_tetra();
        original.locate(&[0.2, 0.2, 0.2], false);
        let clone = original.clone();
        assert!(!clone.cache.stale.get());
        clone.locate(&[5.0, 5.0, 5.0], true);
        original.locate(&[0.1, 0.1, 0.1], false);
        assert_eq!(
            clone.value(&[0.25, 0.0, 0.0], false),
            original.value(&[0.25, 0.0, 0.0], false)
        );
    }

    #[test]
    fn walk_crosses_between_tetrahedra() {
        // Two tetrahedra glued across facet {1, 2, 3}; querying each half
        // in turn exercises the neighbor hop from the cached start.
        let interp = TetrahedralInterpolator::with_connectivity(
            vec![
                Point3::new([0.0, 0.0, 0.0]),
                Point3::new([1.0, 0.0, 0.0]),
                Point3::new([0.0, 1.0, 0.0]),
                Point3::new([0.0, 0.0, 1.0]),
                Point3::new([1.0, 1.0, 1.0]),
            ],
            vec![0.0, 1.0, 0.0, 0.0, 3.0],
            vec![[0, 1, 2, 3], [4, 1, 2, 3]],
        )
        .unwrap();

        let a = interp.locate(&[0.1, 0.1, 0.1], false);
        assert!(matches!(a, Location::Inside { tetra: 0, .. }));
        let b = interp.locate(&[0.7, 0.7, 0.7], false);
        assert!(matches!(b, Location::Inside { tetra: 1, .. }));
        assert_eq!(interp.cache.tetra.get(), 1);
    }
}
