//! Delaunay tetrahedralization of a scattered point cloud.
//!
//! Classic Bowyer–Watson incremental insertion inside an enclosing
//! super-tetrahedron: for each sample, collect the tetrahedra whose
//! circumspheres conflict with it, carve out that cavity, and refill it by
//! fanning the cavity-boundary facets to the new point. Tetrahedra touching
//! the super-tetrahedron are stripped at the end, leaving a tessellation of
//! the convex hull in which every sample is a vertex.
//!
//! Cospherical samples (box corners, lattice points) are the common case for
//! tabulated fields, so the conflict predicate counts near-zero insphere
//! determinants as conflicts. That keeps the cavity non-empty for every
//! insertion and guarantees the refill never creates flat tetrahedra: a
//! cavity-boundary facet coplanar with the inserted point would put the
//! point on the boundary of the outer tetrahedron's circumsphere, making
//! that tetrahedron part of the cavity as well.

use nalgebra::Vector3;
use tracing::trace;

use crate::core::collections::{facet_key, FacetKey, FastHashMap};
use crate::core::mesh::{MeshError, Tetra};
use crate::geometry::barycentric::{conflicts_with_circumsphere, orientation};
use crate::geometry::point::Point3;

/// Super-tetrahedron circumradius, as a multiple of the cloud's extent.
const SUPER_SCALE: f64 = 1.0e4;

/// Tetrahedralizes `points`, covering their convex hull exactly.
///
/// Fails on fewer than 4 points, exact duplicate points, and degenerate
/// (coplanar or collinear) clouds.
pub fn delaunay(points: &[Point3]) -> Result<Vec<Tetra>, MeshError> {
    if points.len() < 4 {
        return Err(MeshError::TooFewPoints {
            found: points.len(),
        });
    }
    reject_duplicates(points)?;

    let n = points.len();
    let mut verts: Vec<Vector3<f64>> = points.iter().map(|p| p.to_vector()).collect();
    let enclosure = super_vertices(&verts);
    verts.extend(enclosure);

    let mut tetras: Vec<Tetra> = vec![[n, n + 1, n + 2, n + 3]];

    for i in 0..n {
        insert_point(&mut tetras, &verts, i)?;
        trace!(point = i, tetrahedra = tetras.len(), "inserted sample");
    }

    // Strip everything attached to the super-tetrahedron.
    tetras.retain(|t| t.iter().all(|&v| v < n));
    if tetras.is_empty() {
        return Err(MeshError::DegenerateCloud);
    }

    let mut used = vec![false; n];
    for t in &tetras {
        for &v in t {
            used[v] = true;
        }
    }
    if let Some(index) = used.iter().position(|&u| !u) {
        return Err(MeshError::IsolatedPoint { index });
    }

    Ok(tetras)
}

/// One Bowyer–Watson insertion step for point `i`.
fn insert_point(tetras: &mut Vec<Tetra>, verts: &[Vector3<f64>], i: usize) -> Result<(), MeshError> {
    let p = verts[i];

    let mut conflicts: Vec<usize> = Vec::new();
    for (t, tet) in tetras.iter().enumerate() {
        let [a, b, c, d] = [verts[tet[0]], verts[tet[1]], verts[tet[2]], verts[tet[3]]];
        let sign = orientation(a, b, c, d).signum();
        if conflicts_with_circumsphere(a, b, c, d, sign, p) {
            conflicts.push(t);
        }
    }
    if conflicts.is_empty() {
        // The point lies inside the super-tetrahedron, so at minimum the
        // tetrahedron containing it must conflict.
        return Err(MeshError::TriangulationFailed { point: i });
    }

    // A facet seen once among the conflict tetrahedra bounds the cavity;
    // seen twice, it is interior to the cavity and disappears.
    let mut seen: FastHashMap<FacetKey, usize> = FastHashMap::default();
    for &t in &conflicts {
        for omit in 0..4 {
            *seen.entry(facet_key(&tetras[t], omit)).or_insert(0) += 1;
        }
    }
    // Second pass in scan order keeps the refill deterministic.
    let mut boundary: Vec<FacetKey> = Vec::new();
    for &t in &conflicts {
        for omit in 0..4 {
            let key = facet_key(&tetras[t], omit);
            if seen.get(&key) == Some(&1) {
                boundary.push(key);
            }
        }
    }

    // Drop the cavity (reverse order keeps the remaining indices valid).
    for &t in conflicts.iter().rev() {
        tetras.swap_remove(t);
    }

    for facet in boundary {
        let mut tet = [facet[0], facet[1], facet[2], i];
        let vol = orientation(verts[tet[0]], verts[tet[1]], verts[tet[2]], p);
        if vol == 0.0 {
            return Err(MeshError::TriangulationFailed { point: i });
        }
        if vol < 0.0 {
            tet.swap(0, 1);
        }
        tetras.push(tet);
    }
    Ok(())
}

/// Rejects clouds containing exact duplicate points; the reported index is
/// the position in lexicographic point order.
fn reject_duplicates(points: &[Point3]) -> Result<(), MeshError> {
    let mut keys: Vec<_> = points.iter().map(Point3::lex_key).collect();
    keys.sort_unstable();
    for (index, pair) in keys.windows(2).enumerate() {
        if pair[0] == pair[1] {
            return Err(MeshError::DuplicatePoint { index: index + 1 });
        }
    }
    Ok(())
}

/// Regular tetrahedron with circumradius `SUPER_SCALE` times the cloud's
/// extent, centered on the cloud. Its insphere radius is a third of that,
/// still far outside every sample.
fn super_vertices(verts: &[Vector3<f64>]) -> [Vector3<f64>; 4] {
    let centroid = verts.iter().sum::<Vector3<f64>>() / verts.len() as f64;
    let extent = verts
        .iter()
        .map(|v| (v - centroid).norm())
        .fold(0.0f64, f64::max);
    // Duplicate rejection upstream means distinct points, hence a non-zero
    // extent; the guard only covers a degenerate single-location cloud.
    let extent = if extent > 0.0 { extent } else { 1.0 };
    let r = SUPER_SCALE * extent / 3.0f64.sqrt();
    [
        centroid + r * Vector3::new(1.0, 1.0, 1.0),
        centroid + r * Vector3::new(1.0, -1.0, -1.0),
        centroid + r * Vector3::new(-1.0, 1.0, -1.0),
        centroid + r * Vector3::new(-1.0, -1.0, 1.0),
    ]
}
