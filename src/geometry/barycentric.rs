//! Barycentric coordinates and the geometric predicates built on them.
//!
//! Each tetrahedron carries a [`BarycentricTransform`], the inverse of the
//! affine map from barycentric to Cartesian coordinates. The transform is
//! computed once at construction; queries then reduce to one matrix-vector
//! product, and the field gradient over the tetrahedron (constant, because
//! interpolation is linear) falls out of the same inverse.

use nalgebra::{Matrix3, Matrix4, Vector3};

/// Slack applied to barycentric containment tests.
///
/// A point with every coordinate `>= -BARY_TOL` counts as inside, so queries
/// exactly on shared facets succeed in whichever tetrahedron tests them
/// first instead of ping-ponging across the boundary.
pub const BARY_TOL: f64 = 1e-10;

/// Relative tolerance below which a tetrahedron's signed volume counts as
/// zero (flat tetrahedron).
const FLAT_TOL: f64 = 1e-12;

/// Insphere cutoff relative to the Hadamard bound of the determinant, a few
/// orders above the roundoff floor. Determinants under the cutoff
/// (cospherical configurations) count as conflicts so that the refill never
/// produces flat tetrahedra.
const INSPHERE_TOL: f64 = 1e-12;

/// Inverse affine map from Cartesian to barycentric coordinates of one
/// tetrahedron, plus the data needed for the constant field gradient.
#[derive(Debug, Clone, Copy)]
pub struct BarycentricTransform {
    /// Inverse of the edge matrix `E = [v0-v3 | v1-v3 | v2-v3]`.
    inv: Matrix3<f64>,
    /// The fourth vertex, origin of the edge frame.
    origin: Vector3<f64>,
}

impl BarycentricTransform {
    /// Builds the transform for the tetrahedron `(v0, v1, v2, v3)`.
    ///
    /// Returns `None` when the four vertices are coplanar (within a relative
    /// tolerance of the edge lengths), in which case no barycentric frame
    /// exists.
    pub fn new(
        v0: Vector3<f64>,
        v1: Vector3<f64>,
        v2: Vector3<f64>,
        v3: Vector3<f64>,
    ) -> Option<Self> {
        let e0 = v0 - v3;
        let e1 = v1 - v3;
        let e2 = v2 - v3;
        let edge = Matrix3::from_columns(&[e0, e1, e2]);

        let det = edge.determinant();
        let scale = e0.norm() * e1.norm() * e2.norm();
        if det.abs() <= FLAT_TOL * scale {
            return None;
        }

        edge.try_inverse().map(|inv| Self { inv, origin: v3 })
    }

    /// Barycentric coordinates of `p` with respect to the tetrahedron.
    ///
    /// The four coordinates sum to exactly 1 by construction; all four are in
    /// `[0, 1]` iff `p` lies inside (up to roundoff, see [`BARY_TOL`]).
    #[inline]
    pub fn barycentric(&self, p: Vector3<f64>) -> [f64; 4] {
        let lambda = self.inv * (p - self.origin);
        [
            lambda.x,
            lambda.y,
            lambda.z,
            1.0 - lambda.x - lambda.y - lambda.z,
        ]
    }

    /// Gradient of the linear interpolant with the given vertex values.
    ///
    /// Constant over the tetrahedron: `∇f = Σ_i (V_i - V_3) · ∇λ_i`, where
    /// the `∇λ_i` are the rows of the inverse edge matrix.
    #[inline]
    pub fn gradient(&self, values: &[f64; 4]) -> Vector3<f64> {
        let dv = Vector3::new(
            values[0] - values[3],
            values[1] - values[3],
            values[2] - values[3],
        );
        self.inv.transpose() * dv
    }
}

/// Signed orientation volume of `(v0, v1, v2, v3)`:
/// `det [v1-v0 | v2-v0 | v3-v0]`, positive for a right-handed tetrahedron.
#[inline]
pub fn orientation(
    v0: Vector3<f64>,
    v1: Vector3<f64>,
    v2: Vector3<f64>,
    v3: Vector3<f64>,
) -> f64 {
    Matrix3::from_columns(&[v1 - v0, v2 - v0, v3 - v0]).determinant()
}

/// Whether `p` conflicts with the circumsphere of the tetrahedron
/// `(v0, v1, v2, v3)` whose orientation sign is `orient_sign` (±1.0).
///
/// Strictly-inside points always conflict. Cospherical points (determinant
/// within a relative tolerance of zero) are treated as conflicts too, so
/// that batches of cocircular/cospherical input such as box corners still
/// carve a non-empty cavity and never leave flat refill tetrahedra behind.
pub fn conflicts_with_circumsphere(
    v0: Vector3<f64>,
    v1: Vector3<f64>,
    v2: Vector3<f64>,
    v3: Vector3<f64>,
    orient_sign: f64,
    p: Vector3<f64>,
) -> bool {
    let d0 = v0 - p;
    let d1 = v1 - p;
    let d2 = v2 - p;
    let d3 = v3 - p;

    #[rustfmt::skip]
    let m = Matrix4::new(
        d0.x, d0.y, d0.z, d0.norm_squared(),
        d1.x, d1.y, d1.z, d1.norm_squared(),
        d2.x, d2.y, d2.z, d2.norm_squared(),
        d3.x, d3.y, d3.z, d3.norm_squared(),
    );
    let det = m.determinant();

    // Hadamard bound: the row-norm product caps both the determinant and
    // its roundoff, so the cutoff tracks the precision actually available
    // even when vertex magnitudes are wildly mixed.
    let scale = m.row(0).norm() * m.row(1).norm() * m.row(2).norm() * m.row(3).norm();

    det * orient_sign < INSPHERE_TOL * scale
}
