//! The closed sum type over both interpolation families.
//!
//! Transport code holds one `Interpolator` per field and dispatches by
//! match instead of through a virtual base; the two variants are the only
//! implementations there will ever be, so the closed enum keeps the
//! contract explicit and the dispatch free.

use std::path::Path;

use nalgebra::Vector3;
use tracing::warn;

use crate::core::interpolator::TetrahedralInterpolator;
use crate::grid::bilinear::{BilinearTable, GridQueryError};

/// A field interpolator of either family, with the shared query contract:
/// value and gradient by position, text persistence, clone-per-worker.
#[derive(Debug, Clone)]
pub enum Interpolator {
    /// Unstructured tetrahedral mesh over scattered 3-D samples.
    Tetrahedral3D(TetrahedralInterpolator),
    /// Even 2-D lookup grid over the unit disk; `z` is ignored.
    RegularGrid2D(BilinearTable),
}

impl Interpolator {
    /// Field value at `pos`, or `None` when the position is outside the
    /// interpolator's domain. `quiet` suppresses the diagnostic log line.
    pub fn value(&self, pos: &[f64; 3], quiet: bool) -> Option<f64> {
        match self {
            Self::Tetrahedral3D(mesh) => mesh.value(pos, quiet),
            Self::RegularGrid2D(table) => {
                grid_outcome(table.interpolate(pos[0], pos[1]), pos, quiet)
            }
        }
    }

    /// Field gradient at `pos`, or `None` outside the domain. Grid tables
    /// vary only over the disk plane, so their gradient has `z = 0`.
    pub fn gradient(&self, pos: &[f64; 3], quiet: bool) -> Option<Vector3<f64>> {
        match self {
            Self::Tetrahedral3D(mesh) => mesh.gradient(pos, quiet),
            Self::RegularGrid2D(table) => {
                grid_outcome(table.gradient(pos[0], pos[1]), pos, quiet)
                    .map(|(gx, gy)| Vector3::new(gx, gy, 0.0))
            }
        }
    }

    /// Persists the interpolator's data under `dir` with file names derived
    /// from `stem`.
    pub fn save<P: AsRef<Path>>(&self, dir: P, stem: &str) -> Result<(), std::io::Error> {
        match self {
            Self::Tetrahedral3D(mesh) => mesh.save(dir, stem),
            Self::RegularGrid2D(table) => {
                table.save(dir.as_ref().join(format!("{stem}.dat")))
            }
        }
    }
}

impl From<TetrahedralInterpolator> for Interpolator {
    fn from(mesh: TetrahedralInterpolator) -> Self {
        Self::Tetrahedral3D(mesh)
    }
}

impl From<BilinearTable> for Interpolator {
    fn from(table: BilinearTable) -> Self {
        Self::RegularGrid2D(table)
    }
}

/// Collapses a grid query to the shared `Option` outcome, logging the
/// out-of-domain case unless `quiet`.
fn grid_outcome<T>(result: Result<T, GridQueryError>, pos: &[f64; 3], quiet: bool) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(err) => {
            if !quiet {
                warn!(x = pos[0], y = pos[1], %err, "grid query out of domain");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3;

    fn tetra_variant() -> Interpolator {
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
        .into()
    }

    fn grid_variant() -> Interpolator {
        let mut samples = Vec::new();
        for ix in 0..3 {
            for iy in 0..3 {
                let (x, y) = (0.25 * ix as f64, 0.25 * iy as f64);
                samples.push((x, y, 2.0 * x + y));
            }
        }
        BilinearTable::from_samples(0.0, 0.25, 0.0, 0.25, &samples)
            .unwrap()
            .into()
    }

    #[test]
    fn both_variants_answer_the_shared_contract() {
        let mesh = tetra_variant();
        let grid = grid_variant();

        let v = mesh.value(&[0.25, 0.25, 0.25], false).unwrap();
        approx::assert_relative_eq!(v, 0.25, epsilon = 1e-12);
        let v = grid.value(&[0.1, 0.2, 99.0], false).unwrap();
        approx::assert_relative_eq!(v, 0.4, epsilon = 1e-12);

        let g = grid.gradient(&[0.1, 0.2, 0.0], false).unwrap();
        approx::assert_relative_eq!(g.x, 2.0, epsilon = 1e-12);
        approx::assert_relative_eq!(g.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn out_of_domain_is_none_for_both() {
        assert_eq!(tetra_variant().value(&[5.0, 5.0, 5.0], true), None);
        assert_eq!(grid_variant().value(&[0.9, 0.9, 0.0], true), None);
    }
}
