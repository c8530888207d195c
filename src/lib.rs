//! # meshfield
//!
//! Field evaluation at arbitrary query points from pre-computed sampled data,
//! as needed by condensed-matter transport simulations:
//!
//! - **Tetrahedral mesh interpolation** — scattered 3-D samples (for example a
//!   numerically tabulated electric potential) are triangulated into a
//!   tetrahedral decomposition of their convex hull; queries locate the
//!   enclosing tetrahedron with a cached neighbor walk and return
//!   barycentric-weighted values and piecewise-constant gradients.
//! - **Direction-grid lookup tables** — anisotropic direction-dependent
//!   quantities (phonon phase velocity, group velocity, slowness,
//!   polarization) are sampled once on an evenly spaced grid over the unit
//!   disk of direction cosines and answered by bilinear lookup.
//!
//! Both families share the same query contract (value / gradient by position,
//! text persistence) through the closed [`Interpolator`](interp::Interpolator)
//! sum type.
//!
//! # Mesh interpolation
//!
//! ```rust
//! use meshfield::prelude::*;
//!
//! // One tetrahedron, value = x coordinate at each vertex.
//! let points = vec![
//!     Point3::new([0.0, 0.0, 0.0]),
//!     Point3::new([1.0, 0.0, 0.0]),
//!     Point3::new([0.0, 1.0, 0.0]),
//!     Point3::new([0.0, 0.0, 1.0]),
//! ];
//! let values = vec![0.0, 1.0, 0.0, 0.0];
//! let tetra = vec![[0, 1, 2, 3]];
//!
//! let field = TetrahedralInterpolator::with_connectivity(points, values, tetra).unwrap();
//!
//! // Linear field reproduced exactly inside the mesh.
//! let v = field.value(&[0.25, 0.25, 0.25], false).unwrap();
//! assert!((v - 0.25).abs() < 1e-12);
//!
//! let g = field.gradient(&[0.25, 0.25, 0.25], false).unwrap();
//! assert!((g.x - 1.0).abs() < 1e-12);
//!
//! // Outside the hull the query is a signaled condition, not an error.
//! assert_eq!(field.value(&[2.0, 2.0, 2.0], true), None);
//! ```
//!
//! Scattered samples without pre-built connectivity go through the
//! triangulator instead:
//!
//! ```rust
//! use meshfield::prelude::*;
//!
//! let points = vec![
//!     Point3::new([0.0, 0.0, 0.0]),
//!     Point3::new([1.0, 0.0, 0.0]),
//!     Point3::new([0.0, 1.0, 0.0]),
//!     Point3::new([0.0, 0.0, 1.0]),
//!     Point3::new([0.25, 0.25, 0.25]),
//! ];
//! let values: Vec<f64> = points.iter().map(|p| p.x()).collect();
//!
//! let field = TetrahedralInterpolator::from_scattered(points, values).unwrap();
//! let v = field.value(&[0.1, 0.1, 0.1], false).unwrap();
//! assert!((v - 0.1).abs() < 1e-9);
//! ```
//!
//! # Query semantics
//!
//! Construction errors (degenerate point clouds, corrupt connectivity,
//! double-populated grid cells) are unrecoverable and reported as `Err` — the
//! interpolator must not be used afterward. Query points outside the mesh
//! hull or outside the unit disk are *expected* steady-state outcomes and are
//! reported as sentinels (`None`, dedicated error variants); the `quiet` flag
//! on mesh queries suppresses only the diagnostic log line, never the
//! outcome.
//!
//! # Thread safety
//!
//! Mesh queries mutate a per-instance locate cache (last tetrahedron, cached
//! gradient) through [`std::cell::Cell`], which makes
//! [`TetrahedralInterpolator`](core::interpolator::TetrahedralInterpolator)
//! deliberately `!Sync`. Clone one instance per worker thread instead of
//! sharing; clones are fully independent, cache included.

/// Core mesh data structures and the tetrahedral interpolation pipeline.
pub mod core {
    /// Collection aliases tuned for the hot construction/query paths.
    pub mod collections;
    /// Tetrahedral field interpolator: point location walk and evaluation.
    pub mod interpolator;
    /// Mesh store: sample points, values, connectivity, text persistence.
    pub mod mesh;
    /// Facet-matched neighbor table over a tetrahedra list.
    pub mod neighbors;
    /// Delaunay tetrahedralization of a scattered point cloud.
    pub mod triangulate;

    pub use interpolator::*;
    pub use mesh::*;
    pub use neighbors::*;
}

/// Geometric primitives: points, barycentric transforms, predicates.
pub mod geometry {
    pub mod barycentric;
    pub mod point;
    /// Epsilon-tolerant floating-point comparisons.
    pub mod tolerance;

    pub use barycentric::*;
    pub use point::*;
    pub use tolerance::*;
}

/// Semi-regular 2-D lookup tables over the unit disk of direction cosines.
pub mod grid {
    pub mod bilinear;
    pub mod table;

    pub use bilinear::*;
    pub use table::*;
}

/// Closed sum type over the two interpolation families.
pub mod interp;

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::core::interpolator::{Location, TetrahedralInterpolator};
    pub use crate::core::mesh::{LoadError, MeshError, TetMesh, Tetra};
    pub use crate::core::neighbors::NeighborTable;
    pub use crate::geometry::barycentric::{BarycentricTransform, BARY_TOL};
    pub use crate::geometry::point::Point3;
    pub use crate::geometry::tolerance::{approx_eq, definitely_greater, definitely_less};
    pub use crate::grid::bilinear::{
        BilinearTable, GridQueryError, TableBuildError, OUT_OF_BOUNDS,
    };
    pub use crate::grid::table::{
        DispersionOracle, DispersionTable, GridSpec, PhononMode, Quantity, TableFileError,
    };
    pub use crate::interp::Interpolator;
}
