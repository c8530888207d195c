//! Mesh store: sample points, per-point values, tetrahedral connectivity,
//! and the whitespace-separated text persistence formats.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geometry::barycentric::BarycentricTransform;
use crate::geometry::point::Point3;

/// A tetrahedron: four indices into the mesh point list.
pub type Tetra = [usize; 4];

/// Errors detected while constructing or validating a mesh.
///
/// All of these are fatal: the input data is unusable and the caller must
/// not build an interpolator from it.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("need at least 4 points to tetrahedralize, found {found}")]
    TooFewPoints { found: usize },

    #[error("duplicate sample point at sorted index {index}")]
    DuplicatePoint { index: usize },

    #[error("point cloud is degenerate (all points coplanar or collinear)")]
    DegenerateCloud,

    #[error("point {index} is not a vertex of any tetrahedron")]
    IsolatedPoint { index: usize },

    #[error("triangulation failed while inserting point {point}")]
    TriangulationFailed { point: usize },

    #[error("value count {values} does not match point count {points}")]
    ValueCountMismatch { points: usize, values: usize },

    #[error("tetrahedron {tetra} references vertex {vertex}, but only {points} points exist")]
    InvalidVertexIndex {
        tetra: usize,
        vertex: usize,
        points: usize,
    },

    #[error("tetrahedron {tetra} lists the same vertex more than once")]
    RepeatedVertex { tetra: usize },

    #[error("tetrahedron {tetra} is flat (vertices are coplanar)")]
    FlatTetrahedron { tetra: usize },

    #[error("facet {facet:?} is shared by {count} tetrahedra (at most 2 allowed)")]
    NonManifoldFacet { facet: [usize; 3], count: usize },
}

/// Errors from the text loaders.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line {line}: cannot parse {token:?} as a number")]
    MalformedRecord { line: usize, token: String },

    #[error("line {line}: expected {expected} fields, found {found}")]
    WrongFieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// A validated tetrahedral mesh with one scalar value per sample point.
///
/// Immutable after construction except for [`replace_values`], which swaps
/// the sampled field without touching geometry or connectivity.
///
/// [`replace_values`]: TetMesh::replace_values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawMesh")]
pub struct TetMesh {
    points: Vec<Point3>,
    values: Vec<f64>,
    tetrahedra: Vec<Tetra>,
}

/// Field-for-field mirror of [`TetMesh`] used during deserialization; the
/// conversion runs the full construction checks, so serialized input cannot
/// smuggle in connectivity that [`TetMesh::new`] would reject.
#[derive(Deserialize)]
struct RawMesh {
    points: Vec<Point3>,
    values: Vec<f64>,
    tetrahedra: Vec<Tetra>,
}

impl TryFrom<RawMesh> for TetMesh {
    type Error = MeshError;

    fn try_from(raw: RawMesh) -> Result<Self, MeshError> {
        Self::new(raw.points, raw.values, raw.tetrahedra)
    }
}

impl TetMesh {
    /// Builds a mesh from pre-supplied connectivity, validating it.
    ///
    /// Checks per tetrahedron: vertex indices in range, no repeated vertex,
    /// non-zero volume. Checks globally: value/point count agreement, every
    /// point used by at least one tetrahedron.
    pub fn new(
        points: Vec<Point3>,
        values: Vec<f64>,
        tetrahedra: Vec<Tetra>,
    ) -> Result<Self, MeshError> {
        if values.len() != points.len() {
            return Err(MeshError::ValueCountMismatch {
                points: points.len(),
                values: values.len(),
            });
        }

        let mut used = vec![false; points.len()];
        for (t, tet) in tetrahedra.iter().enumerate() {
            for &v in tet {
                if v >= points.len() {
                    return Err(MeshError::InvalidVertexIndex {
                        tetra: t,
                        vertex: v,
                        points: points.len(),
                    });
                }
                used[v] = true;
            }
            if tet[0] == tet[1]
                || tet[0] == tet[2]
                || tet[0] == tet[3]
                || tet[1] == tet[2]
                || tet[1] == tet[3]
                || tet[2] == tet[3]
            {
                return Err(MeshError::RepeatedVertex { tetra: t });
            }
            let frame = BarycentricTransform::new(
                points[tet[0]].to_vector(),
                points[tet[1]].to_vector(),
                points[tet[2]].to_vector(),
                points[tet[3]].to_vector(),
            );
            if frame.is_none() {
                return Err(MeshError::FlatTetrahedron { tetra: t });
            }
        }
        if let Some(index) = used.iter().position(|&u| !u) {
            return Err(MeshError::IsolatedPoint { index });
        }

        Ok(Self {
            points,
            values,
            tetrahedra,
        })
    }

    /// Builds a mesh from scattered samples by Delaunay tetrahedralization.
    pub fn triangulated(points: Vec<Point3>, values: Vec<f64>) -> Result<Self, MeshError> {
        if values.len() != points.len() {
            return Err(MeshError::ValueCountMismatch {
                points: points.len(),
                values: values.len(),
            });
        }
        let tetrahedra = crate::core::triangulate::delaunay(&points)?;
        debug!(
            points = points.len(),
            tetrahedra = tetrahedra.len(),
            "tetrahedralized scattered samples"
        );
        Ok(Self {
            points,
            values,
            tetrahedra,
        })
    }

    /// Replaces the sampled values, keeping geometry and connectivity.
    pub fn replace_values(&mut self, values: Vec<f64>) -> Result<(), MeshError> {
        if values.len() != self.points.len() {
            return Err(MeshError::ValueCountMismatch {
                points: self.points.len(),
                values: values.len(),
            });
        }
        self.values = values;
        Ok(())
    }

    #[inline]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn tetrahedra(&self) -> &[Tetra] {
        &self.tetrahedra
    }

    /// Vertex positions of tetrahedron `t` as vectors.
    #[inline]
    pub(crate) fn tetra_vertices(&self, t: usize) -> [nalgebra::Vector3<f64>; 4] {
        let tet = self.tetrahedra[t];
        [
            self.points[tet[0]].to_vector(),
            self.points[tet[1]].to_vector(),
            self.points[tet[2]].to_vector(),
            self.points[tet[3]].to_vector(),
        ]
    }

    /// Sampled values at the vertices of tetrahedron `t`.
    #[inline]
    pub(crate) fn tetra_values(&self, t: usize) -> [f64; 4] {
        let tet = self.tetrahedra[t];
        [
            self.values[tet[0]],
            self.values[tet[1]],
            self.values[tet[2]],
            self.values[tet[3]],
        ]
    }

    /// Writes one `x y z` line per point.
    ///
    /// `f64` `Display` output round-trips exactly through `parse`, so a
    /// dump-and-reload reproduces the mesh bit for bit.
    pub fn save_points<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let mut w = BufWriter::new(File::create(path)?);
        for p in &self.points {
            writeln!(w, "{} {} {}", p.x(), p.y(), p.z())?;
        }
        w.flush()
    }

    /// Writes one `i0 i1 i2 i3` line per tetrahedron.
    pub fn save_tetra<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let mut w = BufWriter::new(File::create(path)?);
        for t in &self.tetrahedra {
            writeln!(w, "{} {} {} {}", t[0], t[1], t[2], t[3])?;
        }
        w.flush()
    }

    /// Reads a point dump written by [`save_points`](TetMesh::save_points).
    pub fn load_points<P: AsRef<Path>>(path: P) -> Result<Vec<Point3>, LoadError> {
        let reader = BufReader::new(File::open(path)?);
        let mut points = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let fields = parse_fields(&line, idx + 1)?;
            let Some([x, y, z]) = fields else { continue };
            points.push(Point3::new([x, y, z]));
        }
        Ok(points)
    }

    /// Reads a connectivity dump written by [`save_tetra`](TetMesh::save_tetra).
    pub fn load_tetra<P: AsRef<Path>>(path: P) -> Result<Vec<Tetra>, LoadError> {
        let reader = BufReader::new(File::open(path)?);
        let mut tetrahedra = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != 4 {
                return Err(LoadError::WrongFieldCount {
                    line: idx + 1,
                    expected: 4,
                    found: tokens.len(),
                });
            }
            let mut tet = [0usize; 4];
            for (slot, token) in tet.iter_mut().zip(&tokens) {
                *slot = token.parse().map_err(|_| LoadError::MalformedRecord {
                    line: idx + 1,
                    token: (*token).to_owned(),
                })?;
            }
            tetrahedra.push(tet);
        }
        Ok(tetrahedra)
    }
}

/// Loads scattered `x y z value` records and sorts them lexicographically by
/// position, so the same sample set always triangulates identically
/// regardless of record order in the file.
pub fn load_scattered<P: AsRef<Path>>(path: P) -> Result<(Vec<Point3>, Vec<f64>), LoadError> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows: Vec<(Point3, f64)> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let fields = parse_fields(&line, idx + 1)?;
        let Some([x, y, z, v]) = fields else { continue };
        rows.push((Point3::new([x, y, z]), v));
    }
    rows.sort_by_key(|(p, _)| p.lex_key());
    debug!(records = rows.len(), "loaded scattered samples");
    Ok(rows.into_iter().unzip())
}

/// Parses exactly `N` whitespace-separated floats from `line`.
///
/// Blank lines yield `Ok(None)`; a wrong field count or an unparsable token
/// is fatal (truncated or corrupt files must not silently load short).
fn parse_fields<const N: usize>(line: &str, line_no: usize) -> Result<Option<[f64; N]>, LoadError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() != N {
        return Err(LoadError::WrongFieldCount {
            line: line_no,
            expected: N,
            found: tokens.len(),
        });
    }
    let mut out = [0.0f64; N];
    for (slot, token) in out.iter_mut().zip(&tokens) {
        *slot = token.parse().map_err(|_| LoadError::MalformedRecord {
            line: line_no,
            token: (*token).to_owned(),
        })?;
    }
    Ok(Some(out))
}
