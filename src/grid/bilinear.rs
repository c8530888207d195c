//! Bilinear lookup over a semi-regular grid on the unit disk.
//!
//! Direction-dependent quantities are tabulated over the disk
//! `x² + y² ≤ 1` of direction cosines. The table allocates the disk's
//! bounding rectangle; cells the disk never touches stay at the
//! [`OUT_OF_BOUNDS`] sentinel and are excluded from every blend, so a
//! garbage sentinel can never leak into an interpolated value.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::mesh::LoadError;
use crate::geometry::tolerance::{approx_eq, definitely_greater};

/// Marker for grid cells outside the unit disk. Large enough that no
/// physical quantity reaches half of it.
pub const OUT_OF_BOUNDS: f64 = 9.0e299;

/// Slack on the unit-disk boundary test; direction cosines computed from
/// normalized vectors can overshoot 1 by roundoff.
const DISK_TOL: f64 = 1e-6;

/// Whether a stored value is the out-of-disk sentinel.
#[inline]
pub(crate) fn is_sentinel(v: f64) -> bool {
    v >= OUT_OF_BOUNDS / 2.0
}

/// Errors while populating a table. All fatal: they mean the sample set
/// disagrees with the declared grid geometry.
#[derive(Debug, Error)]
pub enum TableBuildError {
    #[error("grid cell ({ix}, {iy}) populated twice")]
    DuplicateCell { ix: usize, iy: usize },

    #[error("{axis} coordinate {value} does not land on grid index {index}")]
    IndexMismatch {
        axis: &'static str,
        value: f64,
        index: usize,
    },

    #[error("table needs at least a 2x2 grid of samples")]
    EmptyTable,
}

/// Errors from a table query.
#[derive(Debug, Error)]
pub enum GridQueryError {
    /// The query direction is not a valid pair of direction cosines.
    /// Erroneous input, not a steady-state outcome.
    #[error("query ({x}, {y}) lies outside the unit disk")]
    OutsideUnitDisk { x: f64, y: f64 },

    /// The query's support cells were never populated (disk rim corner).
    #[error("no populated samples around query ({x}, {y})")]
    UnpopulatedCell { x: f64, y: f64 },
}

/// A bilinear lookup table over an evenly spaced grid trimmed to the unit
/// disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BilinearTable {
    xaxis: Vec<f64>,
    yaxis: Vec<f64>,
    xstep: f64,
    ystep: f64,
    /// Row-major `[ix * yaxis.len() + iy]`; sentinel where unpopulated.
    values: Vec<f64>,
}

impl BilinearTable {
    /// Builds a table from `(x, y, value)` samples on an even grid with the
    /// given origin and steps. Samples must arrive in non-decreasing axis
    /// order (the natural lattice scan order).
    ///
    /// Each sample must land on a grid node within tolerance
    /// (`IndexMismatch` otherwise) and each node may be populated once
    /// (`DuplicateCell` otherwise).
    pub fn from_samples(
        xmin: f64,
        xstep: f64,
        ymin: f64,
        ystep: f64,
        samples: &[(f64, f64, f64)],
    ) -> Result<Self, TableBuildError> {
        // Axes grow as samples arrive, so the table spans exactly the
        // populated sub-rectangle rather than a declared bound. Samples
        // scan x-major, so x values only ever increase; y values reset per
        // row (and rim rows may skip nodes), hence the sort + dedup.
        let mut xaxis = vec![xmin];
        let mut yaxis = vec![ymin];
        for &(x, y, _) in samples {
            if definitely_greater(x, *last(&xaxis), axis_tol(xstep)) {
                xaxis.push(x);
            }
            yaxis.push(y);
        }
        yaxis.sort_unstable_by(f64::total_cmp);
        yaxis.dedup_by(|a, b| approx_eq(*a, *b, axis_tol(ystep)));
        if xaxis.len() < 2 || yaxis.len() < 2 {
            return Err(TableBuildError::EmptyTable);
        }

        let ny = yaxis.len();
        let mut values = vec![OUT_OF_BOUNDS; xaxis.len() * ny];
        for &(x, y, v) in samples {
            let ix = node_index(&xaxis, x, xmin, xstep, "x")?;
            let iy = node_index(&yaxis, y, ymin, ystep, "y")?;
            let slot = &mut values[ix * ny + iy];
            if !is_sentinel(*slot) {
                return Err(TableBuildError::DuplicateCell { ix, iy });
            }
            *slot = v;
        }

        Ok(Self {
            xaxis,
            yaxis,
            xstep,
            ystep,
            values,
        })
    }

    /// Bilinear interpolation at `(x, y)`.
    ///
    /// Rejects points outside the unit disk. Near the disk rim the 2×2
    /// support may contain sentinel corners; those are dropped and the
    /// remaining weights renormalized, so rim queries still answer from
    /// the populated side.
    pub fn interpolate(&self, x: f64, y: f64) -> Result<f64, GridQueryError> {
        let (ix, iy, tx, ty) = self.cell(x, y)?;
        let corners = self.corners(ix, iy);
        let weights = [
            (1.0 - tx) * (1.0 - ty),
            tx * (1.0 - ty),
            (1.0 - tx) * ty,
            tx * ty,
        ];

        let mut num = 0.0;
        let mut den = 0.0;
        for (&v, &w) in corners.iter().zip(&weights) {
            if !is_sentinel(v) {
                num += w * v;
                den += w;
            }
        }
        if den <= 0.0 {
            return Err(GridQueryError::UnpopulatedCell { x, y });
        }
        Ok(num / den)
    }

    /// Gradient `(∂v/∂x, ∂v/∂y)` of the bilinear patch at `(x, y)`.
    ///
    /// Needs all four support corners populated; the renormalization trick
    /// has no meaningful derivative.
    pub fn gradient(&self, x: f64, y: f64) -> Result<(f64, f64), GridQueryError> {
        let (ix, iy, tx, ty) = self.cell(x, y)?;
        let [v00, v10, v01, v11] = self.corners(ix, iy);
        if [v00, v10, v01, v11].iter().any(|&v| is_sentinel(v)) {
            return Err(GridQueryError::UnpopulatedCell { x, y });
        }
        let dx = self.xaxis[ix + 1] - self.xaxis[ix];
        let dy = self.yaxis[iy + 1] - self.yaxis[iy];
        let gx = ((v10 - v00) * (1.0 - ty) + (v11 - v01) * ty) / dx;
        let gy = ((v01 - v00) * (1.0 - tx) + (v11 - v10) * tx) / dy;
        Ok((gx, gy))
    }

    /// Resolves a query to its support cell and normalized offsets.
    fn cell(&self, x: f64, y: f64) -> Result<(usize, usize, f64, f64), GridQueryError> {
        // NaN compares false against everything, so the disk test alone
        // would wave non-finite coordinates straight into the blend.
        if !x.is_finite() || !y.is_finite() || definitely_greater(x * x + y * y, 1.0, DISK_TOL) {
            return Err(GridQueryError::OutsideUnitDisk { x, y });
        }
        let ix = lower_index(&self.xaxis, x);
        let iy = lower_index(&self.yaxis, y);
        // Offsets are clamped so that disk-rim queries past the last
        // populated node stay on the patch instead of extrapolating.
        let tx = ((x - self.xaxis[ix]) / (self.xaxis[ix + 1] - self.xaxis[ix])).clamp(0.0, 1.0);
        let ty = ((y - self.yaxis[iy]) / (self.yaxis[iy + 1] - self.yaxis[iy])).clamp(0.0, 1.0);
        Ok((ix, iy, tx, ty))
    }

    /// Support corners in `[v00, v10, v01, v11]` order.
    #[inline]
    fn corners(&self, ix: usize, iy: usize) -> [f64; 4] {
        let ny = self.yaxis.len();
        [
            self.values[ix * ny + iy],
            self.values[(ix + 1) * ny + iy],
            self.values[ix * ny + iy + 1],
            self.values[(ix + 1) * ny + iy + 1],
        ]
    }

    /// Stored node value, sentinel included. Mostly for diagnostics.
    #[inline]
    pub fn node(&self, ix: usize, iy: usize) -> f64 {
        self.values[ix * self.yaxis.len() + iy]
    }

    #[inline]
    pub fn xaxis(&self) -> &[f64] {
        &self.xaxis
    }

    #[inline]
    pub fn yaxis(&self) -> &[f64] {
        &self.yaxis
    }

    /// Writes the populated nodes as `x y value` records behind a header
    /// carrying the grid steps, reloadable via [`BilinearTable::load`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "# xstep {} ystep {}", self.xstep, self.ystep)?;
        writeln!(w, "# x y value")?;
        let ny = self.yaxis.len();
        for (ix, &x) in self.xaxis.iter().enumerate() {
            for (iy, &y) in self.yaxis.iter().enumerate() {
                let v = self.values[ix * ny + iy];
                if !is_sentinel(v) {
                    writeln!(w, "{x} {y} {v}")?;
                }
            }
        }
        w.flush()
    }

    /// Reads a table written by [`BilinearTable::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let reader = BufReader::new(File::open(path)?);
        let mut xstep = None;
        let mut samples: Vec<(f64, f64, f64)> = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if let Some(rest) = line.strip_prefix('#') {
                let tokens: Vec<&str> = rest.split_whitespace().collect();
                if let ["xstep", xs, "ystep", ys] = tokens.as_slice() {
                    xstep = Some((parse_token(xs, line_no)?, parse_token(ys, line_no)?));
                }
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != 3 {
                return Err(LoadError::WrongFieldCount {
                    line: line_no,
                    expected: 3,
                    found: tokens.len(),
                });
            }
            samples.push((
                parse_token(tokens[0], line_no)?,
                parse_token(tokens[1], line_no)?,
                parse_token(tokens[2], line_no)?,
            ));
        }
        let (xstep, ystep) = xstep.ok_or(LoadError::WrongFieldCount {
            line: 1,
            expected: 4,
            found: 0,
        })?;
        let xmin = samples.first().map_or(0.0, |s| s.0);
        let ymin = samples
            .iter()
            .map(|s| s.1)
            .fold(f64::INFINITY, f64::min);
        Self::from_samples(xmin, xstep, ymin, ystep, &samples)
            .map_err(|_| LoadError::MalformedRecord {
                line: 0,
                token: "inconsistent grid samples".to_owned(),
            })
    }
}

fn parse_token(token: &str, line: usize) -> Result<f64, LoadError> {
    token.parse().map_err(|_| LoadError::MalformedRecord {
        line,
        token: token.to_owned(),
    })
}

#[inline]
fn axis_tol(step: f64) -> f64 {
    1e-6 * step.abs().max(f64::EPSILON)
}

#[inline]
fn last(axis: &[f64]) -> &f64 {
    // Axes are seeded with one element and only ever grow.
    &axis[axis.len() - 1]
}

/// Index of the cell whose lower edge is at or below `v`, clamped so that
/// `index + 1` is always a valid node.
#[inline]
fn lower_index(axis: &[f64], v: f64) -> usize {
    let upper = axis.partition_point(|&a| a <= v);
    upper.saturating_sub(1).min(axis.len() - 2)
}

/// Maps a sample coordinate to its node index on `axis`.
///
/// The raw `floor((v - min) / step)` estimate can land one short of the
/// true node when `v` sits a hair under a node boundary; in that case the
/// next node is checked before declaring a mismatch.
fn node_index(
    axis: &[f64],
    v: f64,
    min: f64,
    step: f64,
    name: &'static str,
) -> Result<usize, TableBuildError> {
    let tol = axis_tol(step);
    let raw = ((v - min) / step).floor().max(0.0) as usize;
    let idx = raw.min(axis.len() - 1);
    if approx_eq(axis[idx], v, tol) {
        return Ok(idx);
    }
    if idx + 1 < axis.len() && approx_eq(axis[idx + 1], v, tol) {
        return Ok(idx + 1);
    }
    Err(TableBuildError::IndexMismatch {
        axis: name,
        value: v,
        index: idx,
    })
}
