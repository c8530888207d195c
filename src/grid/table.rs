//! Phonon dispersion lookup tables over the unit disk of direction cosines.
//!
//! A [`DispersionOracle`] (the acoustic model, typically a Christoffel-matrix
//! solver) is sampled once per grid node and polarization mode; every
//! direction-dependent quantity a transport loop asks for afterwards is a
//! bilinear lookup. Tables persist as a single commented-header text file,
//! one row per (node, mode).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geometry::tolerance::definitely_greater;
use crate::grid::bilinear::{BilinearTable, GridQueryError, TableBuildError};

/// Slack on the unit-disk trim while sampling the lattice.
const TRIM_TOL: f64 = 1e-4;

/// Acoustic polarization modes, in table row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhononMode {
    Longitudinal,
    SlowTransverse,
    FastTransverse,
}

impl PhononMode {
    pub const COUNT: usize = 3;
    pub const ALL: [Self; Self::COUNT] =
        [Self::Longitudinal, Self::SlowTransverse, Self::FastTransverse];

    /// Row label in table files.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Longitudinal => "L",
            Self::SlowTransverse => "ST",
            Self::FastTransverse => "FT",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.label() == label)
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Tabulated quantities, in table column order.
///
/// `NX` and `NY` are the grid coordinates themselves; they are carried in
/// the file for human readers and answered by passthrough, never
/// interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Direction cosine x (passthrough).
    NX,
    /// Direction cosine y (passthrough).
    NY,
    /// Direction cosine z, `sqrt(1 - x² - y²)`.
    NZ,
    /// Polar angle of the direction.
    Theta,
    /// Azimuthal angle of the direction.
    Phi,
    /// Slowness component x, `n_x / v_p`.
    SX,
    /// Slowness component y.
    SY,
    /// Slowness component z.
    SZ,
    /// Slowness magnitude, `1 / v_p`.
    SMag,
    /// Transverse-plane slowness, `sqrt(s_x² + s_y²)`.
    SPar,
    /// Phase velocity.
    VPhase,
    /// Group velocity magnitude.
    VGMag,
    /// Group velocity component x.
    VGX,
    /// Group velocity component y.
    VGY,
    /// Group velocity component z.
    VGZ,
    /// Polarization vector component x.
    EX,
    /// Polarization vector component y.
    EY,
    /// Polarization vector component z.
    EZ,
}

impl Quantity {
    pub const COUNT: usize = 18;
    pub const ALL: [Self; Self::COUNT] = [
        Self::NX,
        Self::NY,
        Self::NZ,
        Self::Theta,
        Self::Phi,
        Self::SX,
        Self::SY,
        Self::SZ,
        Self::SMag,
        Self::SPar,
        Self::VPhase,
        Self::VGMag,
        Self::VGX,
        Self::VGY,
        Self::VGZ,
        Self::EX,
        Self::EY,
        Self::EZ,
    ];

    /// Column label in table files.
    pub const fn label(self) -> &'static str {
        match self {
            Self::NX => "n_x",
            Self::NY => "n_y",
            Self::NZ => "n_z",
            Self::Theta => "theta",
            Self::Phi => "phi",
            Self::SX => "s_x",
            Self::SY => "s_y",
            Self::SZ => "s_z",
            Self::SMag => "s",
            Self::SPar => "s_par",
            Self::VPhase => "v_p",
            Self::VGMag => "V_g",
            Self::VGX => "V_gx",
            Self::VGY => "V_gy",
            Self::VGZ => "V_gz",
            Self::EX => "e_x",
            Self::EY => "e_y",
            Self::EZ => "e_z",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.label() == label)
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// The acoustic model sampled to build a table: per mode and unit
/// wavevector direction, the phase velocity, group velocity vector, and
/// polarization vector.
pub trait DispersionOracle {
    fn phase_velocity(&self, mode: PhononMode, n: Vector3<f64>) -> f64;
    fn group_velocity(&self, mode: PhononMode, n: Vector3<f64>) -> Vector3<f64>;
    fn polarization(&self, mode: PhononMode, n: Vector3<f64>) -> Vector3<f64>;
}

/// Even sampling lattice over a rectangle; nodes outside the unit disk are
/// trimmed at build time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridSpec {
    pub xmin: f64,
    pub xmax: f64,
    /// Number of steps along x (nodes = steps + 1).
    pub nx: usize,
    pub ymin: f64,
    pub ymax: f64,
    pub ny: usize,
}

impl GridSpec {
    /// The standard lattice: `[-1, 1]²` with `n` steps per axis.
    pub const fn unit_disk(n: usize) -> Self {
        Self {
            xmin: -1.0,
            xmax: 1.0,
            nx: n,
            ymin: -1.0,
            ymax: 1.0,
            ny: n,
        }
    }

    #[inline]
    pub fn xstep(&self) -> f64 {
        (self.xmax - self.xmin) / self.nx as f64
    }

    #[inline]
    pub fn ystep(&self) -> f64 {
        (self.ymax - self.ymin) / self.ny as f64
    }
}

/// Errors reading or parsing a table file.
#[derive(Debug, Error)]
pub enum TableFileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line {line}: cannot parse row")]
    MalformedRow { line: usize },

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unknown mode label {label:?}")]
    UnknownMode { line: usize, label: String },

    #[error("line {line}: column header declares {label:?} where {expected:?} is expected")]
    ColumnLabel {
        line: usize,
        label: String,
        expected: &'static str,
    },

    #[error("line {line}: mode rows out of order (expected L, ST, FT per node)")]
    ModeOrder { line: usize },

    #[error(transparent)]
    Build(#[from] TableBuildError),
}

/// One full row of tabulated quantities per polarization mode.
type NodeRow = [[f64; Quantity::COUNT]; PhononMode::COUNT];

/// The complete dispersion table: one [`BilinearTable`] per (mode,
/// quantity), plus the raw rows for persistence.
#[derive(Debug, Clone)]
pub struct DispersionTable {
    spec: GridSpec,
    nodes: Vec<(f64, f64)>,
    rows: Vec<NodeRow>,
    tables: Vec<BilinearTable>,
}

impl DispersionTable {
    /// Samples `oracle` over the lattice, trimmed to the unit disk.
    pub fn build<O: DispersionOracle>(oracle: &O, spec: GridSpec) -> Result<Self, TableBuildError> {
        let mut nodes = Vec::new();
        let mut rows = Vec::new();
        for i in 0..=spec.nx {
            let x = spec.xmin + spec.xstep() * i as f64;
            for j in 0..=spec.ny {
                let y = spec.ymin + spec.ystep() * j as f64;
                let rho2 = x * x + y * y;
                if definitely_greater(rho2, 1.0, TRIM_TOL) {
                    continue;
                }
                // Rim nodes can overshoot 1 by roundoff.
                let nz = (1.0 - rho2).max(0.0).sqrt();
                let n = Vector3::new(x, y, nz);

                let mut row: NodeRow = [[0.0; Quantity::COUNT]; PhononMode::COUNT];
                for mode in PhononMode::ALL {
                    row[mode.index()] = sample_row(oracle, mode, n);
                }
                nodes.push((x, y));
                rows.push(row);
            }
        }
        debug!(
            nodes = nodes.len(),
            lattice = (spec.nx + 1) * (spec.ny + 1),
            "sampled dispersion oracle over the unit disk"
        );
        Self::from_rows(spec, nodes, rows)
    }

    /// Assembles the per-quantity lookup tables from pre-computed rows.
    pub fn from_rows(
        spec: GridSpec,
        nodes: Vec<(f64, f64)>,
        rows: Vec<NodeRow>,
    ) -> Result<Self, TableBuildError> {
        let mut tables = Vec::with_capacity(PhononMode::COUNT * Quantity::COUNT);
        for mode in PhononMode::ALL {
            for quantity in Quantity::ALL {
                let samples: Vec<(f64, f64, f64)> = nodes
                    .iter()
                    .zip(&rows)
                    .map(|(&(x, y), row)| (x, y, row[mode.index()][quantity.index()]))
                    .collect();
                tables.push(BilinearTable::from_samples(
                    spec.xmin,
                    spec.xstep(),
                    spec.ymin,
                    spec.ystep(),
                    &samples,
                )?);
            }
        }
        Ok(Self {
            spec,
            nodes,
            rows,
            tables,
        })
    }

    #[inline]
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// The lookup table backing one (mode, quantity) pair.
    #[inline]
    pub fn table(&self, mode: PhononMode, quantity: Quantity) -> &BilinearTable {
        &self.tables[mode.index() * Quantity::COUNT + quantity.index()]
    }

    /// Interpolated quantity at direction cosines `(x, y)`.
    ///
    /// `NX` and `NY` pass the query coordinate straight through (they *are*
    /// the coordinate), after the same unit-disk check as every other
    /// quantity.
    pub fn lookup(
        &self,
        mode: PhononMode,
        quantity: Quantity,
        x: f64,
        y: f64,
    ) -> Result<f64, GridQueryError> {
        match quantity {
            Quantity::NX => {
                debug!(quantity = quantity.label(), "lookup of a query coordinate, answered by passthrough");
                self.table(mode, Quantity::NZ).interpolate(x, y)?;
                Ok(x)
            }
            Quantity::NY => {
                debug!(quantity = quantity.label(), "lookup of a query coordinate, answered by passthrough");
                self.table(mode, Quantity::NZ).interpolate(x, y)?;
                Ok(y)
            }
            _ => self.table(mode, quantity).interpolate(x, y),
        }
    }

    /// Interpolated quantity for a wavevector of any magnitude.
    pub fn lookup_direction(
        &self,
        mode: PhononMode,
        quantity: Quantity,
        k: Vector3<f64>,
    ) -> Result<f64, GridQueryError> {
        let n = k.normalize();
        self.lookup(mode, quantity, n.x, n.y)
    }

    /// Assembles the group-velocity vector for a wavevector direction from
    /// the three component tables.
    pub fn interp_group_velocity(
        &self,
        mode: PhononMode,
        k: Vector3<f64>,
    ) -> Result<Vector3<f64>, GridQueryError> {
        let n = k.normalize();
        Ok(Vector3::new(
            self.lookup(mode, Quantity::VGX, n.x, n.y)?,
            self.lookup(mode, Quantity::VGY, n.x, n.y)?,
            self.lookup(mode, Quantity::VGZ, n.x, n.y)?,
        ))
    }

    /// Writes the table: three `#` header lines, then one row per
    /// (node, mode), mode label first, columns padded for eyeballing.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), std::io::Error> {
        writeln!(
            w,
            "# phonon dispersion table: {} nodes x {} modes",
            self.nodes.len(),
            PhononMode::COUNT
        )?;
        writeln!(
            w,
            "# grid: x in [{}, {}] ({} steps), y in [{}, {}] ({} steps)",
            self.spec.xmin, self.spec.xmax, self.spec.nx, self.spec.ymin, self.spec.ymax, self.spec.ny
        )?;
        write!(w, "# Columns: mode")?;
        for quantity in Quantity::ALL {
            write!(w, " {}", quantity.label())?;
        }
        writeln!(w)?;

        for row in &self.rows {
            for mode in PhononMode::ALL {
                write!(w, "{:<4}", mode.label())?;
                for value in &row[mode.index()] {
                    write!(w, "{:<18} ", value)?;
                }
                writeln!(w)?;
            }
        }
        Ok(())
    }

    /// Writes the table to `<stem>.dat` under `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P, stem: &str) -> Result<(), std::io::Error> {
        let path = dir.as_ref().join(format!("{stem}.dat"));
        let mut w = BufWriter::new(File::create(path)?);
        self.write(&mut w)?;
        w.flush()
    }

    /// Reads a table written by [`write`](DispersionTable::write). The
    /// lattice geometry is not stored per row, so the caller supplies the
    /// `GridSpec` the table was built with.
    pub fn read<P: AsRef<Path>>(path: P, spec: GridSpec) -> Result<Self, TableFileError> {
        let reader = BufReader::new(File::open(path)?);
        let mut nodes: Vec<(f64, f64)> = Vec::new();
        let mut rows: Vec<NodeRow> = Vec::new();
        let mut mode_cursor = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if let Some(rest) = line.strip_prefix('#') {
                let header: Vec<&str> = rest.split_whitespace().collect();
                if header.first() == Some(&"Columns:") {
                    validate_columns(&header[1..], line_no)?;
                }
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != Quantity::COUNT + 1 {
                return Err(TableFileError::ColumnCount {
                    line: line_no,
                    expected: Quantity::COUNT + 1,
                    found: tokens.len(),
                });
            }

            let mode = PhononMode::from_label(tokens[0]).ok_or_else(|| {
                TableFileError::UnknownMode {
                    line: line_no,
                    label: tokens[0].to_owned(),
                }
            })?;
            if mode != PhononMode::ALL[mode_cursor] {
                return Err(TableFileError::ModeOrder { line: line_no });
            }

            let mut values = [0.0f64; Quantity::COUNT];
            for (slot, token) in values.iter_mut().zip(&tokens[1..]) {
                *slot = token
                    .parse()
                    .map_err(|_| TableFileError::MalformedRow { line: line_no })?;
            }

            if mode_cursor == 0 {
                nodes.push((values[Quantity::NX.index()], values[Quantity::NY.index()]));
                rows.push([[0.0; Quantity::COUNT]; PhononMode::COUNT]);
            }
            // rows is non-empty here: mode_cursor > 0 implies a prior push.
            let row = rows.last_mut().ok_or(TableFileError::ModeOrder { line: line_no })?;
            row[mode.index()] = values;

            mode_cursor = (mode_cursor + 1) % PhononMode::COUNT;
        }
        if mode_cursor != 0 {
            return Err(TableFileError::ModeOrder { line: 0 });
        }
        Ok(Self::from_rows(spec, nodes, rows)?)
    }
}

/// Checks a declared `# Columns:` list against the quantity catalogue, so a
/// file written for a different catalogue fails loudly instead of feeding
/// mislabeled columns into the tables.
fn validate_columns(declared: &[&str], line: usize) -> Result<(), TableFileError> {
    if declared.len() != Quantity::COUNT + 1 {
        return Err(TableFileError::ColumnCount {
            line,
            expected: Quantity::COUNT + 1,
            found: declared.len(),
        });
    }
    let expected = std::iter::once("mode").chain(Quantity::ALL.iter().map(|q| q.label()));
    for (&label, expected) in declared.iter().zip(expected) {
        if label != expected {
            return Err(TableFileError::ColumnLabel {
                line,
                label: label.to_owned(),
                expected,
            });
        }
    }
    Ok(())
}

/// All 18 quantities for one (mode, direction) sample.
fn sample_row<O: DispersionOracle>(
    oracle: &O,
    mode: PhononMode,
    n: Vector3<f64>,
) -> [f64; Quantity::COUNT] {
    let vp = oracle.phase_velocity(mode, n);
    let vg = oracle.group_velocity(mode, n);
    let e = oracle.polarization(mode, n);
    let s = n / vp;

    let mut row = [0.0f64; Quantity::COUNT];
    row[Quantity::NX.index()] = n.x;
    row[Quantity::NY.index()] = n.y;
    row[Quantity::NZ.index()] = n.z;
    row[Quantity::Theta.index()] = n.z.acos();
    row[Quantity::Phi.index()] = n.y.atan2(n.x);
    row[Quantity::SX.index()] = s.x;
    row[Quantity::SY.index()] = s.y;
    row[Quantity::SZ.index()] = s.z;
    row[Quantity::SMag.index()] = 1.0 / vp;
    row[Quantity::SPar.index()] = s.x.hypot(s.y);
    row[Quantity::VPhase.index()] = vp;
    row[Quantity::VGMag.index()] = vg.norm();
    row[Quantity::VGX.index()] = vg.x;
    row[Quantity::VGY.index()] = vg.y;
    row[Quantity::VGZ.index()] = vg.z;
    row[Quantity::EX.index()] = e.x;
    row[Quantity::EY.index()] = e.y;
    row[Quantity::EZ.index()] = e.z;
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_labels_round_trip() {
        for mode in PhononMode::ALL {
            assert_eq!(PhononMode::from_label(mode.label()), Some(mode));
        }
        assert_eq!(PhononMode::from_label("X"), None);
    }

    #[test]
    fn quantity_labels_are_distinct_and_round_trip() {
        for quantity in Quantity::ALL {
            assert_eq!(Quantity::from_label(quantity.label()), Some(quantity));
        }
        let labels: std::collections::HashSet<_> =
            Quantity::ALL.iter().map(|q| q.label()).collect();
        assert_eq!(labels.len(), Quantity::COUNT);
    }

    #[test]
    fn unit_disk_spec_steps() {
        let spec = GridSpec::unit_disk(40);
        assert_eq!(spec.xstep(), 0.05);
        assert_eq!(spec.ystep(), 0.05);
    }

    #[test]
    fn sample_row_is_self_consistent() {
        struct Iso;
        impl DispersionOracle for Iso {
            fn phase_velocity(&self, _: PhononMode, _: Vector3<f64>) -> f64 {
                5000.0
            }
            fn group_velocity(&self, _: PhononMode, n: Vector3<f64>) -> Vector3<f64> {
                5000.0 * n
            }
            fn polarization(&self, _: PhononMode, n: Vector3<f64>) -> Vector3<f64> {
                n
            }
        }
        let n = Vector3::new(0.6, 0.0, 0.8);
        let row = sample_row(&Iso, PhononMode::Longitudinal, n);
        approx::assert_relative_eq!(
            row[Quantity::SMag.index()],
            1.0 / 5000.0,
            epsilon = 1e-15
        );
        approx::assert_relative_eq!(
            row[Quantity::SPar.index()],
            0.6 / 5000.0,
            epsilon = 1e-15
        );
        approx::assert_relative_eq!(row[Quantity::VGMag.index()], 5000.0, epsilon = 1e-9);
        approx::assert_relative_eq!(row[Quantity::Theta.index()], 0.8f64.acos(), epsilon = 1e-15);
    }
}
