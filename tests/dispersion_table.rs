//! Dispersion-table behavior with an isotropic Debye toy model: one speed
//! per mode, group velocity along the wavevector. Every tabulated quantity
//! has a closed form, so node exactness and interpolation bounds are easy
//! to pin down.

use approx::assert_relative_eq;
use meshfield::prelude::*;
use nalgebra::Vector3;

struct Debye;

impl Debye {
    fn speed(mode: PhononMode) -> f64 {
        match mode {
            PhononMode::Longitudinal => 5000.0,
            PhononMode::SlowTransverse => 3000.0,
            PhononMode::FastTransverse => 2000.0,
        }
    }
}

impl DispersionOracle for Debye {
    fn phase_velocity(&self, mode: PhononMode, _n: Vector3<f64>) -> f64 {
        Self::speed(mode)
    }

    fn group_velocity(&self, mode: PhononMode, n: Vector3<f64>) -> Vector3<f64> {
        Self::speed(mode) * n
    }

    fn polarization(&self, mode: PhononMode, n: Vector3<f64>) -> Vector3<f64> {
        match mode {
            PhononMode::Longitudinal => n,
            _ => {
                let t = Vector3::z().cross(&n);
                if t.norm() < 1e-9 {
                    Vector3::x()
                } else {
                    t.normalize()
                }
            }
        }
    }
}

fn build_table(n: usize) -> DispersionTable {
    DispersionTable::build(&Debye, GridSpec::unit_disk(n)).unwrap()
}

#[test]
fn phase_velocity_nodes_are_exact() {
    let table = build_table(20);
    for mode in PhononMode::ALL {
        // (0.5, 0.5) is a lattice node of the 0.1-step grid, inside the disk.
        let v = table.lookup(mode, Quantity::VPhase, 0.5, 0.5).unwrap();
        assert_relative_eq!(v, Debye::speed(mode), epsilon = 1e-9);
    }
}

#[test]
fn derived_quantities_match_closed_forms_at_nodes() {
    let table = build_table(20);
    let (x, y) = (0.6, 0.0);
    let nz = (1.0f64 - x * x - y * y).sqrt();
    let mode = PhononMode::Longitudinal;
    let c = Debye::speed(mode);

    assert_relative_eq!(
        table.lookup(mode, Quantity::NZ, x, y).unwrap(),
        nz,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        table.lookup(mode, Quantity::Theta, x, y).unwrap(),
        nz.acos(),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        table.lookup(mode, Quantity::SMag, x, y).unwrap(),
        1.0 / c,
        epsilon = 1e-15
    );
    assert_relative_eq!(
        table.lookup(mode, Quantity::SPar, x, y).unwrap(),
        x / c,
        epsilon = 1e-12
    );
    assert_relative_eq!(
        table.lookup(mode, Quantity::VGMag, x, y).unwrap(),
        c,
        epsilon = 1e-9
    );
}

#[test]
fn passthrough_coordinates_return_the_query() {
    let table = build_table(20);
    let v = table
        .lookup(PhononMode::FastTransverse, Quantity::NX, 0.33, -0.21)
        .unwrap();
    assert_eq!(v, 0.33);
    let v = table
        .lookup(PhononMode::FastTransverse, Quantity::NY, 0.33, -0.21)
        .unwrap();
    assert_eq!(v, -0.21);
}

#[test]
fn outside_disk_is_rejected_for_every_quantity() {
    let table = build_table(20);
    for quantity in [Quantity::NX, Quantity::VPhase, Quantity::VGZ] {
        assert!(matches!(
            table.lookup(PhononMode::Longitudinal, quantity, 0.9, 0.9),
            Err(GridQueryError::OutsideUnitDisk { .. })
        ));
    }
}

#[test]
fn group_velocity_vector_along_the_wavevector() {
    let table = build_table(20);
    let mode = PhononMode::SlowTransverse;
    let c = Debye::speed(mode);

    // Normal incidence: (0, 0) is a node, so the lookup is exact.
    let vg = table
        .interp_group_velocity(mode, Vector3::new(0.0, 0.0, 7.5))
        .unwrap();
    assert_relative_eq!(vg.x, 0.0, epsilon = 1e-9);
    assert_relative_eq!(vg.y, 0.0, epsilon = 1e-9);
    assert_relative_eq!(vg.z, c, epsilon = 1e-9);

    // Oblique direction between nodes: close to c * n, off by the bilinear
    // sampling of the sphere cap.
    let k = Vector3::new(0.3, 0.4, 0.866).normalize() * 2.0;
    let vg = table.interp_group_velocity(mode, k).unwrap();
    let n = k.normalize();
    assert_relative_eq!(vg.x, c * n.x, epsilon = 1.0);
    assert_relative_eq!(vg.y, c * n.y, epsilon = 1.0);
    assert_relative_eq!(vg.z, c * n.z, epsilon = 20.0);
}

#[test]
fn zero_wavevector_is_rejected_not_nan() {
    // Normalizing a null wavevector yields NaN direction cosines; those
    // must surface as a domain error, never as a NaN lookup result.
    let table = build_table(20);
    let mode = PhononMode::Longitudinal;
    assert!(matches!(
        table.lookup_direction(mode, Quantity::VPhase, Vector3::zeros()),
        Err(GridQueryError::OutsideUnitDisk { .. })
    ));
    assert!(matches!(
        table.interp_group_velocity(mode, Vector3::zeros()),
        Err(GridQueryError::OutsideUnitDisk { .. })
    ));
}

#[test]
fn interpolation_stays_within_corner_bounds() {
    let table = build_table(20);
    let mode = PhononMode::Longitudinal;
    // VGZ = c * nz is monotone in radius; any in-disk query must land
    // between the extremes of its support cell, hence within [0, c].
    for &(x, y) in &[(0.13, 0.27), (0.55, 0.02), (-0.4, -0.33), (0.71, -0.64)] {
        let v = table.lookup(mode, Quantity::VGZ, x, y).unwrap();
        assert!(v >= 0.0 && v <= Debye::speed(mode), "VGZ {v} out of range");
    }
}

#[test]
fn rim_queries_renormalize_over_populated_corners() {
    let table = build_table(20);
    // (0.95, 0.01) sits in a support cell whose (1.0, 0.1) corner is
    // outside the disk and therefore unpopulated. The constant phase
    // velocity must survive renormalization untouched.
    let v = table
        .lookup(PhononMode::Longitudinal, Quantity::VPhase, 0.95, 0.01)
        .unwrap();
    assert_relative_eq!(v, 5000.0, epsilon = 1e-9);
}

#[test]
fn file_round_trip_is_exact() {
    let table = build_table(12);
    let dir = tempfile::tempdir().unwrap();
    table.save(dir.path(), "debye_kvg").unwrap();

    let reloaded = DispersionTable::read(dir.path().join("debye_kvg.dat"), GridSpec::unit_disk(12))
        .unwrap();
    for mode in PhononMode::ALL {
        for quantity in [Quantity::VPhase, Quantity::VGZ, Quantity::Theta, Quantity::EX] {
            for &(x, y) in &[(0.0, 0.0), (0.25, -0.5), (0.6, 0.3)] {
                let a = table.lookup(mode, quantity, x, y).unwrap();
                let b = reloaded.lookup(mode, quantity, x, y).unwrap();
                assert_eq!(a, b, "{mode:?} {quantity:?} at ({x}, {y})");
            }
        }
    }
}

#[test]
fn table_file_has_commented_header_and_mode_labels() {
    let table = build_table(8);
    let mut buf = Vec::new();
    table.write(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();

    let headers: Vec<&str> = text.lines().take_while(|l| l.starts_with('#')).collect();
    assert_eq!(headers.len(), 3);
    assert!(headers[2].starts_with("# Columns: mode n_x n_y n_z"));
    assert!(headers[2].ends_with("e_x e_y e_z"));

    let first_rows: Vec<&str> = text.lines().skip(3).take(3).collect();
    assert!(first_rows[0].starts_with("L "));
    assert!(first_rows[1].starts_with("ST "));
    assert!(first_rows[2].starts_with("FT "));
}

#[test]
fn corrupt_files_are_rejected() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let spec = GridSpec::unit_disk(8);

    let write_file = |name: &str, body: &str| {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{body}").unwrap();
        path
    };

    let row18 = vec!["0.0"; 18].join(" ");

    // Unknown mode label.
    let path = write_file("unknown.dat", &format!("# h\nXX {row18}\n"));
    assert!(matches!(
        DispersionTable::read(&path, spec),
        Err(TableFileError::UnknownMode { line: 2, .. })
    ));

    // Wrong column count.
    let path = write_file("short.dat", "# h\nL 0.0 0.0 1.0\n");
    assert!(matches!(
        DispersionTable::read(&path, spec),
        Err(TableFileError::ColumnCount {
            line: 2,
            expected: 19,
            found: 4
        })
    ));

    // Modes out of order.
    let path = write_file("order.dat", &format!("# h\nL {row18}\nFT {row18}\n"));
    assert!(matches!(
        DispersionTable::read(&path, spec),
        Err(TableFileError::ModeOrder { line: 3 })
    ));

    // Unparsable value.
    let bad_row = format!("0.0 0.0 {}", vec!["oops"; 16].join(" "));
    let path = write_file("garbage.dat", &format!("# h\nL {bad_row}\n"));
    assert!(matches!(
        DispersionTable::read(&path, spec),
        Err(TableFileError::MalformedRow { line: 2 })
    ));

    // Column declaration missing a column.
    let labels: Vec<&str> = Quantity::ALL.iter().map(|q| q.label()).collect();
    let header = format!("# Columns: mode {}", labels[..17].join(" "));
    let path = write_file("columns_short.dat", &format!("{header}\nL {row18}\n"));
    assert!(matches!(
        DispersionTable::read(&path, spec),
        Err(TableFileError::ColumnCount {
            line: 1,
            expected: 19,
            found: 18
        })
    ));

    // Column declaration naming a different quantity.
    let header = format!("# Columns: mode {}", labels.join(" ").replace("v_p", "vp"));
    let path = write_file("columns_renamed.dat", &format!("{header}\nL {row18}\n"));
    assert!(matches!(
        DispersionTable::read(&path, spec),
        Err(TableFileError::ColumnLabel {
            line: 1,
            expected: "v_p",
            ..
        })
    ));
}

#[test]
fn duplicate_grid_nodes_fail_the_build() {
    let spec = GridSpec::unit_disk(2);
    let nodes = vec![(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];
    let rows = vec![[[1.0; Quantity::COUNT]; PhononMode::COUNT]; nodes.len()];
    assert!(matches!(
        DispersionTable::from_rows(spec, nodes, rows),
        Err(TableBuildError::DuplicateCell { .. })
    ));
}
