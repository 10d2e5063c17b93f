use std::fs;

use ohmspice::{AnalysisKind, AnalysisResult, Circuit, Error, SourceSpec};

fn rc_filter() -> Circuit {
    let mut circuit = Circuit::new("RC");
    circuit
        .add_voltage_source("V1", "in", "gnd", SourceSpec::ac(1.0))
        .unwrap()
        .add_resistor("R1", "in", "out", "1k")
        .unwrap()
        .add_capacitor("C1", "out", "0", "159.15n")
        .unwrap()
        .add_ac_analysis("dec", 20, 1, "1meg")
        .unwrap();
    circuit
}

#[test]
fn rc_filter_netlist() {
    let expected = "* RC\nV1 in 0 AC 1\nR1 in out 1k\nC1 out 0 159.15n\n.ac dec 20 1 1meg\n.end";
    assert_eq!(rc_filter().to_netlist(), expected);
}

#[test]
fn save_adds_extension_and_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = rc_filter().save(dir.path().join("nested/deeper/rc")).unwrap();

    assert_eq!(path, dir.path().join("nested/deeper/rc.cir"));
    assert_eq!(fs::read_to_string(&path).unwrap(), rc_filter().to_netlist());

    let explicit = rc_filter().save(dir.path().join("rc.net")).unwrap();
    assert_eq!(explicit.extension().unwrap(), "net");
}

#[test]
fn duplicate_ids_are_rejected_across_kinds() {
    let mut circuit = rc_filter();
    let err = circuit.add_resistor("c1", "a", "b", 10.0).unwrap_err();
    // A resistor cannot be named c1 either way; the prefix check runs first.
    assert!(matches!(err, Error::InvalidValue { field: "id", .. }));

    let err = circuit.add_capacitor("c1", "a", "b", "1n").unwrap_err();
    assert!(matches!(err, Error::DuplicateId { .. }));
    assert_eq!(circuit.len(), 3);
}

fn corner_frequency() -> f64 {
    1.0 / (2.0 * std::f64::consts::PI * 1e3 * 159.15e-9)
}

/// Frequency, V(out), V(in) for a first-order low-pass.
fn synthetic_ac_file(frequencies: &[f64]) -> Vec<u8> {
    let corner = corner_frequency();
    let mut bytes = format!(
        "Title: * RC\nDate: Mon Oct 19 12:00:00 2026\nPlotname: AC Analysis\nFlags: complex forward log\n\
No. Variables: 3\nNo. Points: {}\nOffset:   0.0000000000000000e+000\nCommand: Linear Technology Corporation LTspice\n\
Variables:\n\t0\tfrequency\tfrequency\n\t1\tV(out)\tvoltage\n\t2\tV(in)\tvoltage\nBinary:\n",
        frequencies.len()
    )
    .into_bytes();

    for &f in frequencies {
        // H = 1 / (1 + j f/fc)
        let x = f / corner;
        let denom = 1.0 + x * x;
        for value in [f, 1.0 / denom, -x / denom, 1.0, 0.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

#[test]
fn decodes_synthetic_complex_result() {
    let frequencies = [1.0, 10.0, 100.0, 1e3, 1e4, 1e5, 1e6];
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rc.raw");
    fs::write(&path, synthetic_ac_file(&frequencies)).unwrap();

    let result = AnalysisResult::from_file(&path).unwrap();
    assert_eq!(result.analysis_kind(), AnalysisKind::Ac);
    assert_eq!(result.point_count(), frequencies.len());
    assert_eq!(result.get_frequency(), &frequencies);

    let out = result.get_voltage("out").unwrap();
    let phase = result.get_phase("out").unwrap();
    assert_eq!(out.len(), frequencies.len());
    assert_eq!(phase.len(), frequencies.len());

    // |H| = 1/sqrt(1 + x^2), arg H = -atan(x)
    for (i, &f) in frequencies.iter().enumerate() {
        let x = f / corner_frequency();
        let magnitude = 1.0 / (1.0 + x * x).sqrt();
        let degrees = -x.atan().to_degrees();
        assert!((out[i] - magnitude).abs() < 1e-12, "{f} Hz: {} != {magnitude}", out[i]);
        assert!((phase[i] - degrees).abs() < 1e-9, "{f} Hz: {} != {degrees}", phase[i]);
    }
    assert!((out[3] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    assert!((phase[3] + 45.0).abs() < 0.1);

    assert!(result.get_voltage("in").unwrap().iter().all(|&v| (v - 1.0).abs() < 1e-12));
}

#[test]
fn truncated_result_never_panics() {
    let bytes = synthetic_ac_file(&[1.0, 10.0, 100.0]);
    for cut in (0..bytes.len()).step_by(7) {
        assert!(AnalysisResult::from_bytes(&bytes[..cut]).is_err());
    }
    assert!(matches!(
        AnalysisResult::from_bytes(&bytes[..bytes.len() - 1]),
        Err(Error::TruncatedFile { .. })
    ));
}
