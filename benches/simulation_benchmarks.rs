use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ohmspice::*;

fn bench_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("values");
    let literals = ["1k", "4.7meg", "159.15n", "-2.5e-3u", "1000"];

    group.bench_function("parse_value", |b| {
        b.iter(|| {
            for literal in literals {
                parse_value(literal).unwrap();
            }
        });
    });

    group.bench_function("format_value", |b| {
        b.iter(|| {
            for value in [1e3, 4.7e6, 159.15e-9, -2.5e-9, 0.5] {
                format_value(value);
            }
        });
    });

    group.finish();
}

fn bench_netlist(c: &mut Criterion) {
    let mut group = c.benchmark_group("netlist");

    // RC ladder with a growing number of sections
    for sections in [10, 100, 1000].iter() {
        let mut circuit = Circuit::new("ladder");
        circuit.add_voltage_source("V1", "n0", "0", SourceSpec::ac(1.0)).unwrap();
        for i in 0..*sections {
            let (a, b) = (format!("n{}", i), format!("n{}", i + 1));
            circuit.add_resistor(&format!("R{}", i), &a, &b, "1k").unwrap();
            circuit.add_capacitor(&format!("C{}", i), &b, "0", "10n").unwrap();
        }
        circuit.add_ac_analysis("dec", 20, 1.0, "1meg").unwrap();

        group.bench_with_input(BenchmarkId::new("render", sections), &circuit, |b, circuit| {
            b.iter(|| circuit.to_netlist());
        });
    }

    group.finish();
}

fn synthetic_ac_file(points: usize) -> Vec<u8> {
    let mut bytes = format!(
        "Title: * bench\nDate: now\nPlotname: AC Analysis\nFlags: complex forward log\nNo. Variables: 3\nNo. Points: {}\nVariables:\n\t0\tfrequency\tfrequency\n\t1\tV(out)\tvoltage\n\t2\tV(in)\tvoltage\nBinary:\n",
        points
    )
    .into_bytes();
    for i in 0..points {
        let f = 10f64.powf(i as f64 / 20.0);
        for value in [f, 1.0 / (1.0 + f), -f / (1.0 + f * f), 1.0, 0.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

fn bench_raw_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("raw_decoding");

    for points in [100, 1000, 10000].iter() {
        let bytes = synthetic_ac_file(*points);
        group.bench_with_input(BenchmarkId::new("binary_complex", points), &bytes, |b, bytes| {
            b.iter(|| {
                let result = AnalysisResult::from_bytes(bytes).unwrap();
                result.get_voltage("out").unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_values, bench_netlist, bench_raw_decoding);
criterion_main!(benches);
