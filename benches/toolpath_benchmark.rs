use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use platekit::toolpath::{ToolpathConfig, extract_layers, parse_metadata};
use std::fmt::Write;
use std::hint::black_box;
use std::io::Cursor;

/// Generate a toolpath with `layers` layers of `moves` perimeter moves each
fn generate_toolpath(layers: usize, moves: usize) -> String {
    let mut out = String::with_capacity(layers * moves * 24);
    writeln!(out, "; total layer number: {}", layers).unwrap();
    out.push_str("G90\nM83\n");

    for layer in 0..layers {
        writeln!(out, "G1 Z{:.2} F600", 0.2 * (layer + 1) as f64).unwrap();
        for i in 0..moves {
            let angle = i as f64 / moves as f64 * std::f64::consts::TAU;
            writeln!(
                out,
                "G1 X{:.3} Y{:.3} E0.0123",
                135.0 + 40.0 * angle.cos(),
                135.0 + 40.0 * angle.sin()
            )
            .unwrap();
        }
        out.push_str("G1 E-0.8 ; retract\n");
    }
    out.push_str("; estimated printing time (normal mode) = 2h 10m 5s\n");
    out
}

fn bench_metadata(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_metadata");
    let config = ToolpathConfig::default();

    for layers in [10, 100, 500] {
        let text = generate_toolpath(layers, 200);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(layers), &text, |b, text| {
            b.iter(|| parse_metadata(Cursor::new(black_box(text.as_bytes())), &config).unwrap());
        });
    }
    group.finish();
}

fn bench_layers(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_layers");
    let config = ToolpathConfig::default();
    let text = generate_toolpath(300, 200);

    for window in [1, 20, 300] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| {
                extract_layers(Cursor::new(black_box(text.as_bytes())), 0, window, &config).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_metadata, bench_layers);
criterion_main!(benches);
