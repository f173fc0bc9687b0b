use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{ImageFormat, Rgba, RgbaImage};
use rfpixels::imaging::{extract, normalize, MetadataGuard};
use std::io::Cursor;

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]))
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for (w, h) in [(64u32, 64u32), (640, 480), (1280, 720)] {
        let raw = gradient(w, h).into_raw();
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}x{}", w, h)), &raw, |b, raw| {
            b.iter(|| extract(black_box(raw), w, h).unwrap())
        });
    }
    group.finish();
}

fn bench_normalize_png(c: &mut Criterion) {
    let mut png = Cursor::new(Vec::new());
    gradient(640, 480).write_to(&mut png, ImageFormat::Png).unwrap();
    let png = png.into_inner();
    let guard = MetadataGuard::default();

    c.bench_function("normalize_png_640x480", |b| {
        b.iter(|| normalize(black_box(&png), &guard).unwrap())
    });
}

criterion_group!(benches, bench_extract, bench_normalize_png);
criterion_main!(benches);
