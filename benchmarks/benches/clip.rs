use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geo_types::{Coord, Rect};
use maplibre_raster::clip::{clip_line_string, clip_ring, ClipBounds};

fn zigzag(count: usize) -> Vec<Coord<f32>> {
    (0..count)
        .map(|i| Coord {
            x: i as f32 * 4.0 - 256.0,
            y: if i % 2 == 0 { -64.0 } else { 576.0 },
        })
        .collect()
}

fn star(points: usize, center: f32, outer: f32, inner: f32) -> Vec<Coord<f32>> {
    (0..points * 2)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::PI / points as f32;
            let radius = if i % 2 == 0 { outer } else { inner };
            Coord {
                x: center + radius * angle.cos(),
                y: center + radius * angle.sin(),
            }
        })
        .collect()
}

fn clip(c: &mut Criterion) {
    let rect = Rect::new(Coord { x: -5.0, y: -5.0 }, Coord { x: 517.0, y: 517.0 });
    let bounds = ClipBounds::new(rect);

    let line = zigzag(512);
    c.bench_function("clip_line_string", |b| {
        b.iter(|| clip_line_string(black_box(&line), black_box(&rect)))
    });

    let outside = star(64, 5000.0, 400.0, 200.0);
    c.bench_function("clip_ring_outside", |b| {
        b.iter(|| clip_ring(black_box(&outside), black_box(&bounds)))
    });

    let crossing = star(64, 256.0, 400.0, 200.0);
    c.bench_function("clip_ring_crossing", |b| {
        b.iter(|| clip_ring(black_box(&crossing), black_box(&bounds)))
    });
}

criterion_group!(benches, clip);
criterion_main!(benches);
