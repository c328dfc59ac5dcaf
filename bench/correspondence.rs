use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_correspondence::prelude::*;

const WIDTH: usize = 320;
const HEIGHT: usize = 240;

/// Hashed texture, `shift` pixels to the left of the unshifted one.
fn texture(shift: usize) -> Vec<u8> {
    (0..WIDTH * HEIGHT)
        .map(|i| {
            let (x, y) = ((i % WIDTH + shift) as u32, (i / WIDTH) as u32);
            let mut h = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263);
            h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
            (h >> 24) as u8
        })
        .collect()
}

fn correspondence_bench(c: &mut Criterion) {

    // Build frames
    let left = texture(0);
    let right = texture(6);
    let left_rgb: Vec<u8> = left.iter().flat_map(|&v| vec![v, v, v]).collect();
    let right_rgb: Vec<u8> = right.iter().flat_map(|&v| vec![v, v, v]).collect();

    for name in &["simple", "simple2", "simple_colour", "canny", "edges", "dense", "geometric"] {

        // Build engine
        let mut engine = CorrespondenceEngine::from_json(
            &format!(r#"{{"algorithm": "{}"}}"#, name)
        ).unwrap();

        let (l, r) = if *name == "simple_colour" {
            (&left_rgb, &right_rgb)
        }
        else {
            (&left, &right)
        };

        // Benchmark update function
        c.bench_function(&format!("{} {}x{}", name, WIDTH, HEIGHT), |b| b.iter(|| {
            engine.update(black_box(l), black_box(r), WIDTH, HEIGHT, 0.0, 0.0).unwrap()
        }));
    }
}

criterion_group!(benches, correspondence_bench);
criterion_main!(benches);
