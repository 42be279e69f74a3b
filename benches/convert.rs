//! Benchmarks for the hot conversion paths: per-pixel matching and the
//! sequential dither scan.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};

use mapart::colortable::{ColorSpace, ColorTable};
use mapart::matcher::{CandidateSet, MapMode, MatchAlgorithm};
use mapart::models::{Palette, PixelGrid};
use mapart::progress::{CancelToken, NullProgress};
use mapart::quantize::{QuantizeConfig, Quantizer, TransparencyStrategy};

fn fixture(algorithm: MatchAlgorithm) -> (Palette, ColorTable) {
    let mut bases = vec![[0u8, 0, 0]];
    for i in 0..32u32 {
        bases.push([(i * 8) as u8, (255 - i * 7) as u8, (i * 3 + 40) as u8]);
    }
    let table = ColorTable::generate(algorithm.space(), &bases);
    let rgb_table = ColorTable::generate(ColorSpace::Rgb, &bases);

    let blocks: Vec<String> = (1..=32)
        .map(|i| format!(r#"{{"id": "minecraft:block_{}", "base_color": {}}}"#, i, i))
        .collect();
    let json = format!(r#"{{"blocks": [{}]}}"#, blocks.join(","));
    let (palette, _) = Palette::load_fixed(&json, &rgb_table).unwrap();
    (palette, table)
}

fn gradient(width: u32, height: u32) -> PixelGrid {
    let mut image = RgbaImage::new(width, height);
    for z in 0..height {
        for x in 0..width {
            image.put_pixel(
                x,
                z,
                Rgba([(x * 4) as u8, (z * 4) as u8, ((x + z) * 2) as u8, 255]),
            );
        }
    }
    PixelGrid::from_image(image)
}

fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_pixel");
    for algorithm in [MatchAlgorithm::Rgb, MatchAlgorithm::RgbPlus, MatchAlgorithm::Lab] {
        let (palette, table) = fixture(algorithm);
        let set =
            CandidateSet::build(&palette, &table, algorithm, MapMode::Sloped.tiers()).unwrap();
        group.bench_function(format!("{:?}", algorithm), |b| {
            b.iter(|| {
                for v in (0..255u32).step_by(5) {
                    black_box(set.closest([v as f32, (255 - v) as f32, 128.0]));
                }
            })
        });
    }
    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let grid = gradient(64, 64);
    let mut group = c.benchmark_group("quantize_64x64");
    for dither in [false, true] {
        let (palette, table) = fixture(MatchAlgorithm::RgbPlus);
        let cfg = QuantizeConfig {
            algorithm: MatchAlgorithm::RgbPlus,
            dither,
            transparency: TransparencyStrategy::Air,
            mode: MapMode::Sloped,
        };
        let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
        let name = if dither { "dithered" } else { "direct" };
        group.bench_function(name, |b| {
            b.iter(|| {
                quantizer
                    .quantize(black_box(&grid), &NullProgress::new(), &CancelToken::new())
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_matching, bench_quantize);
criterion_main!(benches);
