//! Glyph atlas and uniform marshaling benchmarks.
//! Run: cargo bench
//!
//! Atlas builds use host fonts; the bench is skipped if none are installed.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use retrograde::glyph_atlas::{build_atlas, SystemFonts};
use retrograde::params::{AsciiRamp, Effect, EffectKind, ParameterBlock, SYSTEM_FONT};
use retrograde::EffectUniforms;

fn bench_atlas_build(c: &mut Criterion) {
    let mut fonts = SystemFonts::new();
    if build_atlas(&mut fonts, " ", SYSTEM_FONT).is_err() {
        eprintln!("Skipping atlas bench: no usable system font");
        return;
    }

    let mut group = c.benchmark_group("atlas_build");
    for ramp in [AsciiRamp::Classic, AsciiRamp::RetroGlyphs, AsciiRamp::Braille] {
        group.bench_function(ramp.name(), |b| {
            b.iter(|| black_box(build_atlas(&mut fonts, ramp.chars(), SYSTEM_FONT).expect("atlas")));
        });
    }
    group.finish();
}

fn bench_uniforms(c: &mut Criterion) {
    let blocks: Vec<ParameterBlock> = EffectKind::ALL
        .into_iter()
        .map(|kind| ParameterBlock::with_effect(Effect::default_for(kind)))
        .collect();

    c.bench_function("uniforms_from_params", |b| {
        b.iter(|| {
            for params in &blocks {
                black_box(EffectUniforms::from_params(params, (1920, 1080), None));
            }
        });
    });
}

criterion_group!(benches, bench_atlas_build, bench_uniforms);
criterion_main!(benches);
