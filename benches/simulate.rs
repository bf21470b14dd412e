//! Benchmarks for the CPU side of the engine.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pfx::prelude::*;
use pfx::render::shaders;

const DT: f32 = 1.0 / 60.0;

/// One effect per kind, each emitting `rate` particles per second.
fn engine(rate: f32, sort: bool) -> ParticleEngine {
    let mut registry = DefinitionRegistry::new();
    let material = registry.add_material(Material::new("flat", "flat.wgsl")).unwrap();
    let spark = registry
        .add_billboard(BillboardDefinition::new("spark", material).with_lifetime(2.0))
        .unwrap();
    let ember = registry
        .add_geometry(
            GeometryDefinition::new("ember", material)
                .with_lifetime(2.0)
                .with_gravity(-9.8)
                .with_light(
                    EaseCurve::new(Easing::Linear, Vec4::ONE, Vec4::ZERO),
                    EaseCurve::new(Easing::EaseIn, 3.0, 0.5),
                ),
        )
        .unwrap();
    let streak = registry
        .add_trail(
            TrailDefinition::new("streak", material)
                .with_frequency(0.02)
                .with_start_velocity(Vec3::new(-1.0, 2.0, -1.0), Vec3::new(1.0, 4.0, 1.0)),
        )
        .unwrap();

    let spread = |entry: ParticleEffectEntry| {
        entry
            .with_window(0.0, 10.0)
            .with_rate(rate)
            .with_start_position(Vec3::splat(-2.0), Vec3::splat(2.0))
            .with_start_velocity(Vec3::splat(-1.0), Vec3::splat(1.0))
    };
    let effect = ParticleEffect::new("stress")
        .with_looping(true)
        .with_entry(spread(ParticleEffectEntry::new(EntryKind::Billboard(spark))))
        .unwrap()
        .with_entry(spread(ParticleEffectEntry::new(EntryKind::Geometry(ember))))
        .unwrap()
        .with_entry(ParticleEffectEntry::new(EntryKind::Trail(streak)).with_window(0.0, 10.0))
        .unwrap();

    let mut library = EffectLibrary::new();
    library.add(effect).unwrap();
    let config = EngineConfig::default()
        .with_billboard_capacity(100_000)
        .with_geometry_capacity(4096)
        .with_sort_billboards(sort)
        .with_persistent_particles(true)
        .with_seed(7);
    ParticleEngine::new(registry, library, config)
}

/// Run until the pools reach steady state.
fn warmed(rate: f32, sort: bool) -> (ParticleEngine, pfx::EffectInstance) {
    let mut engine = engine(rate, sort);
    let camera = Camera::new();
    let mut instance = engine.play("stress").unwrap();
    for _ in 0..150 {
        engine.process_fx(&mut instance, Mat4::IDENTITY, DT);
        engine.update(&camera, DT);
    }
    (engine, instance)
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    let camera = Camera::new();

    for rate in [500.0_f32, 5_000.0, 20_000.0] {
        group.bench_with_input(BenchmarkId::new("steady_state", rate as u32), &rate, |b, &rate| {
            let (mut engine, mut instance) = warmed(rate, false);
            b.iter(|| {
                engine.process_fx(&mut instance, Mat4::IDENTITY, DT);
                engine.update(&camera, black_box(DT));
            })
        });
    }

    group.bench_function("sorted_5000", |b| {
        let (mut engine, mut instance) = warmed(5_000.0, true);
        b.iter(|| {
            engine.process_fx(&mut instance, Mat4::IDENTITY, DT);
            engine.update(&camera, black_box(DT));
        })
    });

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let camera = Camera::new();
    let (engine, _) = warmed(5_000.0, false);
    let mut renderer = RecordingRenderer::new();

    c.bench_function("render_recording_5000", |b| {
        b.iter(|| engine.render(&camera, black_box(&mut renderer), false))
    });
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    for kind in ParticleKind::ALL {
        group.bench_function(kind.label(), |b| {
            b.iter(|| black_box(shaders::compose(kind, shaders::DEFAULT_MATERIAL)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_update, bench_render, bench_compose);
criterion_main!(benches);
