//! Property tests for easing, spawn sampling and spawn accumulation.

use pfx::prelude::*;
use pfx::{ease, EffectState};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn easing() -> impl Strategy<Value = Easing> {
    prop_oneof![Just(Easing::Linear), Just(Easing::EaseIn), Just(Easing::EaseOut)]
}

fn finite_f32() -> impl Strategy<Value = f32> {
    -1000.0f32..1000.0
}

fn valid_vec3() -> impl Strategy<Value = Vec3> {
    (finite_f32(), finite_f32(), finite_f32()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #[test]
    fn ease_hits_both_endpoints(kind in easing(), start in finite_f32(), end in finite_f32()) {
        prop_assert_eq!(ease(kind, start, end, 0.0), start);
        prop_assert_eq!(ease(kind, start, end, 1.0), end);
    }

    #[test]
    fn ease_stays_between_endpoints(kind in easing(), start in finite_f32(), end in finite_f32(), t in 0.0f32..=1.0) {
        let value = ease(kind, start, end, t);
        let slack = 1e-3 * (1.0 + start.abs().max(end.abs()));
        prop_assert!(value >= start.min(end) - slack);
        prop_assert!(value <= start.max(end) + slack);
    }

    #[test]
    fn ease_factor_is_monotonic(kind in easing(), a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(kind.factor(lo) <= kind.factor(hi));
    }

    #[test]
    fn spawn_box_samples_stay_inside(a in valid_vec3(), b in valid_vec3(), seed in any::<u64>()) {
        let spawn = SpawnBox::new(a, b);
        let mut rng = SmallRng::seed_from_u64(seed);
        for _ in 0..32 {
            prop_assert!(spawn.contains(spawn.sample(&mut rng)));
        }
    }

    #[test]
    fn spawn_total_tracks_rate(rate in 1.0f32..200.0, fps in 20.0f32..240.0) {
        let mut registry = DefinitionRegistry::new();
        let material = registry.add_material(Material::new("flat", "flat.wgsl")).unwrap();
        let spark = registry
            .add_billboard(BillboardDefinition::new("spark", material).with_lifetime(100.0))
            .unwrap();
        let mut library = EffectLibrary::new();
        library
            .add(
                ParticleEffect::new("steady")
                    .with_entry(ParticleEffectEntry::new(EntryKind::Billboard(spark)).with_window(0.0, 1.0).with_rate(rate))
                    .unwrap(),
            )
            .unwrap();
        let config = EngineConfig::default().with_billboard_capacity(1024).with_seed(5);
        let mut engine = ParticleEngine::new(registry, library, config);
        let mut instance = engine.play("steady").unwrap();

        let dt = 1.0 / fps;
        while engine.process_fx(&mut instance, Mat4::IDENTITY, dt) != EffectState::Expired {}

        let spawned = engine.billboards().len() as f32;
        prop_assert!(spawned <= rate + 1.0, "{} > {}", spawned, rate);
        prop_assert!(spawned >= rate - 1.0, "{} < {}", spawned, rate);
    }
}
