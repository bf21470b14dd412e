//! Loading, resolving and saving library files.

use std::path::PathBuf;

use pfx::prelude::*;
use pfx::{EffectState, LoadError};

fn demo_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/library.json")
}

#[test]
fn test_demo_library_loads() {
    let library = Library::load(demo_path()).unwrap();

    assert_eq!(library.registry.materials().count(), 3);
    assert!(library.registry.find_billboard("Spark").is_some());
    assert!(library.registry.find_geometry("Fireball").is_some());
    assert!(library.registry.find_trail("Streak").is_some());

    let explosion = library.effects.get("Explosion").unwrap();
    assert_eq!(explosion.entries().len(), 6);
    assert!(!explosion.looping);
    assert!((explosion.duration() - 2.0).abs() < 1e-6);

    let torch = library.effects.get("Torch").unwrap();
    assert!(torch.looping);
    assert_eq!(torch.duration(), 2.0);
    assert!(torch.entries()[0].anchored);
}

#[test]
fn test_shader_paths_resolve_next_to_the_file() {
    let library = Library::load(demo_path()).unwrap();
    for (_, material) in library.registry.materials() {
        assert!(material.shader_path.exists(), "{}", material.shader_path.display());
    }
}

#[test]
fn test_demo_materials_resolve_with_file_checks() {
    let library = Library::load(demo_path()).unwrap();
    let mut engine = library.into_engine(EngineConfig::default().with_seed(3));
    let mut renderer = RecordingRenderer::new().with_file_checks();
    assert_eq!(engine.reload_materials(&mut renderer), 3);
    assert!(engine.registry().materials().all(|(_, m)| m.shader.is_some()));
}

#[test]
fn test_demo_explosion_plays_to_completion() {
    let library = Library::load(demo_path()).unwrap();
    let mut engine = library.into_engine(EngineConfig::default().with_seed(11));
    let camera = Camera::new();
    let mut renderer = RecordingRenderer::new();
    engine.reload_materials(&mut renderer);

    let mut explosion = engine.play("Explosion").unwrap();
    let mut saw_lights = false;
    let mut peak_trails = 0;
    let mut steps = 0;
    loop {
        let state = engine.process_fx(&mut explosion, Mat4::IDENTITY, 1.0 / 60.0);
        engine.update(&camera, 1.0 / 60.0);
        engine.render(&camera, &mut renderer, false);
        saw_lights |= renderer.light_count > 0;
        peak_trails = peak_trails.max(renderer.drawn(ParticleKind::Trail));
        engine.frame();
        steps += 1;
        if state == EffectState::Expired {
            break;
        }
        assert!(steps < 1000);
    }

    assert!(saw_lights);
    assert_eq!(peak_trails, 3);
    // streaks collapse well before the smoke window closes
    assert!(engine.trails().is_empty());
    assert_eq!(engine.stats().dropped_geometry, 0);
}

#[test]
fn test_unknown_material_is_reported() {
    let json = r#"{
        "materials": [],
        "billboard_definitions": [{ "name": "Spark", "material_name": "Fire" }]
    }"#;
    match Library::from_json(json) {
        Err(LoadError::UnknownMaterial { definition, material }) => {
            assert_eq!(definition, "Spark");
            assert_eq!(material, "Fire");
        }
        other => panic!("expected UnknownMaterial, got {other:?}"),
    }
}

#[test]
fn test_unknown_definition_is_reported() {
    let json = r#"{
        "materials": [{ "name": "Fire", "path": "fire.wgsl" }],
        "billboard_definitions": [{ "name": "Spark", "material_name": "Fire" }],
        "fx": [{ "name": "Boom", "entries": [{ "type": "geometry", "name": "Spark" }] }]
    }"#;
    match Library::from_json(json) {
        Err(LoadError::UnknownDefinition { effect, kind, name }) => {
            assert_eq!(effect, "Boom");
            assert_eq!(kind, ParticleKind::Geometry);
            assert_eq!(name, "Spark");
        }
        other => panic!("expected UnknownDefinition, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = Library::load("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
    assert!(err.to_string().contains("here.json"));
}

#[test]
fn test_saved_library_loads_back() {
    let library = Library::load(demo_path()).unwrap();
    let json = library.to_json().unwrap();
    let reloaded = Library::from_json(&json).unwrap();

    assert_eq!(reloaded.to_file(), library.to_file());
    let fireball = reloaded.registry.find_geometry("Fireball").unwrap();
    let def = reloaded.registry.geometry(fireball).unwrap();
    assert!(def.light.radius.is_enabled());
    assert_eq!(def.deform.speed, 4.0);
}

#[test]
fn test_disabled_light_serializes_as_none() {
    let json = r#"{
        "materials": [{ "name": "Glow", "path": "glow.wgsl" }],
        "geometry_definitions": [{
            "name": "Orb",
            "material_name": "Glow",
            "light": {
                "color": { "function": "None", "start": [1, 1, 1, 1], "end": [1, 1, 1, 1] },
                "radius": { "function": "None", "start": 0, "end": 0 }
            }
        }]
    }"#;
    let library = Library::from_json(json).unwrap();
    let orb = library.registry.find_geometry("Orb").unwrap();
    assert!(library.registry.geometry(orb).unwrap().light.sample(0.5).is_none());
}
