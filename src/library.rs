//! JSON effect library files.
//!
//! A library file holds materials, textures, the three definition tables and
//! the effect recipes. Everything refers to materials and definitions by
//! name:
//!
//! ```json
//! {
//!     "materials": [{ "name": "Fire", "path": "materials/fire.wgsl" }],
//!     "textures": [],
//!     "billboard_definitions": [{ "name": "Spark", "material_name": "Fire", "lifetime": 0.5 }],
//!     "geometry_definitions": [],
//!     "trail_definitions": [],
//!     "fx": [{
//!         "name": "Sparks",
//!         "entries": [{
//!             "type": "billboard", "name": "Spark", "start": 0.0, "time": 1.0,
//!             "spawn": { "function": "Linear", "start": 20.0, "end": 0.0 }
//!         }]
//!     }]
//! }
//! ```
//!
//! Loading resolves every name up front and fails with a [`LoadError`]
//! naming the first unresolved reference, so the engine never holds a
//! dangling definition. Relative shader and texture paths resolve against
//! the directory of the library file.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec4;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::definition::{
    BillboardDefinition, DeformCurve, GeometryDefinition, LightCurve, TrailDefinition,
};
use crate::ease::EaseCurve;
use crate::effect::{EffectLibrary, EntryKind, ParticleEffect, ParticleEffectEntry};
use crate::engine::ParticleEngine;
use crate::error::LoadError;
use crate::particle::ParticleKind;
use crate::registry::{DefinitionRegistry, Material, MaterialId};
use crate::spawn::{SpawnBox, SpawnRange};

/// A `{name, path}` pair for materials and textures.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AssetRecord {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BillboardRecord {
    pub name: String,
    pub material_name: String,
    #[serde(default = "default_lifetime")]
    pub lifetime: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LightRecord {
    pub color: EaseCurve<Vec4>,
    pub radius: EaseCurve<f32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeometryRecord {
    pub name: String,
    pub material_name: String,
    #[serde(default = "default_lifetime")]
    pub lifetime: f32,
    #[serde(default)]
    pub gravity: f32,
    #[serde(default)]
    pub noise_scale: f32,
    #[serde(default)]
    pub noise_speed: f32,
    #[serde(default = "default_color")]
    pub color: EaseCurve<Vec4>,
    #[serde(default = "default_deform")]
    pub deform: EaseCurve<f32>,
    #[serde(default)]
    pub deform_speed: f32,
    #[serde(default = "default_size")]
    pub size: EaseCurve<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<LightRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrailRecord {
    pub name: String,
    pub material_name: String,
    #[serde(default = "default_lifetime")]
    pub lifetime: f32,
    #[serde(default)]
    pub gravity: f32,
    pub frequency: f32,
    #[serde(default)]
    pub start_position: SpawnBox,
    #[serde(default)]
    pub start_velocity: SpawnBox,
    #[serde(default = "default_trail_size")]
    pub size_start: f32,
    #[serde(default)]
    pub size_end: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EntryRecord {
    #[serde(rename = "type")]
    pub kind: ParticleKind,
    /// Definition name, looked up in the table for `kind`.
    pub name: String,
    #[serde(default)]
    pub start: f32,
    /// Window length.
    #[serde(default = "default_lifetime")]
    pub time: f32,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub start_position: SpawnBox,
    #[serde(default)]
    pub start_velocity: SpawnBox,
    #[serde(default = "default_spawn")]
    pub spawn: EaseCurve<f32>,
    #[serde(default)]
    pub rotation: SpawnRange,
    #[serde(default)]
    pub rotation_speed: SpawnRange,
    #[serde(default)]
    pub anchored: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EffectRecord {
    pub name: String,
    /// Total effect time; the latest entry window end when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f32>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
}

/// On-disk shape of a library.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LibraryFile {
    #[serde(default)]
    pub materials: Vec<AssetRecord>,
    #[serde(default)]
    pub textures: Vec<AssetRecord>,
    #[serde(default)]
    pub billboard_definitions: Vec<BillboardRecord>,
    #[serde(default)]
    pub geometry_definitions: Vec<GeometryRecord>,
    #[serde(default)]
    pub trail_definitions: Vec<TrailRecord>,
    #[serde(default)]
    pub fx: Vec<EffectRecord>,
}

fn default_lifetime() -> f32 {
    1.0
}

fn default_color() -> EaseCurve<Vec4> {
    EaseCurve::constant(Vec4::ONE)
}

fn default_deform() -> EaseCurve<f32> {
    EaseCurve::constant(0.0)
}

fn default_size() -> EaseCurve<f32> {
    EaseCurve::constant(1.0)
}

fn default_trail_size() -> f32 {
    0.1
}

fn default_spawn() -> EaseCurve<f32> {
    EaseCurve::constant(0.0)
}

/// A resolved registry and effect library, ready to hand to an engine.
#[derive(Clone, Debug, Default)]
pub struct Library {
    pub registry: DefinitionRegistry,
    pub effects: EffectLibrary,
}

impl Library {
    /// Read and resolve a library file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LibraryFile = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let library = file.resolve(base)?;
        info!(
            "loaded library {}: {} materials, {} definitions, {} effects",
            path.display(),
            file.materials.len(),
            file.billboard_definitions.len() + file.geometry_definitions.len() + file.trail_definitions.len(),
            library.effects.len()
        );
        Ok(library)
    }

    /// Resolve a library from JSON text; relative paths stay as written.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let file: LibraryFile = serde_json::from_str(json)?;
        file.resolve(Path::new(""))
    }

    /// Convert back into the on-disk shape.
    pub fn to_file(&self) -> LibraryFile {
        LibraryFile::capture(&self.registry, &self.effects)
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(&self.to_file())?)
    }

    /// Write the library as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_engine(self, config: EngineConfig) -> ParticleEngine {
        ParticleEngine::new(self.registry, self.effects, config)
    }
}

impl LibraryFile {
    /// Resolve every name reference. Relative asset paths are joined to
    /// `base`.
    pub fn resolve(&self, base: &Path) -> Result<Library, LoadError> {
        let mut registry = DefinitionRegistry::new();

        for record in &self.materials {
            registry.add_material(Material::new(record.name.clone(), base.join(&record.path)))?;
        }
        for record in &self.textures {
            registry.add_texture(record.name.clone(), base.join(&record.path))?;
        }

        let material = |registry: &DefinitionRegistry, definition: &str, name: &str| {
            registry
                .find_material(name)
                .ok_or_else(|| LoadError::UnknownMaterial {
                    definition: definition.to_string(),
                    material: name.to_string(),
                })
        };

        for record in &self.billboard_definitions {
            let id = material(&registry, &record.name, &record.material_name)?;
            registry.add_billboard(BillboardDefinition::new(record.name.clone(), id).with_lifetime(record.lifetime))?;
        }
        for record in &self.geometry_definitions {
            let id = material(&registry, &record.name, &record.material_name)?;
            registry.add_geometry(record.to_definition(id))?;
        }
        for record in &self.trail_definitions {
            let id = material(&registry, &record.name, &record.material_name)?;
            registry.add_trail(record.to_definition(id))?;
        }

        let mut effects = EffectLibrary::new();
        for record in &self.fx {
            let mut effect = ParticleEffect::new(record.name.clone()).with_looping(record.looping);
            effect.time = record.time;
            for entry in &record.entries {
                let kind = resolve_entry(&registry, &record.name, entry)?;
                effect.push_entry(entry.to_entry(kind))?;
            }
            effects.add(effect)?;
        }

        Ok(Library { registry, effects })
    }

    /// Build the file shape from live tables.
    pub fn capture(registry: &DefinitionRegistry, effects: &EffectLibrary) -> Self {
        let material_name = |id: MaterialId| {
            registry
                .material(id)
                .map(|m| m.name.clone())
                .unwrap_or_default()
        };

        let materials = registry
            .materials()
            .map(|(_, m)| AssetRecord {
                name: m.name.clone(),
                path: m.shader_path.clone(),
            })
            .collect();
        let textures = registry
            .textures()
            .map(|(_, t)| AssetRecord {
                name: t.name.clone(),
                path: t.path.clone(),
            })
            .collect();
        let billboard_definitions = registry
            .billboards()
            .iter()
            .map(|d| BillboardRecord {
                name: d.name.clone(),
                material_name: material_name(d.material),
                lifetime: d.lifetime,
            })
            .collect();
        let geometry_definitions = registry
            .geometries()
            .iter()
            .map(|d| GeometryRecord {
                name: d.name.clone(),
                material_name: material_name(d.material),
                lifetime: d.lifetime,
                gravity: d.gravity,
                noise_scale: d.noise_scale,
                noise_speed: d.noise_speed,
                color: d.color,
                deform: d.deform.curve,
                deform_speed: d.deform.speed,
                size: d.size,
                light: d.light.radius.is_enabled().then_some(LightRecord {
                    color: d.light.color,
                    radius: d.light.radius,
                }),
            })
            .collect();
        let trail_definitions = registry
            .trails()
            .iter()
            .map(|d| TrailRecord {
                name: d.name.clone(),
                material_name: material_name(d.material),
                lifetime: d.lifetime,
                gravity: d.gravity,
                frequency: d.frequency,
                start_position: d.start_position,
                start_velocity: d.start_velocity,
                size_start: d.size_start,
                size_end: d.size_end,
            })
            .collect();

        let fx = effects
            .iter()
            .map(|(_, effect)| EffectRecord {
                name: effect.name.clone(),
                time: effect.time,
                looping: effect.looping,
                entries: effect
                    .entries()
                    .iter()
                    .map(|entry| EntryRecord::capture(registry, entry))
                    .collect(),
            })
            .collect();

        Self {
            materials,
            textures,
            billboard_definitions,
            geometry_definitions,
            trail_definitions,
            fx,
        }
    }
}

fn resolve_entry(registry: &DefinitionRegistry, effect: &str, entry: &EntryRecord) -> Result<EntryKind, LoadError> {
    let kind = match entry.kind {
        ParticleKind::Billboard => registry.find_billboard(&entry.name).map(EntryKind::Billboard),
        ParticleKind::Geometry => registry.find_geometry(&entry.name).map(EntryKind::Geometry),
        ParticleKind::Trail => registry.find_trail(&entry.name).map(EntryKind::Trail),
    };
    kind.ok_or_else(|| LoadError::UnknownDefinition {
        effect: effect.to_string(),
        kind: entry.kind,
        name: entry.name.clone(),
    })
}

impl GeometryRecord {
    fn to_definition(&self, material: MaterialId) -> GeometryDefinition {
        let mut def = GeometryDefinition::new(self.name.clone(), material)
            .with_lifetime(self.lifetime)
            .with_gravity(self.gravity)
            .with_noise(self.noise_scale, self.noise_speed);
        def.color = self.color;
        def.size = self.size;
        def.deform = DeformCurve {
            curve: self.deform,
            speed: self.deform_speed,
        };
        def.light = match &self.light {
            Some(light) => LightCurve {
                color: light.color,
                radius: light.radius,
            },
            None => LightCurve::disabled(),
        };
        def
    }
}

impl TrailRecord {
    fn to_definition(&self, material: MaterialId) -> TrailDefinition {
        let mut def = TrailDefinition::new(self.name.clone(), material)
            .with_lifetime(self.lifetime)
            .with_gravity(self.gravity)
            .with_frequency(self.frequency)
            .with_size(self.size_start, self.size_end);
        def.start_position = self.start_position;
        def.start_velocity = self.start_velocity;
        def
    }
}

impl EntryRecord {
    fn to_entry(&self, kind: EntryKind) -> ParticleEffectEntry {
        let mut entry = ParticleEffectEntry::new(kind)
            .with_window(self.start, self.time)
            .with_looping(self.looping)
            .with_rotation(self.rotation, self.rotation_speed)
            .with_anchored(self.anchored);
        entry.spawn = self.spawn;
        entry.start_position = self.start_position;
        entry.start_velocity = self.start_velocity;
        entry
    }

    fn capture(registry: &DefinitionRegistry, entry: &ParticleEffectEntry) -> Self {
        let name = match entry.kind {
            EntryKind::Billboard(id) => registry.billboard(id).map(|d| d.name.clone()),
            EntryKind::Geometry(id) => registry.geometry(id).map(|d| d.name.clone()),
            EntryKind::Trail(id) => registry.trail(id).map(|d| d.name.clone()),
        };
        Self {
            kind: entry.kind.particle_kind(),
            name: name.unwrap_or_default(),
            start: entry.start,
            time: entry.duration,
            looping: entry.looping,
            start_position: entry.start_position,
            start_velocity: entry.start_velocity,
            spawn: entry.spawn,
            rotation: entry.rotation_limit,
            rotation_speed: entry.rotation_speed,
            anchored: entry.anchored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ease::Easing;
    use crate::error::RegistryError;

    const LIBRARY: &str = r#"{
        "materials": [{ "name": "Fire", "path": "fire.wgsl" }],
        "textures": [{ "name": "Noise", "path": "noise.png" }],
        "billboard_definitions": [{ "name": "Spark", "material_name": "Fire", "lifetime": 0.5 }],
        "geometry_definitions": [{
            "name": "Ember", "material_name": "Fire", "lifetime": 2.0, "gravity": -9.8,
            "noise_scale": 1.0, "noise_speed": 0.5,
            "color": { "function": "EaseOut", "start": [1, 1, 1, 1], "end": [1, 0, 0, 0] },
            "deform": { "function": "None", "start": 0.0, "end": 0.0 },
            "size": { "function": "Linear", "start": 0.2, "end": 0.0 }
        }],
        "trail_definitions": [{
            "name": "Smoke", "material_name": "Fire", "lifetime": 3.0, "frequency": 0.1, "gravity": 1.0,
            "start_position": { "min": [0, 0, 0], "max": [0, 0, 0] },
            "start_velocity": { "min": [-1, 2, -1], "max": [1, 3, 1] }
        }],
        "fx": [{
            "name": "Explosion",
            "entries": [
                { "type": "billboard", "name": "Spark", "start": 0.0, "time": 0.5,
                  "spawn": { "function": "Linear", "start": 40.0, "end": 0.0 } },
                { "type": "geometry", "name": "Ember", "start": 0.1, "time": 1.0,
                  "spawn": { "function": "EaseIn", "start": 5.0, "end": 5.0 },
                  "rotation": { "min": -1.0, "max": 1.0 },
                  "rotation_speed": { "min": 0.5, "max": 2.0 } },
                { "type": "trail", "name": "Smoke", "start": 0.0, "time": 2.0 }
            ]
        }]
    }"#;

    #[test]
    fn test_load_resolves_names() {
        let library = Library::from_json(LIBRARY).unwrap();
        let registry = &library.registry;
        let fire = registry.find_material("Fire").unwrap();
        let ember = registry.find_geometry("Ember").unwrap();
        assert_eq!(registry.geometry(ember).unwrap().material, fire);
        assert_eq!(registry.geometry(ember).unwrap().color.easing, Some(Easing::EaseOut));
        assert!(!registry.geometry(ember).unwrap().deform.curve.is_enabled());

        let effect = library.effects.get("Explosion").unwrap();
        assert_eq!(effect.entries().len(), 3);
        assert_eq!(effect.entries()[1].kind, EntryKind::Geometry(ember));
        assert_eq!(effect.entries()[1].rotation_speed, SpawnRange::new(0.5, 2.0));
        assert_eq!(effect.duration(), 2.0);
    }

    #[test]
    fn test_unknown_material_fails() {
        let json = r#"{
            "billboard_definitions": [{ "name": "Spark", "material_name": "Missing", "lifetime": 1.0 }]
        }"#;
        match Library::from_json(json) {
            Err(LoadError::UnknownMaterial { definition, material }) => {
                assert_eq!(definition, "Spark");
                assert_eq!(material, "Missing");
            }
            other => panic!("expected UnknownMaterial, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_definition_fails() {
        let json = r#"{
            "fx": [{ "name": "Broken", "entries": [{ "type": "trail", "name": "Nope" }] }]
        }"#;
        assert!(matches!(
            Library::from_json(json),
            Err(LoadError::UnknownDefinition { kind: ParticleKind::Trail, .. })
        ));
    }

    #[test]
    fn test_duplicate_definition_fails() {
        let json = r#"{
            "materials": [{ "name": "M", "path": "m.wgsl" }],
            "billboard_definitions": [
                { "name": "A", "material_name": "M" },
                { "name": "A", "material_name": "M" }
            ]
        }"#;
        assert!(matches!(
            Library::from_json(json),
            Err(LoadError::Registry(RegistryError::DuplicateName { .. }))
        ));
    }

    #[test]
    fn test_save_keeps_shape() {
        let library = Library::from_json(LIBRARY).unwrap();
        let json = library.to_json().unwrap();
        assert!(json.contains("\"material_name\""));
        assert!(json.contains("\"function\""));
        let reloaded = Library::from_json(&json).unwrap();
        assert_eq!(reloaded.to_file(), library.to_file());
    }

    #[test]
    fn test_relative_paths_join_base() {
        let file: LibraryFile = serde_json::from_str(LIBRARY).unwrap();
        let library = file.resolve(Path::new("assets")).unwrap();
        let fire = library.registry.find_material("Fire").unwrap();
        assert_eq!(
            library.registry.material(fire).unwrap().shader_path,
            Path::new("assets").join("fire.wgsl")
        );
    }
}
