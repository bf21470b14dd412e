//! Definition registry: materials, textures and particle definitions.
//!
//! The registry is a set of flat, fixed-capacity tables populated at load
//! time. Everything else refers into it by typed handle:
//!
//! | Table | Handle | Capacity |
//! |-------|--------|----------|
//! | materials | [`MaterialId`] | [`MAX_MATERIALS`] |
//! | textures | [`TextureId`] | [`MAX_TEXTURES`] |
//! | billboard definitions | [`BillboardId`] | [`MAX_DEFINITIONS`] |
//! | geometry definitions | [`GeometryId`] | [`MAX_DEFINITIONS`] |
//! | trail definitions | [`TrailId`] | [`MAX_DEFINITIONS`] |
//!
//! Entries are never removed, so a handle stays valid for the lifetime of
//! the registry. Names are only used for lookup at load time; simulation
//! code compares handles.

use std::path::{Path, PathBuf};

use log::{error, info};

use crate::definition::{BillboardDefinition, GeometryDefinition, TrailDefinition};
use crate::error::{MaterialError, RegistryError};
use crate::particle::ParticleKind;

/// Capacity of the material table.
pub const MAX_MATERIALS: usize = 16;
/// Capacity of the texture table.
pub const MAX_TEXTURES: usize = 16;
/// Capacity of each definition table.
pub const MAX_DEFINITIONS: usize = 32;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Position in the owning table.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

handle!(
    /// Handle to a [`Material`].
    MaterialId
);
handle!(
    /// Handle to a [`Texture`].
    TextureId
);
handle!(
    /// Handle to a [`BillboardDefinition`].
    BillboardId
);
handle!(
    /// Handle to a [`GeometryDefinition`].
    GeometryId
);
handle!(
    /// Handle to a [`TrailDefinition`].
    TrailId
);

/// Opaque compiled-shader handle issued by a [`MaterialProvider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// A named pixel shader.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub shader_path: PathBuf,
    /// Set by [`DefinitionRegistry::reload_materials`]; `None` until resolved
    /// or after a failed compile.
    pub shader: Option<ShaderHandle>,
}

impl Material {
    pub fn new(name: impl Into<String>, shader_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            shader_path: shader_path.into(),
            shader: None,
        }
    }
}

/// A named texture file referenced by material shaders.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub path: PathBuf,
}

/// Compiles materials into shader handles.
///
/// Implemented by renderer adapters. A failed material keeps a `None`
/// handle; renderers skip draws that use it.
pub trait MaterialProvider {
    fn resolve(&mut self, id: MaterialId, material: &Material) -> Result<ShaderHandle, MaterialError>;
}

/// Flat tables of materials, textures and particle definitions.
#[derive(Clone, Debug, Default)]
pub struct DefinitionRegistry {
    materials: Vec<Material>,
    textures: Vec<Texture>,
    billboards: Vec<BillboardDefinition>,
    geometry: Vec<GeometryDefinition>,
    trails: Vec<TrailDefinition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Materials and textures ==========

    pub fn add_material(&mut self, material: Material) -> Result<MaterialId, RegistryError> {
        if self.find_material(&material.name).is_some() {
            return Err(duplicate("material", &material.name));
        }
        if self.materials.len() >= MAX_MATERIALS {
            return Err(RegistryError::MaterialsFull {
                capacity: MAX_MATERIALS,
            });
        }
        self.materials.push(material);
        Ok(MaterialId::from_index(self.materials.len() - 1))
    }

    pub fn add_texture(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<TextureId, RegistryError> {
        let name = name.into();
        if self.find_texture(&name).is_some() {
            return Err(duplicate("texture", &name));
        }
        if self.textures.len() >= MAX_TEXTURES {
            return Err(RegistryError::TexturesFull {
                capacity: MAX_TEXTURES,
            });
        }
        self.textures.push(Texture {
            name,
            path: path.as_ref().to_path_buf(),
        });
        Ok(TextureId::from_index(self.textures.len() - 1))
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.index())
    }

    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        position(&self.materials, |m| m.name == name).map(MaterialId::from_index)
    }

    pub fn find_texture(&self, name: &str) -> Option<TextureId> {
        position(&self.textures, |t| t.name == name).map(TextureId::from_index)
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, m)| (MaterialId::from_index(i), m))
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureId, &Texture)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, t)| (TextureId::from_index(i), t))
    }

    /// Re-resolve every material through `provider`.
    ///
    /// Failures are logged and leave the shader handle `None`. Returns the
    /// number of materials that resolved.
    pub fn reload_materials<P: MaterialProvider + ?Sized>(&mut self, provider: &mut P) -> usize {
        let mut resolved = 0;
        for (index, material) in self.materials.iter_mut().enumerate() {
            match provider.resolve(MaterialId::from_index(index), material) {
                Ok(handle) => {
                    material.shader = Some(handle);
                    resolved += 1;
                }
                Err(err) => {
                    error!("material '{}': {}", material.name, err);
                    material.shader = None;
                }
            }
        }
        info!(
            "resolved {}/{} materials",
            resolved,
            self.materials.len()
        );
        resolved
    }

    // ========== Definitions ==========

    pub fn add_billboard(&mut self, def: BillboardDefinition) -> Result<BillboardId, RegistryError> {
        self.check_definition(ParticleKind::Billboard, &def.name, def.material)?;
        if position(&self.billboards, |d| d.name == def.name).is_some() {
            return Err(duplicate("billboard definition", &def.name));
        }
        self.billboards.push(def);
        Ok(BillboardId::from_index(self.billboards.len() - 1))
    }

    pub fn add_geometry(&mut self, def: GeometryDefinition) -> Result<GeometryId, RegistryError> {
        self.check_definition(ParticleKind::Geometry, &def.name, def.material)?;
        if position(&self.geometry, |d| d.name == def.name).is_some() {
            return Err(duplicate("geometry definition", &def.name));
        }
        self.geometry.push(def);
        Ok(GeometryId::from_index(self.geometry.len() - 1))
    }

    pub fn add_trail(&mut self, def: TrailDefinition) -> Result<TrailId, RegistryError> {
        self.check_definition(ParticleKind::Trail, &def.name, def.material)?;
        if position(&self.trails, |d| d.name == def.name).is_some() {
            return Err(duplicate("trail definition", &def.name));
        }
        self.trails.push(def);
        Ok(TrailId::from_index(self.trails.len() - 1))
    }

    pub fn billboard(&self, id: BillboardId) -> Option<&BillboardDefinition> {
        self.billboards.get(id.index())
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&GeometryDefinition> {
        self.geometry.get(id.index())
    }

    pub fn trail(&self, id: TrailId) -> Option<&TrailDefinition> {
        self.trails.get(id.index())
    }

    pub fn billboard_mut(&mut self, id: BillboardId) -> Option<&mut BillboardDefinition> {
        self.billboards.get_mut(id.index())
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut GeometryDefinition> {
        self.geometry.get_mut(id.index())
    }

    pub fn trail_mut(&mut self, id: TrailId) -> Option<&mut TrailDefinition> {
        self.trails.get_mut(id.index())
    }

    pub fn find_billboard(&self, name: &str) -> Option<BillboardId> {
        position(&self.billboards, |d| d.name == name).map(BillboardId::from_index)
    }

    pub fn find_geometry(&self, name: &str) -> Option<GeometryId> {
        position(&self.geometry, |d| d.name == name).map(GeometryId::from_index)
    }

    pub fn find_trail(&self, name: &str) -> Option<TrailId> {
        position(&self.trails, |d| d.name == name).map(TrailId::from_index)
    }

    pub fn billboards(&self) -> &[BillboardDefinition] {
        &self.billboards
    }

    pub fn geometries(&self) -> &[GeometryDefinition] {
        &self.geometry
    }

    pub fn trails(&self) -> &[TrailDefinition] {
        &self.trails
    }

    fn check_definition(
        &self,
        kind: ParticleKind,
        name: &str,
        material: MaterialId,
    ) -> Result<(), RegistryError> {
        let len = match kind {
            ParticleKind::Billboard => self.billboards.len(),
            ParticleKind::Geometry => self.geometry.len(),
            ParticleKind::Trail => self.trails.len(),
        };
        if len >= MAX_DEFINITIONS {
            return Err(RegistryError::DefinitionsFull {
                kind,
                capacity: MAX_DEFINITIONS,
            });
        }
        if self.material(material).is_none() {
            log::debug!("definition '{}' rejected: bad material handle", name);
            return Err(RegistryError::InvalidHandle {
                kind: "material",
                index: material.index(),
            });
        }
        Ok(())
    }
}

fn position<T>(items: &[T], pred: impl Fn(&T) -> bool) -> Option<usize> {
    items.iter().position(pred)
}

fn duplicate(kind: &'static str, name: &str) -> RegistryError {
    RegistryError::DuplicateName {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider {
        fail: &'static str,
    }

    impl MaterialProvider for FakeProvider {
        fn resolve(&mut self, id: MaterialId, material: &Material) -> Result<ShaderHandle, MaterialError> {
            if material.name == self.fail {
                Err(MaterialError::Compile {
                    path: material.shader_path.clone(),
                    message: "bad".into(),
                })
            } else {
                Ok(ShaderHandle(id.index() as u64 + 100))
            }
        }
    }

    #[test]
    fn test_material_table_capacity() {
        let mut registry = DefinitionRegistry::new();
        for i in 0..MAX_MATERIALS {
            registry
                .add_material(Material::new(format!("m{i}"), "m.wgsl"))
                .unwrap();
        }
        let err = registry
            .add_material(Material::new("overflow", "m.wgsl"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MaterialsFull { capacity: 16 }));
    }

    #[test]
    fn test_definition_table_capacity() {
        let mut registry = DefinitionRegistry::new();
        let mat = registry.add_material(Material::new("m", "m.wgsl")).unwrap();
        for i in 0..MAX_DEFINITIONS {
            registry
                .add_billboard(BillboardDefinition::new(format!("b{i}"), mat))
                .unwrap();
        }
        let err = registry
            .add_billboard(BillboardDefinition::new("overflow", mat))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DefinitionsFull {
                kind: ParticleKind::Billboard,
                ..
            }
        ));
        // other tables are independent
        assert!(registry.add_trail(TrailDefinition::new("t", mat)).is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = DefinitionRegistry::new();
        let mat = registry.add_material(Material::new("m", "m.wgsl")).unwrap();
        assert!(registry.add_material(Material::new("m", "other.wgsl")).is_err());
        registry.add_geometry(GeometryDefinition::new("g", mat)).unwrap();
        let err = registry
            .add_geometry(GeometryDefinition::new("g", mat))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
    }

    #[test]
    fn test_bad_material_handle() {
        let mut registry = DefinitionRegistry::new();
        let err = registry
            .add_billboard(BillboardDefinition::new("b", MaterialId::from_index(3)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidHandle { index: 3, .. }));
    }

    #[test]
    fn test_find_by_name() {
        let mut registry = DefinitionRegistry::new();
        let mat = registry.add_material(Material::new("fire", "fire.wgsl")).unwrap();
        let trail = registry.add_trail(TrailDefinition::new("smoke", mat)).unwrap();
        assert_eq!(registry.find_material("fire"), Some(mat));
        assert_eq!(registry.find_trail("smoke"), Some(trail));
        assert_eq!(registry.find_trail("Smoke"), None);
        assert_eq!(registry.find_geometry("smoke"), None);
    }

    #[test]
    fn test_reload_materials() {
        let mut registry = DefinitionRegistry::new();
        let good = registry.add_material(Material::new("good", "good.wgsl")).unwrap();
        let bad = registry.add_material(Material::new("bad", "bad.wgsl")).unwrap();
        let resolved = registry.reload_materials(&mut FakeProvider { fail: "bad" });
        assert_eq!(resolved, 1);
        assert_eq!(registry.material(good).unwrap().shader, Some(ShaderHandle(100)));
        assert_eq!(registry.material(bad).unwrap().shader, None);
    }
}
