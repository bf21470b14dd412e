//! # pfx - particle effect scheduler and simulator
//!
//! Timed particle effects built from three particle kinds, simulated on the
//! CPU and handed to a renderer as flat instance buffers.
//!
//! pfx owns the timeline, spawning, integration and buffer layout. Drawing
//! goes through the [`Renderer`] trait so the same engine runs headless in
//! tests or on wgpu in an application.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pfx::prelude::*;
//!
//! let library = Library::load("demos/library.json")?;
//! let mut engine = library.into_engine(EngineConfig::default());
//! let mut renderer = RecordingRenderer::new();
//! let camera = Camera::new();
//!
//! let mut explosion = engine.play("Explosion")?;
//! loop {
//!     let state = engine.process_fx(&mut explosion, Mat4::IDENTITY, 1.0 / 60.0);
//!     engine.update(&camera, 1.0 / 60.0);
//!     engine.render(&camera, &mut renderer, false);
//!     engine.frame();
//!     if state == EffectState::Expired {
//!         break;
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Definitions
//!
//! A definition is the static attribute set of one particle kind:
//!
//! - [`BillboardDefinition`] - camera-facing quads with a lifetime
//! - [`GeometryDefinition`] - instanced meshes with eased size, color,
//!   deformation and an optional point light
//! - [`TrailDefinition`] - fixed-length polylines fed from a moving head
//!
//! Definitions and materials live in a [`DefinitionRegistry`] and are
//! referenced by typed handles ([`MaterialId`], [`BillboardId`], ...).
//!
//! ### Effects
//!
//! A [`ParticleEffect`] is a recipe of up to [`MAX_ENTRIES`](effect::MAX_ENTRIES)
//! timed entries. Each entry spawns one definition over a time window at an
//! eased rate. Recipes are immutable; playback state lives in an
//! [`EffectInstance`], so one recipe can play many times at once.
//!
//! ### The frame loop
//!
//! [`ParticleEngine`] is driven once per frame:
//!
//! 1. [`process_fx`](ParticleEngine::process_fx) /
//!    [`process_anchored_fx`](ParticleEngine::process_anchored_fx) advance
//!    effect instances and spawn particles
//! 2. [`update`](ParticleEngine::update) integrates, retires and rebuilds
//!    instance buffers
//! 3. [`render`](ParticleEngine::render) uploads and draws through a
//!    [`Renderer`]
//! 4. [`frame`](ParticleEngine::frame) clears the per-frame pools
//!
//! ## Features
//!
//! - `wgpu` (default) - the [`render::gpu::WgpuRenderer`] adapter and WGSL
//!   validation with naga

extern crate self as pfx;

pub mod camera;
pub mod config;
pub mod definition;
pub mod ease;
pub mod effect;
pub mod engine;
pub mod error;
pub mod library;
pub mod particle;
pub mod pool;
pub mod registry;
pub mod render;
pub mod spawn;

pub use bytemuck;
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use pfx_derive::InstanceLayout;

pub use camera::Camera;
pub use config::EngineConfig;
pub use definition::{BillboardDefinition, GeometryDefinition, LightCurve, TrailDefinition};
pub use ease::{ease, EaseCurve, Easing};
pub use effect::{EffectId, EffectInstance, EffectLibrary, EffectState, EntryKind, ParticleEffect, ParticleEffectEntry};
pub use engine::{AnchorId, AnchoredParticleEffect, EngineStats, ManagedEffect, ParticleEngine};
pub use error::{ConfigError, EffectError, LoadError, MaterialError, RegistryError};
pub use library::{Library, LibraryFile};
pub use particle::{
    BillboardInstance, BillboardParticle, GeometryInstance, GeometryParticle, Light, LightData, ParticleKind, Trail,
    TrailPoint, TrailVertex, MAX_LIGHTS, TRAIL_COUNT,
};
pub use pool::BoundedPool;
pub use registry::{
    BillboardId, DefinitionRegistry, GeometryId, Material, MaterialId, MaterialProvider, ShaderHandle, TextureId,
    TrailId,
};
pub use render::{DrawBatch, FrameUniforms, RecordingRenderer, Renderer};
pub use spawn::{SpawnBox, SpawnRange};

/// Vertex attribute formats an instance record field can map to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Sint32,
}

/// One shader-visible field of an instance record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceAttribute {
    pub name: &'static str,
    pub format: AttributeFormat,
    /// Byte offset inside the record.
    pub offset: u64,
    /// Shader location.
    pub location: u32,
}

/// Layout description of a `#[repr(C)]` GPU instance record.
///
/// Implemented by `#[derive(InstanceLayout)]`; do not implement by hand.
/// The derive reads field offsets from the compiler, so [`ATTRIBUTES`]
/// always matches the Rust layout that `bytemuck` uploads.
///
/// [`ATTRIBUTES`]: InstanceLayout::ATTRIBUTES
///
/// # Example
///
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, Pod, Zeroable, InstanceLayout)]
/// struct Spark {
///     position: [f32; 3],
///     age: f32,
/// }
///
/// assert_eq!(Spark::ATTRIBUTES[1].offset, 12);
/// assert!(Spark::WGSL_STRUCT.contains("@location(1) age: f32"));
/// ```
pub trait InstanceLayout: bytemuck::Pod {
    /// WGSL vertex-input struct with one `@location` per attribute.
    const WGSL_STRUCT: &'static str;

    /// Shader-visible fields in declaration order.
    const ATTRIBUTES: &'static [InstanceAttribute];

    /// Byte stride between consecutive records.
    const STRIDE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use pfx::prelude::*;
/// ```
pub mod prelude {
    pub use crate::camera::Camera;
    pub use crate::config::EngineConfig;
    pub use crate::definition::{BillboardDefinition, GeometryDefinition, TrailDefinition};
    pub use crate::ease::{EaseCurve, Easing};
    pub use crate::effect::{EffectLibrary, EffectState, EntryKind, ParticleEffect, ParticleEffectEntry};
    pub use crate::engine::{AnchorId, ParticleEngine};
    pub use crate::library::Library;
    pub use crate::particle::ParticleKind;
    pub use crate::registry::{DefinitionRegistry, Material, MaterialProvider};
    #[cfg(feature = "wgpu")]
    pub use crate::render::gpu::WgpuRenderer;
    pub use crate::render::{RecordingRenderer, Renderer};
    pub use crate::spawn::{SpawnBox, SpawnRange};
    // trait and derive macro share the name
    pub use crate::{InstanceLayout, Mat4, Quat, Vec2, Vec3, Vec4};
    pub use bytemuck::{Pod, Zeroable};
}
