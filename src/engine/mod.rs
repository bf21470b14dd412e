//! The particle simulation engine.
//!
//! [`ParticleEngine`] owns the definition registry, the effect library, the
//! spawn generator and every live particle pool. A host drives it once per
//! frame, always in this order:
//!
//! ```ignore
//! let mut explosion = engine.play("explosion")?;
//! loop {
//!     engine.process_fx(&mut explosion, transform, dt); // advance + spawn
//!     engine.update(&camera, dt);                       // integrate + write buffers
//!     engine.render(&camera, &mut renderer, false);     // upload + draw
//!     engine.frame();                                   // clear transient pools
//! }
//! ```
//!
//! # Pools
//!
//! | Pool | Cleared by `frame()` | Retired when |
//! |------|----------------------|--------------|
//! | billboards | yes (unless persistent) | `age > lifetime` |
//! | world geometry | yes (unless persistent) | `age > lifetime` |
//! | anchored geometry | no | `age > lifetime` or owner removed |
//! | trails | no | tail fully collapsed |
//! | lights | yes, rebuilt every update | every update |
//!
//! Every pool is bounded. Geometry capacity is one budget shared by the
//! world pool and all anchored children, matching the size of the geometry
//! instance buffer. Insertions into a full pool are dropped and counted in
//! [`EngineStats`].

mod anchored;
mod integrate;
mod output;
mod spawn;

use glam::Mat4;
use rand::rngs::SmallRng;

use crate::config::EngineConfig;
use crate::effect::{EffectInstance, EffectLibrary, EffectState, ParticleEffect};
use crate::error::EffectError;
use crate::particle::{BillboardParticle, GeometryParticle, Light, Trail, MAX_LIGHTS};
use crate::pool::BoundedPool;
use crate::registry::{DefinitionRegistry, MaterialProvider};
use crate::spawn::make_rng;

pub use anchored::{AnchorId, AnchoredParticleEffect};
use output::InstanceOutput;

/// An effect started with [`ParticleEngine::add_fx`] and advanced by
/// [`ParticleEngine::update`].
#[derive(Clone, Debug, PartialEq)]
pub struct ManagedEffect {
    pub instance: EffectInstance,
    pub transform: Mat4,
}

/// Live counts and drop counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub billboards: usize,
    pub geometry: usize,
    pub anchored_geometry: usize,
    pub trails: usize,
    pub lights: usize,
    pub managed_effects: usize,
    pub anchored_effects: usize,
    pub dropped_billboards: u64,
    pub dropped_geometry: u64,
    pub dropped_trails: u64,
    pub dropped_lights: u64,
    pub dropped_effects: u64,
}

/// Particle effect scheduler and simulator.
pub struct ParticleEngine {
    config: EngineConfig,
    registry: DefinitionRegistry,
    library: EffectLibrary,
    rng: SmallRng,
    billboards: BoundedPool<BillboardParticle>,
    geometry: BoundedPool<GeometryParticle>,
    trails: BoundedPool<Trail>,
    lights: BoundedPool<Light>,
    managed: BoundedPool<ManagedEffect>,
    anchored: Vec<AnchoredParticleEffect>,
    /// Drops recorded by anchored pools that have since been removed.
    removed_anchor_drops: u64,
    next_trail_key: u64,
    next_anchor: u64,
    output: InstanceOutput,
}

impl ParticleEngine {
    /// Create an engine over a populated registry and effect library.
    ///
    /// `config.light_capacity` is capped at [`MAX_LIGHTS`].
    pub fn new(registry: DefinitionRegistry, library: EffectLibrary, config: EngineConfig) -> Self {
        let light_capacity = config.light_capacity.min(MAX_LIGHTS);
        Self {
            rng: make_rng(config.seed),
            billboards: BoundedPool::new("billboard", config.billboard_capacity),
            geometry: BoundedPool::new("geometry", config.geometry_capacity),
            trails: BoundedPool::new("trail", config.trail_capacity),
            lights: BoundedPool::new("light", light_capacity),
            managed: BoundedPool::new("managed effect", config.managed_capacity),
            anchored: Vec::new(),
            removed_anchor_drops: 0,
            next_trail_key: 0,
            next_anchor: 0,
            output: InstanceOutput::default(),
            config,
            registry,
            library,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Mutable registry access, for editing definitions between frames.
    pub fn registry_mut(&mut self) -> &mut DefinitionRegistry {
        &mut self.registry
    }

    pub fn library(&self) -> &EffectLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut EffectLibrary {
        &mut self.library
    }

    /// Re-resolve all materials. See [`DefinitionRegistry::reload_materials`].
    pub fn reload_materials<P: MaterialProvider + ?Sized>(&mut self, provider: &mut P) -> usize {
        self.registry.reload_materials(provider)
    }

    // ========== Effect lookup and playback ==========

    /// Look up an effect recipe by exact name.
    pub fn get_fx(&self, name: &str) -> Option<&ParticleEffect> {
        self.library.get(name)
    }

    /// Create a fresh instance of the named effect for use with
    /// [`process_fx`](Self::process_fx).
    pub fn play(&self, name: &str) -> Result<EffectInstance, EffectError> {
        self.library
            .find(name)
            .map(EffectInstance::new)
            .ok_or_else(|| EffectError::UnknownEffect(name.to_string()))
    }

    /// Start the named effect at `transform` and let the engine advance it
    /// during [`update`](Self::update) until it expires.
    ///
    /// Returns `Ok(false)` if the managed-effect pool is full.
    pub fn add_fx(&mut self, name: &str, transform: Mat4) -> Result<bool, EffectError> {
        let instance = self.play(name)?;
        Ok(self.managed.push(ManagedEffect {
            instance,
            transform,
        }))
    }

    pub fn managed_effects(&self) -> &[ManagedEffect] {
        self.managed.as_slice()
    }

    /// Advance managed effects; expired non-looping ones are dropped.
    fn advance_managed(&mut self, dt: f32) {
        let placeholder = BoundedPool::new("managed effect", 0);
        let mut managed = std::mem::replace(&mut self.managed, placeholder);
        managed.retain_mut(|m| self.advance(&mut m.instance, spawn::Emitter::new(m.transform), dt, None) != EffectState::Expired);
        self.managed = managed;
    }

    // ========== Frame ==========

    /// Clear the per-frame pools.
    ///
    /// Billboards and world geometry are cleared unless
    /// `persistent_particles` is set. Lights are always cleared. Trails and
    /// anchored children carry over.
    pub fn frame(&mut self) {
        if !self.config.persistent_particles {
            self.billboards.clear();
            self.geometry.clear();
        }
        self.lights.clear();
        self.output.clear_transient(self.config.persistent_particles);
    }

    // ========== Inspection ==========

    pub fn billboards(&self) -> &[BillboardParticle] {
        self.billboards.as_slice()
    }

    /// World-space geometry particles (anchored children excluded).
    pub fn geometry(&self) -> &[GeometryParticle] {
        self.geometry.as_slice()
    }

    pub fn trails(&self) -> &[Trail] {
        self.trails.as_slice()
    }

    pub fn lights(&self) -> &[Light] {
        self.lights.as_slice()
    }

    /// Geometry particles across the world pool and all anchored children.
    pub fn geometry_in_use(&self) -> usize {
        self.geometry.len() + self.anchored.iter().map(|a| a.children.len()).sum::<usize>()
    }

    pub fn stats(&self) -> EngineStats {
        let anchored_geometry = self.anchored.iter().map(|a| a.children.len()).sum();
        let anchored_drops: u64 = self.anchored.iter().map(|a| a.children.dropped()).sum();
        EngineStats {
            billboards: self.billboards.len(),
            geometry: self.geometry.len(),
            anchored_geometry,
            trails: self.trails.len(),
            lights: self.lights.len(),
            managed_effects: self.managed.len(),
            anchored_effects: self.anchored.len(),
            dropped_billboards: self.billboards.dropped(),
            dropped_geometry: self.geometry.dropped() + anchored_drops + self.removed_anchor_drops,
            dropped_trails: self.trails.dropped(),
            dropped_lights: self.lights.dropped(),
            dropped_effects: self.managed.dropped(),
        }
    }
}
