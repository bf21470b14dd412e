//! Effects whose geometry follows a moving anchor.

use glam::{Mat4, Vec3};
use log::debug;

use super::spawn::Emitter;
use super::ParticleEngine;
use crate::effect::{EffectInstance, EffectState};
use crate::error::EffectError;
use crate::particle::GeometryParticle;
use crate::pool::BoundedPool;

/// Stable identifier of an anchored effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorId(pub u64);

/// An effect instance that owns the geometry particles it spawns from
/// anchored entries. Those particles store positions relative to
/// `position` and move with it.
#[derive(Clone, Debug)]
pub struct AnchoredParticleEffect {
    pub id: AnchorId,
    pub instance: EffectInstance,
    pub position: Vec3,
    pub children: BoundedPool<GeometryParticle>,
}

impl ParticleEngine {
    /// Start an anchored instance of the named effect at `position`.
    pub fn add_anchored_fx(&mut self, name: &str, position: Vec3) -> Result<AnchorId, EffectError> {
        let instance = self.play(name)?;
        let id = AnchorId(self.next_anchor);
        self.next_anchor += 1;
        self.anchored.push(AnchoredParticleEffect {
            id,
            instance,
            position,
            children: BoundedPool::new("anchored geometry", self.config.geometry_capacity),
        });
        debug!("anchored effect {} started for '{}'", id.0, name);
        Ok(id)
    }

    pub fn anchored_fx(&self, id: AnchorId) -> Option<&AnchoredParticleEffect> {
        self.anchored.iter().find(|a| a.id == id)
    }

    pub fn anchored_effects(&self) -> &[AnchoredParticleEffect] {
        &self.anchored
    }

    /// Move an anchor. Its children follow on the next update.
    pub fn set_anchor_position(&mut self, id: AnchorId, position: Vec3) -> Result<(), EffectError> {
        let slot = self.anchor_slot(id)?;
        self.anchored[slot].position = position;
        Ok(())
    }

    /// Remove an anchored effect together with all of its children.
    pub fn remove_anchored_fx(&mut self, id: AnchorId) -> Result<(), EffectError> {
        let slot = self.anchor_slot(id)?;
        let removed = self.anchored.remove(slot);
        self.removed_anchor_drops += removed.children.dropped();
        debug!(
            "anchored effect {} removed with {} children",
            id.0,
            removed.children.len()
        );
        Ok(())
    }

    /// Advance an anchored effect. The anchor moves to the translation of
    /// `transform` before spawning.
    pub fn process_anchored_fx(
        &mut self,
        id: AnchorId,
        transform: Mat4,
        dt: f32,
    ) -> Result<EffectState, EffectError> {
        let slot = self.anchor_slot(id)?;
        let anchored = &mut self.anchored[slot];
        anchored.position = transform.w_axis.truncate();
        let mut instance = anchored.instance.clone();
        let state = self.advance(&mut instance, Emitter::new(transform), dt, Some(slot));
        self.anchored[slot].instance = instance;
        Ok(state)
    }

    fn anchor_slot(&self, id: AnchorId) -> Result<usize, EffectError> {
        self.anchored
            .iter()
            .position(|a| a.id == id)
            .ok_or(EffectError::UnknownAnchor(id.0))
    }
}
