//! Timeline advance and particle spawning.

use glam::{Mat4, Vec2, Vec3};
use log::{debug, warn};

use super::ParticleEngine;
use crate::effect::{EffectInstance, EffectState, EntryKind, ParticleEffectEntry};
use crate::particle::{BillboardParticle, GeometryParticle, Trail, TrailPoint, TRAIL_COUNT};
use crate::registry::{BillboardId, GeometryId, TrailId};
use crate::spawn::{random_axis, random_range};

/// Random rotation phase bounds, in seconds of rotation.
const ROTATION_PHASE: f32 = 180.0;

/// Where one `process_*` call spawns from.
#[derive(Clone, Copy, Debug)]
pub(super) struct Emitter {
    pub transform: Mat4,
    /// Velocity handed to every spawn in place of the sampled one.
    pub velocity: Option<Vec3>,
}

impl Emitter {
    pub fn new(transform: Mat4) -> Self {
        Self {
            transform,
            velocity: None,
        }
    }

    /// Start velocity for a spawn whose box sample is `sampled`. Samples are
    /// local to the emitter and rotate with it.
    fn velocity_or(&self, sampled: Vec3) -> Vec3 {
        self.velocity
            .unwrap_or_else(|| self.transform.transform_vector3(sampled))
    }
}

impl ParticleEngine {
    /// Advance `instance` by `dt` and spawn what its active entries emit.
    ///
    /// Order within one call:
    /// 1. if the age reached the effect time, a looping effect restarts at
    ///    age 0 and a non-looping one returns [`EffectState::Expired`]
    /// 2. every entry is evaluated at the current age
    /// 3. the age advances by `dt`
    ///
    /// The first call therefore spawns at age 0. Entries with the anchored
    /// flag spawn into the world pool here; use
    /// [`process_anchored_fx`](Self::process_anchored_fx) to give them an
    /// anchor.
    pub fn process_fx(&mut self, instance: &mut EffectInstance, transform: Mat4, dt: f32) -> EffectState {
        self.advance(instance, Emitter::new(transform), dt, None)
    }

    /// Like [`process_fx`](Self::process_fx), for an emitter that is itself
    /// moving. Spawned geometry and trail heads start with `velocity`
    /// instead of a sample from the entry's velocity box.
    pub fn process_fx_with_velocity(
        &mut self,
        instance: &mut EffectInstance,
        transform: Mat4,
        velocity: Vec3,
        dt: f32,
    ) -> EffectState {
        let emitter = Emitter {
            transform,
            velocity: Some(velocity),
        };
        self.advance(instance, emitter, dt, None)
    }

    /// Shared body of the `process_*` calls. `anchor` is the slot of the
    /// owning anchored effect.
    pub(super) fn advance(
        &mut self,
        instance: &mut EffectInstance,
        emitter: Emitter,
        dt: f32,
        anchor: Option<usize>,
    ) -> EffectState {
        let Some(effect) = self.library.effect(instance.effect) else {
            warn!("effect instance refers to missing effect {:?}", instance.effect);
            return EffectState::Expired;
        };

        if instance.age >= effect.duration() {
            if !effect.looping {
                return EffectState::Expired;
            }
            debug!("effect '{}' wrapped after {:.3}s", effect.name, instance.age);
            instance.restart();
            instance.loops += 1;
        }

        let age = instance.age;
        let entry_count = effect.entries().len();
        let mut active = false;

        for index in 0..entry_count {
            let Some(entry) = self
                .library
                .effect(instance.effect)
                .and_then(|e| e.entries().get(index))
                .copied()
            else {
                break;
            };
            if !entry.is_active(age) {
                continue;
            }
            active = true;

            if let EntryKind::Trail(id) = entry.kind {
                self.feed_trail(instance, index, &entry, id, emitter);
                continue;
            }

            let carry = &mut instance.accumulators[index];
            *carry += entry.rate(age).max(0.0) * entry.step_in_window(age, dt);
            if *carry < 1.0 {
                continue;
            }
            let whole = carry.floor();
            *carry -= whole;
            self.spawn_many(&entry, whole as u64, emitter, anchor);
        }

        instance.age += dt;
        if active {
            EffectState::Active
        } else {
            EffectState::Inactive
        }
    }

    /// Spawn `count` particles for a billboard or geometry entry.
    fn spawn_many(&mut self, entry: &ParticleEffectEntry, count: u64, emitter: Emitter, anchor: Option<usize>) {
        for spawned in 0..count {
            let stored = match entry.kind {
                EntryKind::Billboard(id) => self.spawn_billboard(entry, id, emitter.transform),
                EntryKind::Geometry(id) => self.spawn_geometry(entry, id, emitter, anchor),
                EntryKind::Trail(_) => return,
            };
            if !stored {
                // Every pool is full or the definition is gone; count the rest
                // without sampling them.
                let rest = count - spawned - 1;
                match entry.kind {
                    EntryKind::Billboard(_) => self.billboards.record_drops(rest),
                    _ => self.geometry_target(entry, anchor).record_drops(rest),
                }
                return;
            }
        }
    }

    fn spawn_billboard(&mut self, entry: &ParticleEffectEntry, id: BillboardId, transform: Mat4) -> bool {
        let Some(def) = self.registry.billboard(id) else {
            warn!("entry references missing billboard definition {:?}", id);
            return false;
        };
        let position = transform.transform_point3(entry.start_position.sample(&mut self.rng));
        self.billboards.push(BillboardParticle {
            position,
            size: Vec2::ONE,
            age: 0.0,
            lifetime: def.lifetime,
            definition: id,
            material: def.material,
        })
    }

    fn spawn_geometry(
        &mut self,
        entry: &ParticleEffectEntry,
        id: GeometryId,
        emitter: Emitter,
        anchor: Option<usize>,
    ) -> bool {
        let Some(def) = self.registry.geometry(id) else {
            warn!("entry references missing geometry definition {:?}", id);
            return false;
        };
        let material = def.material;

        if self.geometry_in_use() >= self.config.geometry_capacity {
            self.geometry_target(entry, anchor).record_drop();
            return false;
        }

        let transform = emitter.transform;
        let rng = &mut self.rng;
        let world = transform.transform_point3(entry.start_position.sample(rng));
        let velocity = emitter.velocity_or(entry.start_velocity.sample(rng));
        let rotation_axis = random_axis(rng, &entry.rotation_limit);
        let rotation_phase = random_range(rng, -ROTATION_PHASE, ROTATION_PHASE);
        let rotation_speed = entry.rotation_speed.sample(rng);

        let mut particle = GeometryParticle {
            position: world,
            anchor: Vec3::ZERO,
            velocity,
            rotation_axis,
            rotation_phase,
            rotation_speed,
            definition: id,
            material,
            age: 0.0,
        };

        match anchor.filter(|_| entry.anchored) {
            Some(slot) => {
                let origin = transform.w_axis.truncate();
                particle.position = world - origin;
                particle.anchor = origin;
                self.anchored[slot].children.push(particle)
            }
            None => self.geometry.push(particle),
        }
    }

    /// Pool a geometry entry spawns into.
    fn geometry_target(
        &mut self,
        entry: &ParticleEffectEntry,
        anchor: Option<usize>,
    ) -> &mut crate::pool::BoundedPool<GeometryParticle> {
        match anchor.filter(|_| entry.anchored) {
            Some(slot) => &mut self.anchored[slot].children,
            None => &mut self.geometry,
        }
    }

    /// Allocate the entry's trail on first activation, then keep its origin
    /// on the effect transform.
    fn feed_trail(
        &mut self,
        instance: &mut EffectInstance,
        index: usize,
        entry: &ParticleEffectEntry,
        id: TrailId,
        emitter: Emitter,
    ) {
        let transform = emitter.transform;
        let origin = transform.w_axis.truncate();

        if let Some(key) = instance.trail_slots[index] {
            if let Some(trail) = self.trails.iter_mut().find(|t| t.key == key) {
                trail.origin = origin;
            }
            return;
        }

        let Some(def) = self.registry.trail(id) else {
            warn!("entry references missing trail definition {:?}", id);
            return;
        };

        let key = self.next_trail_key;
        self.next_trail_key += 1;
        instance.trail_slots[index] = Some(key);

        let position_box = entry.start_position.or(def.start_position);
        let velocity_box = entry.start_velocity.or(def.start_velocity);
        let offset = transform.transform_point3(position_box.sample(&mut self.rng)) - origin;
        let velocity = emitter.velocity_or(velocity_box.sample(&mut self.rng));

        let mut points = [TrailPoint::default(); TRAIL_COUNT];
        for (i, point) in points.iter_mut().enumerate() {
            point.position = origin + offset;
            point.size = def.size_at(i, TRAIL_COUNT);
        }

        let period = def.period();
        let trail = Trail {
            key,
            points,
            origin,
            head: TrailPoint {
                position: offset,
                velocity,
                size: def.size_start,
            },
            definition: id,
            material: def.material,
            lifetime: def.lifetime,
            frequency: period,
            age: 0.0,
            accumulator: period,
            dead: 0,
            shifts: 0,
        };

        if self.trails.push(trail) {
            debug!("trail {} allocated for '{}'", key, def.name);
        }
    }
}
