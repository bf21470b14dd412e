//! Per-frame integration of live particles.

use glam::Vec3;
use log::debug;

use super::ParticleEngine;
use crate::camera::Camera;
use crate::definition::TrailDefinition;
use crate::particle::{age_factor, GeometryParticle, Light, Trail, TrailPoint, TRAIL_COUNT};
use crate::pool::BoundedPool;
use crate::registry::DefinitionRegistry;

impl ParticleEngine {
    /// Integrate every live particle by `dt` and rebuild the instance buffers.
    ///
    /// Managed effects (see [`add_fx`](Self::add_fx)) are advanced first, so
    /// particles they spawn are integrated in the same call.
    pub fn update(&mut self, camera: &Camera, dt: f32) {
        self.advance_managed(dt);

        self.billboards.retain_mut(|b| {
            b.age += dt;
            b.age <= b.lifetime
        });

        self.lights.clear();
        let registry = &self.registry;
        let lights = &mut self.lights;
        self.geometry
            .retain_mut(|p| integrate_geometry(p, registry, lights, dt));
        for anchored in &mut self.anchored {
            let anchor = anchored.position;
            anchored.children.retain_mut(|p| {
                p.anchor = anchor;
                integrate_geometry(p, registry, lights, dt)
            });
        }

        self.trails.retain_mut(|trail| {
            if let Some(def) = registry.trail(trail.definition) {
                advance_trail(trail, def, dt);
            } else {
                // definition gone, retire immediately
                trail.dead = TRAIL_COUNT - 2;
            }
            if trail.is_fully_dead() {
                debug!("trail {} retired after {} shifts", trail.key, trail.shifts);
                false
            } else {
                true
            }
        });

        if self.config.sort_billboards {
            self.billboards.as_mut_slice().sort_by(|a, b| {
                camera.depth_sq(b.position).total_cmp(&camera.depth_sq(a.position))
            });
        }

        self.write_instances();
    }
}

/// Age, retire and move one geometry particle. Returns `false` once it
/// outlived its definition.
fn integrate_geometry(
    particle: &mut GeometryParticle,
    registry: &DefinitionRegistry,
    lights: &mut BoundedPool<Light>,
    dt: f32,
) -> bool {
    particle.age += dt;
    let Some(def) = registry.geometry(particle.definition) else {
        return false;
    };
    if particle.age > def.lifetime {
        return false;
    }

    particle.velocity += Vec3::new(0.0, def.gravity, 0.0) * dt;
    particle.position += particle.velocity * dt;
    particle.rotation_phase += dt;

    if let Some((color, radius)) = def.light.sample(age_factor(particle.age, def.lifetime)) {
        lights.push(Light::from_rgba(particle.world_position(), radius, color));
    }
    true
}

/// Run the shifts owed to `trail`, then age it.
///
/// At most [`TRAIL_COUNT`] shifts happen per call; debt beyond that is
/// discarded so a long stall cannot stack up work.
pub(crate) fn advance_trail(trail: &mut Trail, def: &TrailDefinition, dt: f32) {
    let period = trail.frequency;
    let mut shifted = 0;
    while trail.accumulator >= period {
        if shifted == TRAIL_COUNT {
            trail.accumulator %= period;
            break;
        }
        trail.accumulator -= period;
        shift_trail(trail, def, period);
        shifted += 1;
    }
    trail.age += dt;
    trail.accumulator += dt;
}

/// Move every point one slot towards the tail and write a new head sample.
fn shift_trail(trail: &mut Trail, def: &TrailDefinition, step: f32) {
    let gravity = Vec3::new(0.0, def.gravity, 0.0);
    let last = TRAIL_COUNT - 1;

    trail.head.velocity += gravity * step;
    trail.head.position += trail.head.velocity * step;

    for i in (2..last).rev() {
        let mut point = trail.points[i - 1];
        point.velocity += gravity * step;
        point.position += point.velocity * step;
        trail.points[i] = point;
    }
    trail.points[0] = TrailPoint {
        position: trail.origin + trail.head.position,
        velocity: trail.head.velocity,
        size: def.size_start,
    };

    if trail.age >= trail.lifetime {
        trail.dead = (trail.dead + 1).min(last - 1);
    }
    if trail.dead > 0 {
        let last_alive = last - 1 - trail.dead;
        let keep = trail.points[last_alive];
        for point in &mut trail.points[last_alive + 1..last] {
            point.position = keep.position;
            point.velocity = keep.velocity;
        }
    }

    trail.points[1] = trail.points[0];
    trail.points[last] = trail.points[last - 1];
    for (i, point) in trail.points.iter_mut().enumerate() {
        point.size = def.size_at(i, TRAIL_COUNT);
    }
    trail.shifts += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MaterialId;
    use crate::TrailId;

    fn trail(def: &TrailDefinition, velocity: Vec3) -> Trail {
        Trail {
            key: 0,
            points: [TrailPoint::default(); TRAIL_COUNT],
            origin: Vec3::ZERO,
            head: TrailPoint {
                position: Vec3::ZERO,
                velocity,
                size: def.size_start,
            },
            definition: TrailId::from_index(0),
            material: MaterialId::from_index(0),
            lifetime: def.lifetime,
            frequency: def.period(),
            age: 0.0,
            accumulator: def.period(),
            dead: 0,
            shifts: 0,
        }
    }

    fn def() -> TrailDefinition {
        TrailDefinition::new("t", MaterialId::from_index(0))
            .with_frequency(0.1)
            .with_lifetime(100.0)
    }

    #[test]
    fn test_head_duplication_after_every_shift() {
        let def = def();
        let mut t = trail(&def, Vec3::X);
        for _ in 0..30 {
            advance_trail(&mut t, &def, 0.1);
            assert_eq!(t.points[1], t.points[0]);
            assert_eq!(t.points[TRAIL_COUNT - 1], t.points[TRAIL_COUNT - 2]);
            assert_eq!(t.points[0].position, t.origin + t.head.position);
        }
        assert_eq!(t.shifts, 30);
    }

    #[test]
    fn test_points_move_towards_tail() {
        let def = def();
        let mut t = trail(&def, Vec3::X);
        advance_trail(&mut t, &def, 0.1);
        let first_head = t.points[0].position;
        advance_trail(&mut t, &def, 0.1);
        // previous head moved one slot back and kept integrating
        assert!((t.points[2].position.x - (first_head.x + 0.1)).abs() < 1e-5);
    }

    #[test]
    fn test_shift_budget_is_capped() {
        let def = def();
        let mut t = trail(&def, Vec3::ZERO);
        advance_trail(&mut t, &def, 0.0);
        t.accumulator = 100.0;
        advance_trail(&mut t, &def, 0.0);
        assert_eq!(t.shifts, 1 + TRAIL_COUNT as u64);
        assert!(t.accumulator < def.period());
    }

    #[test]
    fn test_dead_trail_collapses_and_retires() {
        let def = def().with_lifetime(0.0);
        let mut t = trail(&def, Vec3::Y);
        let mut steps = 0;
        while !t.is_fully_dead() {
            advance_trail(&mut t, &def, 0.1);
            steps += 1;
            assert!(steps <= TRAIL_COUNT * 2, "trail never retired");
        }
        let head = t.points[0].position;
        assert!(t.points.iter().all(|p| p.position == head));
    }

    #[test]
    fn test_size_tapers_head_to_tail() {
        let def = def().with_size(1.0, 0.0);
        let mut t = trail(&def, Vec3::ZERO);
        advance_trail(&mut t, &def, 0.1);
        assert_eq!(t.points[0].size, 1.0);
        assert_eq!(t.points[TRAIL_COUNT - 1].size, 0.0);
    }
}
