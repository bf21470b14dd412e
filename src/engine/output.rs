//! Instance buffer assembly and the render call sequence.

use glam::{Mat4, Quat, Vec3};

use super::ParticleEngine;
use crate::camera::Camera;
use crate::particle::{
    age_factor, BillboardInstance, GeometryInstance, GeometryParticle, LightData, ParticleKind, TrailVertex,
};
use crate::registry::DefinitionRegistry;
use crate::render::{batch_by_material, DrawBatch, FrameUniforms, Renderer};

/// CPU-side copies of everything uploaded each frame.
#[derive(Debug, Default)]
pub(crate) struct InstanceOutput {
    pub billboards: Vec<BillboardInstance>,
    pub geometry: Vec<GeometryInstance>,
    pub trails: Vec<TrailVertex>,
    pub trail_count: u32,
    pub lights: Vec<LightData>,
    pub batches: Vec<DrawBatch>,
}

impl InstanceOutput {
    /// Drop the buffers of pools that `frame()` clears.
    pub fn clear_transient(&mut self, persistent: bool) {
        if !persistent {
            self.billboards.clear();
            self.geometry.clear();
        }
        self.lights.clear();
        self.batches
            .retain(|b| persistent || b.kind == ParticleKind::Trail);
    }

    fn count(&self, kind: ParticleKind) -> u32 {
        match kind {
            ParticleKind::Billboard => self.billboards.len() as u32,
            ParticleKind::Geometry => self.geometry.len() as u32,
            ParticleKind::Trail => self.trail_count,
        }
    }

    fn bytes(&self, kind: ParticleKind) -> &[u8] {
        match kind {
            ParticleKind::Billboard => bytemuck::cast_slice(&self.billboards),
            ParticleKind::Geometry => bytemuck::cast_slice(&self.geometry),
            ParticleKind::Trail => bytemuck::cast_slice(&self.trails),
        }
    }
}

/// Build the GPU record of one geometry particle.
fn geometry_instance(particle: &GeometryParticle, registry: &DefinitionRegistry) -> Option<GeometryInstance> {
    let def = registry.geometry(particle.definition)?;
    let factor = age_factor(particle.age, def.lifetime);
    let sample = def.sample(factor);
    let angle = (particle.rotation_phase + particle.age) * particle.rotation_speed;
    let model = Mat4::from_scale_rotation_translation(
        Vec3::splat(sample.scale),
        Quat::from_axis_angle(particle.rotation_axis, angle),
        particle.world_position(),
    );
    Some(GeometryInstance {
        model: model.to_cols_array_2d(),
        color: sample.color.to_array(),
        age_factor: factor,
        deform: sample.deform,
        deform_speed: def.deform.speed,
        noise_scale: def.noise_scale,
        noise_speed: def.noise_speed,
        material: particle.material.index() as u32,
        _pad: [0; 2],
    })
}

impl ParticleEngine {
    /// Rebuild instance records and draw batches from the live pools.
    pub(super) fn write_instances(&mut self) {
        let out = &mut self.output;
        out.billboards.clear();
        out.geometry.clear();
        out.trails.clear();
        out.lights.clear();
        out.batches.clear();

        out.billboards
            .extend(self.billboards.iter().map(|b| b.to_instance()));
        batch_by_material(
            ParticleKind::Billboard,
            self.billboards.iter().map(|b| b.material),
            &mut out.batches,
        );

        let registry = &self.registry;
        let world = self.geometry.iter();
        let anchored = self.anchored.iter().flat_map(|a| a.children.iter());
        let mut materials = Vec::with_capacity(self.geometry.len());
        for particle in world.chain(anchored) {
            if let Some(instance) = geometry_instance(particle, registry) {
                out.geometry.push(instance);
                materials.push(particle.material);
            }
        }
        batch_by_material(ParticleKind::Geometry, materials, &mut out.batches);

        for trail in &self.trails {
            trail.write_vertices(&mut out.trails);
        }
        out.trail_count = self.trails.len() as u32;
        batch_by_material(
            ParticleKind::Trail,
            self.trails.iter().map(|t| t.material),
            &mut out.batches,
        );

        out.lights.extend(self.lights.iter().map(|l| l.to_data()));
    }

    /// Upload this frame's instance data and issue one draw per batch.
    pub fn render<R: Renderer + ?Sized>(&self, camera: &Camera, renderer: &mut R, debug: bool) {
        let out = &self.output;
        renderer.begin_frame(&FrameUniforms::from_camera(camera, debug));
        for kind in ParticleKind::ALL {
            renderer.upload_instances(kind, out.bytes(kind), out.count(kind));
        }
        renderer.upload_lights(bytemuck::cast_slice(&out.lights), out.lights.len() as u32);
        for batch in &out.batches {
            renderer.draw(batch.kind, batch.material, batch.range.clone());
        }
    }

    /// Raw bytes last written for `kind`.
    pub fn instance_data(&self, kind: ParticleKind) -> &[u8] {
        self.output.bytes(kind)
    }

    /// Number of instances last written for `kind`. Trails count once each.
    pub fn instance_count(&self, kind: ParticleKind) -> u32 {
        self.output.count(kind)
    }

    pub fn light_data(&self) -> &[LightData] {
        &self.output.lights
    }

    pub fn draw_batches(&self) -> &[DrawBatch] {
        &self.output.batches
    }
}
