//! Renderer adapter seam.
//!
//! The engine never touches a graphics API. Each frame
//! [`ParticleEngine::render`](crate::ParticleEngine::render) drives a
//! [`Renderer`] through a fixed call sequence:
//!
//! 1. [`Renderer::begin_frame`] with camera matrices and the debug flag
//! 2. [`Renderer::upload_instances`] once per [`ParticleKind`]
//! 3. [`Renderer::upload_lights`] once
//! 4. [`Renderer::draw`] once per contiguous run of equal material
//!
//! Upload data is the raw bytes of the kind's GPU record
//! ([`BillboardInstance`](crate::BillboardInstance),
//! [`GeometryInstance`](crate::GeometryInstance) or, for trails,
//! [`TRAIL_COUNT`](crate::TRAIL_COUNT) [`TrailVertex`](crate::TrailVertex)
//! records per trail). Draw ranges count instances; one trail is one
//! instance.
//!
//! Two adapters ship with the crate: [`RecordingRenderer`] for headless use
//! and tests, and [`gpu::WgpuRenderer`] (feature `wgpu`).

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::camera::Camera;

#[cfg(feature = "wgpu")]
pub mod gpu;
pub mod mesh;
pub mod recording;
pub mod shaders;

pub use crate::particle::ParticleKind;
pub use crate::registry::{MaterialId, MaterialProvider, ShaderHandle};
pub use recording::RecordingRenderer;

/// Per-frame camera state handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub camera_right: Vec3,
    pub camera_up: Vec3,
    /// Tint particles by material index instead of shading them.
    pub debug: bool,
}

impl FrameUniforms {
    pub fn from_camera(camera: &Camera, debug: bool) -> Self {
        Self {
            view_proj: camera.view_proj(),
            camera_position: camera.position(),
            camera_right: camera.right(),
            camera_up: camera.up(),
            debug,
        }
    }

    /// GPU layout of these uniforms.
    pub fn to_data(&self) -> FrameData {
        FrameData {
            view_proj: self.view_proj.to_cols_array_2d(),
            camera_position: self.camera_position.to_array(),
            debug: self.debug as u32,
            camera_right: self.camera_right.to_array(),
            _pad0: 0.0,
            camera_up: self.camera_up.to_array(),
            _pad1: 0.0,
        }
    }
}

/// Frame uniform block as laid out for shaders (112 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct FrameData {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub debug: u32,
    pub camera_right: [f32; 3],
    pub _pad0: f32,
    pub camera_up: [f32; 3],
    pub _pad1: f32,
}

/// One draw call: a run of instances sharing a material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawBatch {
    pub kind: ParticleKind,
    pub material: MaterialId,
    pub range: Range<u32>,
}

/// Consumer of the engine's per-frame instance data.
pub trait Renderer {
    fn begin_frame(&mut self, frame: &FrameUniforms);

    /// Replace the instance data of `kind` with `count` records.
    fn upload_instances(&mut self, kind: ParticleKind, data: &[u8], count: u32);

    /// Replace the light array with `count` [`LightData`](crate::LightData) records.
    fn upload_lights(&mut self, data: &[u8], count: u32);

    /// Draw instances `range` of `kind` with `material`.
    fn draw(&mut self, kind: ParticleKind, material: MaterialId, range: Range<u32>);
}

/// Group a sequence of per-instance materials into draw batches.
pub fn batch_by_material(
    kind: ParticleKind,
    materials: impl IntoIterator<Item = MaterialId>,
    out: &mut Vec<DrawBatch>,
) {
    let mut current: Option<DrawBatch> = None;
    for (index, material) in materials.into_iter().enumerate() {
        let index = index as u32;
        match current.as_mut() {
            Some(batch) if batch.material == material => batch.range.end = index + 1,
            _ => {
                out.extend(current.take());
                current = Some(DrawBatch {
                    kind,
                    material,
                    range: index..index + 1,
                });
            }
        }
    }
    out.extend(current);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_split_on_material_change() {
        let a = MaterialId::from_index(0);
        let b = MaterialId::from_index(1);
        let mut out = Vec::new();
        batch_by_material(ParticleKind::Billboard, [a, a, b, b, b, a], &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].range, 0..2);
        assert_eq!(out[1].material, b);
        assert_eq!(out[1].range, 2..5);
        assert_eq!(out[2].range, 5..6);
    }

    #[test]
    fn test_no_instances_no_batches() {
        let mut out = Vec::new();
        batch_by_material(ParticleKind::Trail, std::iter::empty(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_frame_data_layout() {
        assert_eq!(std::mem::size_of::<FrameData>(), 112);
        let data = FrameUniforms::from_camera(&Camera::new(), true).to_data();
        assert_eq!(data.debug, 1);
    }
}
