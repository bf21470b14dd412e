//! Headless renderer that records what it was asked to do.
//!
//! Used by the `pfx-run` binary and by tests to observe the render-call
//! sequence without a GPU.

use std::collections::HashMap;
use std::fs;
use std::ops::Range;

use log::trace;

use super::{DrawBatch, FrameUniforms, MaterialId, MaterialProvider, ParticleKind, Renderer, ShaderHandle};
use crate::error::MaterialError;
use crate::registry::Material;

/// One `upload_instances` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub kind: ParticleKind,
    pub bytes: usize,
    pub count: u32,
}

/// Records uploads and draws of the current frame.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    /// Frames begun since creation.
    pub frames: u64,
    pub frame: Option<FrameUniforms>,
    pub uploads: Vec<Upload>,
    pub light_count: u32,
    pub draws: Vec<DrawBatch>,
    /// Draws issued for materials that never resolved.
    pub skipped_draws: u64,
    shaders: HashMap<MaterialId, ShaderHandle>,
    next_shader: u64,
    /// Check that shader files exist when resolving materials.
    check_files: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve materials only if their shader file can be read.
    pub fn with_file_checks(mut self) -> Self {
        self.check_files = true;
        self
    }

    /// Instances drawn this frame for `kind`.
    pub fn drawn(&self, kind: ParticleKind) -> u32 {
        self.draws
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.range.end - d.range.start)
            .sum()
    }

    pub fn upload(&self, kind: ParticleKind) -> Option<&Upload> {
        self.uploads.iter().find(|u| u.kind == kind)
    }
}

impl Renderer for RecordingRenderer {
    fn begin_frame(&mut self, frame: &FrameUniforms) {
        self.frames += 1;
        self.frame = Some(*frame);
        self.uploads.clear();
        self.draws.clear();
        self.light_count = 0;
    }

    fn upload_instances(&mut self, kind: ParticleKind, data: &[u8], count: u32) {
        trace!("upload {} x{} ({} bytes)", kind, count, data.len());
        self.uploads.push(Upload {
            kind,
            bytes: data.len(),
            count,
        });
    }

    fn upload_lights(&mut self, _data: &[u8], count: u32) {
        self.light_count = count;
    }

    fn draw(&mut self, kind: ParticleKind, material: MaterialId, range: Range<u32>) {
        if self.check_files && !self.shaders.contains_key(&material) {
            self.skipped_draws += 1;
            return;
        }
        self.draws.push(DrawBatch {
            kind,
            material,
            range,
        });
    }
}

impl MaterialProvider for RecordingRenderer {
    fn resolve(&mut self, id: MaterialId, material: &Material) -> Result<ShaderHandle, MaterialError> {
        if self.check_files {
            fs::metadata(&material.shader_path).map_err(|source| MaterialError::Io {
                path: material.shader_path.clone(),
                source,
            })?;
        }
        let handle = ShaderHandle(self.next_shader);
        self.next_shader += 1;
        self.shaders.insert(id, handle);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;

    #[test]
    fn test_begin_frame_resets() {
        let mut renderer = RecordingRenderer::new();
        let material = MaterialId::from_index(0);
        renderer.draw(ParticleKind::Billboard, material, 0..4);
        renderer.begin_frame(&FrameUniforms::from_camera(&Camera::new(), false));
        assert!(renderer.draws.is_empty());
        assert_eq!(renderer.frames, 1);
    }

    #[test]
    fn test_unresolved_material_is_skipped() {
        let mut renderer = RecordingRenderer::new().with_file_checks();
        let missing = Material::new("missing", "/no/such/shader.wgsl");
        let id = MaterialId::from_index(0);
        assert!(renderer.resolve(id, &missing).is_err());
        renderer.draw(ParticleKind::Geometry, id, 0..3);
        assert!(renderer.draws.is_empty());
        assert_eq!(renderer.skipped_draws, 1);
    }

    #[test]
    fn test_drawn_counts_instances() {
        let mut renderer = RecordingRenderer::new();
        let id = MaterialId::from_index(0);
        renderer.draw(ParticleKind::Trail, id, 0..2);
        renderer.draw(ParticleKind::Trail, id, 2..5);
        assert_eq!(renderer.drawn(ParticleKind::Trail), 5);
        assert_eq!(renderer.drawn(ParticleKind::Billboard), 0);
    }
}
