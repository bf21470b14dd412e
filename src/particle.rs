//! Live particles and their fixed-layout GPU records.
//!
//! The engine owns one pool per [`ParticleKind`]. Each frame the pools are
//! written into flat `#[repr(C)]` instance records that a renderer uploads
//! verbatim:
//!
//! | Kind | Live type | GPU record | Records per particle |
//! |------|-----------|------------|----------------------|
//! | Billboard | [`BillboardParticle`] | [`BillboardInstance`] | 1 |
//! | Geometry | [`GeometryParticle`] | [`GeometryInstance`] | 1 |
//! | Trail | [`Trail`] | [`TrailVertex`] | [`TRAIL_COUNT`] |
//!
//! Lights emitted by geometry particles are aggregated into [`LightData`]
//! records, at most [`MAX_LIGHTS`] per frame.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::registry::{BillboardId, GeometryId, MaterialId, TrailId};
use crate::InstanceLayout;

/// Number of points in every trail polyline.
pub const TRAIL_COUNT: usize = 32;

/// Upper bound on dynamic lights per frame.
pub const MAX_LIGHTS: usize = 128;

/// The three particle kinds an effect entry can emit.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParticleKind {
    Billboard,
    Geometry,
    Trail,
}

impl ParticleKind {
    pub const ALL: [Self; 3] = [Self::Billboard, Self::Geometry, Self::Trail];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Billboard => "billboard",
            Self::Geometry => "geometry",
            Self::Trail => "trail",
        }
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Live particles
// ============================================================================

/// Camera-facing sprite. Does not move after spawning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BillboardParticle {
    pub position: Vec3,
    pub size: Vec2,
    pub age: f32,
    pub lifetime: f32,
    pub definition: BillboardId,
    pub material: MaterialId,
}

impl BillboardParticle {
    pub fn to_instance(&self) -> BillboardInstance {
        BillboardInstance {
            position: self.position.to_array(),
            age_factor: age_factor(self.age, self.lifetime),
            size: self.size.to_array(),
            material: self.material.index() as u32,
            _pad: 0,
        }
    }
}

/// Instanced mesh particle with rotation and eased attributes.
///
/// `position` is relative to `anchor`. World particles have a zero anchor;
/// anchored children get their owner's position written into `anchor` every
/// update so they follow it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryParticle {
    pub position: Vec3,
    pub anchor: Vec3,
    pub velocity: Vec3,
    pub rotation_axis: Vec3,
    /// Phase offset in seconds, randomized at spawn.
    pub rotation_phase: f32,
    /// Radians per second.
    pub rotation_speed: f32,
    pub definition: GeometryId,
    pub material: MaterialId,
    pub age: f32,
}

impl GeometryParticle {
    pub fn world_position(&self) -> Vec3 {
        self.anchor + self.position
    }
}

/// One point of a trail polyline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrailPoint {
    pub position: Vec3,
    pub velocity: Vec3,
    pub size: f32,
}

/// Fixed-length polyline fed from a moving head.
///
/// `points[0]` is the newest sample and `points[1]` duplicates it;
/// `points[TRAIL_COUNT - 1]` duplicates the oldest. The duplicates give
/// renderers the adjacency they need at both ends.
#[derive(Clone, Debug, PartialEq)]
pub struct Trail {
    /// Engine-unique id, used by effect instances to find their trail again.
    pub key: u64,
    pub points: [TrailPoint; TRAIL_COUNT],
    /// Emitter origin, moved by the owning effect entry.
    pub origin: Vec3,
    /// Free point relative to `origin`; sampled into `points[0]` on each shift.
    pub head: TrailPoint,
    pub definition: TrailId,
    pub material: MaterialId,
    pub lifetime: f32,
    /// Seconds between shifts.
    pub frequency: f32,
    pub age: f32,
    /// Time carried towards the next shift.
    pub accumulator: f32,
    /// Tail points collapsed after the trail outlived `lifetime`.
    pub dead: usize,
    /// Total shifts performed.
    pub shifts: u64,
}

impl Trail {
    /// Whether every interior point has collapsed.
    pub fn is_fully_dead(&self) -> bool {
        self.dead >= TRAIL_COUNT - 2
    }

    /// Write the polyline as `TRAIL_COUNT` vertices.
    pub fn write_vertices(&self, out: &mut Vec<TrailVertex>) {
        let factor = age_factor(self.age, self.lifetime);
        let material = self.material.index() as u32;
        out.extend(self.points.iter().map(|point| TrailVertex {
            position: point.position.to_array(),
            size: point.size,
            age_factor: factor,
            material,
            _pad: [0; 2],
        }));
    }
}

/// Point light aggregated from geometry particles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub range: f32,
    pub color: Vec3,
    pub intensity: f32,
}

impl Light {
    /// Build from an eased RGBA light color; alpha becomes the intensity.
    pub fn from_rgba(position: Vec3, range: f32, color: Vec4) -> Self {
        Self {
            position,
            range,
            color: color.truncate(),
            intensity: color.w,
        }
    }

    pub fn to_data(&self) -> LightData {
        LightData {
            position: self.position.to_array(),
            range: self.range,
            color: self.color.to_array(),
            intensity: self.intensity,
        }
    }
}

/// `age / lifetime`, with zero-lifetime particles reported as finished.
#[inline]
pub fn age_factor(age: f32, lifetime: f32) -> f32 {
    if lifetime > 1e-6 {
        age / lifetime
    } else {
        1.0
    }
}

// ============================================================================
// GPU records
// ============================================================================

/// Per-instance billboard record (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, pfx_derive::InstanceLayout)]
pub struct BillboardInstance {
    pub position: [f32; 3],
    pub age_factor: f32,
    pub size: [f32; 2],
    pub material: u32,
    #[instance(skip)]
    pub _pad: u32,
}

/// Per-instance geometry record (112 bytes).
///
/// Starts at location 2; the sphere mesh uses locations 0 and 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, pfx_derive::InstanceLayout)]
#[instance(location = 2)]
pub struct GeometryInstance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub age_factor: f32,
    pub deform: f32,
    pub deform_speed: f32,
    pub noise_scale: f32,
    pub noise_speed: f32,
    pub material: u32,
    #[instance(skip)]
    pub _pad: [u32; 2],
}

impl GeometryInstance {
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }
}

/// One trail polyline vertex (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, pfx_derive::InstanceLayout)]
pub struct TrailVertex {
    pub position: [f32; 3],
    pub size: f32,
    pub age_factor: f32,
    pub material: u32,
    #[instance(skip)]
    pub _pad: [u32; 2],
}

/// Light record as laid out in the light uniform array (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightData {
    pub position: [f32; 3],
    pub range: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Byte stride of one record of the given kind.
pub fn record_stride(kind: ParticleKind) -> u64 {
    match kind {
        ParticleKind::Billboard => BillboardInstance::STRIDE,
        ParticleKind::Geometry => GeometryInstance::STRIDE,
        ParticleKind::Trail => TrailVertex::STRIDE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeFormat;

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<BillboardInstance>(), 32);
        assert_eq!(std::mem::size_of::<GeometryInstance>(), 112);
        assert_eq!(std::mem::size_of::<TrailVertex>(), 32);
        assert_eq!(std::mem::size_of::<LightData>(), 32);
    }

    #[test]
    fn test_geometry_attributes() {
        let attrs = GeometryInstance::ATTRIBUTES;
        // 4 matrix columns + color + 5 scalars + material
        assert_eq!(attrs.len(), 11);
        assert_eq!(attrs[0].name, "model_0");
        assert_eq!(attrs[0].location, 2);
        assert_eq!(attrs[3].offset, 48);
        assert_eq!(attrs[4].name, "color");
        assert_eq!(attrs[4].offset, 64);
        let material = attrs.last().unwrap();
        assert_eq!(material.name, "material");
        assert_eq!(material.format, AttributeFormat::Uint32);
        assert_eq!(material.location, 12);
    }

    #[test]
    fn test_padding_is_not_exposed() {
        assert!(BillboardInstance::ATTRIBUTES.iter().all(|a| a.name != "_pad"));
        assert!(!TrailVertex::WGSL_STRUCT.contains("_pad"));
    }

    #[test]
    fn test_age_factor_guards_zero_lifetime() {
        assert_eq!(age_factor(0.5, 1.0), 0.5);
        assert_eq!(age_factor(0.5, 0.0), 1.0);
    }

    #[test]
    fn test_light_from_rgba() {
        let light = Light::from_rgba(Vec3::X, 2.0, Vec4::new(1.0, 0.5, 0.25, 3.0));
        assert_eq!(light.color, Vec3::new(1.0, 0.5, 0.25));
        assert_eq!(light.intensity, 3.0);
        assert_eq!(light.to_data().range, 2.0);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ParticleKind::Trail.to_string(), "trail");
        let json = serde_json::to_string(&ParticleKind::Geometry).unwrap();
        assert_eq!(json, "\"geometry\"");
    }
}
