//! Particle type definitions.
//!
//! A definition is the static attribute set shared by every particle of one
//! type. Definitions live in the [`crate::DefinitionRegistry`] and are
//! referenced from effect entries by handle.
//!
//! | Definition | Particle | Animated attributes |
//! |------------|----------|---------------------|
//! | [`BillboardDefinition`] | camera-facing sprite | none |
//! | [`GeometryDefinition`] | instanced sphere mesh | size, color, deform, light |
//! | [`TrailDefinition`] | 16-point polyline | width taper head to tail |
//!
//! All definitions are built with `with_*` methods:
//!
//! ```ignore
//! let spark = GeometryDefinition::new("spark", material)
//!     .with_lifetime(0.8)
//!     .with_gravity(-9.8)
//!     .with_size(Easing::EaseOut, 0.2, 0.0)
//!     .with_color(Easing::Linear, Vec4::new(1.0, 0.8, 0.3, 1.0), Vec4::ZERO);
//! ```

use glam::{Vec3, Vec4};

use crate::ease::{EaseCurve, Easing};
use crate::registry::MaterialId;
use crate::spawn::SpawnBox;

/// Camera-facing sprite type.
#[derive(Clone, Debug, PartialEq)]
pub struct BillboardDefinition {
    pub name: String,
    pub material: MaterialId,
    pub lifetime: f32,
}

impl BillboardDefinition {
    pub fn new(name: impl Into<String>, material: MaterialId) -> Self {
        Self {
            name: name.into(),
            material,
            lifetime: 1.0,
        }
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Surface deformation over a geometry particle's lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeformCurve {
    pub curve: EaseCurve<f32>,
    /// Animation speed of the deformation pattern, passed through to shaders.
    pub speed: f32,
}

impl Default for DeformCurve {
    fn default() -> Self {
        Self {
            curve: EaseCurve::constant(0.0),
            speed: 0.0,
        }
    }
}

/// Dynamic point light carried by a geometry particle.
///
/// Disabled unless `radius` has an easing and samples above zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightCurve {
    /// RGB color, alpha is the intensity.
    pub color: EaseCurve<Vec4>,
    pub radius: EaseCurve<f32>,
}

impl LightCurve {
    pub fn disabled() -> Self {
        Self {
            color: EaseCurve::disabled(Vec4::ONE),
            radius: EaseCurve::disabled(0.0),
        }
    }

    /// Light `(color, radius)` at `factor`, or `None` when switched off.
    pub fn sample(&self, factor: f32) -> Option<(Vec4, f32)> {
        let radius = self.radius.sample(factor)?;
        if radius <= 0.0 {
            return None;
        }
        Some((self.color.sample_or_start(factor), radius))
    }
}

impl Default for LightCurve {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Instanced mesh particle type.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryDefinition {
    pub name: String,
    pub material: MaterialId,
    pub lifetime: f32,
    /// Vertical acceleration in units/s² (negative pulls down).
    pub gravity: f32,
    pub noise_scale: f32,
    pub noise_speed: f32,
    pub deform: DeformCurve,
    pub size: EaseCurve<f32>,
    pub color: EaseCurve<Vec4>,
    pub light: LightCurve,
}

impl GeometryDefinition {
    pub fn new(name: impl Into<String>, material: MaterialId) -> Self {
        Self {
            name: name.into(),
            material,
            lifetime: 1.0,
            gravity: 0.0,
            noise_scale: 0.0,
            noise_speed: 0.0,
            deform: DeformCurve::default(),
            size: EaseCurve::constant(1.0),
            color: EaseCurve::constant(Vec4::ONE),
            light: LightCurve::disabled(),
        }
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_noise(mut self, scale: f32, speed: f32) -> Self {
        self.noise_scale = scale;
        self.noise_speed = speed;
        self
    }

    pub fn with_deform(mut self, easing: Easing, start: f32, end: f32, speed: f32) -> Self {
        self.deform = DeformCurve {
            curve: EaseCurve::new(easing, start, end),
            speed,
        };
        self
    }

    pub fn with_size(mut self, easing: Easing, start: f32, end: f32) -> Self {
        self.size = EaseCurve::new(easing, start, end);
        self
    }

    pub fn with_color(mut self, easing: Easing, start: Vec4, end: Vec4) -> Self {
        self.color = EaseCurve::new(easing, start, end);
        self
    }

    /// Emit a point light whose color and radius follow the given curves.
    pub fn with_light(mut self, color: EaseCurve<Vec4>, radius: EaseCurve<f32>) -> Self {
        self.light = LightCurve { color, radius };
        self
    }

    /// Attributes at normalized age `factor`.
    pub fn sample(&self, factor: f32) -> GeometrySample {
        GeometrySample {
            scale: self.size.sample_or_start(factor),
            color: self.color.sample_or_start(factor),
            deform: self.deform.curve.sample_or_start(factor),
            light: self.light.sample(factor),
        }
    }
}

/// Eased geometry attributes at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometrySample {
    pub scale: f32,
    pub color: Vec4,
    pub deform: f32,
    pub light: Option<(Vec4, f32)>,
}

/// Polyline trail type.
#[derive(Clone, Debug, PartialEq)]
pub struct TrailDefinition {
    pub name: String,
    pub material: MaterialId,
    pub lifetime: f32,
    pub gravity: f32,
    /// Seconds between head samples. Clamped to at least [`MIN_TRAIL_FREQUENCY`].
    pub frequency: f32,
    pub start_position: SpawnBox,
    pub start_velocity: SpawnBox,
    /// Width at the head.
    pub size_start: f32,
    /// Width at the tail.
    pub size_end: f32,
}

/// Smallest accepted trail period.
pub const MIN_TRAIL_FREQUENCY: f32 = 1e-4;

impl TrailDefinition {
    pub fn new(name: impl Into<String>, material: MaterialId) -> Self {
        Self {
            name: name.into(),
            material,
            lifetime: 1.0,
            gravity: 0.0,
            frequency: 0.05,
            start_position: SpawnBox::ZERO,
            start_velocity: SpawnBox::ZERO,
            size_start: 0.1,
            size_end: 0.0,
        }
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_start_position(mut self, min: Vec3, max: Vec3) -> Self {
        self.start_position = SpawnBox::new(min, max);
        self
    }

    pub fn with_start_velocity(mut self, min: Vec3, max: Vec3) -> Self {
        self.start_velocity = SpawnBox::new(min, max);
        self
    }

    pub fn with_size(mut self, head: f32, tail: f32) -> Self {
        self.size_start = head;
        self.size_end = tail;
        self
    }

    /// The shift period actually used by the simulation.
    pub fn period(&self) -> f32 {
        if self.frequency.is_finite() {
            self.frequency.max(MIN_TRAIL_FREQUENCY)
        } else {
            MIN_TRAIL_FREQUENCY
        }
    }

    /// Width of point `index` out of `count`, tapering head to tail.
    pub fn size_at(&self, index: usize, count: usize) -> f32 {
        let t = if count > 1 {
            index as f32 / (count - 1) as f32
        } else {
            0.0
        };
        Easing::Linear.ease(self.size_start, self.size_end, t)
    }
}
