//! Spawn boxes and random helpers for particle initialization.
//!
//! Every random draw in the engine goes through an explicit generator, so a
//! seeded [`SmallRng`] makes a whole simulation reproducible:
//!
//! ```
//! use pfx::spawn::SpawnBox;
//! use pfx::Vec3;
//! use rand::{rngs::SmallRng, SeedableRng};
//!
//! let spawn = SpawnBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
//! let mut a = SmallRng::seed_from_u64(7);
//! let mut b = SmallRng::seed_from_u64(7);
//! assert_eq!(spawn.sample(&mut a), spawn.sample(&mut b));
//! ```

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Create the engine generator: seeded when `seed` is set, from entropy otherwise.
pub fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

/// Random f32 between `lo` and `hi`.
///
/// Unlike `gen_range` this accepts `lo == hi` and reversed bounds, which
/// occur naturally in authored data (a fixed value, or a range typed
/// backwards).
#[inline]
pub fn random_range<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    // rounding in the blend can step one ulp past either bound
    (lo + (hi - lo) * rng.gen::<f32>()).max(lo.min(hi)).min(lo.max(hi))
}

/// Axis-aligned `{min, max}` box sampled independently per axis.
///
/// Used for start positions and start velocities.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct SpawnBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl SpawnBox {
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// A degenerate box that always samples `value`.
    pub fn point(value: Vec3) -> Self {
        Self::new(value, value)
    }

    /// Cube of given half-size centered at the origin.
    pub fn cube(half_size: f32) -> Self {
        Self::new(Vec3::splat(-half_size), Vec3::splat(half_size))
    }

    /// Whether both corners are zero (the "no override" marker on entries).
    pub fn is_zero(&self) -> bool {
        self.min == Vec3::ZERO && self.max == Vec3::ZERO
    }

    /// `self` unless it is all-zero, in which case `fallback`.
    pub fn or(self, fallback: SpawnBox) -> SpawnBox {
        if self.is_zero() {
            fallback
        } else {
            self
        }
    }

    /// Uniform sample inside the box.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        Vec3::new(
            random_range(rng, self.min.x, self.max.x),
            random_range(rng, self.min.y, self.max.y),
            random_range(rng, self.min.z, self.max.z),
        )
    }

    /// Whether `point` lies inside the (possibly reversed) box.
    pub fn contains(&self, point: Vec3) -> bool {
        let lo = self.min.min(self.max);
        let hi = self.min.max(self.max);
        point.cmpge(lo).all() && point.cmple(hi).all()
    }
}

/// Inclusive `{min, max}` scalar range.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct SpawnRange {
    pub min: f32,
    pub max: f32,
}

impl SpawnRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(value, value)
    }

    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        random_range(rng, self.min, self.max)
    }
}

/// Random unit vector, uniform on the sphere.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let z = random_range(rng, -1.0, 1.0);
    let theta = random_range(rng, -PI, PI);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

/// Random rotation axis with every component drawn from `limit`.
///
/// A zero limit, or a degenerate sample, falls back to a uniform unit vector.
pub fn random_axis<R: Rng + ?Sized>(rng: &mut R, limit: &SpawnRange) -> Vec3 {
    if limit.min == 0.0 && limit.max == 0.0 {
        return random_unit_vector(rng);
    }
    Vec3::new(limit.sample(rng), limit.sample(rng), limit.sample(rng))
        .try_normalize()
        .unwrap_or_else(|| random_unit_vector(rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_within_box() {
        let mut rng = SmallRng::seed_from_u64(1);
        let spawn = SpawnBox::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 0.5, 3.0));
        for _ in 0..1000 {
            assert!(spawn.contains(spawn.sample(&mut rng)));
        }
    }

    #[test]
    fn test_degenerate_and_reversed_ranges() {
        let mut rng = SmallRng::seed_from_u64(2);
        assert_eq!(random_range(&mut rng, 3.0, 3.0), 3.0);
        for _ in 0..100 {
            let v = random_range(&mut rng, 1.0, -1.0);
            assert!((-1.0..=1.0).contains(&v));
        }
        let point = SpawnBox::point(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(point.sample(&mut rng), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let spawn = SpawnBox::cube(5.0);
        let mut a = make_rng(Some(99));
        let mut b = make_rng(Some(99));
        for _ in 0..10 {
            assert_eq!(spawn.sample(&mut a), spawn.sample(&mut b));
        }
    }

    #[test]
    fn test_zero_box_fallback() {
        let fallback = SpawnBox::cube(1.0);
        assert_eq!(SpawnBox::ZERO.or(fallback), fallback);
        let own = SpawnBox::point(Vec3::X);
        assert_eq!(own.or(fallback), own);
    }

    #[test]
    fn test_axes_are_unit_length() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..100 {
            let axis = random_axis(&mut rng, &SpawnRange::default());
            assert!((axis.length() - 1.0).abs() < 1e-4);
        }
        let limited = SpawnRange::constant(2.0);
        let expected = Vec3::ONE.normalize();
        assert!((random_axis(&mut rng, &limited) - expected).length() < 1e-6);
    }
}
