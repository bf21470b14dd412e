//! Particle effects: timed recipes of emitter entries.
//!
//! A [`ParticleEffect`] is an immutable recipe of up to [`MAX_ENTRIES`]
//! entries. Each [`ParticleEffectEntry`] binds one definition to a time
//! window and a spawn-rate curve. Playing an effect creates an
//! [`EffectInstance`], which carries all mutable timeline state (age,
//! per-entry spawn accumulators, trail slots), so any number of instances
//! of one effect can play at once.
//!
//! # Entry timing
//!
//! | Entry | Active when | Spawn rate |
//! |-------|-------------|------------|
//! | windowed | `start <= age <= start + duration` | `ease(spawn, factor)` |
//! | looping | always | `spawn.start` |
//!
//! `factor = (age - start) / duration` is not clamped; it reaches exactly
//! 1.0 at the end of the window. Zero-length windows use `factor = 1.0`.
//!
//! # Example
//!
//! ```ignore
//! let mut effect = ParticleEffect::new("explosion");
//! effect.push_entry(
//!     ParticleEffectEntry::new(EntryKind::Geometry(spark))
//!         .with_window(0.0, 0.5)
//!         .with_spawn(Easing::EaseOut, 200.0, 0.0),
//! )?;
//! ```

use glam::Vec3;

use crate::ease::{EaseCurve, Easing};
use crate::error::EffectError;
use crate::particle::ParticleKind;
use crate::registry::{BillboardId, GeometryId, TrailId};
use crate::spawn::{SpawnBox, SpawnRange};

/// Maximum number of entries per effect.
pub const MAX_ENTRIES: usize = 8;

/// Durations at or below this are treated as zero-length windows.
pub const MIN_DURATION: f32 = 1e-6;

/// Definition bound to an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Billboard(BillboardId),
    Geometry(GeometryId),
    Trail(TrailId),
}

impl EntryKind {
    pub fn particle_kind(&self) -> ParticleKind {
        match self {
            Self::Billboard(_) => ParticleKind::Billboard,
            Self::Geometry(_) => ParticleKind::Geometry,
            Self::Trail(_) => ParticleKind::Trail,
        }
    }
}

/// One timed sub-emitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleEffectEntry {
    pub kind: EntryKind,
    /// Window start, seconds from effect start.
    pub start: f32,
    /// Window length in seconds.
    pub duration: f32,
    /// Ignore the window and spawn at the constant `spawn.start` rate.
    pub looping: bool,
    /// Particles per second over the window.
    pub spawn: EaseCurve<f32>,
    /// Spawn offset box; all-zero uses the definition default.
    pub start_position: SpawnBox,
    /// Start velocity box; all-zero uses the definition default.
    pub start_velocity: SpawnBox,
    /// Per-component range of the random rotation axis.
    pub rotation_limit: SpawnRange,
    /// Rotation speed range in radians per second.
    pub rotation_speed: SpawnRange,
    /// Spawn geometry into the owning anchored effect instead of world space.
    pub anchored: bool,
}

impl ParticleEffectEntry {
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            start: 0.0,
            duration: 1.0,
            looping: false,
            spawn: EaseCurve::constant(0.0),
            start_position: SpawnBox::ZERO,
            start_velocity: SpawnBox::ZERO,
            rotation_limit: SpawnRange::default(),
            rotation_speed: SpawnRange::default(),
            anchored: false,
        }
    }

    pub fn with_window(mut self, start: f32, duration: f32) -> Self {
        self.start = start;
        self.duration = duration;
        self
    }

    pub fn with_spawn(mut self, easing: Easing, start: f32, end: f32) -> Self {
        self.spawn = EaseCurve::new(easing, start, end);
        self
    }

    /// Constant spawn rate in particles per second.
    pub fn with_rate(self, rate: f32) -> Self {
        self.with_spawn(Easing::Linear, rate, rate)
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
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

    pub fn with_rotation(mut self, limit: SpawnRange, speed: SpawnRange) -> Self {
        self.rotation_limit = limit;
        self.rotation_speed = speed;
        self
    }

    pub fn with_anchored(mut self, anchored: bool) -> Self {
        self.anchored = anchored;
        self
    }

    /// End of the window.
    pub fn window_end(&self) -> f32 {
        self.start + self.duration
    }

    /// Whether the entry spawns at effect age `age`.
    pub fn is_active(&self, age: f32) -> bool {
        self.looping || (age >= self.start && age <= self.window_end())
    }

    /// Part of a `dt` step starting at `age` that falls inside the window.
    /// Looping and zero-length windows take the whole step.
    pub fn step_in_window(&self, age: f32, dt: f32) -> f32 {
        if self.looping || self.duration <= MIN_DURATION {
            dt
        } else {
            dt.min(self.window_end() - age).max(0.0)
        }
    }

    /// Normalized window position. Unclamped.
    pub fn factor(&self, age: f32) -> f32 {
        if self.duration <= MIN_DURATION {
            1.0
        } else {
            (age - self.start) / self.duration
        }
    }

    /// Spawn rate in particles per second at effect age `age`.
    pub fn rate(&self, age: f32) -> f32 {
        if self.looping {
            self.spawn.start
        } else {
            self.spawn.sample_or_start(self.factor(age))
        }
    }
}

/// A reusable effect recipe.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleEffect {
    pub name: String,
    entries: Vec<ParticleEffectEntry>,
    /// Total running time. `None` runs until the last entry window ends.
    pub time: Option<f32>,
    /// Restart from age 0 instead of expiring.
    pub looping: bool,
}

impl ParticleEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::with_capacity(MAX_ENTRIES),
            time: None,
            looping: false,
        }
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Append an entry, failing once the effect holds [`MAX_ENTRIES`].
    pub fn push_entry(&mut self, entry: ParticleEffectEntry) -> Result<usize, EffectError> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(EffectError::TooManyEntries {
                effect: self.name.clone(),
                capacity: MAX_ENTRIES,
            });
        }
        self.entries.push(entry);
        Ok(self.entries.len() - 1)
    }

    /// Builder form of [`push_entry`](Self::push_entry).
    pub fn with_entry(mut self, entry: ParticleEffectEntry) -> Result<Self, EffectError> {
        self.push_entry(entry)?;
        Ok(self)
    }

    pub fn remove_entry(&mut self, index: usize) -> Option<ParticleEffectEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn entries(&self) -> &[ParticleEffectEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [ParticleEffectEntry] {
        &mut self.entries
    }

    /// Effective running time.
    pub fn duration(&self) -> f32 {
        self.time.unwrap_or_else(|| {
            self.entries
                .iter()
                .map(ParticleEffectEntry::window_end)
                .fold(0.0, f32::max)
        })
    }

    /// Timeline state at `age`, ignoring wrap.
    pub fn state_at(&self, age: f32) -> EffectState {
        if !self.looping && age >= self.duration() {
            EffectState::Expired
        } else if self.entries.iter().any(|e| e.is_active(age)) {
            EffectState::Active
        } else {
            EffectState::Inactive
        }
    }
}

/// Where an effect instance is on its timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectState {
    /// No entry window contains the current age.
    Inactive,
    /// At least one entry is spawning.
    Active,
    /// A non-looping effect ran past its time. Nothing spawns any more.
    Expired,
}

/// Handle to an effect in an [`EffectLibrary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u32);

impl EffectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Named effect recipes.
#[derive(Clone, Debug, Default)]
pub struct EffectLibrary {
    effects: Vec<ParticleEffect>,
}

impl EffectLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: ParticleEffect) -> Result<EffectId, EffectError> {
        if self.find(&effect.name).is_some() {
            return Err(EffectError::DuplicateEffect(effect.name));
        }
        self.effects.push(effect);
        Ok(EffectId(self.effects.len() as u32 - 1))
    }

    /// Look up an effect by exact, case-sensitive name.
    pub fn get(&self, name: &str) -> Option<&ParticleEffect> {
        self.effects.iter().find(|e| e.name == name)
    }

    pub fn find(&self, name: &str) -> Option<EffectId> {
        self.effects
            .iter()
            .position(|e| e.name == name)
            .map(|i| EffectId(i as u32))
    }

    pub fn effect(&self, id: EffectId) -> Option<&ParticleEffect> {
        self.effects.get(id.index())
    }

    pub fn effect_mut(&mut self, id: EffectId) -> Option<&mut ParticleEffect> {
        self.effects.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectId, &ParticleEffect)> {
        self.effects
            .iter()
            .enumerate()
            .map(|(i, e)| (EffectId(i as u32), e))
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Mutable playback state of one effect.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectInstance {
    pub effect: EffectId,
    /// Seconds since the effect (re)started.
    pub age: f32,
    /// Fractional spawn carry per entry.
    pub accumulators: [f32; MAX_ENTRIES],
    /// Trail allocated by each trail entry during the current run.
    pub trail_slots: [Option<u64>; MAX_ENTRIES],
    /// Number of times a looping effect wrapped.
    pub loops: u32,
}

impl EffectInstance {
    pub fn new(effect: EffectId) -> Self {
        Self {
            effect,
            age: 0.0,
            accumulators: [0.0; MAX_ENTRIES],
            trail_slots: [None; MAX_ENTRIES],
            loops: 0,
        }
    }

    /// Rewind to age 0 and forget spawn carry and trail activations.
    pub fn restart(&mut self) {
        self.age = 0.0;
        self.accumulators = [0.0; MAX_ENTRIES];
        self.trail_slots = [None; MAX_ENTRIES];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn billboard() -> EntryKind {
        EntryKind::Billboard(BillboardId::from_index(0))
    }

    #[test]
    fn test_entry_capacity() {
        let mut effect = ParticleEffect::new("full");
        for _ in 0..MAX_ENTRIES {
            effect.push_entry(ParticleEffectEntry::new(billboard())).unwrap();
        }
        let err = effect
            .push_entry(ParticleEffectEntry::new(billboard()))
            .unwrap_err();
        assert!(matches!(err, EffectError::TooManyEntries { capacity: 8, .. }));
        assert_eq!(effect.entries().len(), MAX_ENTRIES);
    }

    #[test]
    fn test_window_is_inclusive() {
        let entry = ParticleEffectEntry::new(billboard()).with_window(1.0, 2.0);
        assert!(!entry.is_active(0.99));
        assert!(entry.is_active(1.0));
        assert!(entry.is_active(3.0));
        assert!(!entry.is_active(3.01));
        assert!(entry.with_looping(true).is_active(100.0));
    }

    #[test]
    fn test_step_is_clipped_to_window() {
        let entry = ParticleEffectEntry::new(billboard()).with_window(1.0, 2.0);
        assert_eq!(entry.step_in_window(1.0, 0.5), 0.5);
        assert_eq!(entry.step_in_window(2.75, 0.5), 0.25);
        assert_eq!(entry.step_in_window(3.0, 0.5), 0.0);
        assert_eq!(entry.with_looping(true).step_in_window(3.0, 0.5), 0.5);
        let burst = ParticleEffectEntry::new(billboard()).with_window(1.0, 0.0);
        assert_eq!(burst.step_in_window(1.0, 0.5), 0.5);
    }

    #[test]
    fn test_factor_is_unclamped() {
        let entry = ParticleEffectEntry::new(billboard()).with_window(1.0, 2.0);
        assert_eq!(entry.factor(1.0), 0.0);
        assert_eq!(entry.factor(3.0), 1.0);
        assert_eq!(entry.factor(4.0), 1.5);
    }

    #[test]
    fn test_zero_duration_factor() {
        let entry = ParticleEffectEntry::new(billboard()).with_window(1.0, 0.0);
        assert_eq!(entry.factor(1.0), 1.0);
        assert!(entry.rate(1.0).is_finite());
    }

    #[test]
    fn test_looping_entry_uses_start_rate() {
        let entry = ParticleEffectEntry::new(billboard())
            .with_window(0.0, 1.0)
            .with_spawn(Easing::Linear, 5.0, 50.0)
            .with_looping(true);
        assert_eq!(entry.rate(0.5), 5.0);
        assert_eq!(entry.with_looping(false).rate(0.5), 27.5);
    }

    #[test]
    fn test_effect_duration() {
        let effect = ParticleEffect::new("e")
            .with_entry(ParticleEffectEntry::new(billboard()).with_window(0.0, 1.0))
            .unwrap()
            .with_entry(ParticleEffectEntry::new(billboard()).with_window(0.5, 2.0))
            .unwrap();
        assert_eq!(effect.duration(), 2.5);
        assert_eq!(effect.clone().with_time(4.0).duration(), 4.0);
        assert_eq!(effect.state_at(0.2), EffectState::Active);
        assert_eq!(effect.state_at(2.5), EffectState::Expired);
    }

    #[test]
    fn test_state_inactive_between_windows() {
        let effect = ParticleEffect::new("gap")
            .with_entry(ParticleEffectEntry::new(billboard()).with_window(0.0, 1.0))
            .unwrap()
            .with_entry(ParticleEffectEntry::new(billboard()).with_window(2.0, 1.0))
            .unwrap();
        assert_eq!(effect.state_at(1.5), EffectState::Inactive);
    }

    #[test]
    fn test_library_lookup() {
        let mut library = EffectLibrary::new();
        let id = library.add(ParticleEffect::new("smoke")).unwrap();
        assert_eq!(library.find("smoke"), Some(id));
        assert!(library.get("smoke").is_some());
        assert!(library.get("nonexistent").is_none());
        assert!(library.get("Smoke").is_none());
        assert!(matches!(
            library.add(ParticleEffect::new("smoke")),
            Err(EffectError::DuplicateEffect(_))
        ));
    }

    #[test]
    fn test_instance_restart() {
        let mut instance = EffectInstance::new(EffectId(0));
        instance.age = 3.0;
        instance.accumulators[2] = 0.5;
        instance.trail_slots[1] = Some(7);
        instance.restart();
        assert_eq!(instance, EffectInstance::new(EffectId(0)));
    }
}
