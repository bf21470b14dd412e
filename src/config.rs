//! Engine configuration.
//!
//! [`EngineConfig`] sets pool capacities and the few policy switches the
//! simulation has. It can be built in code or loaded from JSON; missing
//! fields take their defaults:
//!
//! ```json
//! {
//!     "geometry_capacity": 256,
//!     "sort_billboards": true,
//!     "seed": 42
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::particle::MAX_LIGHTS;

/// Capacities and policies for a [`crate::ParticleEngine`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Live billboard limit.
    pub billboard_capacity: usize,
    /// Live geometry limit, shared by world particles and all anchored
    /// children. Also the size of the geometry instance buffer.
    pub geometry_capacity: usize,
    /// Live trail limit.
    pub trail_capacity: usize,
    /// Lights per frame, at most [`MAX_LIGHTS`].
    pub light_capacity: usize,
    /// Concurrently playing effects started with `add_fx`.
    pub managed_capacity: usize,
    /// Sort billboards back-to-front from the camera during update.
    pub sort_billboards: bool,
    /// Keep billboards and world geometry across `frame()` calls.
    pub persistent_particles: bool,
    /// Seed for the spawn generator. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            billboard_capacity: 4096,
            geometry_capacity: 256,
            trail_capacity: 64,
            light_capacity: MAX_LIGHTS,
            managed_capacity: 64,
            sort_billboards: false,
            persistent_particles: false,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_billboard_capacity(mut self, capacity: usize) -> Self {
        self.billboard_capacity = capacity;
        self
    }

    pub fn with_geometry_capacity(mut self, capacity: usize) -> Self {
        self.geometry_capacity = capacity;
        self
    }

    pub fn with_trail_capacity(mut self, capacity: usize) -> Self {
        self.trail_capacity = capacity;
        self
    }

    pub fn with_light_capacity(mut self, capacity: usize) -> Self {
        self.light_capacity = capacity;
        self
    }

    pub fn with_sort_billboards(mut self, sort: bool) -> Self {
        self.sort_billboards = sort;
        self
    }

    pub fn with_persistent_particles(mut self, persistent: bool) -> Self {
        self.persistent_particles = persistent;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.light_capacity > MAX_LIGHTS {
            return Err(ConfigError::Invalid {
                field: "light_capacity",
                reason: format!("{} exceeds the shader limit of {}", self.light_capacity, MAX_LIGHTS),
            });
        }
        if self.geometry_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "geometry_capacity",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"sort_billboards": true, "seed": 7}"#).unwrap();
        assert!(config.sort_billboards);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.geometry_capacity, 256);
        assert_eq!(config.light_capacity, MAX_LIGHTS);
    }

    #[test]
    fn test_light_capacity_limit() {
        let err = EngineConfig::from_json(r#"{"light_capacity": 500}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "light_capacity", .. }));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            EngineConfig::from_json("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_json_roundtrip_preserves_values() {
        let config = EngineConfig::default().with_seed(3).with_geometry_capacity(16);
        let back = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, back);
    }
}
