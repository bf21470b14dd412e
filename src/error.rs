//! Error types for pfx.
//!
//! This module provides error types for registry population, effect lookup,
//! library loading and engine configuration. Runtime simulation never
//! returns errors: capacity overflow is counted (see [`crate::pool`]) and a
//! missing shader only makes the renderer skip a draw.

use std::path::PathBuf;

use thiserror::Error;

use crate::particle::ParticleKind;

/// Errors that can occur while populating the definition registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The fixed material table is full.
    #[error("material table is full ({capacity} entries)")]
    MaterialsFull { capacity: usize },
    /// The fixed texture table is full.
    #[error("texture table is full ({capacity} entries)")]
    TexturesFull { capacity: usize },
    /// The fixed definition table for a particle kind is full.
    #[error("{kind} definition table is full ({capacity} entries)")]
    DefinitionsFull { kind: ParticleKind, capacity: usize },
    /// A material or definition with this name already exists.
    #[error("a {kind} named '{name}' is already registered")]
    DuplicateName { kind: &'static str, name: String },
    /// A handle does not point into the registry.
    #[error("{kind} handle {index} is out of range")]
    InvalidHandle { kind: &'static str, index: usize },
}

/// Errors that can occur when building or looking up effects.
#[derive(Debug, Error)]
pub enum EffectError {
    /// An effect can hold at most [`crate::effect::MAX_ENTRIES`] entries.
    #[error("effect '{effect}' already has {capacity} entries")]
    TooManyEntries { effect: String, capacity: usize },
    /// No effect with this name exists in the library.
    #[error("no effect named '{0}'")]
    UnknownEffect(String),
    /// An effect with this name already exists in the library.
    #[error("an effect named '{0}' already exists")]
    DuplicateEffect(String),
    /// The anchored effect was removed or never existed.
    #[error("anchored effect {0} does not exist")]
    UnknownAnchor(u64),
}

/// Errors that can occur while loading or saving a library file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read or write the file.
    #[error("failed to access library file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid library JSON.
    #[error("invalid library JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A definition references a material that is not in the file.
    #[error("definition '{definition}' references unknown material '{material}'")]
    UnknownMaterial { definition: String, material: String },
    /// An effect entry references a definition that is not in the file.
    #[error("effect '{effect}' references unknown {kind} definition '{name}'")]
    UnknownDefinition {
        effect: String,
        kind: ParticleKind,
        name: String,
    },
    /// The registry rejected a definition.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The effect library rejected an effect.
    #[error(transparent)]
    Effect(#[from] EffectError),
}

/// Errors that can occur while loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is outside its accepted range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors a material provider can report while compiling a material.
#[derive(Debug, Error)]
pub enum MaterialError {
    /// The shader source file could not be read.
    #[error("failed to read shader '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The shader source did not compile.
    #[error("shader '{path}' failed to compile: {message}")]
    Compile { path: PathBuf, message: String },
}
