// src/config/mod.rs

//! Manifest loading and validation.
//!
//! - [`model`] holds the raw (serde) and validated manifest types.
//! - [`loader`] reads the TOML manifest, falling back to the built-in
//!   default manifest when no file is present.
//! - [`validate`] turns a [`model::RawManifest`] into a checked
//!   [`model::Manifest`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{builtin_manifest, default_manifest_path, load_and_validate, load_from_path};
pub use model::{
    parse_duration, Manifest, MigrateSection, OptionsSection, RawManifest, ServerSection,
    ServerSettings, TargetKind, TargetSpec, WatchSection,
};
