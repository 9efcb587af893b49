// src/registry.rs

//! Static build-target registry.
//!
//! Constructed once at startup from the validated manifest plus any
//! command-line overrides, then treated as immutable. Every command's
//! task graph is derived from this registry.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::{Manifest, TargetKind};
use crate::errors::{DevflowError, Result};

pub const DEFAULT_DEST: &str = "dist";
pub const DEFAULT_PORT: u16 = 4000;

/// Command-line overrides applied on top of the manifest's `[options]`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dest: Option<String>,
    pub port: Option<u16>,
    pub production: bool,
}

/// One build target with compiled glob patterns and a resolved
/// destination directory.
pub struct Target {
    pub name: String,
    pub kind: TargetKind,
    pub source_root: PathBuf,
    glob_set: GlobSet,
    /// Resolved output directory: `<dest root>/<out>`.
    pub destination: PathBuf,
    /// Bundle file name for compiled kinds.
    pub bundle: Option<String>,
    /// External compiler command for compiled kinds.
    pub command: Option<String>,
    /// Whether a successful rebuild restarts the supervised server.
    pub restart_server: bool,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl Target {
    /// Whether a path relative to `source_root` (forward slashes, e.g.
    /// `"pages/main.scss"`) belongs to this target.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.glob_set.is_match(rel_path)
    }
}

/// Immutable registry of all build targets plus the effective global
/// options.
#[derive(Debug)]
pub struct TargetRegistry {
    targets: BTreeMap<String, Arc<Target>>,
    pub dest_root: PathBuf,
    pub port: u16,
    pub production: bool,
}

impl TargetRegistry {
    /// Build the registry from a validated manifest and CLI overrides.
    ///
    /// Fails fast with `Configuration` when `production` is requested
    /// without an explicit destination: producing a production build
    /// into an implicit location is treated as unsafe.
    pub fn from_manifest(manifest: &Manifest, overrides: &Overrides) -> Result<Self> {
        let explicit_dest = overrides
            .dest
            .clone()
            .or_else(|| manifest.options.dest.clone());
        let production = overrides.production || manifest.options.production;

        if production && explicit_dest.is_none() {
            return Err(DevflowError::Configuration(
                "production build requires an explicit destination (--dest)".to_string(),
            ));
        }

        let dest_root = PathBuf::from(
            explicit_dest.unwrap_or_else(|| DEFAULT_DEST.to_string()),
        );
        let port = overrides
            .port
            .or(manifest.options.port)
            .unwrap_or(DEFAULT_PORT);

        let mut targets = BTreeMap::new();
        for (name, spec) in manifest.targets.iter() {
            let glob_set = build_globset(name, &spec.globs)?;
            let target = Target {
                name: name.clone(),
                kind: spec.kind,
                source_root: PathBuf::from(&spec.src),
                glob_set,
                destination: dest_root.join(&spec.out),
                bundle: spec.bundle.clone(),
                command: spec.command.clone(),
                restart_server: spec.restart_server,
            };
            targets.insert(name.clone(), Arc::new(target));
        }

        Ok(Self {
            targets,
            dest_root,
            port,
            production,
        })
    }

    /// Look up a target by name.
    pub fn resolve(&self, name: &str) -> Result<&Arc<Target>> {
        self.targets
            .get(name)
            .ok_or_else(|| DevflowError::UnknownTarget(name.to_string()))
    }

    /// All targets in name order.
    pub fn targets(&self) -> impl Iterator<Item = &Arc<Target>> {
        self.targets.values()
    }

    /// Distinct destination directories across all targets, in a
    /// stable order.
    pub fn destinations(&self) -> Vec<PathBuf> {
        let mut dests: Vec<PathBuf> = self
            .targets
            .values()
            .map(|t| t.destination.clone())
            .collect();
        dests.sort();
        dests.dedup();
        dests
    }
}

fn build_globset(target: &str, patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|e| {
            DevflowError::Configuration(format!(
                "target '{target}' has invalid glob pattern '{pat}': {e}"
            ))
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| {
        DevflowError::Configuration(format!(
            "target '{target}': failed to compile glob set: {e}"
        ))
    })
}
