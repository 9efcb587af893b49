// src/config/validate.rs

use std::collections::HashMap;

use regex::Regex;

use crate::config::model::{
    parse_duration, Manifest, RawManifest, ServerSettings, TargetSpec,
};
use crate::errors::{DevflowError, Result};

impl TryFrom<RawManifest> for Manifest {
    type Error = DevflowError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_targets(&raw)?;

        let debounce = parse_duration(&raw.watch.debounce).map_err(|e| {
            DevflowError::Configuration(format!("[watch].debounce: {e}"))
        })?;

        let server = validate_server(&raw)?;

        Ok(Manifest::new_unchecked(
            raw.options,
            debounce,
            server,
            raw.migrate.commands,
            raw.target,
        ))
    }
}

fn validate_server(raw: &RawManifest) -> Result<ServerSettings> {
    if let Some(ref pat) = raw.server.ready_pattern {
        Regex::new(pat).map_err(|e| {
            DevflowError::Configuration(format!(
                "[server].ready_pattern is not a valid regex: {e}"
            ))
        })?;
    }

    let dur = |field: &str, value: &str| {
        parse_duration(value).map_err(|e| {
            DevflowError::Configuration(format!("[server].{field}: {e}"))
        })
    };

    Ok(ServerSettings {
        command: raw.server.command.clone(),
        entry: raw.server.entry.clone(),
        ready_pattern: raw.server.ready_pattern.clone(),
        startup_timeout: dur("startup_timeout", &raw.server.startup_timeout)?,
        shutdown_timeout: dur("shutdown_timeout", &raw.server.shutdown_timeout)?,
        settle_delay: dur("settle_delay", &raw.server.settle_delay)?,
    })
}

fn validate_targets(raw: &RawManifest) -> Result<()> {
    if raw.target.is_empty() {
        return Err(DevflowError::Configuration(
            "manifest must contain at least one [target.<name>] section".to_string(),
        ));
    }

    for (name, spec) in raw.target.iter() {
        validate_target(name, spec)?;
    }

    ensure_no_destination_races(raw)?;

    Ok(())
}

fn validate_target(name: &str, spec: &TargetSpec) -> Result<()> {
    if spec.src.trim().is_empty() {
        return Err(DevflowError::Configuration(format!(
            "target '{name}' has an empty src"
        )));
    }
    if spec.globs.is_empty() {
        return Err(DevflowError::Configuration(format!(
            "target '{name}' has no glob patterns"
        )));
    }
    if spec.out.trim().is_empty() {
        return Err(DevflowError::Configuration(format!(
            "target '{name}' has an empty out directory"
        )));
    }

    if spec.kind.is_compiled() {
        if spec.command.is_none() {
            return Err(DevflowError::Configuration(format!(
                "target '{name}' is a compiled kind but has no `command`"
            )));
        }
        if spec.bundle.is_none() {
            return Err(DevflowError::Configuration(format!(
                "target '{name}' is a compiled kind but has no `bundle` file name"
            )));
        }
    }

    Ok(())
}

/// Two targets may share an `out` directory only if they cannot write
/// the same output path: compiled targets sharing a directory must use
/// distinct bundle names, and no two targets sharing a directory may
/// repeat a glob pattern.
fn ensure_no_destination_races(raw: &RawManifest) -> Result<()> {
    let mut by_out: HashMap<&str, Vec<(&str, &TargetSpec)>> = HashMap::new();
    for (name, spec) in raw.target.iter() {
        by_out
            .entry(spec.out.as_str())
            .or_default()
            .push((name.as_str(), spec));
    }

    for (out, entries) in by_out {
        if entries.len() < 2 {
            continue;
        }

        let mut bundles: HashMap<&str, &str> = HashMap::new();
        let mut patterns: HashMap<&str, &str> = HashMap::new();

        for (name, spec) in entries {
            if let Some(ref bundle) = spec.bundle {
                if let Some(other) = bundles.insert(bundle.as_str(), name) {
                    return Err(DevflowError::Configuration(format!(
                        "targets '{other}' and '{name}' both write bundle '{bundle}' under '{out}'"
                    )));
                }
            }
            for pat in &spec.globs {
                if let Some(other) = patterns.insert(pat.as_str(), name) {
                    return Err(DevflowError::Configuration(format!(
                        "targets '{other}' and '{name}' both watch '{pat}' into '{out}'"
                    )));
                }
            }
        }
    }

    Ok(())
}
