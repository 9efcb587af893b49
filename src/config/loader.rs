// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Built-in manifest used when no `Devflow.toml` exists. Mirrors the
/// project's conventional layout: sass-compiled styles, transpiled
/// frontend and backend scripts, and copied sql/template/static
/// assets. Backend templates are rendered server-side at runtime, so
/// they are mirrored as-is rather than precompiled.
const BUILTIN_MANIFEST: &str = r#"
[options]
port = 4000

[server]
command = "node"
entry = "backend/server.js"

[target.styles]
kind = "styles"
src = "src/styles"
globs = ["**/*.scss"]
out = "frontend/styles"
bundle = "app.css"
command = "sass"

[target.frontend-scripts]
kind = "scripts"
src = "src/app"
globs = ["**/*.js"]
out = "frontend"
bundle = "app.js"
command = "babel"

[target.backend-scripts]
kind = "scripts"
src = "src/node"
globs = ["**/*.js", "**/*.ts"]
out = "backend"
bundle = "server.js"
command = "babel"
restart_server = true

[target.backend-sql]
kind = "assets"
src = "src/node"
globs = ["**/*.sql"]
out = "backend"

[target.backend-templates]
kind = "assets"
src = "src/node"
globs = ["**/*.njn", "**/*.html"]
out = "backend"

[target.backend-assets]
kind = "assets"
src = "src/node"
globs = ["assets/**"]
out = "backend/static"
"#;

/// Load a manifest from a given path and return the raw `RawManifest`.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let manifest: RawManifest = toml::from_str(&contents)?;

    Ok(manifest)
}

/// Load and validate the manifest the CLI should use.
///
/// - With an explicit `--config` path, that file must exist.
/// - Otherwise, `Devflow.toml` in the working directory is used when
///   present, and the built-in manifest when not.
pub fn load_and_validate(path: Option<&Path>) -> Result<Manifest> {
    let raw = match path {
        Some(p) => load_from_path(p)?,
        None => {
            let default = default_manifest_path();
            if default.is_file() {
                load_from_path(&default)?
            } else {
                info!("no {:?} found; using built-in manifest", default);
                builtin_manifest()
            }
        }
    };

    Manifest::try_from(raw)
}

/// The raw built-in manifest.
pub fn builtin_manifest() -> RawManifest {
    // The literal above is part of the crate; a parse failure here is a
    // programming error, not a runtime condition.
    toml::from_str(BUILTIN_MANIFEST).expect("built-in manifest must parse")
}

/// Default manifest location: `Devflow.toml` in the current working
/// directory.
pub fn default_manifest_path() -> PathBuf {
    PathBuf::from("Devflow.toml")
}
