// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Top-level manifest as read from a TOML file.
///
/// ```toml
/// [options]
/// dest = "dist"
/// port = 4000
///
/// [server]
/// command = "node"
/// entry = "backend/server.js"
/// ready_pattern = "listening on"
///
/// [target.styles]
/// kind = "styles"
/// src = "src/styles"
/// globs = ["**/*.scss"]
/// out = "frontend/styles"
/// bundle = "app.css"
/// command = "sass"
/// ```
///
/// All sections are optional and have defaults matching the built-in
/// manifest in [`crate::config::loader`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    #[serde(default)]
    pub options: OptionsSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub migrate: MigrateSection,

    /// All build targets from `[target.<name>]`, keyed by target name.
    #[serde(default)]
    pub target: BTreeMap<String, TargetSpec>,
}

/// `[options]` section: global build options.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OptionsSection {
    /// Build destination root. When absent the CLI default ("dist")
    /// applies, and `production = true` refuses to run.
    #[serde(default)]
    pub dest: Option<String>,

    /// Port the supervised server is expected to bind.
    #[serde(default)]
    pub port: Option<u16>,

    /// Production build. Requires an explicit destination (here or on
    /// the command line).
    #[serde(default)]
    pub production: bool,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Quiet period after the last filesystem event before a rebuild
    /// fires. Duration string, e.g. `"200ms"`.
    #[serde(default = "default_debounce")]
    pub debounce: String,
}

fn default_debounce() -> String {
    "200ms".to_string()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
        }
    }
}

/// `[server]` section: how to run and health-check the backend process.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Interpreter/launcher, e.g. `"node"`.
    #[serde(default = "default_server_command")]
    pub command: String,

    /// Entry file relative to the build destination root.
    #[serde(default = "default_server_entry")]
    pub entry: String,

    /// Optional regex matched against server stdout lines; the first
    /// match marks the server ready. Without it the server is
    /// considered ready as soon as it spawns.
    #[serde(default)]
    pub ready_pattern: Option<String>,

    /// Duration strings, e.g. `"10s"`.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: String,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,

    /// Delay between a successful (re)start and the live-reload
    /// notification, so clients don't reload against a server that is
    /// still binding its socket.
    #[serde(default = "default_settle_delay")]
    pub settle_delay: String,
}

fn default_server_command() -> String {
    "node".to_string()
}

fn default_server_entry() -> String {
    "backend/server.js".to_string()
}

fn default_startup_timeout() -> String {
    "10s".to_string()
}

fn default_shutdown_timeout() -> String {
    "5s".to_string()
}

fn default_settle_delay() -> String {
    "1s".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            command: default_server_command(),
            entry: default_server_entry(),
            ready_pattern: None,
            startup_timeout: default_startup_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            settle_delay: default_settle_delay(),
        }
    }
}

/// `[migrate]` section: shell commands run by `db:migrate`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MigrateSection {
    #[serde(default)]
    pub commands: Vec<String>,
}

/// What kind of artifact a target produces, which picks the leaf
/// action used to build it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Transpiled script bundle.
    Scripts,
    /// Compiled stylesheet bundle.
    Styles,
    /// Bundled templates.
    Templates,
    /// Files mirrored as-is into the destination.
    Assets,
}

impl TargetKind {
    /// Whether this kind runs a compiler (vs a plain copy).
    pub fn is_compiled(self) -> bool {
        !matches!(self, TargetKind::Assets)
    }
}

/// `[target.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec {
    pub kind: TargetKind,

    /// Source root the globs are evaluated under.
    pub src: String,

    /// Glob patterns relative to `src`.
    pub globs: Vec<String>,

    /// Output directory relative to the destination root.
    pub out: String,

    /// Bundle file name for compiled kinds (e.g. `"app.css"`).
    #[serde(default)]
    pub bundle: Option<String>,

    /// External compiler command for compiled kinds (e.g. `"sass"`).
    /// Source files are appended as arguments; stdout is the artifact.
    #[serde(default)]
    pub command: Option<String>,

    /// Whether a successful rebuild of this target restarts the
    /// supervised server (otherwise only a reload is signaled).
    #[serde(default)]
    pub restart_server: bool,
}

/// Validated manifest. Produced from [`RawManifest`] via `TryFrom` in
/// [`crate::config::validate`]; duration strings are parsed and the
/// ready pattern is checked to be a valid regex.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub options: OptionsSection,
    pub debounce: Duration,
    pub server: ServerSettings,
    pub migrate_commands: Vec<String>,
    pub targets: BTreeMap<String, TargetSpec>,
}

/// Parsed `[server]` settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub command: String,
    pub entry: String,
    pub ready_pattern: Option<String>,
    pub startup_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub settle_delay: Duration,
}

impl Manifest {
    /// Construct without re-validating. Only `validate` should call this.
    pub(crate) fn new_unchecked(
        options: OptionsSection,
        debounce: Duration,
        server: ServerSettings,
        migrate_commands: Vec<String>,
        targets: BTreeMap<String, TargetSpec>,
    ) -> Self {
        Self {
            options,
            debounce,
            server,
            migrate_commands,
            targets,
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
