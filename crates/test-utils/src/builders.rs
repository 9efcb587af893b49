#![allow(dead_code)]

use std::collections::BTreeMap;

use devflow::config::{
    Manifest, MigrateSection, OptionsSection, RawManifest, ServerSection, TargetKind, TargetSpec,
    WatchSection,
};

/// Builder for a validated `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    raw: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawManifest {
                options: OptionsSection::default(),
                watch: WatchSection::default(),
                server: ServerSection::default(),
                migrate: MigrateSection::default(),
                target: BTreeMap::new(),
            },
        }
    }

    pub fn with_target(mut self, name: &str, spec: TargetSpec) -> Self {
        self.raw.target.insert(name.to_string(), spec);
        self
    }

    pub fn with_dest(mut self, dest: &str) -> Self {
        self.raw.options.dest = Some(dest.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.raw.options.port = Some(port);
        self
    }

    pub fn with_production(mut self, val: bool) -> Self {
        self.raw.options.production = val;
        self
    }

    pub fn with_debounce(mut self, debounce: &str) -> Self {
        self.raw.watch.debounce = debounce.to_string();
        self
    }

    pub fn with_migrate_command(mut self, command: &str) -> Self {
        self.raw.migrate.commands.push(command.to_string());
        self
    }

    pub fn with_server_command(mut self, command: &str, entry: &str) -> Self {
        self.raw.server.command = command.to_string();
        self.raw.server.entry = entry.to_string();
        self
    }

    pub fn with_ready_pattern(mut self, pattern: &str) -> Self {
        self.raw.server.ready_pattern = Some(pattern.to_string());
        self
    }

    /// The raw form, for validation-failure tests.
    pub fn build_raw(self) -> RawManifest {
        self.raw
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.raw).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetSpec`.
pub struct TargetSpecBuilder {
    spec: TargetSpec,
}

impl TargetSpecBuilder {
    pub fn new(kind: TargetKind, src: &str, out: &str) -> Self {
        Self {
            spec: TargetSpec {
                kind,
                src: src.to_string(),
                globs: vec![],
                out: out.to_string(),
                bundle: None,
                command: None,
                restart_server: false,
            },
        }
    }

    /// An assets target with a single catch-all glob.
    pub fn assets(src: &str, out: &str) -> Self {
        Self::new(TargetKind::Assets, src, out).glob("**/*")
    }

    pub fn glob(mut self, pattern: &str) -> Self {
        self.spec.globs.push(pattern.to_string());
        self
    }

    pub fn bundle(mut self, name: &str) -> Self {
        self.spec.bundle = Some(name.to_string());
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.spec.command = Some(command.to_string());
        self
    }

    pub fn restart_server(mut self, val: bool) -> Self {
        self.spec.restart_server = val;
        self
    }

    pub fn build(self) -> TargetSpec {
        self.spec
    }
}
