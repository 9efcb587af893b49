// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5", features = ["derive"] }` in `Cargo.toml`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `devflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devflow",
    version,
    about = "Build, watch and serve a web project from a declarative target registry.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the manifest file (TOML).
    ///
    /// Default: `Devflow.toml` in the current working directory; if
    /// absent, a built-in manifest is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Destination directory for build artifacts.
    ///
    /// Default: `dist`. Required explicitly when --production is set.
    #[arg(long, value_name = "DIR")]
    pub dest: Option<String>,

    /// Port the supervised server listens on.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Production build: forbids the implicit destination default.
    #[arg(long)]
    pub production: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CommandKind,
}

/// Subcommands exposed on the CLI.
#[derive(Debug, Clone, Subcommand)]
pub enum CommandKind {
    /// Remove all build destinations.
    Clean,
    /// Clean, then build every target once.
    Build,
    /// Build once, then rebuild targets as their sources change.
    Watch,
    /// Build, start the backend server, watch, and live-reload.
    Serve,
    /// Rebuild the backend, then run the configured migration commands.
    #[command(name = "db:migrate")]
    DbMigrate,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
