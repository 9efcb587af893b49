// src/actions/compile.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, info};

use crate::actions::{collect_sources, write_atomic, Action, ActionFuture, RunContext};
use crate::errors::{DevflowError, Result};
use crate::registry::Target;

/// External compiler/transpiler boundary: source files in, artifact
/// bytes out. Implementations are treated as pure functions by the
/// scheduler; they carry no build state of their own.
pub trait Compiler: Send + Sync {
    fn compile<'a>(
        &'a self,
        sources: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;
}

/// Production compiler that shells out to the configured tool (e.g.
/// `sass`, `babel`) with the source files as arguments and captures
/// stdout as the artifact.
pub struct ShellCompiler {
    target: String,
    command: String,
}

impl ShellCompiler {
    pub fn new(target: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            command: command.into(),
        }
    }
}

impl Compiler for ShellCompiler {
    fn compile<'a>(
        &'a self,
        sources: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            let mut parts = self.command.split_whitespace();
            let program = parts.next().ok_or_else(|| {
                DevflowError::Configuration(format!(
                    "target '{}' has an empty compiler command",
                    self.target
                ))
            })?;

            let mut cmd = Command::new(program);
            cmd.args(parts).args(sources);

            debug!(target = %self.target, tool = %program, files = sources.len(), "invoking compiler");

            let output = cmd.output().await.map_err(|e| DevflowError::Compile {
                target: self.target.clone(),
                message: format!("failed to spawn '{}': {e}", self.command),
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(DevflowError::Compile {
                    target: self.target.clone(),
                    message: format!(
                        "'{}' exited with {}: {}",
                        self.command,
                        output.status.code().unwrap_or(-1),
                        stderr.trim()
                    ),
                });
            }

            Ok(output.stdout)
        })
    }
}

/// Builds a compiled target: gather matching sources, run the
/// compiler, write the bundle to a fresh file and rename it over the
/// previous artifact.
pub struct CompileAction {
    target: Arc<Target>,
    compiler: Arc<dyn Compiler>,
}

impl CompileAction {
    pub fn new(target: Arc<Target>, compiler: Arc<dyn Compiler>) -> Self {
        Self { target, compiler }
    }
}

impl Action for CompileAction {
    fn run<'a>(&'a self, _ctx: &'a RunContext) -> ActionFuture<'a> {
        Box::pin(async move {
            let sources = collect_sources(&self.target)?;
            if sources.is_empty() {
                debug!(target = %self.target.name, "no sources matched; skipping compile");
                return Ok(());
            }

            let bundle = self.target.bundle.as_deref().ok_or_else(|| {
                DevflowError::Configuration(format!(
                    "target '{}' has no bundle file name",
                    self.target.name
                ))
            })?;

            let artifact = self.compiler.compile(&sources).await?;

            let out_path = self.target.destination.join(bundle);
            write_atomic(&out_path, &artifact)?;

            info!(
                target = %self.target.name,
                sources = sources.len(),
                bytes = artifact.len(),
                artifact = ?out_path,
                "compiled bundle"
            );
            Ok(())
        })
    }
}
