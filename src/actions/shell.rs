// src/actions/shell.rs

use anyhow::anyhow;
use tokio::process::Command;
use tracing::{debug, info};

use crate::actions::{Action, ActionFuture, RunContext};
use crate::errors::{DevflowError, Result};

/// Runs a list of shell commands in order, stopping at the first
/// failure.
pub struct ShellAction {
    label: String,
    commands: Vec<String>,
}

impl ShellAction {
    pub fn new(label: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            label: label.into(),
            commands,
        }
    }
}

impl Action for ShellAction {
    fn run<'a>(&'a self, _ctx: &'a RunContext) -> ActionFuture<'a> {
        Box::pin(async move {
            for command in &self.commands {
                run_command(&self.label, command).await?;
            }
            Ok(())
        })
    }
}

/// Run one command through the platform shell, inheriting stdio.
pub(crate) async fn run_command(label: &str, command: &str) -> Result<()> {
    debug!(task = %label, cmd = %command, "running shell command");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    let status = cmd.status().await?;

    if !status.success() {
        return Err(DevflowError::Other(anyhow!(
            "command '{command}' exited with {}",
            status.code().unwrap_or(-1)
        )));
    }

    info!(task = %label, cmd = %command, "shell command finished");
    Ok(())
}
