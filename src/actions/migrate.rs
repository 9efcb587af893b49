// src/actions/migrate.rs

use tracing::info;

use crate::actions::shell::run_command;
use crate::actions::{Action, ActionFuture, RunContext};
use crate::errors::DevflowError;

/// Terminal migration task: runs the manifest's `[migrate].commands`
/// against the external database. Migration bookkeeping lives in the
/// database itself, not here.
pub struct MigrateAction {
    commands: Vec<String>,
}

impl MigrateAction {
    pub fn new(commands: Vec<String>) -> Self {
        Self { commands }
    }
}

impl Action for MigrateAction {
    fn run<'a>(&'a self, _ctx: &'a RunContext) -> ActionFuture<'a> {
        Box::pin(async move {
            if self.commands.is_empty() {
                return Err(DevflowError::Configuration(
                    "no migration commands configured under [migrate]".to_string(),
                ));
            }

            for command in &self.commands {
                run_command("db:migrate", command).await?;
            }

            info!(commands = self.commands.len(), "migrations applied");
            Ok(())
        })
    }
}
