// src/actions/clean.rs

use std::path::PathBuf;

use tracing::{debug, info};

use crate::actions::{Action, ActionFuture, RunContext};

/// Removes a destination directory tree.
///
/// Keyed on the destination path via [`RunContext::claim_clean`], so a
/// clean leaf referenced from several graph paths removes the
/// directory at most once per run. Removing an already-absent
/// directory succeeds, which makes back-to-back cleans idempotent.
pub struct CleanAction {
    dest: PathBuf,
}

impl CleanAction {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }
}

impl Action for CleanAction {
    fn run<'a>(&'a self, ctx: &'a RunContext) -> ActionFuture<'a> {
        Box::pin(async move {
            if !ctx.claim_clean(&self.dest) {
                debug!(dest = ?self.dest, "destination already cleaned this run");
                return Ok(());
            }

            if self.dest.exists() {
                tokio::fs::remove_dir_all(&self.dest).await?;
                info!(dest = ?self.dest, "removed destination tree");
            } else {
                debug!(dest = ?self.dest, "destination absent; nothing to clean");
            }

            Ok(())
        })
    }
}
