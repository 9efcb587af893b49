// src/actions/copy.rs

use std::sync::Arc;

use tracing::{debug, info};

use crate::actions::{collect_sources, write_atomic, Action, ActionFuture, RunContext};
use crate::registry::Target;

/// Mirrors a target's matching source files into its destination,
/// preserving relative paths. Each file is written to a fresh path and
/// renamed into place.
pub struct CopyAction {
    target: Arc<Target>,
}

impl CopyAction {
    pub fn new(target: Arc<Target>) -> Self {
        Self { target }
    }
}

impl Action for CopyAction {
    fn run<'a>(&'a self, _ctx: &'a RunContext) -> ActionFuture<'a> {
        Box::pin(async move {
            let sources = collect_sources(&self.target)?;
            if sources.is_empty() {
                debug!(target = %self.target.name, "no matching files to copy");
                return Ok(());
            }

            let mut copied = 0usize;
            for src in &sources {
                let rel = src
                    .strip_prefix(&self.target.source_root)
                    .expect("collect_sources yields paths under source_root");
                let dest = self.target.destination.join(rel);
                let contents = std::fs::read(src)?;
                write_atomic(&dest, &contents)?;
                copied += 1;
            }

            info!(
                target = %self.target.name,
                files = copied,
                dest = ?self.target.destination,
                "copied assets"
            );
            Ok(())
        })
    }
}
