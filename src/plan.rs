// src/plan.rs

//! Top-level task graph composition.
//!
//! Turns the target registry into the named graphs behind each CLI
//! command. Graphs are built fresh per invocation; shared sub-steps
//! (like `clean`) are plain immutable nodes and safe to reference from
//! several parents.

use std::sync::Arc;

use crate::actions::{
    Action, CleanAction, CompileAction, CopyAction, MigrateAction, ShellCompiler,
};
use crate::config::Manifest;
use crate::graph::{leaf, parallel, series, TaskNode};
use crate::registry::{Target, TargetRegistry};

/// `clean`: remove every distinct destination directory, in parallel.
pub fn clean_graph(registry: &TargetRegistry) -> Arc<TaskNode> {
    let leaves: Vec<_> = registry
        .destinations()
        .into_iter()
        .map(|dest| {
            leaf(
                format!("clean:{}", dest.display()),
                Arc::new(CleanAction::new(dest)) as Arc<dyn Action>,
            )
        })
        .collect();

    parallel("clean", leaves)
}

/// The build leaf for one target: compile for compiled kinds, mirror
/// copy for assets.
pub fn target_leaf(target: &Arc<Target>) -> Arc<TaskNode> {
    let action: Arc<dyn Action> = if target.kind.is_compiled() {
        // Validation guarantees compiled targets carry a command.
        let command = target.command.clone().unwrap_or_default();
        let compiler = Arc::new(ShellCompiler::new(&target.name, command));
        Arc::new(CompileAction::new(Arc::clone(target), compiler))
    } else {
        Arc::new(CopyAction::new(Arc::clone(target)))
    };

    leaf(format!("build:{}", target.name), action)
}

/// `build`: clean everything, then build all targets in parallel.
pub fn build_graph(registry: &TargetRegistry) -> Arc<TaskNode> {
    let builds: Vec<_> = registry.targets().map(target_leaf).collect();

    series(
        "build",
        [clean_graph(registry), parallel("build:targets", builds)],
    )
}

/// The minimal subgraph a watcher re-runs when one target's sources
/// change. No clean here: other targets sharing the destination keep
/// their artifacts, and build leaves replace their own outputs
/// atomically.
pub fn rebuild_graph(target: &Arc<Target>) -> Arc<TaskNode> {
    target_leaf(target)
}

/// `db:migrate`: build the server-side targets, then run the
/// migration task.
pub fn migrate_graph(registry: &TargetRegistry, manifest: &Manifest) -> Arc<TaskNode> {
    // The targets flagged restart_server are the backend build; when
    // none is flagged, fall back to building everything.
    let mut backend: Vec<_> = registry
        .targets()
        .filter(|t| t.restart_server)
        .map(target_leaf)
        .collect();
    if backend.is_empty() {
        backend = registry.targets().map(target_leaf).collect();
    }

    series(
        "db:migrate",
        [
            parallel("build:backend", backend),
            leaf(
                "migrate",
                Arc::new(MigrateAction::new(manifest.migrate_commands.clone()))
                    as Arc<dyn Action>,
            ),
        ],
    )
}
