// src/lib.rs

pub mod actions;
pub mod cli;
pub mod config;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod plan;
pub mod registry;
pub mod serve;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::{CliArgs, CommandKind};
use crate::config::{load_and_validate, Manifest};
use crate::graph::Scheduler;
use crate::registry::{Overrides, TargetRegistry};
use crate::serve::{spawn_supervisor, BroadcastReloadNotifier, ReloadNotifier, SupervisorSettings};
use crate::watch::{arm, RebuildOutcome, WatchHandle};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading + validation
/// - the target registry (manifest + CLI overrides)
/// - per-command task graphs and the scheduler
/// - (for watch/serve) debounced file watchers
/// - (for serve) the server supervisor and live reload
pub async fn run(args: CliArgs) -> Result<()> {
    let manifest_path = args.config.as_ref().map(PathBuf::from);
    let manifest = load_and_validate(manifest_path.as_deref())?;

    let overrides = Overrides {
        dest: args.dest.clone(),
        port: args.port,
        production: args.production,
    };
    let registry = TargetRegistry::from_manifest(&manifest, &overrides)?;

    info!(
        dest = %registry.dest_root.display(),
        port = registry.port,
        production = registry.production,
        targets = registry.targets().count(),
        "registry ready"
    );

    let scheduler = Arc::new(Scheduler);

    match args.command {
        CommandKind::Clean => {
            scheduler.run(&plan::clean_graph(&registry)).await?;
        }
        CommandKind::Build => {
            scheduler.run(&plan::build_graph(&registry)).await?;
        }
        CommandKind::Watch => {
            watch_command(&manifest, &registry, scheduler).await?;
        }
        CommandKind::Serve => {
            serve_command(&manifest, &registry, scheduler).await?;
        }
        CommandKind::DbMigrate => {
            scheduler
                .run(&plan::migrate_graph(&registry, &manifest))
                .await?;
        }
    }

    Ok(())
}

/// `watch`: full build, then keep rebuilding changed targets until
/// Ctrl-C.
async fn watch_command(
    manifest: &Manifest,
    registry: &TargetRegistry,
    scheduler: Arc<Scheduler>,
) -> Result<()> {
    scheduler.run(&plan::build_graph(registry)).await?;

    let _handles = arm_all(manifest, registry, &scheduler, None)?;

    info!("watching for changes (Ctrl-C to stop)");
    tokio::signal::ctrl_c().await?;
    info!("shutting down watchers");
    Ok(())
}

/// `serve`: full build, supervised server, watchers, live reload.
async fn serve_command(
    manifest: &Manifest,
    registry: &TargetRegistry,
    scheduler: Arc<Scheduler>,
) -> Result<()> {
    scheduler.run(&plan::build_graph(registry)).await?;

    let reloader = Arc::new(BroadcastReloadNotifier::new(16));
    let settings =
        SupervisorSettings::from_server(&manifest.server, &registry.dest_root, registry.port);
    let supervisor = spawn_supervisor(settings, Arc::clone(&reloader) as Arc<dyn ReloadNotifier>);

    // A server that never comes up is fatal to `serve`.
    supervisor.start().await?;
    info!(port = registry.port, "server is up");

    let (outcome_tx, mut outcome_rx) = mpsc::channel::<RebuildOutcome>(32);
    let _handles = arm_all(manifest, registry, &scheduler, Some(outcome_tx))?;

    info!("serving (Ctrl-C to stop)");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down server and watchers");
                supervisor.shutdown().await;
                break;
            }
            Some(outcome) = outcome_rx.recv() => {
                if !outcome.ok {
                    continue;
                }
                if outcome.restart_server {
                    // Restart schedules its own reload after the
                    // settle delay.
                    if let Err(err) = supervisor.restart().await {
                        warn!(
                            target = %outcome.target,
                            error = %err,
                            "server restart after rebuild failed"
                        );
                    }
                } else {
                    reloader.clients_changed();
                }
            }
        }
    }

    Ok(())
}

/// Arm a watch session per target. A target whose subscription fails is
/// logged and skipped; only zero armed sessions is an error.
fn arm_all(
    manifest: &Manifest,
    registry: &TargetRegistry,
    scheduler: &Arc<Scheduler>,
    outcomes: Option<mpsc::Sender<RebuildOutcome>>,
) -> Result<Vec<WatchHandle>> {
    let mut handles = Vec::new();

    for target in registry.targets() {
        let graph = plan::rebuild_graph(target);
        match arm(
            Arc::clone(target),
            graph,
            Arc::clone(scheduler),
            manifest.debounce,
            outcomes.clone(),
        ) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                error!(target = %target.name, error = %err, "failed to arm watch session");
            }
        }
    }

    if handles.is_empty() {
        return Err(anyhow!("no watch session could be armed"));
    }

    Ok(handles)
}
