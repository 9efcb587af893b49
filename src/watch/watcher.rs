// src/watch/watcher.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::{DevflowError, Result};
use crate::graph::{Scheduler, TaskNode};
use crate::registry::Target;
use crate::watch::session::{SessionEffect, WatchSession};

/// Handle for one armed watch session.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the
/// handle tears the session down.
pub struct WatchHandle {
    pub target: String,
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Outcome of one watcher-triggered rebuild, reported to `serve`.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub target: String,
    pub ok: bool,
    pub restart_server: bool,
}

/// Arm a debounced watch session for one target.
///
/// Subscribes to filesystem events under `target.source_root`
/// (recursive), filtered by the target's globs, and re-runs `graph`
/// through the scheduler after each quiet period. A successful return
/// is the session's readiness report: the subscription is established
/// before this function returns. Subscription failure is a
/// `WatchError` fatal only to this target's session.
pub fn arm(
    target: Arc<Target>,
    graph: Arc<TaskNode>,
    scheduler: Arc<Scheduler>,
    debounce: Duration,
    outcomes: Option<mpsc::Sender<RebuildOutcome>>,
) -> Result<WatchHandle> {
    let root = target.source_root.clone();
    // Canonicalize once for stable prefix-stripping of event paths.
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Bridge from notify's blocking callback into the async world.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => {
                // tracing is unavailable inside notify's thread here.
                eprintln!("devflow: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .map_err(|e| DevflowError::Watch(format!("creating watcher for '{}': {e}", target.name)))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| {
            DevflowError::Watch(format!(
                "subscribing to {:?} for target '{}': {e}",
                root, target.name
            ))
        })?;

    // Readiness: reported exactly once per session.
    info!(target = %target.name, root = ?root, "watch session ready");

    tokio::spawn(session_loop(
        Arc::clone(&target),
        canonical_root.into(),
        graph,
        scheduler,
        debounce,
        event_rx,
        outcomes,
    ));

    Ok(WatchHandle {
        target: target.name.clone(),
        _inner: watcher,
    })
}

async fn session_loop(
    target: Arc<Target>,
    canonical_root: Arc<Path>,
    graph: Arc<TaskNode>,
    scheduler: Arc<Scheduler>,
    debounce: Duration,
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    outcomes: Option<mpsc::Sender<RebuildOutcome>>,
) {
    let mut session = WatchSession::new(debounce);
    let mut deadline: Option<Instant> = None;

    loop {
        // Biased: events already queued are consumed before an expired
        // quiet-period timer, so a burst straddling the timer boundary
        // still coalesces into one rebuild.
        let effect = tokio::select! {
            biased;

            maybe_event = event_rx.recv() => {
                match maybe_event {
                    None => break,
                    Some(event) => {
                        if !qualifies(&target, &canonical_root, &event) {
                            continue;
                        }
                        debug!(target = %target.name, ?event, "qualifying change event");
                        session.on_file_event()
                    }
                }
            }
            _ = sleep_until_opt(deadline), if deadline.is_some() => {
                deadline = None;
                session.on_quiet_elapsed()
            }
        };

        match effect {
            SessionEffect::ArmTimer(window) => {
                deadline = Some(Instant::now() + window);
            }
            SessionEffect::StartRebuild => {
                info!(target = %target.name, "quiet period elapsed; rebuilding");

                // Rebuilds run inline on this loop, which is what
                // enforces single-rebuild-in-flight: events arriving
                // meanwhile buffer in the channel and coalesce after.
                let ok = match scheduler.run(&graph).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(
                            target = %target.name,
                            error = %err,
                            "rebuild failed; previous artifacts left in place"
                        );
                        false
                    }
                };

                if let SessionEffect::ArmTimer(window) = session.on_rebuild_finished(ok) {
                    deadline = Some(Instant::now() + window);
                }

                if let Some(tx) = &outcomes {
                    let _ = tx
                        .send(RebuildOutcome {
                            target: target.name.clone(),
                            ok,
                            restart_server: target.restart_server,
                        })
                        .await;
                }
            }
            SessionEffect::Nothing => {}
        }
    }

    debug!(target = %target.name, "watch session loop finished");
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        // Guarded by `deadline.is_some()` in the select.
        None => std::future::pending().await,
    }
}

/// Whether an event is a create/modify/remove touching a path that
/// matches this target's globs.
fn qualifies(target: &Target, canonical_root: &Path, event: &Event) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }

    event.paths.iter().any(|path| {
        let rel = path
            .strip_prefix(canonical_root)
            .or_else(|_| path.strip_prefix(&target.source_root));
        match rel {
            Ok(rel) => {
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                target.matches(&rel_str)
            }
            Err(_) => false,
        }
    })
}
