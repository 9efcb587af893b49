// src/graph/scheduler.rs

use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::actions::RunContext;
use crate::errors::{DevflowError, Result};
use crate::graph::node::{Mode, NodeKind, TaskNode};
use crate::graph::record::{RunRecord, TaskStatus};

/// Executes a [`TaskNode`] graph to completion.
///
/// - Series children run strictly in order; the first failure aborts
///   the remaining siblings and becomes the composite's error.
/// - Parallel children all start concurrently; the composite waits for
///   every child to reach a terminal state (no orphaned background
///   work), then reports the earliest-declared failing child's error.
///
/// The scheduler itself is stateless between runs; each invocation
/// creates a fresh [`RunRecord`] and [`RunContext`].
#[derive(Debug, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Run the graph, reporting the first error.
    pub async fn run(&self, root: &Arc<TaskNode>) -> Result<()> {
        let record = Arc::new(Mutex::new(RunRecord::seeded_from(root)));
        let ctx = Arc::new(RunContext::new());
        let started = Instant::now();

        info!(graph = %root.name, "scheduler: run starting");

        let result = execute(Arc::clone(root), ctx, Arc::clone(&record)).await;

        let (succeeded, failed, pending) = record
            .lock()
            .expect("run record poisoned")
            .summary();

        match &result {
            Ok(()) => info!(
                graph = %root.name,
                succeeded,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "scheduler: run finished"
            ),
            Err(err) => warn!(
                graph = %root.name,
                succeeded,
                failed,
                never_started = pending,
                error = %err,
                "scheduler: run failed"
            ),
        }

        result
    }
}

type ExecFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>;

/// Recursive executor. Boxed so series/parallel can recurse and so
/// parallel children can be `tokio::spawn`ed as `'static` futures.
fn execute(
    node: Arc<TaskNode>,
    ctx: Arc<RunContext>,
    record: Arc<Mutex<RunRecord>>,
) -> ExecFuture {
    Box::pin(async move {
        set_status(&record, &node.name, TaskStatus::Running);

        let result = match &node.kind {
            NodeKind::Leaf(action) => {
                debug!(task = %node.name, "running leaf action");
                action.run(&ctx).await
            }
            NodeKind::Composite {
                mode: Mode::Series,
                children,
            } => run_series(children, &ctx, &record).await,
            NodeKind::Composite {
                mode: Mode::Parallel,
                children,
            } => run_parallel(children, &ctx, &record).await,
        };

        match result {
            Ok(()) => {
                set_status(&record, &node.name, TaskStatus::Succeeded);
                Ok(())
            }
            Err(err) => {
                warn!(task = %node.name, error = %err, "task failed");
                set_status(&record, &node.name, TaskStatus::Failed(err.to_string()));
                Err(err)
            }
        }
    })
}

async fn run_series(
    children: &[Arc<TaskNode>],
    ctx: &Arc<RunContext>,
    record: &Arc<Mutex<RunRecord>>,
) -> Result<()> {
    for child in children {
        // `?` aborts the remaining siblings: they stay Pending and are
        // never started.
        execute(Arc::clone(child), Arc::clone(ctx), Arc::clone(record)).await?;
    }
    Ok(())
}

async fn run_parallel(
    children: &[Arc<TaskNode>],
    ctx: &Arc<RunContext>,
    record: &Arc<Mutex<RunRecord>>,
) -> Result<()> {
    let handles: Vec<_> = children
        .iter()
        .map(|child| {
            tokio::spawn(execute(
                Arc::clone(child),
                Arc::clone(ctx),
                Arc::clone(record),
            ))
        })
        .collect();

    // Join barrier: every child reaches a terminal state before the
    // composite reports, even when some have already failed.
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await);
    }

    // `results` is in child declaration order, so the first error seen
    // here is the earliest-declared failure.
    for result in results {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(join_err) => {
                return Err(DevflowError::Other(anyhow!(
                    "parallel child panicked: {join_err}"
                )))
            }
        }
    }

    Ok(())
}

fn set_status(record: &Arc<Mutex<RunRecord>>, name: &str, status: TaskStatus) {
    record
        .lock()
        .expect("run record poisoned")
        .set(name, status);
}
