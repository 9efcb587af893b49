// src/actions/mod.rs

//! Leaf actions executed by the scheduler.
//!
//! Each action is an atomic build step behind the [`Action`] trait:
//! clean, copy, compile, run-shell, migrate. Production actions talk
//! to the real filesystem and external tools; tests substitute probe
//! implementations to exercise scheduler semantics without builds.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;

use crate::errors::{DevflowError, Result};
use crate::registry::Target;

pub mod clean;
pub mod compile;
pub mod copy;
pub mod migrate;
pub mod shell;

pub use clean::CleanAction;
pub use compile::{CompileAction, Compiler, ShellCompiler};
pub use copy::CopyAction;
pub use migrate::MigrateAction;
pub use shell::ShellAction;

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// An atomic build step.
///
/// Implementations must be idempotent with respect to re-invocation: a
/// rebuild after a partial failure must not corrupt destination
/// artifacts. Writers achieve this by producing a fresh output file
/// and renaming it over the previous artifact.
pub trait Action: Send + Sync {
    fn run<'a>(&'a self, ctx: &'a RunContext) -> ActionFuture<'a>;
}

/// Per-run shared state handed to every action.
///
/// Currently this only tracks which destination paths have already
/// been cleaned, so that a "clean" leaf shared by multiple graph paths
/// removes a destination at most once per run.
#[derive(Debug, Default)]
pub struct RunContext {
    cleaned: Mutex<HashSet<PathBuf>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once per destination path per run.
    pub fn claim_clean(&self, dest: &Path) -> bool {
        let mut cleaned = self.cleaned.lock().expect("cleaned set poisoned");
        cleaned.insert(dest.to_path_buf())
    }
}

/// Collect all files under `target.source_root` matching the target's
/// globs, sorted for deterministic compiler invocations.
pub fn collect_sources(target: &Target) -> Result<Vec<PathBuf>> {
    let root = &target.source_root;
    let mut files = Vec::new();

    if !root.is_dir() {
        return Ok(files);
    }

    let mut stack = vec![root.clone()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if target.matches(&rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Write `contents` next to `path` and rename into place, so a
/// partially written artifact is never observable at `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // The scratch name appends to the full file name: same-stem
    // siblings like `app.js` and `app.css` must not share a scratch
    // path when written concurrently into one directory.
    let Some(name) = path.file_name() else {
        return Err(DevflowError::Configuration(format!(
            "artifact path {path:?} has no file name"
        )));
    };
    let mut tmp_name = name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
