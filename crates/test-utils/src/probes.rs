#![allow(dead_code)]

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use devflow::actions::{Action, ActionFuture, RunContext};
use devflow::errors::{DevflowError, Result};
use devflow::serve::ReloadNotifier;

/// Shared event log for probe actions, recording start/end markers in
/// the order the scheduler drove them.
#[derive(Debug, Default, Clone)]
pub struct ProbeLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl ProbeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }
}

/// A probe action that records `"<name>:start"` / `"<name>:end"` in a
/// shared log, optionally sleeping and optionally failing.
pub struct ProbeAction {
    name: String,
    log: ProbeLog,
    delay: Option<Duration>,
    fail: bool,
}

impl ProbeAction {
    pub fn new(name: &str, log: ProbeLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            delay: None,
            fail: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Action for ProbeAction {
    fn run<'a>(&'a self, _ctx: &'a RunContext) -> ActionFuture<'a> {
        Box::pin(async move {
            self.log.record(format!("{}:start", self.name));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                self.log.record(format!("{}:fail", self.name));
                return Err(DevflowError::Other(anyhow!(
                    "probe '{}' failed as configured",
                    self.name
                )));
            }
            self.log.record(format!("{}:end", self.name));
            Ok(())
        })
    }
}

/// A fake compiler that concatenates its input file names into the
/// artifact instead of running an external tool.
pub struct FakeCompiler {
    pub invocations: Arc<Mutex<Vec<Vec<PathBuf>>>>,
    fail: bool,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            invocations: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

impl Default for FakeCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl devflow::actions::Compiler for FakeCompiler {
    fn compile<'a>(
        &'a self,
        sources: &'a [PathBuf],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            self.invocations.lock().unwrap().push(sources.to_vec());
            if self.fail {
                return Err(DevflowError::Compile {
                    target: "fake".to_string(),
                    message: "fake compiler failure".to_string(),
                });
            }
            let mut out = Vec::new();
            for src in sources {
                out.extend_from_slice(src.to_string_lossy().as_bytes());
                out.push(b'\n');
            }
            Ok(out)
        })
    }
}

/// Counts live-reload notifications.
#[derive(Debug, Default)]
pub struct RecordingReloader {
    count: AtomicUsize,
}

impl RecordingReloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ReloadNotifier for RecordingReloader {
    fn clients_changed(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
