// src/watch/session.rs

use std::time::Duration;

/// Effect the IO shell should apply after feeding an input into the
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    /// (Re)arm the quiet-period timer for this window.
    ArmTimer(Duration),
    /// Begin exactly one rebuild now.
    StartRebuild,
    Nothing,
}

/// Debounce state for one watched target.
///
/// Single-writer: only the target's own session loop feeds inputs, in
/// the order it observes them. The state machine guarantees:
///
/// - a burst of events within one debounce window coalesces into one
///   rebuild, triggered after the window elapses quietly;
/// - events arriving while a rebuild is in flight coalesce into
///   exactly one follow-up rebuild, started through a fresh quiet
///   period once the in-flight rebuild finishes;
/// - at most one rebuild is ever in flight per target.
#[derive(Debug)]
pub struct WatchSession {
    debounce: Duration,
    pending_change: bool,
    timer_armed: bool,
    rebuild_in_flight: bool,
    last_rebuild_ok: Option<bool>,
}

impl WatchSession {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending_change: false,
            timer_armed: false,
            rebuild_in_flight: false,
            last_rebuild_ok: None,
        }
    }

    pub fn rebuild_in_flight(&self) -> bool {
        self.rebuild_in_flight
    }

    pub fn pending_change(&self) -> bool {
        self.pending_change
    }

    /// Outcome of the most recent rebuild, if any.
    pub fn last_rebuild_ok(&self) -> Option<bool> {
        self.last_rebuild_ok
    }

    /// A qualifying filesystem event arrived.
    pub fn on_file_event(&mut self) -> SessionEffect {
        self.pending_change = true;

        if self.rebuild_in_flight {
            // Coalesce; the follow-up is scheduled when the in-flight
            // rebuild finishes.
            return SessionEffect::Nothing;
        }

        self.timer_armed = true;
        SessionEffect::ArmTimer(self.debounce)
    }

    /// The quiet-period timer elapsed with no further events.
    pub fn on_quiet_elapsed(&mut self) -> SessionEffect {
        if !self.timer_armed {
            return SessionEffect::Nothing;
        }
        self.timer_armed = false;

        if self.rebuild_in_flight || !self.pending_change {
            return SessionEffect::Nothing;
        }

        self.pending_change = false;
        self.rebuild_in_flight = true;
        SessionEffect::StartRebuild
    }

    /// The in-flight rebuild reached a terminal state.
    pub fn on_rebuild_finished(&mut self, ok: bool) -> SessionEffect {
        self.rebuild_in_flight = false;
        self.last_rebuild_ok = Some(ok);

        if self.pending_change {
            // Changes arrived mid-rebuild: exactly one follow-up, via
            // a fresh quiet period.
            self.timer_armed = true;
            return SessionEffect::ArmTimer(self.debounce);
        }

        SessionEffect::Nothing
    }
}
