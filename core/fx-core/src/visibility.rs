//! Visibility tracking for the overlay.
//!
//! The overlay should be on screen only while its owning terminal window is
//! in front. Window-manager information is noisy and sometimes unavailable,
//! so the decision combines three sources:
//!
//! 1. **Focus events**: deactivation hides immediately, activation schedules
//!    a debounced show check so rapid focus flips do not flicker.
//! 2. **Validation ticks**: every 500ms visibility is re-derived from the
//!    latest frontmost verdict (catches minimize and space switches that emit
//!    no event). Verdicts are computed off the tick thread and fed in with
//!    [`VisibilityTracker::on_verdict`].
//! 3. **Startup grace**: hides are suppressed for the first 1.5s so a focus
//!    event racing actor startup cannot kill the overlay.
//!
//! ```text
//! terminal_pid unknown              → hidden   (fail-closed)
//! frontmost pid ≠ terminal_pid      → hidden
//! frontmost query error             → visible  (fail-open)
//! window_id unknown                 → visible
//! first normal window of pid == id  → visible, otherwise hidden
//! window enumeration error          → visible  (fail-open)
//! ```

use std::time::{Duration, Instant};

use crate::error::Result;

pub const STARTUP_GRACE: Duration = Duration::from_millis(1500);
pub const SHOW_DEBOUNCE: Duration = Duration::from_millis(50);
pub const VALIDATION_INTERVAL: Duration = Duration::from_millis(500);
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(2);

/// Window layer used by ordinary application windows.
pub const NORMAL_WINDOW_LAYER: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: u64,
    pub owner_pid: u32,
    pub layer: i32,
}

/// Platform capability answering "who is in front".
///
/// `on_screen_windows` is ordered front to back.
pub trait FocusProbe: Send + Sync {
    fn frontmost_pid(&self) -> Result<Option<u32>>;

    fn on_screen_windows(&self) -> Result<Vec<WindowInfo>>;

    fn cursor_position(&self) -> Option<(f64, f64)> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalTarget {
    pub pid: Option<u32>,
    pub window_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusEvent {
    Activated(Option<u32>),
    Deactivated(Option<u32>),
}

pub fn first_normal_window(windows: &[WindowInfo], pid: u32) -> Option<u64> {
    windows
        .iter()
        .find(|window| window.owner_pid == pid && window.layer == NORMAL_WINDOW_LAYER)
        .map(|window| window.id)
}

/// Whether `target` is the frontmost terminal window, given the answer to the
/// frontmost query. The caller queries once and reuses the answer for focus
/// diffing.
pub fn judge_frontmost(
    frontmost: Result<Option<u32>>,
    probe: &dyn FocusProbe,
    target: TerminalTarget,
) -> bool {
    let Some(terminal_pid) = target.pid else {
        return false;
    };

    match frontmost {
        Ok(Some(pid)) if pid == terminal_pid => {}
        Ok(_) => return false,
        Err(err) => {
            tracing::debug!(error = %err, "Frontmost query failed; treating as visible");
            return true;
        }
    }

    let Some(window_id) = target.window_id else {
        return true;
    };

    // Enumeration errors fail open while unknown pids fail closed above.
    // Kept as-is until product decides otherwise.
    match probe.on_screen_windows() {
        Ok(windows) => first_normal_window(&windows, terminal_pid) == Some(window_id),
        Err(err) => {
            tracing::debug!(error = %err, "Window enumeration failed; treating as visible");
            true
        }
    }
}

#[derive(Debug)]
pub struct VisibilityTracker {
    visible: bool,
    pinned: bool,
    started_at: Instant,
    pending_show: Option<Instant>,
    verdict: Option<bool>,
    next_validation: Instant,
    next_liveness: Instant,
}

impl VisibilityTracker {
    /// `pinned` keeps the overlay visible regardless of focus.
    pub fn new(now: Instant, pinned: bool) -> Self {
        Self {
            visible: true,
            pinned,
            started_at: now,
            pending_show: None,
            verdict: None,
            next_validation: now + VALIDATION_INTERVAL,
            next_liveness: now + LIVENESS_INTERVAL,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_pending_show(&self) -> bool {
        self.pending_show.is_some()
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
        if pinned {
            self.pending_show = None;
            self.visible = true;
        }
    }

    pub fn in_grace(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) < STARTUP_GRACE
    }

    /// Returns true when the visibility flag changed.
    pub fn on_focus_event(&mut self, event: FocusEvent, target: TerminalTarget, now: Instant) -> bool {
        if self.pinned {
            return false;
        }
        match event {
            FocusEvent::Activated(pid) if pid.is_some() && pid == target.pid => {
                self.pending_show = Some(now + SHOW_DEBOUNCE);
                false
            }
            FocusEvent::Activated(_) => {
                self.pending_show = None;
                self.apply(false, now)
            }
            FocusEvent::Deactivated(pid) if pid.is_some() && pid == target.pid => {
                self.pending_show = None;
                self.apply(false, now)
            }
            FocusEvent::Deactivated(_) => false,
        }
    }

    /// Records the most recent frontmost verdict. It takes effect at the next
    /// due debounced show or validation.
    pub fn on_verdict(&mut self, frontmost: bool) {
        self.verdict = Some(frontmost);
    }

    /// Runs due debounced-show and validation checks against the latest
    /// verdict. Returns true when the visibility flag changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.pinned {
            return self.apply(true, now);
        }

        let show_due = self.pending_show.is_some_and(|deadline| now >= deadline);
        let validation_due = now >= self.next_validation;
        if !show_due && !validation_due {
            return false;
        }

        if show_due {
            self.pending_show = None;
        }
        if validation_due {
            self.next_validation = now + VALIDATION_INTERVAL;
        }

        match self.verdict {
            Some(visible) => self.apply(visible, now),
            None => false,
        }
    }

    /// True at most once per liveness interval.
    pub fn liveness_due(&mut self, now: Instant) -> bool {
        if now < self.next_liveness {
            return false;
        }
        self.next_liveness = now + LIVENESS_INTERVAL;
        true
    }

    fn apply(&mut self, visible: bool, now: Instant) -> bool {
        if !visible && self.in_grace(now) {
            return false;
        }
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }
}
