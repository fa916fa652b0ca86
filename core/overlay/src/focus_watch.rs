//! Background focus watcher.
//!
//! Every OS focus query happens on this thread. Each poll turns changes of
//! the frontmost application into `Deactivated`/`Activated` events, then
//! enqueues a frontmost verdict for the current terminal target. The tick
//! loop only ever applies what arrives in the mailbox.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fx_core::visibility::judge_frontmost;
use fx_core::{FocusEvent, FocusProbe, TerminalTarget};

use crate::server::{Inbound, Mailbox};

pub const FOCUS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Terminal target published by the actor for the watcher to evaluate.
#[derive(Debug, Default)]
pub struct TargetCell {
    target: Mutex<TerminalTarget>,
}

impl TargetCell {
    pub fn new(target: TerminalTarget) -> Self {
        Self {
            target: Mutex::new(target),
        }
    }

    pub fn get(&self) -> TerminalTarget {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, target: TerminalTarget) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = target;
    }
}

/// Diffs successive frontmost-pid observations.
#[derive(Debug, Default)]
pub struct FocusWatcher {
    last: Option<Option<u32>>,
}

impl FocusWatcher {
    /// The first observation only sets the baseline.
    pub fn observe(&mut self, frontmost: Option<u32>) -> Vec<FocusEvent> {
        let previous = self.last.replace(frontmost);
        match previous {
            Some(previous) if previous != frontmost => vec![
                FocusEvent::Deactivated(previous),
                FocusEvent::Activated(frontmost),
            ],
            _ => Vec::new(),
        }
    }

    /// One poll: focus transitions first, then the verdict for `target`.
    ///
    /// A failed frontmost query yields no events; the verdict still follows
    /// the fail-open rule.
    pub fn poll(&mut self, probe: &dyn FocusProbe, target: TerminalTarget) -> Vec<Inbound> {
        let frontmost = probe.frontmost_pid();
        let mut inbound: Vec<Inbound> = match &frontmost {
            Ok(pid) => self.observe(*pid).into_iter().map(Inbound::Focus).collect(),
            Err(_) => Vec::new(),
        };
        inbound.push(Inbound::Frontmost(judge_frontmost(frontmost, probe, target)));
        inbound
    }
}

pub fn spawn(
    probe: Arc<dyn FocusProbe>,
    mailbox: Arc<Mailbox>,
    running: Arc<AtomicBool>,
    target: Arc<TargetCell>,
    sample_cursor: bool,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("fx-focus".to_string())
        .spawn(move || {
            let mut watcher = FocusWatcher::default();
            while running.load(Ordering::SeqCst) {
                for item in watcher.poll(probe.as_ref(), target.get()) {
                    mailbox.push(item);
                }
                if sample_cursor {
                    if let Some((x, y)) = probe.cursor_position() {
                        mailbox.push(Inbound::Cursor(x, y));
                    }
                }
                thread::sleep(FOCUS_POLL_INTERVAL);
            }
        })
}
