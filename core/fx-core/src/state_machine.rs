//! Display state machine.
//!
//! Temporal states (greeting, success, error, celebrating, farewell) revert
//! after a fixed duration; sticky states (idle, working, sleeping) hold until
//! replaced. There is exactly one revert deadline slot: every `apply` clears
//! it before possibly re-arming, so a superseded timer can never fire.

use std::time::{Duration, Instant};

use claude_fx_protocol::DisplayState;

use crate::animation::Transition;

pub const TEMPORAL_STATE_DURATION: Duration = Duration::from_secs(3);

pub fn state_duration(state: DisplayState) -> Option<Duration> {
    match state {
        DisplayState::Idle | DisplayState::Working | DisplayState::Sleeping => None,
        DisplayState::Greeting
        | DisplayState::Success
        | DisplayState::Error
        | DisplayState::Celebrating
        | DisplayState::Farewell => Some(TEMPORAL_STATE_DURATION),
    }
}

pub fn is_sticky(state: DisplayState) -> bool {
    state_duration(state).is_none()
}

pub fn transition_for(state: DisplayState) -> Transition {
    match state {
        DisplayState::Greeting => Transition::ScalePop {
            scale: 1.15,
            duration: Duration::from_millis(500),
        },
        DisplayState::Working => Transition::ScalePop {
            scale: 1.05,
            duration: Duration::from_millis(300),
        },
        DisplayState::Success => Transition::Bounce {
            height: 15.0,
            duration: Duration::from_millis(600),
        },
        DisplayState::Error => Transition::Shake {
            intensity: 8.0,
            cycles: 4,
            duration: Duration::from_millis(500),
        },
        DisplayState::Celebrating => Transition::Bounce {
            height: 25.0,
            duration: Duration::from_millis(800),
        },
        DisplayState::Farewell => Transition::ScalePop {
            scale: 1.1,
            duration: Duration::from_millis(500),
        },
        DisplayState::Idle | DisplayState::Sleeping => Transition::None,
    }
}

/// What a fired revert timer asks the actor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    Idle,
    Shutdown,
}

#[derive(Debug)]
pub struct StateMachine {
    current: DisplayState,
    tool: Option<String>,
    revert_at: Option<Instant>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: DisplayState::Idle,
            tool: None,
            revert_at: None,
        }
    }

    pub fn current(&self) -> DisplayState {
        self.current
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    pub fn revert_deadline(&self) -> Option<Instant> {
        self.revert_at
    }

    /// Sets `state`, resetting the revert timer. Returns the transition the
    /// clock should play.
    pub fn apply(&mut self, state: DisplayState, tool: Option<String>, now: Instant) -> Transition {
        self.revert_at = None;
        self.current = state;
        self.tool = tool;
        if let Some(duration) = state_duration(state) {
            self.revert_at = Some(now + duration);
        }
        tracing::debug!(state = %state, revert_at = ?self.revert_at, "Applied display state");
        transition_for(state)
    }

    /// Fires the revert timer if it is due.
    pub fn poll(&mut self, now: Instant) -> Option<RevertOutcome> {
        let deadline = self.revert_at?;
        if now < deadline {
            return None;
        }
        self.revert_at = None;

        if self.current == DisplayState::Farewell {
            return Some(RevertOutcome::Shutdown);
        }
        if is_sticky(self.current) {
            return None;
        }
        self.current = DisplayState::Idle;
        self.tool = None;
        Some(RevertOutcome::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    #[test]
    fn durations_match_state_kinds() {
        for state in [DisplayState::Idle, DisplayState::Working, DisplayState::Sleeping] {
            assert!(is_sticky(state), "{state} should be sticky");
        }
        for state in [
            DisplayState::Greeting,
            DisplayState::Success,
            DisplayState::Error,
            DisplayState::Celebrating,
            DisplayState::Farewell,
        ] {
            assert_eq!(state_duration(state), Some(TEMPORAL_STATE_DURATION));
        }
    }

    #[test]
    fn transition_table_is_well_formed() {
        assert_eq!(transition_for(DisplayState::Greeting).kind(), "scale_pop");
        assert_eq!(transition_for(DisplayState::Success).kind(), "bounce");
        assert_eq!(transition_for(DisplayState::Error).kind(), "shake");
        assert_eq!(transition_for(DisplayState::Idle), Transition::None);
        assert_eq!(transition_for(DisplayState::Sleeping), Transition::None);

        for state in DisplayState::ALL {
            match transition_for(state) {
                Transition::None => {}
                Transition::Bounce { height, duration } => {
                    assert!(height > 0.0);
                    assert!(!duration.is_zero());
                }
                Transition::ScalePop { scale, duration } => {
                    assert!(scale > 1.0);
                    assert!(!duration.is_zero());
                }
                Transition::Shake {
                    intensity,
                    cycles,
                    duration,
                } => {
                    assert!(intensity > 0.0);
                    assert!(cycles > 0);
                    assert!(!duration.is_zero());
                }
            }
        }
    }

    #[test]
    fn temporal_state_reverts_at_duration() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new();
        machine.apply(DisplayState::Success, Some("Bash".to_string()), t0);

        assert_eq!(machine.poll(t0 + secs(2.99)), None);
        assert_eq!(machine.current(), DisplayState::Success);
        assert_eq!(machine.tool(), Some("Bash"));

        assert_eq!(machine.poll(t0 + secs(3.0)), Some(RevertOutcome::Idle));
        assert_eq!(machine.current(), DisplayState::Idle);
        assert_eq!(machine.tool(), None);
        assert_eq!(machine.poll(t0 + secs(10.0)), None);
    }

    #[test]
    fn reapplying_resets_revert_timer() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new();
        machine.apply(DisplayState::Success, None, t0);
        machine.apply(DisplayState::Success, None, t0 + secs(2.0));

        assert_eq!(machine.poll(t0 + secs(4.0)), None);
        assert_eq!(machine.current(), DisplayState::Success);
        assert_eq!(machine.poll(t0 + secs(5.0)), Some(RevertOutcome::Idle));
    }

    #[test]
    fn sticky_state_cancels_pending_revert() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new();
        machine.apply(DisplayState::Error, None, t0);
        machine.apply(DisplayState::Working, Some("Read".to_string()), t0 + secs(1.0));

        assert_eq!(machine.revert_deadline(), None);
        assert_eq!(machine.poll(t0 + secs(60.0)), None);
        assert_eq!(machine.current(), DisplayState::Working);
    }

    #[test]
    fn farewell_revert_requests_shutdown() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new();
        machine.apply(DisplayState::Farewell, None, t0);

        assert_eq!(machine.poll(t0 + secs(2.5)), None);
        assert_eq!(machine.poll(t0 + secs(3.0)), Some(RevertOutcome::Shutdown));
        assert_eq!(machine.current(), DisplayState::Farewell);
        assert_eq!(machine.poll(t0 + secs(4.0)), None);
    }
}
