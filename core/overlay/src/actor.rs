//! The overlay actor: one tick loop that owns every piece of visual state.
//!
//! Each tick:
//! 1. drain the mailbox (commands, focus events, frontmost verdicts, cursor samples)
//! 2. fire the state revert timer
//! 3. apply due visibility verdicts and run the terminal liveness guard
//! 4. expire the speech bubble and finished fades
//! 5. paint one frame
//!
//! Shutdown (command, farewell, terminal exit, overlay disabled) fades out
//! and then ends the loop; the caller runs teardown.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use claude_fx_protocol::{DisplayState, SetState};
use fx_core::animation::{cursor_influence, emotion_overlays, Fade, FADE_DURATION};
use fx_core::state_machine::state_duration;
use fx_core::theme::pick_message;
use fx_core::{
    is_pid_alive, load_settings, AnimationClock, RevertOutcome, Settings, StateMachine, Theme,
    VisibilityTracker,
};
use tracing::info;

use crate::focus_watch::TargetCell;
use crate::renderer::{Frame, Renderer};
use crate::server::{Inbound, Mailbox};

pub const TICK_INTERVAL: Duration = Duration::from_millis(16);
pub const STICKY_MESSAGE_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Requested,
    Farewell,
    TerminalGone,
    Disabled,
}

#[derive(Debug, Clone)]
struct SpeechBubble {
    text: String,
    expires_at: Instant,
}

pub struct Actor<R: Renderer> {
    plugin_root: PathBuf,
    settings: Settings,
    theme: Theme,
    machine: StateMachine,
    visibility: VisibilityTracker,
    clock: AnimationClock,
    target: Arc<TargetCell>,
    renderer: R,
    pid_alive: fn(u32) -> bool,
    bubble: Option<SpeechBubble>,
    opacity: f64,
    fade: Option<Fade>,
    cursor: Option<(f64, f64)>,
    shutdown: Option<ShutdownReason>,
}

impl<R: Renderer> Actor<R> {
    pub fn new(
        plugin_root: PathBuf,
        settings: Settings,
        target: Arc<TargetCell>,
        renderer: R,
        now: Instant,
    ) -> Self {
        let theme = Theme::load(&plugin_root, &settings.theme);
        let pinned = !settings.overlay.show_only_when_terminal_active;
        let fade = settings
            .overlay
            .fade_animation
            .then(|| Fade::new(0.0, 1.0, now, FADE_DURATION));
        Self {
            plugin_root,
            theme,
            machine: StateMachine::new(),
            visibility: VisibilityTracker::new(now, pinned),
            clock: AnimationClock::new(now),
            target,
            renderer,
            pid_alive: is_pid_alive,
            bubble: None,
            opacity: 1.0,
            fade,
            cursor: None,
            shutdown: None,
            settings,
        }
    }

    #[cfg(test)]
    pub fn with_liveness_check(mut self, pid_alive: fn(u32) -> bool) -> Self {
        self.pid_alive = pid_alive;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn current_state(&self) -> DisplayState {
        self.machine.current()
    }

    #[cfg(test)]
    pub fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.shutdown
    }

    pub fn handle(&mut self, inbound: Inbound, now: Instant) {
        if self.shutdown.is_some() {
            return;
        }
        match inbound {
            Inbound::SetState(command) => self.apply_state(command, now),
            Inbound::Shutdown => self.begin_shutdown(ShutdownReason::Requested, now),
            Inbound::ChangeCharacter(character) => {
                info!(folder = %character.folder().display(), "Character changed");
                self.theme.character = Some(character);
            }
            Inbound::ReloadSettings => self.reload_settings(now),
            Inbound::Focus(event) => {
                if self.visibility.on_focus_event(event, self.target.get(), now) {
                    self.visibility_changed(now);
                }
            }
            Inbound::Frontmost(frontmost) => self.visibility.on_verdict(frontmost),
            Inbound::Cursor(x, y) => self.cursor = Some((x, y)),
        }
    }

    fn apply_state(&mut self, command: SetState, now: Instant) {
        let mut target = self.target.get();
        if let Some(pid) = command.terminal_pid {
            target.pid = Some(pid);
        }
        if let Some(window_id) = command.terminal_window_id {
            target.window_id = Some(window_id);
        }
        self.target.set(target);

        let transition = self.machine.apply(command.state, command.tool, now);
        if self.settings.immersion.transitions {
            self.clock.start_transition(transition, now);
        } else {
            self.clock.clear_transition();
        }
        self.bubble = self.speech_bubble(command.state, now);
    }

    fn speech_bubble(&self, state: DisplayState, now: Instant) -> Option<SpeechBubble> {
        if !self.settings.speech_bubble.enabled {
            return None;
        }
        let text = pick_message(&self.theme.messages, state, &mut rand::thread_rng())?;
        let lifetime = state_duration(state).unwrap_or(STICKY_MESSAGE_DURATION);
        Some(SpeechBubble {
            text: text.to_string(),
            expires_at: now + lifetime,
        })
    }

    fn reload_settings(&mut self, now: Instant) {
        let settings = load_settings(&self.plugin_root);
        info!(theme = %settings.theme, enabled = settings.overlay.enabled, "Settings reloaded");

        if settings.theme != self.settings.theme {
            let character = self.theme.character.take();
            self.theme = Theme::load(&self.plugin_root, &settings.theme);
            self.theme.character = character;
        }
        if !settings.immersion.transitions {
            self.clock.clear_transition();
        }
        if !settings.speech_bubble.enabled {
            self.bubble = None;
        }

        let was_visible = self.visibility.is_visible();
        self.visibility
            .set_pinned(!settings.overlay.show_only_when_terminal_active);
        let enabled = settings.overlay.enabled;
        self.settings = settings;

        if was_visible != self.visibility.is_visible() {
            self.visibility_changed(now);
        }
        if !enabled {
            self.begin_shutdown(ShutdownReason::Disabled, now);
        }
    }

    fn visibility_changed(&mut self, now: Instant) {
        let target = if self.visibility.is_visible() { 1.0 } else { 0.0 };
        self.fade_to(target, now);
    }

    fn current_opacity(&self, now: Instant) -> f64 {
        self.fade
            .map(|fade| fade.opacity_at(now))
            .unwrap_or(self.opacity)
    }

    fn fade_to(&mut self, target: f64, now: Instant) {
        let from = self.current_opacity(now);
        self.fade = self
            .settings
            .overlay
            .fade_animation
            .then(|| Fade::new(from, target, now, FADE_DURATION));
        self.opacity = target;
    }

    pub fn begin_shutdown(&mut self, reason: ShutdownReason, now: Instant) {
        if self.shutdown.is_some() {
            return;
        }
        info!(?reason, "Overlay shutting down");
        self.shutdown = Some(reason);
        self.bubble = None;
        self.clock.clear_transition();
        self.fade_to(0.0, now);
    }

    pub fn tick(&mut self, now: Instant) -> Flow {
        if self.shutdown.is_none() {
            if let Some(RevertOutcome::Shutdown) = self.machine.poll(now) {
                self.begin_shutdown(ShutdownReason::Farewell, now);
            }
        }

        if self.shutdown.is_none() {
            if self.visibility.tick(now) {
                self.visibility_changed(now);
            }
            if self.visibility.liveness_due(now) {
                if let Some(pid) = self.target.get().pid {
                    if !(self.pid_alive)(pid) {
                        info!(terminal_pid = pid, "Terminal process exited");
                        self.begin_shutdown(ShutdownReason::TerminalGone, now);
                    }
                }
            }
        }

        if self
            .bubble
            .as_ref()
            .is_some_and(|bubble| now >= bubble.expires_at)
        {
            self.bubble = None;
        }
        if self.fade.is_some_and(|fade| fade.is_finished(now)) {
            self.fade = None;
        }

        let frame = self.frame(now);
        self.renderer.paint(&frame);

        if self.shutdown.is_some() && self.fade.is_none() {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    pub fn frame(&mut self, now: Instant) -> Frame {
        let state = self.machine.current();
        let cursor = self
            .cursor
            .zip(self.renderer.anchor())
            .map(|(cursor, anchor)| cursor_influence(anchor, cursor));
        let overlays = if self.settings.emotion_overlays.enabled {
            emotion_overlays(state).to_vec()
        } else {
            Vec::new()
        };

        Frame {
            state,
            transform: self.clock.sample(now, &self.settings.immersion, cursor),
            overlays,
            message: self.bubble.as_ref().map(|bubble| bubble.text.clone()),
            animation: self.theme.animation_for(state),
            opacity: self.current_opacity(now),
            aura: self.clock.aura(now),
            visible: self.visibility.is_visible(),
        }
    }
}

/// Cursor samples are only worth taking when the renderer can place the
/// character on screen.
pub fn wants_cursor_samples<R: Renderer>(settings: &Settings, renderer: &R) -> bool {
    settings.immersion.cursor_influence && renderer.anchor().is_some()
}

/// Runs the tick loop until the actor asks to exit.
pub fn run<R: Renderer>(actor: &mut Actor<R>, mailbox: &Mailbox) {
    loop {
        let now = Instant::now();
        for item in mailbox.drain() {
            actor.handle(item, now);
        }
        if actor.tick(now) == Flow::Exit {
            return;
        }
        thread::sleep(TICK_INTERVAL);
    }
}
