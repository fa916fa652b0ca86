//! Animation clock.
//!
//! Everything here is a pure function of elapsed time. The clock only keeps
//! its start instant and the one transient effect that may be running; the
//! effect expires on its own once its duration has elapsed.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

use claude_fx_protocol::DisplayState;
use serde::Serialize;

use crate::config::ImmersionSettings;

pub const FLOAT_AMPLITUDE: f64 = 3.0;
pub const FLOAT_PERIOD: f64 = 2.5;
pub const BREATH_INTENSITY: f64 = 0.008;
pub const BREATH_PERIOD: f64 = 3.5;
pub const SWAY_ANGLE: f64 = 1.5;
pub const SWAY_PERIOD: f64 = 4.0;

pub const CURSOR_TILT_MAX: f64 = 5.0;
pub const CURSOR_SHIFT_MAX: f64 = 4.0;
pub const CURSOR_FALLOFF: f64 = 300.0;

pub const AURA_MIN_RADIUS: f64 = 8.0;
pub const AURA_MAX_RADIUS: f64 = 14.0;
pub const AURA_PERIOD: f64 = 2.0;
pub const AURA_OPACITY: f64 = 0.35;
pub const AURA_COLOR: [f64; 4] = [1.0, 0.85, 0.45, 1.0];

pub const FADE_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub rotation_deg: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rotation_deg: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Easing
// ─────────────────────────────────────────────────────────────────────────────

pub fn ease_out_bounce(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;

    let t = t.clamp(0.0, 1.0);
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

/// Elastic ease-out; overshoots 1.0 before settling.
pub fn ease_out_elastic(t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let c4 = (2.0 * PI) / 3.0;
    2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Transitions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    None,
    Bounce { height: f64, duration: Duration },
    Shake { intensity: f64, cycles: u32, duration: Duration },
    ScalePop { scale: f64, duration: Duration },
}

impl Transition {
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::None => "none",
            Transition::Bounce { .. } => "bounce",
            Transition::Shake { .. } => "shake",
            Transition::ScalePop { .. } => "scale_pop",
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Transition::None => None,
            Transition::Bounce { duration, .. }
            | Transition::Shake { duration, .. }
            | Transition::ScalePop { duration, .. } => Some(*duration),
        }
    }

    /// Adds this transition's contribution at `progress` (0..=1).
    fn apply(&self, progress: f64, transform: &mut Transform) {
        match *self {
            Transition::None => {}
            Transition::Bounce { height, .. } => {
                transform.offset_y -= height * (1.0 - ease_out_bounce(progress));
            }
            Transition::Shake {
                intensity, cycles, ..
            } => {
                let decay = 1.0 - progress;
                transform.offset_x += intensity * decay * (2.0 * PI * cycles as f64 * progress).sin();
            }
            Transition::ScalePop { scale, .. } => {
                let factor = scale - (scale - 1.0) * ease_out_elastic(progress);
                transform.scale_x *= factor;
                transform.scale_y *= factor;
            }
        }
    }
}

/// A transition running since `started_at`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientEffect {
    transition: Transition,
    started_at: Instant,
    duration: Duration,
}

impl TransientEffect {
    /// Returns `None` for `Transition::None`.
    pub fn start(transition: Transition, now: Instant) -> Option<Self> {
        let duration = transition.duration().filter(|d| !d.is_zero())?;
        Some(Self {
            transition,
            started_at: now,
            duration,
        })
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }

    /// Progress in `0..1`, or `None` once expired.
    pub fn progress(&self, now: Instant) -> Option<f64> {
        if self.is_expired(now) {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        Some(elapsed.as_secs_f64() / self.duration.as_secs_f64())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cursor & aura
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorInfluence {
    pub tilt_deg: f64,
    pub shift_x: f64,
    pub shift_y: f64,
}

/// Tilt and lean toward the cursor, fading linearly to zero at
/// `CURSOR_FALLOFF` pixels.
pub fn cursor_influence(anchor: (f64, f64), cursor: (f64, f64)) -> CursorInfluence {
    let dx = cursor.0 - anchor.0;
    let dy = cursor.1 - anchor.1;
    let distance = (dx * dx + dy * dy).sqrt();
    if distance >= CURSOR_FALLOFF || distance <= f64::EPSILON {
        return CursorInfluence::default();
    }

    let strength = 1.0 - distance / CURSOR_FALLOFF;
    CursorInfluence {
        tilt_deg: CURSOR_TILT_MAX * strength * (dx / distance),
        shift_x: CURSOR_SHIFT_MAX * strength * (dx / distance),
        shift_y: CURSOR_SHIFT_MAX * strength * (dy / distance),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aura {
    pub radius: f64,
    pub opacity: f64,
    pub color: [f64; 4],
}

pub fn aura_at(elapsed_secs: f64) -> Aura {
    let phase = (1.0 - (2.0 * PI * elapsed_secs / AURA_PERIOD).cos()) / 2.0;
    Aura {
        radius: AURA_MIN_RADIUS + (AURA_MAX_RADIUS - AURA_MIN_RADIUS) * phase,
        opacity: AURA_OPACITY * (0.5 + 0.5 * phase),
        color: AURA_COLOR,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Emotion overlays
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionOverlay {
    SweatDrop,
    Sparkle,
    Star,
    Zzz,
    FocusLines,
}

pub fn emotion_overlays(state: DisplayState) -> &'static [EmotionOverlay] {
    match state {
        DisplayState::Error => &[EmotionOverlay::SweatDrop],
        DisplayState::Success => &[EmotionOverlay::Sparkle],
        DisplayState::Celebrating => &[EmotionOverlay::Sparkle, EmotionOverlay::Star],
        DisplayState::Sleeping => &[EmotionOverlay::Zzz],
        DisplayState::Working => &[EmotionOverlay::FocusLines],
        DisplayState::Idle | DisplayState::Greeting | DisplayState::Farewell => &[],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fade
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    from: f64,
    to: f64,
    started_at: Instant,
    duration: Duration,
}

impl Fade {
    pub fn new(from: f64, to: f64, now: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started_at: now,
            duration,
        }
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }

    pub fn opacity_at(&self, now: Instant) -> f64 {
        if self.duration.is_zero() || self.is_finished(now) {
            return self.to;
        }
        let progress = now.saturating_duration_since(self.started_at).as_secs_f64()
            / self.duration.as_secs_f64();
        self.from + (self.to - self.from) * progress
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Continuous idle motion at `elapsed_secs`.
pub fn base_motion(elapsed_secs: f64, immersion: &ImmersionSettings) -> Transform {
    let mut transform = Transform::default();
    if immersion.floating {
        transform.offset_y = FLOAT_AMPLITUDE * (2.0 * PI * elapsed_secs / FLOAT_PERIOD).sin();
    }
    if immersion.breathing {
        transform.scale_y = 1.0 + BREATH_INTENSITY * (2.0 * PI * elapsed_secs / BREATH_PERIOD).sin();
    }
    if immersion.sway {
        transform.rotation_deg = SWAY_ANGLE * (2.0 * PI * elapsed_secs / SWAY_PERIOD).sin();
    }
    transform
}

#[derive(Debug)]
pub struct AnimationClock {
    started_at: Instant,
    effect: Option<TransientEffect>,
}

impl AnimationClock {
    pub fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            effect: None,
        }
    }

    pub fn elapsed_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started_at).as_secs_f64()
    }

    /// Replaces any running effect.
    pub fn start_transition(&mut self, transition: Transition, now: Instant) {
        self.effect = TransientEffect::start(transition, now);
    }

    pub fn clear_transition(&mut self) {
        self.effect = None;
    }

    pub fn active_transition(&self, now: Instant) -> Option<Transition> {
        self.effect
            .filter(|effect| !effect.is_expired(now))
            .map(|effect| effect.transition())
    }

    pub fn sample(
        &mut self,
        now: Instant,
        immersion: &ImmersionSettings,
        cursor: Option<CursorInfluence>,
    ) -> Transform {
        let mut transform = base_motion(self.elapsed_secs(now), immersion);

        if immersion.cursor_influence {
            if let Some(cursor) = cursor {
                transform.rotation_deg += cursor.tilt_deg;
                transform.offset_x += cursor.shift_x;
                transform.offset_y += cursor.shift_y;
            }
        }

        match self.effect.and_then(|effect| effect.progress(now).map(|p| (effect, p))) {
            Some((effect, progress)) => effect.transition().apply(progress, &mut transform),
            None => self.effect = None,
        }

        transform
    }

    pub fn aura(&self, now: Instant) -> Aura {
        aura_at(self.elapsed_secs(now))
    }
}
