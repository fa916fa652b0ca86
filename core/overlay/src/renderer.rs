//! Renderer seam.
//!
//! Compositing is done elsewhere; the actor hands a complete `Frame` to a
//! `Renderer` every tick. `TraceRenderer` is the headless implementation: it
//! logs whenever the observable part of the frame changes.

use claude_fx_protocol::DisplayState;
use fx_core::animation::{Aura, EmotionOverlay, Transform};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub state: DisplayState,
    pub transform: Transform,
    pub overlays: Vec<EmotionOverlay>,
    pub message: Option<String>,
    pub animation: String,
    pub opacity: f64,
    pub aura: Aura,
    pub visible: bool,
}

pub trait Renderer {
    fn paint(&mut self, frame: &Frame);

    /// Screen position of the character, used for cursor influence.
    fn anchor(&self) -> Option<(f64, f64)> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Summary {
    state: DisplayState,
    animation: String,
    message: Option<String>,
    overlays: Vec<EmotionOverlay>,
    visible: bool,
    faded: bool,
}

impl Summary {
    fn of(frame: &Frame) -> Self {
        Self {
            state: frame.state,
            animation: frame.animation.clone(),
            message: frame.message.clone(),
            overlays: frame.overlays.clone(),
            visible: frame.visible,
            faded: frame.opacity <= 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct TraceRenderer {
    last: Option<Summary>,
    frames: u64,
}

impl TraceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_painted(&self) -> u64 {
        self.frames
    }
}

impl Renderer for TraceRenderer {
    fn paint(&mut self, frame: &Frame) {
        self.frames += 1;
        tracing::trace!(
            frame = %serde_json::to_string(frame).unwrap_or_default(),
            "Frame"
        );
        let summary = Summary::of(frame);
        if self.last.as_ref() == Some(&summary) {
            return;
        }
        tracing::info!(
            state = %frame.state,
            animation = %frame.animation,
            message = ?frame.message,
            overlays = ?frame.overlays,
            visible = frame.visible,
            opacity = frame.opacity,
            "Frame changed"
        );
        self.last = Some(summary);
    }
}
