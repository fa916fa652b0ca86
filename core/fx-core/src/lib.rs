//! # fx-core
//!
//! Shared logic for the claude-fx overlay and its hook client.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The overlay drives everything from a
//!   single tick loop; background threads only enqueue.
//! - **Injected time**: Timers take `Instant` parameters, never read the clock.
//! - **Graceful degradation**: Missing settings, themes or messages fall back
//!   to defaults. OS focus queries that fail are treated as "visible".
//! - **Traits at the OS seams**: `ProcessTable` and `FocusProbe` have system
//!   implementations and test fakes.

pub mod animation;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod focus;
pub mod hook;
pub mod identity;
pub mod process;
pub mod state_machine;
pub mod theme;
pub mod visibility;

pub use animation::{AnimationClock, Aura, EmotionOverlay, Transform, Transition};
pub use cleanup::{run_startup_cleanup, CleanupStats};
pub use config::{load_settings, Settings};
pub use error::{FxError, Result};
pub use focus::SystemFocusProbe;
pub use hook::HookInput;
pub use identity::{SessionIdentity, SessionResolver};
pub use process::{is_pid_alive, ProcessTable, SysinfoProcessTable};
pub use state_machine::{RevertOutcome, StateMachine};
pub use theme::{CharacterOverride, Theme};
pub use visibility::{FocusEvent, FocusProbe, TerminalTarget, VisibilityTracker};

pub use claude_fx_protocol::{DisplayState, SessionId};
