//! Command-backed focus probe.
//!
//! Queries the window system through small helper programs (`osascript` on
//! macOS, `xdotool` on X11). A missing helper marks the probe unavailable so
//! later calls fail fast; callers treat failures as "visible".

use std::io::ErrorKind;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FxError, Result};
use crate::visibility::{FocusProbe, WindowInfo, NORMAL_WINDOW_LAYER};

#[derive(Debug, Default)]
pub struct SystemFocusProbe {
    unavailable: AtomicBool,
}

impl SystemFocusProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(FxError::FocusUnavailable(format!("{program} not installed")));
        }
        let output = match Command::new(program).args(args).output() {
            Ok(output) => output,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(program, "Focus helper not found; disabling focus queries");
                self.unavailable.store(true, Ordering::Relaxed);
                return Err(FxError::FocusUnavailable(format!("{program} not installed")));
            }
            Err(err) => {
                return Err(FxError::CommandFailed {
                    command: program.to_string(),
                    details: err.to_string(),
                })
            }
        };
        if !output.status.success() {
            return Err(FxError::CommandFailed {
                command: program.to_string(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(target_os = "macos")]
impl FocusProbe for SystemFocusProbe {
    fn frontmost_pid(&self) -> Result<Option<u32>> {
        let output = self.run(
            "osascript",
            &[
                "-e",
                "tell application \"System Events\" to get unix id of first application process whose frontmost is true",
            ],
        )?;
        Ok(parse_pid(&output))
    }

    fn on_screen_windows(&self) -> Result<Vec<WindowInfo>> {
        Err(FxError::FocusUnavailable(
            "window enumeration is not available without Quartz".to_string(),
        ))
    }
}

#[cfg(not(target_os = "macos"))]
impl FocusProbe for SystemFocusProbe {
    fn frontmost_pid(&self) -> Result<Option<u32>> {
        let output = self.run("xdotool", &["getactivewindow", "getwindowpid"])?;
        Ok(parse_pid(&output))
    }

    /// X11 exposes no cheap front-to-back listing, but the active window is
    /// by definition the frontmost one, which is all visibility needs.
    fn on_screen_windows(&self) -> Result<Vec<WindowInfo>> {
        let window = self.run("xdotool", &["getactivewindow"])?;
        let pid = self.run("xdotool", &["getactivewindow", "getwindowpid"])?;
        match (window.parse::<u64>().ok(), parse_pid(&pid)) {
            (Some(id), Some(owner_pid)) => Ok(vec![WindowInfo {
                id,
                owner_pid,
                layer: NORMAL_WINDOW_LAYER,
            }]),
            _ => Ok(Vec::new()),
        }
    }

    fn cursor_position(&self) -> Option<(f64, f64)> {
        let output = self.run("xdotool", &["getmouselocation", "--shell"]).ok()?;
        parse_mouse_location(&output)
    }
}

fn parse_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}

#[cfg_attr(target_os = "macos", allow(dead_code))]
fn parse_mouse_location(output: &str) -> Option<(f64, f64)> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        match line.split_once('=') {
            Some(("X", value)) => x = value.trim().parse::<f64>().ok(),
            Some(("Y", value)) => y = value.trim().parse::<f64>().ok(),
            _ => {}
        }
    }
    Some((x?, y?))
}
