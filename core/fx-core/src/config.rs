//! Paths and settings.
//!
//! Runtime files (sockets, pid markers, logs) live in `~/.claude-fx`.
//! Settings and themes live in the plugin root, which defaults to the runtime
//! directory when no plugin root is provided by the environment.

use claude_fx_protocol::SessionId;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{FxError, Result};

pub const RUNTIME_DIR_ENV: &str = "CLAUDE_FX_DIR";
pub const ROOT_ENV: &str = "CLAUDE_FX_ROOT";
pub const PLUGIN_ROOT_ENV: &str = "CLAUDE_PLUGIN_ROOT";
pub const SETTINGS_FILE: &str = "settings-fx.json";

const RUNTIME_DIR_NAME: &str = ".claude-fx";

/// Returns the runtime directory (`~/.claude-fx` unless overridden).
pub fn runtime_dir() -> Result<PathBuf> {
    if let Some(path) = env::var_os(RUNTIME_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(FxError::HomeDirNotFound)?;
    Ok(home.join(RUNTIME_DIR_NAME))
}

/// Returns the plugin root holding `settings-fx.json` and `themes/`.
pub fn plugin_root() -> Result<PathBuf> {
    for key in [ROOT_ENV, PLUGIN_ROOT_ENV] {
        if let Some(path) = env::var_os(key).filter(|value| !value.is_empty()) {
            return Ok(PathBuf::from(path));
        }
    }
    runtime_dir()
}

pub fn socket_path(runtime_dir: &Path, session: SessionId) -> PathBuf {
    runtime_dir.join(session.socket_file_name())
}

pub fn marker_path(runtime_dir: &Path, session: SessionId) -> PathBuf {
    runtime_dir.join(session.marker_file_name())
}

pub fn logs_dir(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join("logs")
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub overlay: OverlaySettings,
    pub immersion: ImmersionSettings,
    pub emotion_overlays: Toggle,
    pub speech_bubble: Toggle,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overlay: OverlaySettings::default(),
            immersion: ImmersionSettings::default(),
            emotion_overlays: Toggle::default(),
            speech_bubble: Toggle::default(),
            theme: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlaySettings {
    pub enabled: bool,
    pub show_only_when_terminal_active: bool,
    pub fade_animation: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            show_only_when_terminal_active: true,
            fade_animation: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImmersionSettings {
    pub floating: bool,
    pub breathing: bool,
    pub sway: bool,
    pub cursor_influence: bool,
    pub transitions: bool,
}

impl Default for ImmersionSettings {
    fn default() -> Self {
        Self {
            floating: true,
            breathing: true,
            sway: true,
            cursor_influence: true,
            transitions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    pub enabled: bool,
}

impl Default for Toggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Loads settings from `root`, returning defaults if the file is missing or
/// malformed.
pub fn load_settings(root: &Path) -> Settings {
    match try_load_settings(root) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring unreadable settings; using defaults");
            Settings::default()
        }
    }
}

pub fn try_load_settings(root: &Path) -> Result<Settings> {
    let path = settings_path(root);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(err) => return Err(FxError::io("reading settings", err)),
    };
    serde_json::from_str(&content).map_err(|err| FxError::ConfigMalformed {
        path,
        details: err.to_string(),
    })
}
