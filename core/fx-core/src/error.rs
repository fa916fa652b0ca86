//! Error types for fx-core operations.

use std::path::PathBuf;

/// All errors that can occur in fx-core operations.
#[derive(Debug, thiserror::Error)]
pub enum FxError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Theme Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Character folder not found: {0}")]
    CharacterFolderNotFound(PathBuf),

    #[error("Character folder has no usable assets: {0}")]
    CharacterFolderEmpty(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // Channel Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Control channel already owned by a live overlay: {0}")]
    ChannelInUse(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // Platform Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Focus query unavailable: {0}")]
    FocusUnavailable(String),

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl FxError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        FxError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using FxError.
pub type Result<T> = std::result::Result<T, FxError>;

impl From<FxError> for String {
    fn from(err: FxError) -> String {
        err.to_string()
    }
}
