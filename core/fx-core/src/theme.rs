//! Themes, character assets and speech-bubble messages.
//!
//! A theme lives at `<root>/themes/<name>/` and may contain:
//! - `manifest.json` mapping states to animation references
//! - `messages.json` overriding the speech-bubble message lists
//!
//! A character folder (set at runtime via `CHANGE_CHARACTER`) overrides the
//! theme's animations with image files named after states.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use claude_fx_protocol::DisplayState;
use fs_err as fs;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{FxError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MESSAGES_FILE: &str = "messages.json";
pub const ASSET_EXTENSIONS: &[&str] = &["png", "gif", "webp", "jpg", "jpeg"];

const FALLBACK_ANIMATION: &str = "characters/idle.png";

pub type MessageTable = HashMap<DisplayState, Vec<String>>;

static DEFAULT_MESSAGES: Lazy<MessageTable> = Lazy::new(|| {
    let table: [(DisplayState, &[&str]); 8] = [
        (DisplayState::Idle, &["...", "Ready when you are.", "*stretches*"]),
        (
            DisplayState::Greeting,
            &["Hello!", "Let's build something!", "Ready to code!"],
        ),
        (
            DisplayState::Working,
            &["On it...", "Working...", "Hmm, let me see..."],
        ),
        (DisplayState::Success, &["Done!", "Nailed it!", "That worked!"]),
        (
            DisplayState::Error,
            &["Oops!", "That didn't work...", "Let me try again."],
        ),
        (
            DisplayState::Celebrating,
            &["We did it!", "All done!", "Woohoo!"],
        ),
        (DisplayState::Sleeping, &["Zzz...", "*snore*"]),
        (DisplayState::Farewell, &["Goodbye!", "See you soon!", "Bye!"]),
    ];
    table
        .into_iter()
        .map(|(state, messages)| {
            (
                state,
                messages.iter().map(|message| message.to_string()).collect(),
            )
        })
        .collect()
});

pub fn default_messages() -> &'static MessageTable {
    &DEFAULT_MESSAGES
}

pub fn theme_dir(root: &Path, theme: &str) -> PathBuf {
    root.join("themes").join(theme)
}

/// Loads `messages.json` from `theme_dir`, layered over the defaults.
///
/// A missing or invalid file yields the defaults; empty lists in the file are
/// ignored so every state keeps at least one message.
pub fn load_messages(theme_dir: &Path) -> MessageTable {
    let mut table = default_messages().clone();
    let path = theme_dir.join(MESSAGES_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return table,
    };

    let overrides: HashMap<String, Vec<String>> = match serde_json::from_str(&content) {
        Ok(overrides) => overrides,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Invalid messages file; using defaults");
            return table;
        }
    };

    for (key, messages) in overrides {
        let Ok(state) = key.parse::<DisplayState>() else {
            continue;
        };
        let messages: Vec<String> = messages
            .into_iter()
            .filter(|message| !message.trim().is_empty())
            .collect();
        if !messages.is_empty() {
            table.insert(state, messages);
        }
    }
    table
}

pub fn pick_message<'a, R: Rng + ?Sized>(
    table: &'a MessageTable,
    state: DisplayState,
    rng: &mut R,
) -> Option<&'a str> {
    table
        .get(&state)
        .and_then(|messages| messages.choose(rng))
        .map(String::as_str)
}

// ─────────────────────────────────────────────────────────────────────────────
// Manifest
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    states: HashMap<String, StateEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StateEntry {
    #[serde(default)]
    animation: Option<String>,
}

impl ThemeManifest {
    /// Loads `manifest.json` from `theme_dir`; missing or invalid manifests
    /// behave as empty.
    pub fn load(theme_dir: &Path) -> Self {
        let path = theme_dir.join(MANIFEST_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "Invalid theme manifest");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn animation_entry(&self, state: DisplayState) -> Option<&str> {
        self.states
            .get(state.as_str())
            .and_then(|entry| entry.animation.as_deref())
            .filter(|animation| !animation.is_empty())
    }

    /// Animation reference for `state`, falling back to idle's.
    pub fn animation_for(&self, state: DisplayState) -> String {
        self.animation_entry(state)
            .or_else(|| self.animation_entry(DisplayState::Idle))
            .unwrap_or(FALLBACK_ANIMATION)
            .to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Character folders
// ─────────────────────────────────────────────────────────────────────────────

fn is_asset(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Returns the image assets directly inside `folder`, sorted by path.
pub fn validate_character_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(FxError::CharacterFolderNotFound(folder.to_path_buf()));
    }

    let mut assets: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_asset(path))
        .collect();

    if assets.is_empty() {
        return Err(FxError::CharacterFolderEmpty(folder.to_path_buf()));
    }
    assets.sort();
    Ok(assets)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterOverride {
    folder: PathBuf,
    assets: Vec<PathBuf>,
}

impl CharacterOverride {
    pub fn load(folder: &Path) -> Result<Self> {
        let assets = validate_character_folder(folder)?;
        Ok(Self {
            folder: folder.to_path_buf(),
            assets,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn asset_named(&self, stem: &str) -> Option<&Path> {
        self.assets
            .iter()
            .find(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case(stem))
            })
            .map(PathBuf::as_path)
    }

    /// Asset for `state`, then idle's, then the first asset.
    pub fn asset_for(&self, state: DisplayState) -> &Path {
        self.asset_named(state.as_str())
            .or_else(|| self.asset_named(DisplayState::Idle.as_str()))
            .unwrap_or_else(|| self.assets[0].as_path())
    }
}

/// Resolves the animation reference the renderer should show.
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub dir: PathBuf,
    pub manifest: ThemeManifest,
    pub messages: MessageTable,
    pub character: Option<CharacterOverride>,
}

impl Theme {
    pub fn load(root: &Path, name: &str) -> Self {
        let dir = theme_dir(root, name);
        Self {
            manifest: ThemeManifest::load(&dir),
            messages: load_messages(&dir),
            character: None,
            dir,
        }
    }

    pub fn animation_for(&self, state: DisplayState) -> String {
        match &self.character {
            Some(character) => character.asset_for(state).display().to_string(),
            None => self.manifest.animation_for(state),
        }
    }
}
