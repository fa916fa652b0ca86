//! Hook event handling and the one-shot control subcommands.
//!
//! Reads the hook JSON from stdin, maps it to a display state and delivers a
//! `SET_STATE` to the session's overlay, spawning the overlay when none
//! answers. Nothing here may fail the host: every failure is logged and
//! swallowed by `main`.

use claude_fx_protocol::{ChangeCharacter, Command, DisplayState, Reply, SetState};
use fs_err as fs;
use fx_core::config::{self, socket_path};
use fx_core::{
    load_settings, HookInput, SessionIdentity, SessionResolver, SysinfoProcessTable,
    SystemFocusProbe,
};
use std::env;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

use crate::overlay_client::{self, DeliveryError};

const ENABLE_ENV: &str = "CLAUDE_FX_ENABLED";

pub fn run() -> Result<(), String> {
    if !hook_enabled() {
        let _ = io::stdin().read_to_end(&mut Vec::new());
        return Ok(());
    }

    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .map_err(|e| format!("Failed to read stdin: {}", e))?;

    let Some(input) = HookInput::parse(&raw) else {
        return Ok(());
    };
    handle_input(&input)
}

fn handle_input(input: &HookInput) -> Result<(), String> {
    let Some(state) = input.target_state() else {
        tracing::debug!("Skipping hook input without event name");
        return Ok(());
    };

    let root = config::plugin_root().map_err(|e| e.to_string())?;
    if !load_settings(&root).overlay.enabled {
        tracing::debug!(state = %state, "Overlay disabled; not contacting overlay");
        return Ok(());
    }

    let Some(identity) = resolve_identity() else {
        tracing::debug!(
            event = ?input.event_name(),
            "Skipping event (session unresolved)"
        );
        return Ok(());
    };

    let runtime_dir = config::runtime_dir().map_err(|e| e.to_string())?;
    let socket = socket_path(&runtime_dir, identity.session_id);
    let command = state_command(input, &identity).ok_or("event has no target state")?;

    let binary = overlay_client::overlay_binary();
    let spawn = spawns_overlay(state).then(|| || overlay_client::spawn_overlay(&binary, &identity));

    match overlay_client::deliver(&socket, &command, spawn) {
        Ok(reply) if reply.is_success() => {
            tracing::debug!(
                event = ?input.event_name(),
                state = %state,
                session = %identity.session_id,
                "Overlay accepted state"
            );
            Ok(())
        }
        Ok(reply) => Err(format!(
            "Overlay rejected state: {}",
            reply.message.unwrap_or_default()
        )),
        Err(err) if !spawns_overlay(state) => {
            tracing::debug!(error = %err, "No overlay to say farewell to");
            Ok(())
        }
        Err(err) => Err(format!("Failed to deliver state: {}", err)),
    }
}

/// `CLAUDE_FX_ENABLED=0` turns the hook into a no-op.
fn hook_enabled() -> bool {
    match env::var(ENABLE_ENV) {
        Ok(value) => !is_disabled_value(&value),
        Err(_) => true,
    }
}

fn is_disabled_value(value: &str) -> bool {
    matches!(
        value.trim(),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF"
    )
}

/// Farewell never starts an overlay just to say goodbye.
fn spawns_overlay(state: DisplayState) -> bool {
    state != DisplayState::Farewell
}

pub fn state_command(input: &HookInput, identity: &SessionIdentity) -> Option<Command> {
    let state = input.target_state()?;
    Some(Command::SetState(SetState {
        state,
        tool: input.tool_name.clone(),
        terminal_pid: Some(identity.terminal_pid),
        terminal_window_id: identity.terminal_window_id,
    }))
}

fn resolve_identity() -> Option<SessionIdentity> {
    let probe = SystemFocusProbe::new();
    let mut resolver = SessionResolver::new(SysinfoProcessTable::new());
    resolver.resolve(std::process::id(), Some(&probe), Instant::now())
}

/// Sends a control command to this session's running overlay. Never spawns.
fn send_to_session(command: Command) -> Reply {
    let Some(identity) = resolve_identity() else {
        return Reply::error("cannot determine terminal session");
    };
    let runtime_dir = match config::runtime_dir() {
        Ok(dir) => dir,
        Err(err) => return Reply::error(err.to_string()),
    };
    let socket = socket_path(&runtime_dir, identity.session_id);

    match overlay_client::send(&socket, &command) {
        Ok(reply) => reply,
        Err(DeliveryError::Connect { .. }) => Reply::error("overlay is not running"),
        Err(err) => Reply::error(err.to_string()),
    }
}

pub fn change_character(folder: &Path) -> Reply {
    let folder = match fs::canonicalize(folder) {
        Ok(folder) => folder,
        Err(err) => return Reply::error(format!("character folder not found: {}", err)),
    };
    send_to_session(Command::ChangeCharacter(ChangeCharacter {
        folder: folder.to_string_lossy().into_owned(),
    }))
}

pub fn reload_settings() -> Reply {
    send_to_session(Command::ReloadSettings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claude_fx_protocol::SessionId;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            session_id: SessionId(4242),
            terminal_pid: 4000,
            terminal_window_id: Some(77),
        }
    }

    #[test]
    fn post_tool_use_failure_becomes_error_state() {
        let input = HookInput::parse(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Read","tool_result":{"output":"ENOENT: no such file"}}"#,
        )
        .unwrap();

        let command = state_command(&input, &identity()).unwrap();
        assert_eq!(
            command,
            Command::SetState(SetState {
                state: DisplayState::Error,
                tool: Some("Read".to_string()),
                terminal_pid: Some(4000),
                terminal_window_id: Some(77),
            })
        );
    }

    #[test]
    fn tool_response_key_is_honoured() {
        let input = HookInput::parse(
            r#"{"hook_event_name":"PostToolUse","tool_response":{"output":"Build succeeded"}}"#,
        )
        .unwrap();

        let Some(Command::SetState(set)) = state_command(&input, &identity()) else {
            panic!("expected SET_STATE");
        };
        assert_eq!(set.state, DisplayState::Success);
    }

    #[test]
    fn missing_event_name_produces_no_command() {
        let input = HookInput::parse(r#"{"tool_name":"Bash"}"#).unwrap();
        assert!(state_command(&input, &identity()).is_none());
    }

    #[test]
    fn only_farewell_skips_spawning() {
        for state in DisplayState::ALL {
            assert_eq!(spawns_overlay(state), state != DisplayState::Farewell);
        }
    }

    #[test]
    fn disabled_values() {
        assert!(is_disabled_value("0"));
        assert!(is_disabled_value(" false "));
        assert!(!is_disabled_value("1"));
        assert!(!is_disabled_value(""));
    }

    #[test]
    fn missing_character_folder_is_an_error_reply() {
        let dir = tempfile::tempdir().unwrap();
        let reply = change_character(&dir.path().join("missing"));
        assert!(!reply.is_success());
        assert!(reply
            .message
            .unwrap_or_default()
            .contains("character folder not found"));
    }
}
