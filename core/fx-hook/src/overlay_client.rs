//! Client side of the overlay control channel.
//!
//! One request per connection. Delivery failures never surface to the hook's
//! exit code; the caller decides whether a missing overlay should be spawned.

use claude_fx_protocol::{
    decode_reply, read_line, write_line, Command, ErrorInfo, Reply, MAX_REQUEST_BYTES,
};
use fx_core::SessionIdentity;
use std::env;
use std::io;
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{self, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;

const OVERLAY_BIN_ENV: &str = "CLAUDE_FX_OVERLAY_BIN";
const OVERLAY_BIN_NAME: &str = "fx-overlay";
const IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Delays between retries after spawning a fresh overlay.
pub const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(200),
    Duration::from_millis(400),
];

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("cannot connect to {}: {source}", .path.display())]
    Connect { path: PathBuf, source: io::Error },

    #[error("failed to write request: {0}")]
    Write(#[source] io::Error),

    #[error("bad reply: {0}")]
    Reply(#[from] ErrorInfo),

    #[error("failed to spawn overlay: {0}")]
    Spawn(#[source] io::Error),
}

/// Sends one command and reads its reply.
///
/// An `{"status":"error"}` reply is still a delivered reply and comes back as
/// `Ok`.
pub fn send(socket: &Path, command: &Command) -> Result<Reply, DeliveryError> {
    let mut stream = UnixStream::connect(socket).map_err(|source| DeliveryError::Connect {
        path: socket.to_path_buf(),
        source,
    })?;
    let _ = stream.set_read_timeout(Some(IO_TIMEOUT));
    let _ = stream.set_write_timeout(Some(IO_TIMEOUT));

    write_line(&mut stream, command).map_err(DeliveryError::Write)?;
    let frame = read_line(&mut stream, MAX_REQUEST_BYTES)?;
    Ok(decode_reply(&frame)?)
}

/// Sends `command`, spawning an overlay and retrying with backoff when no
/// overlay answers. Without a spawner the first failure is final.
pub fn deliver<F>(socket: &Path, command: &Command, spawn: Option<F>) -> Result<Reply, DeliveryError>
where
    F: FnOnce() -> io::Result<()>,
{
    let first = match send(socket, command) {
        Ok(reply) => return Ok(reply),
        Err(err) => err,
    };

    let Some(spawn) = spawn else {
        return Err(first);
    };
    tracing::debug!(error = %first, command = command.name(), "Overlay unreachable; spawning");
    spawn().map_err(DeliveryError::Spawn)?;

    let mut last = first;
    for delay in RETRY_BACKOFF {
        thread::sleep(delay);
        match send(socket, command) {
            Ok(reply) => return Ok(reply),
            Err(err) => last = err,
        }
    }
    Err(last)
}

pub fn overlay_binary() -> PathBuf {
    if let Some(path) = env::var_os(OVERLAY_BIN_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(path);
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(OVERLAY_BIN_NAME)))
        .unwrap_or_else(|| PathBuf::from(OVERLAY_BIN_NAME))
}

/// Launches a detached overlay for `identity`.
///
/// The child gets its own process group so terminal job control signals aimed
/// at the hook do not reach it.
pub fn spawn_overlay(binary: &Path, identity: &SessionIdentity) -> io::Result<()> {
    let mut command = process::Command::new(binary);
    command
        .arg("--session")
        .arg(identity.session_id.to_string())
        .arg("--terminal-pid")
        .arg(identity.terminal_pid.to_string());
    if let Some(window_id) = identity.terminal_window_id {
        command.arg("--window-id").arg(window_id.to_string());
    }
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()?;

    tracing::info!(
        pid = child.id(),
        session = %identity.session_id,
        binary = %binary.display(),
        "Spawned overlay"
    );
    Ok(())
}
