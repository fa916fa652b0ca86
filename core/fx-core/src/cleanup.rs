//! Startup cleanup of stale control channels and legacy files.
//!
//! A control channel is a socket `sock-<id>.sock` plus a marker
//! `sock-<id>.pid` holding the owner pid. An overlay that was killed without
//! running teardown leaves both behind; the next overlay to start reclaims
//! them before binding its own channel.

use std::io::ErrorKind;
use std::os::unix::net::UnixStream;
use std::path::Path;

use claude_fx_protocol::SessionId;
use fs_err as fs;
use walkdir::WalkDir;

use crate::process::is_pid_alive;

const LEGACY_FILE_NAMES: &[&str] = &["state.json", "overlay.pid"];
const LEGACY_PREFIXES: &[(&str, &str)] = &[
    ("state-", ".json"),
    ("overlay-", ".pid"),
    ("overlay-", ".lock"),
];

/// Results from a cleanup operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    /// Stale sockets removed.
    pub channels_removed: u32,
    /// Markers removed, with or without a socket.
    pub markers_removed: u32,
    pub legacy_files_removed: u32,
    pub errors: Vec<String>,
}

impl CleanupStats {
    fn merge(&mut self, other: CleanupStats) {
        self.channels_removed += other.channels_removed;
        self.markers_removed += other.markers_removed;
        self.legacy_files_removed += other.legacy_files_removed;
        self.errors.extend(other.errors);
    }
}

pub fn read_marker_pid(marker: &Path) -> Option<u32> {
    fs::read_to_string(marker)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}

/// Returns true when no live overlay owns the channel at `socket`.
///
/// A dead recorded owner makes the channel stale. A live owner with its
/// socket in place is trusted without connecting, so other sessions never see
/// an empty request. Without a marker the socket is stale when nothing accepts
/// connections on it.
pub fn channel_is_stale(socket: &Path, marker: &Path) -> bool {
    match read_marker_pid(marker) {
        Some(pid) if !is_pid_alive(pid) => return true,
        Some(_) if socket.exists() => return false,
        _ => {}
    }
    match UnixStream::connect(socket) {
        Ok(_) => false,
        Err(err) => matches!(
            err.kind(),
            ErrorKind::ConnectionRefused | ErrorKind::NotFound
        ),
    }
}

fn remove_file(path: &Path, stats: &mut CleanupStats) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            stats.errors.push(err.to_string());
            false
        }
    }
}

/// Unlinks a channel judged stale, unless its marker no longer names `owner`
/// because a new overlay claimed the session in the meantime.
fn reclaim_channel(socket: &Path, marker: &Path, owner: Option<u32>, stats: &mut CleanupStats) {
    if read_marker_pid(marker) != owner {
        tracing::debug!(socket = %socket.display(), "Channel reclaimed by another overlay; keeping it");
        return;
    }
    if remove_file(socket, stats) {
        stats.channels_removed += 1;
    }
    if remove_file(marker, stats) {
        stats.markers_removed += 1;
    }
}

/// Removes the socket and marker of every stale channel in `runtime_dir`.
pub fn reclaim_orphans(runtime_dir: &Path) -> CleanupStats {
    let mut stats = CleanupStats::default();

    for entry in WalkDir::new(runtime_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };

        if let Some(session) = SessionId::from_socket_file_name(name) {
            let socket = entry.path();
            let marker = runtime_dir.join(session.marker_file_name());
            let owner = read_marker_pid(&marker);
            if !channel_is_stale(socket, &marker) {
                continue;
            }
            tracing::info!(session = %session, "Reclaiming stale control channel");
            reclaim_channel(socket, &marker, owner, &mut stats);
            continue;
        }

        // A marker whose socket is gone is stale once its owner has exited.
        if let Some(session) = SessionId::from_marker_file_name(name) {
            let marker = entry.path();
            let socket = runtime_dir.join(session.socket_file_name());
            if socket.exists() {
                continue;
            }
            let owner_alive = read_marker_pid(marker).is_some_and(is_pid_alive);
            if !owner_alive && remove_file(marker, &mut stats) {
                stats.markers_removed += 1;
            }
        }
    }

    stats
}

fn is_legacy_file(name: &str) -> bool {
    LEGACY_FILE_NAMES.contains(&name)
        || LEGACY_PREFIXES.iter().any(|(prefix, suffix)| {
            name.len() > prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        })
}

/// Removes state and pid files left by the file-polling overlay.
pub fn cleanup_legacy_files(runtime_dir: &Path) -> CleanupStats {
    let mut stats = CleanupStats::default();
    for entry in WalkDir::new(runtime_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
    {
        let is_legacy = entry.file_name().to_str().is_some_and(is_legacy_file);
        if is_legacy && remove_file(entry.path(), &mut stats) {
            stats.legacy_files_removed += 1;
        }
    }
    stats
}

/// Performs all startup cleanup for `runtime_dir`.
pub fn run_startup_cleanup(runtime_dir: &Path) -> CleanupStats {
    let mut stats = reclaim_orphans(runtime_dir);
    stats.merge(cleanup_legacy_files(runtime_dir));
    if !stats.errors.is_empty() {
        tracing::warn!(errors = ?stats.errors, "Startup cleanup hit errors");
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    /// Binds and drops a listener, leaving a socket file nobody accepts on.
    fn abandoned_socket(path: &Path) {
        let listener = UnixListener::bind(path).unwrap();
        drop(listener);
    }

    #[test]
    fn removes_channel_with_dead_owner() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId(4242);
        let socket = dir.path().join(session.socket_file_name());
        let marker = dir.path().join(session.marker_file_name());
        abandoned_socket(&socket);
        std::fs::write(&marker, dead_pid().to_string()).unwrap();

        let stats = reclaim_orphans(dir.path());
        assert_eq!(stats.channels_removed, 1);
        assert_eq!(stats.markers_removed, 1);
        assert!(!socket.exists());
        assert!(!marker.exists());
    }

    #[test]
    fn removes_refused_channel_without_marker() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join(SessionId(7).socket_file_name());
        abandoned_socket(&socket);

        let stats = reclaim_orphans(dir.path());
        assert_eq!(stats.channels_removed, 1);
        assert!(!socket.exists());
    }

    #[test]
    fn keeps_live_channel() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId(8);
        let socket = dir.path().join(session.socket_file_name());
        let marker = dir.path().join(session.marker_file_name());
        let _listener = UnixListener::bind(&socket).unwrap();
        std::fs::write(&marker, std::process::id().to_string()).unwrap();

        let stats = reclaim_orphans(dir.path());
        assert_eq!(stats, CleanupStats::default());
        assert!(socket.exists());
        assert!(marker.exists());
    }

    #[test]
    fn live_owner_is_trusted_without_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId(11);
        let socket = dir.path().join(session.socket_file_name());
        let marker = dir.path().join(session.marker_file_name());
        let listener = UnixListener::bind(&socket).unwrap();
        listener.set_nonblocking(true).unwrap();
        std::fs::write(&marker, std::process::id().to_string()).unwrap();

        assert!(!channel_is_stale(&socket, &marker));
        let err = listener.accept().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn channel_claimed_after_check_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId(12);
        let socket = dir.path().join(session.socket_file_name());
        let marker = dir.path().join(session.marker_file_name());
        abandoned_socket(&socket);
        let dead = dead_pid();
        std::fs::write(&marker, dead.to_string()).unwrap();
        assert!(channel_is_stale(&socket, &marker));

        // A successor rebinds and rewrites the marker before the unlink.
        std::fs::remove_file(&socket).unwrap();
        let _listener = UnixListener::bind(&socket).unwrap();
        std::fs::write(&marker, std::process::id().to_string()).unwrap();

        let mut stats = CleanupStats::default();
        reclaim_channel(&socket, &marker, Some(dead), &mut stats);
        assert_eq!(stats, CleanupStats::default());
        assert!(socket.exists());
        assert!(marker.exists());
    }

    #[test]
    fn removes_marker_without_socket_when_owner_dead() {
        let dir = tempfile::tempdir().unwrap();
        let dead = dir.path().join(SessionId(9).marker_file_name());
        let live = dir.path().join(SessionId(10).marker_file_name());
        std::fs::write(&dead, dead_pid().to_string()).unwrap();
        std::fs::write(&live, std::process::id().to_string()).unwrap();

        let stats = reclaim_orphans(dir.path());
        assert_eq!(stats.markers_removed, 1);
        assert!(!dead.exists());
        assert!(live.exists());
    }

    #[test]
    fn legacy_files_are_removed_and_others_kept() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "state.json",
            "overlay.pid",
            "state-123.json",
            "overlay-123.pid",
            "overlay-123.lock",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::write(dir.path().join("settings-fx.json"), "{}").unwrap();
        std::fs::write(dir.path().join("sock-1.pid"), "1").unwrap();

        let stats = cleanup_legacy_files(dir.path());
        assert_eq!(stats.legacy_files_removed, 5);
        assert!(dir.path().join("settings-fx.json").exists());
        assert!(dir.path().join("sock-1.pid").exists());
    }

    #[test]
    fn marker_pid_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("sock-1.pid");
        assert_eq!(read_marker_pid(&marker), None);
        std::fs::write(&marker, "1234\n").unwrap();
        assert_eq!(read_marker_pid(&marker), Some(1234));
        std::fs::write(&marker, "garbage").unwrap();
        assert_eq!(read_marker_pid(&marker), None);
    }
}
