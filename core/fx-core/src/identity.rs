//! Session identity resolution.
//!
//! A session is the shell running directly under a terminal emulator. The
//! hook walks its own process ancestry until it finds a terminal; the child
//! one step below that ancestor is the shell, whose pid becomes the session
//! id. No state file is involved, so every hook invocation from the same
//! terminal tab agrees on the id.

use std::time::{Duration, Instant};

use claude_fx_protocol::SessionId;

use crate::process::ProcessTable;
use crate::visibility::{first_normal_window, FocusProbe};

pub const IDENTITY_TTL: Duration = Duration::from_secs(30);
pub const MAX_ANCESTRY_DEPTH: usize = 64;

/// Substrings identifying terminal emulators (matched case-insensitively).
const TERMINAL_NAME_TOKENS: &[&str] = &[
    "terminal",
    "iterm",
    "alacritty",
    "kitty",
    "wezterm",
    "ghostty",
    "konsole",
    "xterm",
    "tilix",
    "terminator",
    "hyper",
    "tabby",
];

/// Names too generic for substring matching.
const TERMINAL_EXACT_NAMES: &[&str] = &["warp", "stable", "foot", "footclient", "rio"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: SessionId,
    pub terminal_pid: u32,
    pub terminal_window_id: Option<u64>,
}

pub fn is_terminal_name(name: &str) -> bool {
    let name = name.trim().to_ascii_lowercase();
    let name = name.strip_suffix(".app").unwrap_or(&name);
    if name.is_empty() {
        return false;
    }
    TERMINAL_EXACT_NAMES.contains(&name) || TERMINAL_NAME_TOKENS.iter().any(|token| name.contains(token))
}

/// Walks upward from `start_pid` and returns `(shell_pid, terminal_pid)`.
///
/// Returns `None` when no terminal ancestor exists below pid 1 or within
/// `MAX_ANCESTRY_DEPTH` steps.
pub fn walk_to_terminal<T: ProcessTable + ?Sized>(table: &mut T, start_pid: u32) -> Option<(u32, u32)> {
    let mut below: Option<u32> = None;
    let mut pid = start_pid;

    for _ in 0..MAX_ANCESTRY_DEPTH {
        if pid <= 1 {
            return None;
        }
        let entry = table.lookup(pid)?;
        if is_terminal_name(&entry.name) {
            return below.map(|shell_pid| (shell_pid, pid));
        }
        below = Some(pid);
        pid = entry.parent?;
    }

    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedIdentity {
    pub identity: SessionIdentity,
    pub resolved_at: Instant,
}

impl CachedIdentity {
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.resolved_at) < ttl
    }
}

/// Holds the last resolved identity so repeated lookups skip the walk.
pub struct SessionResolver<T: ProcessTable> {
    table: T,
    ttl: Duration,
    cached: Option<CachedIdentity>,
}

impl<T: ProcessTable> SessionResolver<T> {
    pub fn new(table: T) -> Self {
        Self::with_ttl(table, IDENTITY_TTL)
    }

    pub fn with_ttl(table: T, ttl: Duration) -> Self {
        Self {
            table,
            ttl,
            cached: None,
        }
    }

    pub fn resolve(
        &mut self,
        start_pid: u32,
        probe: Option<&dyn FocusProbe>,
        now: Instant,
    ) -> Option<SessionIdentity> {
        if let Some(cached) = self.cached.filter(|cached| cached.is_fresh(now, self.ttl)) {
            return Some(cached.identity);
        }

        let Some((shell_pid, terminal_pid)) = walk_to_terminal(&mut self.table, start_pid) else {
            tracing::debug!(start_pid, "No terminal ancestor; session unresolved");
            self.cached = None;
            return None;
        };

        let identity = SessionIdentity {
            session_id: SessionId(shell_pid),
            terminal_pid,
            terminal_window_id: probe.and_then(|probe| lookup_window(probe, terminal_pid)),
        };
        tracing::debug!(
            session_id = shell_pid,
            terminal_pid,
            window_id = ?identity.terminal_window_id,
            "Resolved session identity"
        );

        self.cached = Some(CachedIdentity {
            identity,
            resolved_at: now,
        });
        Some(identity)
    }
}

fn lookup_window(probe: &dyn FocusProbe, terminal_pid: u32) -> Option<u64> {
    match probe.on_screen_windows() {
        Ok(windows) => first_normal_window(&windows, terminal_pid),
        Err(err) => {
            tracing::debug!(error = %err, "Window lookup failed; window id unknown");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessEntry;
    use crate::visibility::tests::FakeProbe;
    use crate::visibility::WindowInfo;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeTable {
        entries: HashMap<u32, ProcessEntry>,
        lookups: usize,
    }

    impl FakeTable {
        fn with(mut self, pid: u32, parent: u32, name: &str) -> Self {
            self.entries.insert(
                pid,
                ProcessEntry {
                    parent: Some(parent),
                    name: name.to_string(),
                },
            );
            self
        }
    }

    impl ProcessTable for FakeTable {
        fn lookup(&mut self, pid: u32) -> Option<ProcessEntry> {
            self.lookups += 1;
            self.entries.get(&pid).cloned()
        }
    }

    fn iterm_chain() -> FakeTable {
        FakeTable::default()
            .with(500, 400, "fx-hook")
            .with(400, 300, "node")
            .with(300, 200, "zsh")
            .with(200, 1, "iTerm2")
    }

    #[test]
    fn recognizes_terminal_names() {
        for name in [
            "Terminal",
            "iTerm2",
            "Alacritty",
            "kitty",
            "wezterm-gui",
            "ghostty",
            "Warp",
            "stable",
            "konsole",
            "gnome-terminal-server",
            "xterm",
            "Hyper",
            "foot",
        ] {
            assert!(is_terminal_name(name), "{name} should be a terminal");
        }
        for name in ["zsh", "bash", "node", "claude", "tmux", "launchd", "footprint", ""] {
            assert!(!is_terminal_name(name), "{name} should not be a terminal");
        }
    }

    #[test]
    fn shell_below_terminal_is_session() {
        let mut table = iterm_chain();
        assert_eq!(walk_to_terminal(&mut table, 500), Some((300, 200)));
    }

    #[test]
    fn no_terminal_before_init_fails() {
        let mut table = FakeTable::default()
            .with(500, 400, "fx-hook")
            .with(400, 300, "sshd")
            .with(300, 1, "launchd");
        assert_eq!(walk_to_terminal(&mut table, 500), None);
    }

    #[test]
    fn walk_is_depth_bounded() {
        let mut table = FakeTable::default();
        for pid in 2..200u32 {
            table = table.with(pid, pid + 1, "sh");
        }
        table = table.with(200, 1, "kitty");
        assert_eq!(walk_to_terminal(&mut table, 2), None);
        assert!(table.lookups <= MAX_ANCESTRY_DEPTH);
    }

    #[test]
    fn missing_process_fails_resolution() {
        let mut table = FakeTable::default().with(500, 400, "fx-hook");
        assert_eq!(walk_to_terminal(&mut table, 500), None);
    }

    #[test]
    fn terminal_as_start_process_has_no_session() {
        let mut table = FakeTable::default().with(200, 1, "kitty");
        assert_eq!(walk_to_terminal(&mut table, 200), None);
    }

    #[test]
    fn resolver_caches_within_ttl() {
        let now = Instant::now();
        let mut resolver = SessionResolver::new(iterm_chain());

        let first = resolver.resolve(500, None, now).unwrap();
        assert_eq!(first.session_id, SessionId(300));
        assert_eq!(first.terminal_pid, 200);
        let lookups = resolver.table.lookups;

        let second = resolver
            .resolve(500, None, now + Duration::from_secs(10))
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(resolver.table.lookups, lookups);

        resolver.resolve(500, None, now + IDENTITY_TTL).unwrap();
        assert!(resolver.table.lookups > lookups);
    }

    #[test]
    fn freshness_is_pure_function_of_timestamp() {
        let now = Instant::now();
        let cached = CachedIdentity {
            identity: SessionIdentity {
                session_id: SessionId(1),
                terminal_pid: 2,
                terminal_window_id: None,
            },
            resolved_at: now,
        };
        assert!(cached.is_fresh(now, IDENTITY_TTL));
        assert!(cached.is_fresh(now + Duration::from_secs(29), IDENTITY_TTL));
        assert!(!cached.is_fresh(now + Duration::from_secs(30), IDENTITY_TTL));
    }

    #[test]
    fn window_id_is_best_effort() {
        let now = Instant::now();
        let probe = FakeProbe::frontmost(200);
        probe.set_windows(Ok(vec![
            WindowInfo {
                id: 9,
                owner_pid: 999,
                layer: 0,
            },
            WindowInfo {
                id: 42,
                owner_pid: 200,
                layer: 0,
            },
        ]));
        let mut resolver = SessionResolver::new(iterm_chain());
        let identity = resolver.resolve(500, Some(&probe), now).unwrap();
        assert_eq!(identity.terminal_window_id, Some(42));

        let failing = FakeProbe::default();
        let mut resolver = SessionResolver::new(iterm_chain());
        let identity = resolver.resolve(500, Some(&failing), now).unwrap();
        assert_eq!(identity.terminal_window_id, None);
    }
}
