//! Process inspection helpers.

use sysinfo::{Pid, ProcessRefreshKind, System};

/// Returns true if a process with `pid` exists.
///
/// A process owned by another user still counts as alive (`EPERM`).
pub fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    #[cfg(unix)]
    {
        // SAFETY: kill with signal 0 performs only the existence/permission
        // check and never delivers a signal.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(pid as i32, 0) };
        if rc == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub parent: Option<u32>,
    pub name: String,
}

/// Answers `(parent, executable name)` for a pid.
pub trait ProcessTable {
    fn lookup(&mut self, pid: u32) -> Option<ProcessEntry>;
}

/// `ProcessTable` backed by sysinfo with per-pid refresh.
pub struct SysinfoProcessTable {
    sys: System,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn lookup(&mut self, pid: u32) -> Option<ProcessEntry> {
        let sys_pid = Pid::from_u32(pid);
        // Refresh only this pid; a full process scan is too slow for a hook.
        self.sys
            .refresh_process_specifics(sys_pid, ProcessRefreshKind::new());
        self.sys.process(sys_pid).map(|process| ProcessEntry {
            parent: process.parent().map(|parent| parent.as_u32()),
            name: process.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn out_of_range_pids_are_dead() {
        assert!(!is_pid_alive(0));
        assert!(!is_pid_alive(i32::MAX as u32));
        assert!(!is_pid_alive(u32::MAX));
    }

    #[test]
    fn exited_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_pid_alive(pid));
    }

    #[test]
    fn sysinfo_table_reports_current_process_parent() {
        let mut table = SysinfoProcessTable::new();
        let entry = table.lookup(std::process::id()).expect("own process entry");
        assert!(entry.parent.is_some());
        assert!(!entry.name.is_empty());
    }
}
