//! Control channel ownership: bind, owner marker and teardown.
//!
//! The socket bind is the singleton guarantee. Stale channels are reclaimed
//! by startup cleanup first, so a bind that still fails with `AddrInUse`
//! means a live overlay owns the session.

use std::ffi::CString;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use claude_fx_protocol::SessionId;
use fs_err as fs;
use fx_core::config::{marker_path, socket_path};
use fx_core::{FxError, Result};

/// Exit code used when another live overlay already owns the session.
pub const EXIT_OWNERSHIP_CONFLICT: i32 = 2;

static INSTALLED: OnceLock<Teardown> = OnceLock::new();

/// Removes the socket and marker exactly once.
///
/// Paths are converted up front so `run` only touches atomics and
/// `unlink(2)`, both async-signal-safe.
#[derive(Debug)]
pub struct Teardown {
    done: AtomicBool,
    socket: CString,
    marker: CString,
}

impl Teardown {
    pub fn new(socket: &Path, marker: &Path) -> Result<Self> {
        Ok(Self {
            done: AtomicBool::new(false),
            socket: c_path(socket)?,
            marker: c_path(marker)?,
        })
    }

    pub fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        // SAFETY: both pointers come from owned CStrings that live as long
        // as `self`; unlink has no other preconditions.
        #[allow(unsafe_code)]
        unsafe {
            libc::unlink(self.socket.as_ptr());
            libc::unlink(self.marker.as_ptr());
        }
    }
}

fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        FxError::io(
            format!("channel path contains NUL: {}", path.display()),
            std::io::Error::from(ErrorKind::InvalidInput),
        )
    })
}

/// Registers the process-wide teardown used by signal handlers.
pub fn install_teardown(teardown: Teardown) -> &'static Teardown {
    INSTALLED.get_or_init(|| teardown)
}

/// Runs the installed teardown, if any. Safe to call from a signal handler.
pub fn run_installed_teardown() {
    if let Some(teardown) = INSTALLED.get() {
        teardown.run();
    }
}

pub struct BoundChannel {
    pub listener: UnixListener,
    pub socket: PathBuf,
    pub marker: PathBuf,
    pub teardown: Teardown,
}

/// Binds the session's socket and writes the owner marker.
pub fn bind(runtime_dir: &Path, session: SessionId) -> Result<BoundChannel> {
    fs::create_dir_all(runtime_dir).map_err(|err| FxError::io("creating runtime dir", err))?;

    let socket = socket_path(runtime_dir, session);
    let marker = marker_path(runtime_dir, session);

    let listener = match UnixListener::bind(&socket) {
        Ok(listener) => listener,
        Err(err) if err.kind() == ErrorKind::AddrInUse => {
            return Err(FxError::ChannelInUse(socket));
        }
        Err(err) => return Err(FxError::io(format!("binding {}", socket.display()), err)),
    };

    let teardown = Teardown::new(&socket, &marker)?;
    if let Err(err) = fs::write(&marker, std::process::id().to_string()) {
        teardown.run();
        return Err(FxError::io("writing owner marker", err));
    }

    Ok(BoundChannel {
        listener,
        socket,
        marker,
        teardown,
    })
}
