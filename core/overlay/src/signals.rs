//! Termination signals.
//!
//! SIGTERM, SIGINT and SIGHUP remove the control channel and exit at once.
//! No fade-out runs on this path; only async-signal-safe calls are made.

use std::io;

use crate::channel::run_installed_teardown;

const TERMINATION_SIGNALS: [libc::c_int; 3] = [libc::SIGTERM, libc::SIGINT, libc::SIGHUP];

extern "C" fn handle_termination(signal: libc::c_int) {
    run_installed_teardown();
    // SAFETY: _exit is async-signal-safe and skips non-reentrant atexit work.
    #[allow(unsafe_code)]
    unsafe {
        libc::_exit(128 + signal)
    }
}

pub fn install() -> io::Result<()> {
    for signal in TERMINATION_SIGNALS {
        // SAFETY: the handler only calls async-signal-safe functions.
        #[allow(unsafe_code)]
        let previous = unsafe {
            let handler = handle_termination as *const () as libc::sighandler_t;
            libc::signal(signal, handler)
        };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
