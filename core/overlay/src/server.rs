//! Control channel accept loop and the actor mailbox.
//!
//! The accept thread never touches actor state. It decodes one request per
//! connection, validates what can be validated without the actor (character
//! folders), enqueues, and replies.

use std::collections::VecDeque;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use claude_fx_protocol::{
    decode_command, read_line, write_line, Command, Reply, SetState, MAX_REQUEST_BYTES,
};
use fx_core::{CharacterOverride, FocusEvent};
use tracing::{debug, warn};

pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Work for the tick loop.
#[derive(Debug, Clone)]
pub enum Inbound {
    SetState(SetState),
    Shutdown,
    ChangeCharacter(CharacterOverride),
    ReloadSettings,
    Focus(FocusEvent),
    /// Whether the terminal target was frontmost at the last focus poll.
    Frontmost(bool),
    Cursor(f64, f64),
}

#[derive(Debug, Default)]
pub struct Mailbox {
    queue: Mutex<VecDeque<Inbound>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: Inbound) {
        self.lock().push_back(item);
    }

    /// Takes everything queued; the lock is held only for the swap.
    pub fn drain(&self) -> VecDeque<Inbound> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Inbound>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps a decoded command to its reply, enqueueing work for the actor.
pub fn dispatch(command: Command, mailbox: &Mailbox) -> Reply {
    match command {
        Command::Ping => Reply::pong(),
        Command::SetState(set_state) => {
            mailbox.push(Inbound::SetState(set_state));
            Reply::ok()
        }
        Command::Shutdown => {
            mailbox.push(Inbound::Shutdown);
            Reply::ok()
        }
        Command::ChangeCharacter(change) => match CharacterOverride::load(Path::new(&change.folder)) {
            Ok(character) => {
                mailbox.push(Inbound::ChangeCharacter(character));
                Reply::ok()
            }
            Err(err) => Reply::error(err.to_string()),
        },
        Command::ReloadSettings => {
            mailbox.push(Inbound::ReloadSettings);
            Reply::ok()
        }
        Command::Unknown => Reply::error("unknown"),
    }
}

pub fn spawn(
    listener: UnixListener,
    mailbox: Arc<Mailbox>,
    running: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    listener.set_nonblocking(true)?;
    thread::Builder::new()
        .name("fx-accept".to_string())
        .spawn(move || serve(&listener, &mailbox, &running))
}

fn serve(listener: &UnixListener, mailbox: &Mailbox, running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => handle_connection(stream, mailbox),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept control connection");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    debug!("Accept loop stopped");
}

fn handle_connection(mut stream: UnixStream, mailbox: &Mailbox) {
    // Accepted sockets inherit O_NONBLOCK on some platforms.
    if let Err(err) = stream.set_nonblocking(false) {
        debug!(error = %err, "Dropping control connection");
        return;
    }
    let _ = stream.set_read_timeout(Some(READ_TIMEOUT));
    let _ = stream.set_write_timeout(Some(WRITE_TIMEOUT));

    let reply = match read_line(&mut stream, MAX_REQUEST_BYTES).and_then(|frame| decode_command(&frame)) {
        Ok(command) => {
            debug!(command = command.name(), "Control request received");
            dispatch(command, mailbox)
        }
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Rejected control request");
            Reply::from(err)
        }
    };

    if let Err(err) = write_line(&mut stream, &reply) {
        debug!(error = %err, "Failed to write control reply");
    }
}
