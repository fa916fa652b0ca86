//! fx-overlay: per-session overlay actor.
//!
//! One process per terminal session. It owns the session's control channel
//! (`~/.claude-fx/sock-<session>.sock`), runs the display state machine and
//! visibility tracking on a ~60 Hz tick loop, and exits when told to shut
//! down, after a farewell, or when its terminal process disappears.
//!
//! Exit codes: 0 on normal shutdown, 1 on startup failure, 2 when another
//! live overlay already owns the session.

mod actor;
mod channel;
mod focus_watch;
mod renderer;
mod server;
mod signals;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use claude_fx_protocol::SessionId;
use fs_err as fs;
use fx_core::config::{self, logs_dir};
use fx_core::{
    load_settings, run_startup_cleanup, FocusProbe, FxError, SystemFocusProbe, TerminalTarget,
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use crate::actor::{wants_cursor_samples, Actor};
use crate::channel::{BoundChannel, EXIT_OWNERSHIP_CONFLICT};
use crate::focus_watch::TargetCell;
use crate::renderer::TraceRenderer;
use crate::server::Mailbox;

const LOG_FILE_NAME: &str = "overlay.log";

#[derive(Parser, Debug)]
#[command(name = "fx-overlay")]
#[command(about = "Animated claude-fx companion for one terminal session")]
#[command(version)]
struct Args {
    /// Session id (pid of the shell running under the terminal)
    #[arg(long, env = "CLAUDE_FX_SESSION")]
    session: u32,

    /// Terminal emulator pid; the overlay exits when it does
    #[arg(long)]
    terminal_pid: Option<u32>,

    /// Window id of the owning terminal window
    #[arg(long)]
    window_id: Option<u64>,
}

fn main() {
    let args = Args::parse();

    let runtime_dir = match config::runtime_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("fx-overlay: {}", err);
            std::process::exit(1);
        }
    };

    let log_guard = init_logging(&runtime_dir);
    let code = run(args, &runtime_dir);
    drop(log_guard);
    std::process::exit(code);
}

fn init_logging(runtime_dir: &Path) -> Option<WorkerGuard> {
    let debug_enabled = env::var("CLAUDE_FX_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let logs = logs_dir(runtime_dir);
    fs::create_dir_all(&logs).ok()?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_NAME)
        .build(&logs)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn run(args: Args, runtime_dir: &Path) -> i32 {
    let session = SessionId(args.session);
    let plugin_root: PathBuf = config::plugin_root().unwrap_or_else(|_| runtime_dir.to_path_buf());
    let settings = load_settings(&plugin_root);

    let stats = run_startup_cleanup(runtime_dir);
    if stats.channels_removed > 0 || stats.legacy_files_removed > 0 {
        info!(
            channels = stats.channels_removed,
            markers = stats.markers_removed,
            legacy_files = stats.legacy_files_removed,
            "Startup cleanup"
        );
    }

    if !settings.overlay.enabled {
        info!(session = %session, "Overlay disabled in settings; not starting");
        return 0;
    }

    let BoundChannel {
        listener,
        socket,
        marker,
        teardown,
    } = match channel::bind(runtime_dir, session) {
        Ok(channel) => channel,
        Err(FxError::ChannelInUse(path)) => {
            info!(path = %path.display(), "Session already has a live overlay; exiting");
            return EXIT_OWNERSHIP_CONFLICT;
        }
        Err(err) => {
            error!(error = %err, "Failed to bind control channel");
            return 1;
        }
    };
    let teardown = channel::install_teardown(teardown);

    if let Err(err) = signals::install() {
        warn!(error = %err, "Failed to install signal handlers");
    }

    let mailbox = Arc::new(Mailbox::new());
    let running = Arc::new(AtomicBool::new(true));
    let probe: Arc<dyn FocusProbe> = Arc::new(SystemFocusProbe::new());

    let accept = match server::spawn(listener, Arc::clone(&mailbox), Arc::clone(&running)) {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "Failed to start accept loop");
            teardown.run();
            return 1;
        }
    };

    let target = Arc::new(TargetCell::new(TerminalTarget {
        pid: args.terminal_pid,
        window_id: args.window_id,
    }));
    let renderer = TraceRenderer::new();
    if let Err(err) = focus_watch::spawn(
        probe,
        Arc::clone(&mailbox),
        Arc::clone(&running),
        Arc::clone(&target),
        wants_cursor_samples(&settings, &renderer),
    ) {
        warn!(error = %err, "Failed to start focus watcher; visibility stays as is");
    }

    info!(
        session = %session,
        socket = %socket.display(),
        marker = %marker.display(),
        terminal_pid = ?args.terminal_pid,
        window_id = ?args.window_id,
        "Overlay started"
    );

    let mut actor = Actor::new(plugin_root, settings, target, renderer, Instant::now());
    actor::run(&mut actor, &mailbox);

    running.store(false, Ordering::SeqCst);
    if accept.join().is_err() {
        warn!("Accept loop panicked");
    }
    teardown.run();

    info!(
        session = %session,
        reason = ?actor.shutdown_reason(),
        state = %actor.current_state(),
        frames = actor.renderer().frames_painted(),
        "Overlay stopped"
    );
    0
}
