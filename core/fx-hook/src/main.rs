//! fx-hook: lifecycle hook client for the claude-fx overlay.
//!
//! Called by the host CLI's hooks with the event JSON on stdin. Resolves the
//! terminal session, maps the event to a display state and forwards it to the
//! session's overlay, starting one when needed.
//!
//! ## Subcommands
//!
//! - (none): handle a hook event from stdin; always exits 0
//! - `change-character <folder>`: swap the character art of the running overlay
//! - `reload-settings`: make the running overlay re-read `settings-fx.json`
//!
//! Subcommands print the overlay's JSON reply and exit 1 when it is an error.

mod handle;
mod logging;
mod overlay_client;

use clap::{Parser, Subcommand};
use claude_fx_protocol::Reply;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fx-hook")]
#[command(about = "claude-fx hook client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Use the images in FOLDER as the character
    ChangeCharacter {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },

    /// Ask the running overlay to reload its settings
    ReloadSettings,
}

fn main() {
    let logging_guard = logging::init();
    let cli = Cli::parse();

    let code = match cli.command {
        None => {
            // The host's hook pipeline must never see a failure from us.
            if let Err(e) = handle::run() {
                tracing::warn!(error = %e, "fx-hook handle failed");
            }
            0
        }
        Some(Commands::ChangeCharacter { folder }) => report(handle::change_character(&folder)),
        Some(Commands::ReloadSettings) => report(handle::reload_settings()),
    };

    drop(logging_guard);
    std::process::exit(code);
}

fn report(reply: Reply) -> i32 {
    match serde_json::to_string(&reply) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!(error = %e, "Failed to serialize reply"),
    }
    if reply.is_success() {
        0
    } else {
        tracing::info!(message = ?reply.message, "Overlay command failed");
        1
    }
}
