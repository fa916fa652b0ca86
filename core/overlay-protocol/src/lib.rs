//! Control channel wire types for the claude-fx overlay.
//!
//! Shared by the overlay actor and the hook client so the schema cannot
//! drift between them. One JSON object per line, one request and one reply
//! per connection. The actor remains the authority on validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

const SOCKET_PREFIX: &str = "sock-";
const SOCKET_SUFFIX: &str = ".sock";
const MARKER_SUFFIX: &str = ".pid";
const READ_CHUNK_SIZE: usize = 4096;

/// Stable per-terminal session identity (the shell pid below the terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl SessionId {
    pub fn socket_file_name(self) -> String {
        format!("{}{}{}", SOCKET_PREFIX, self.0, SOCKET_SUFFIX)
    }

    pub fn marker_file_name(self) -> String {
        format!("{}{}{}", SOCKET_PREFIX, self.0, MARKER_SUFFIX)
    }

    /// Parses `sock-<id>.sock` back into a session id.
    pub fn from_socket_file_name(name: &str) -> Option<Self> {
        name.strip_prefix(SOCKET_PREFIX)?
            .strip_suffix(SOCKET_SUFFIX)?
            .parse()
            .ok()
    }

    /// Parses `sock-<id>.pid` back into a session id.
    pub fn from_marker_file_name(name: &str) -> Option<Self> {
        name.strip_prefix(SOCKET_PREFIX)?
            .strip_suffix(MARKER_SUFFIX)?
            .parse()
            .ok()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SessionId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Idle,
    Greeting,
    Working,
    Success,
    Error,
    Celebrating,
    Sleeping,
    Farewell,
}

impl DisplayState {
    pub const ALL: [DisplayState; 8] = [
        DisplayState::Idle,
        DisplayState::Greeting,
        DisplayState::Working,
        DisplayState::Success,
        DisplayState::Error,
        DisplayState::Celebrating,
        DisplayState::Sleeping,
        DisplayState::Farewell,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayState::Idle => "idle",
            DisplayState::Greeting => "greeting",
            DisplayState::Working => "working",
            DisplayState::Success => "success",
            DisplayState::Error => "error",
            DisplayState::Celebrating => "celebrating",
            DisplayState::Sleeping => "sleeping",
            DisplayState::Farewell => "farewell",
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayState {
    type Err = ErrorInfo;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisplayState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ErrorInfo::new("invalid_state", format!("unknown state: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetState {
    pub state: DisplayState,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub terminal_pid: Option<u32>,
    #[serde(default)]
    pub terminal_window_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCharacter {
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Ping,
    SetState(SetState),
    Shutdown,
    ChangeCharacter(ChangeCharacter),
    ReloadSettings,
    #[serde(other)]
    Unknown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::SetState(_) => "SET_STATE",
            Command::Shutdown => "SHUTDOWN",
            Command::ChangeCharacter(_) => "CHANGE_CHARACTER",
            Command::ReloadSettings => "RELOAD_SETTINGS",
            Command::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Pong,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            message: None,
        }
    }

    pub fn pong() -> Self {
        Self {
            status: ReplyStatus::Pong,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, ReplyStatus::Error)
    }
}

impl From<ErrorInfo> for Reply {
    fn from(info: ErrorInfo) -> Self {
        Reply::error(info.message)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Reads one newline-terminated frame, stopping at EOF or the first newline.
///
/// Bytes after the newline are ignored. Timeouts configured on the underlying
/// stream surface as `read_timeout`.
pub fn read_line<R: Read>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, ErrorInfo> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > max_bytes {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "frame exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ErrorInfo::new("read_timeout", "timed out reading frame"));
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read frame: {}", err),
                ));
            }
        }
    }

    if let Some(index) = buffer.iter().position(|b| *b == b'\n') {
        buffer.truncate(index);
    }

    if buffer.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "frame was empty"));
    }

    Ok(buffer)
}

/// Decodes a request frame into a [`Command`].
///
/// Frames that are not a JSON object with a string `command` are malformed;
/// a well-formed frame naming a command this build does not know decodes to
/// [`Command::Unknown`].
pub fn decode_command(frame: &[u8]) -> Result<Command, ErrorInfo> {
    let value: Value = serde_json::from_slice(frame).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })?;

    match value.get("command") {
        Some(Value::String(_)) => {}
        _ => {
            return Err(ErrorInfo::new(
                "missing_field",
                "command is required",
            ))
        }
    }

    serde_json::from_value(value)
        .map_err(|err| ErrorInfo::new("invalid_params", format!("invalid command: {}", err)))
}

pub fn decode_reply(frame: &[u8]) -> Result<Reply, ErrorInfo> {
    serde_json::from_slice(frame).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("reply was not valid JSON: {}", err),
        )
    })
}

pub fn write_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
    let mut payload = serde_json::to_vec(value).map_err(io::Error::other)?;
    payload.push(b'\n');
    writer.write_all(&payload)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trips_through_wire_form() {
        let command = decode_command(br#"{"command":"PING"}"#).unwrap();
        assert_eq!(command, Command::Ping);
    }

    #[test]
    fn set_state_decodes_optional_fields() {
        let frame = br#"{"command":"SET_STATE","state":"success","tool":"Bash","terminal_pid":42}"#;
        let command = decode_command(frame).unwrap();
        assert_eq!(
            command,
            Command::SetState(SetState {
                state: DisplayState::Success,
                tool: Some("Bash".to_string()),
                terminal_pid: Some(42),
                terminal_window_id: None,
            })
        );
    }

    #[test]
    fn set_state_serializes_with_command_tag() {
        let command = Command::SetState(SetState {
            state: DisplayState::Working,
            tool: None,
            terminal_pid: None,
            terminal_window_id: Some(7),
        });
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["command"], "SET_STATE");
        assert_eq!(value["state"], "working");
        assert_eq!(value["terminal_window_id"], 7);
    }

    #[test]
    fn unrecognized_command_decodes_to_unknown() {
        let command = decode_command(br#"{"command":"DANCE"}"#).unwrap();
        assert_eq!(command, Command::Unknown);
    }

    #[test]
    fn rejects_unknown_state_name() {
        let err = decode_command(br#"{"command":"SET_STATE","state":"angry"}"#).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_frame_without_command() {
        let err = decode_command(br#"{"state":"idle"}"#).unwrap_err();
        assert_eq!(err.code, "missing_field");
    }

    #[test]
    fn rejects_malformed_json() {
        let err = decode_command(b"{not json").unwrap_err();
        assert_eq!(err.code, "invalid_json");
    }

    #[test]
    fn read_line_stops_at_newline() {
        let mut input: &[u8] = b"{\"command\":\"PING\"}\ntrailing";
        let frame = read_line(&mut input, MAX_REQUEST_BYTES).unwrap();
        assert_eq!(frame, br#"{"command":"PING"}"#.to_vec());
    }

    #[test]
    fn read_line_rejects_blank_frame() {
        let mut input: &[u8] = b"   \n";
        let err = read_line(&mut input, MAX_REQUEST_BYTES).unwrap_err();
        assert_eq!(err.code, "empty_request");
    }

    #[test]
    fn read_line_enforces_size_limit() {
        let payload = vec![b'a'; 64];
        let mut input: &[u8] = &payload;
        let err = read_line(&mut input, 16).unwrap_err();
        assert_eq!(err.code, "request_too_large");
    }

    #[test]
    fn reply_omits_empty_message() {
        let encoded = serde_json::to_string(&Reply::ok()).unwrap();
        assert_eq!(encoded, r#"{"status":"ok"}"#);
        let encoded = serde_json::to_string(&Reply::error("unknown")).unwrap();
        assert_eq!(encoded, r#"{"status":"error","message":"unknown"}"#);
    }

    #[test]
    fn socket_names_round_trip_session_id() {
        let id = SessionId(12345);
        assert_eq!(id.socket_file_name(), "sock-12345.sock");
        assert_eq!(id.marker_file_name(), "sock-12345.pid");
        assert_eq!(SessionId::from_socket_file_name("sock-12345.sock"), Some(id));
        assert_eq!(SessionId::from_socket_file_name("sock-12345.pid"), None);
        assert_eq!(SessionId::from_marker_file_name("sock-12345.pid"), Some(id));
        assert_eq!(SessionId::from_socket_file_name("overlay-1.sock"), None);
    }

    #[test]
    fn display_state_parses_every_variant() {
        for state in DisplayState::ALL {
            assert_eq!(state.as_str().parse::<DisplayState>().unwrap(), state);
        }
        assert!("nope".parse::<DisplayState>().is_err());
    }
}
