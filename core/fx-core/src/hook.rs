//! Hook event input and its mapping to display states.
//!
//! ```text
//! SessionStart → greeting
//! PreToolUse   → working
//! PostToolUse  → success | error
//! Stop         → celebrating
//! SessionEnd   → farewell
//! (anything)   → idle
//! ```

use claude_fx_protocol::DisplayState;
use serde::Deserialize;
use serde_json::Value;

const ERROR_PATTERNS: &[&str] = &["error:", "Error:", "ERROR", "failed", "ENOENT"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_result: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
}

impl HookInput {
    /// Parses stdin content; blank or invalid input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(raw) {
            Ok(input) => Some(input),
            Err(err) => {
                tracing::debug!(error = %err, "Ignoring unparseable hook input");
                None
            }
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.hook_event_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// The tool's result; `tool_result` wins when both keys are sent.
    pub fn result(&self) -> Option<&Value> {
        self.tool_result.as_ref().or(self.tool_response.as_ref())
    }

    pub fn is_error(&self) -> bool {
        self.result().is_some_and(detect_error)
    }

    /// Target state for this event, or `None` when the event name is missing.
    pub fn target_state(&self) -> Option<DisplayState> {
        let event = self.event_name()?;
        let is_error = event == "PostToolUse" && self.is_error();
        Some(map_event_to_state(event, is_error))
    }
}

pub fn map_event_to_state(event: &str, is_error: bool) -> DisplayState {
    match event {
        "SessionStart" => DisplayState::Greeting,
        "PreToolUse" => DisplayState::Working,
        "PostToolUse" if is_error => DisplayState::Error,
        "PostToolUse" => DisplayState::Success,
        "Stop" => DisplayState::Celebrating,
        "SessionEnd" => DisplayState::Farewell,
        _ => DisplayState::Idle,
    }
}

/// Truthiness of a JSON value: null, false, 0, "" and empty containers are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// True when a tool result reports failure.
pub fn detect_error(result: &Value) -> bool {
    let output = match result {
        Value::Object(map) => {
            if map.get("error").is_some_and(is_truthy) {
                return true;
            }
            map.get("output").map(value_text).unwrap_or_default()
        }
        other => value_text(other),
    };
    ERROR_PATTERNS.iter().any(|pattern| output.contains(pattern))
}
