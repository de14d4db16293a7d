use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw `message` event delivered by an injected script.
///
/// Mirrors the engine wire shape `{"type": "send" | "error", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptMessage {
    Send {
        #[serde(default)]
        payload: Value,
    },
    Error {
        #[serde(default)]
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl ScriptMessage {
    pub fn send(payload: Value) -> Self {
        ScriptMessage::Send { payload }
    }

    pub fn error(description: impl Into<String>) -> Self {
        ScriptMessage::Error {
            description: description.into(),
            stack: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ScriptMessage::Error { .. })
    }
}
