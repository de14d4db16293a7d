use crate::util::ellipsize_path;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ordered field → value mapping carried by a message.
///
/// The orchestrator never interprets it; each probe decides its shape.
pub type Payload = Map<String, Value>;

/// Timestamp layout used for persisted messages (`2024-05-01 13:37:00`).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One structured event emitted by a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the probe that produced the event.
    pub probe: String,
    /// Local wall-clock time the message was created.
    pub time: String,
    /// Executable path of the instrumented process.
    pub target: String,
    pub payload: Payload,
}

impl Message {
    pub fn new(probe: impl Into<String>, target: impl Into<String>, payload: Payload) -> Self {
        Self {
            probe: probe.into(),
            time: Local::now().format(TIME_FORMAT).to_string(),
            target: target.into(),
            payload,
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }

    /// Merge the header fields and payload into one mapping.
    ///
    /// Header keys come first; a payload field with the same name as a
    /// header overrides it, keeping the header's position.
    pub fn flatten(&self) -> Payload {
        let mut flat = Payload::new();
        flat.insert("probe".to_string(), Value::String(self.probe.clone()));
        flat.insert("time".to_string(), Value::String(self.time.clone()));
        flat.insert("target".to_string(), Value::String(self.target.clone()));
        for (key, value) in &self.payload {
            flat.insert(key.clone(), value.clone());
        }
        flat
    }

    /// Copy of the message with the target path shortened to `C:/.../name.exe`.
    pub fn ellipsized(&self) -> Self {
        Self {
            probe: self.probe.clone(),
            time: self.time.clone(),
            target: ellipsize_path(&self.target),
            payload: self.payload.clone(),
        }
    }
}

/// Render a payload value without JSON quoting for plain strings.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Grep-friendly single line: `probe|time|target|key:value|...`
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.probe, self.time, self.target)?;
        for (key, value) in &self.payload {
            write!(f, "|{}:{}", key, display_value(value))?;
        }
        Ok(())
    }
}
