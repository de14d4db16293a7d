use serde::{Deserialize, Serialize};

/// Static metadata describing a probe type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeDescriptor {
    pub name: String,
    pub description: String,
    /// Whether an implementation exists for this name.
    pub available: bool,
}

/// Lifecycle of one probe bound to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeState {
    Loaded,
    Running,
    Finished,
}
