use crate::probe::ProbeState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating-system process id.
pub type Pid = u32;

/// Lifecycle of an instrumented process.
///
/// `Spawned → Attaching → Attached → Instrumented → Detached`. A failed
/// attach ends at `Attaching` and never produces a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Spawned,
    Attaching,
    Attached,
    Instrumented,
    Detached,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Spawned => "spawned",
            SessionState::Attaching => "attaching",
            SessionState::Attached => "attached",
            SessionState::Instrumented => "instrumented",
            SessionState::Detached => "detached",
        };
        f.write_str(label)
    }
}

/// Read-only view of an active session for introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub pid: Pid,
    pub path: String,
    pub state: SessionState,
    pub probes: Vec<(String, ProbeState)>,
}

impl SessionSummary {
    pub fn has_probe(&self, name: &str) -> bool {
        self.probes.iter().any(|(probe, _)| probe == name)
    }
}
