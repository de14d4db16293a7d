use winstrument_probes::Probe;
use winstrument_types::{Message, Pid, ProbeState, SessionState, SessionSummary};

use crate::engine::{ScriptHandle, SessionHandle};

/// One probe bound to one session.
pub struct ProbeInstance {
    pub name: String,
    pub(crate) probe: Box<dyn Probe>,
    pub state: ProbeState,
    pub script: ScriptHandle,
    /// Messages this instance emitted, for the detach report
    pub output: Vec<Message>,
}

impl ProbeInstance {
    pub(crate) fn new(name: &str, probe: Box<dyn Probe>, script: ScriptHandle) -> Self {
        Self {
            name: name.to_string(),
            probe,
            state: ProbeState::Loaded,
            script,
            output: Vec::new(),
        }
    }
}

/// An instrumented process and the probes attached to it.
pub struct Session {
    pub pid: Pid,
    pub path: String,
    pub state: SessionState,
    pub handle: SessionHandle,
    pub probes: Vec<ProbeInstance>,
}

impl Session {
    pub fn new(pid: Pid, path: impl Into<String>, handle: SessionHandle) -> Self {
        Self {
            pid,
            path: path.into(),
            state: SessionState::Attached,
            handle,
            probes: Vec::new(),
        }
    }

    pub fn probe_index(&self, script: ScriptHandle) -> Option<usize> {
        self.probes.iter().position(|p| p.script == script)
    }

    pub fn output(&self) -> impl Iterator<Item = &Message> {
        self.probes.iter().flat_map(|p| p.output.iter())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            pid: self.pid,
            path: self.path.clone(),
            state: self.state,
            probes: self
                .probes
                .iter()
                .map(|p| (p.name.clone(), p.state))
                .collect(),
        }
    }
}
