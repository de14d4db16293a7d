//! Engine that replays a recorded capture instead of touching live processes.
//!
//! A recording lists processes by pid and path, each with a timeline of
//! steps. `resume(pid)` starts a thread that walks the timeline, sleeping
//! `after_ms` before each step and delivering events through the sinks the
//! orchestrator registered. Every engine call is written to a [`Journal`]
//! so callers can check the order of operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use winstrument_types::{Pid, ScriptMessage};

use super::{Engine, EngineEvent, EventSink, ScriptHandle, SessionHandle};
use crate::{EngineError, Result};

fn default_exit_reason() -> String {
    "process-terminated".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub processes: Vec<RecordedProcess>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedProcess {
    pub pid: Pid,
    pub path: String,
    /// When set, `attach` fails with this transport error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_error: Option<String>,
    #[serde(default)]
    pub timeline: Vec<Step>,
}

/// One recorded event. `after_ms` is relative to the previous step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Send {
        probe: String,
        payload: Value,
        #[serde(default)]
        after_ms: u64,
    },
    Error {
        probe: String,
        description: String,
        #[serde(default)]
        after_ms: u64,
    },
    Child {
        pid: Pid,
        path: String,
        #[serde(default)]
        after_ms: u64,
    },
    ChildRemoved {
        pid: Pid,
        #[serde(default)]
        after_ms: u64,
    },
    Exit {
        #[serde(default = "default_exit_reason")]
        reason: String,
        #[serde(default)]
        after_ms: u64,
    },
}

impl Step {
    fn delay(&self) -> Duration {
        let ms = match self {
            Step::Send { after_ms, .. }
            | Step::Error { after_ms, .. }
            | Step::Child { after_ms, .. }
            | Step::ChildRemoved { after_ms, .. }
            | Step::Exit { after_ms, .. } => *after_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Ordered log of engine calls and replayed events.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: String) {
        tracing::trace!(entry = %entry, "replay");
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(|e| e == entry)
    }
}

struct ScriptEntry {
    pid: Pid,
    name: String,
    loaded: bool,
    sink: Option<EventSink>,
}

#[derive(Default)]
struct ReplayState {
    sessions: HashMap<SessionHandle, Pid>,
    detached_sinks: HashMap<SessionHandle, EventSink>,
    scripts: HashMap<ScriptHandle, ScriptEntry>,
    gated: HashSet<Pid>,
    resumed: HashSet<Pid>,
    device_sink: Option<EventSink>,
    next_handle: u64,
}

impl ReplayState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

pub struct ReplayEngine {
    processes: Vec<RecordedProcess>,
    state: Arc<Mutex<ReplayState>>,
    journal: Journal,
}

impl ReplayEngine {
    pub fn new(recording: Recording) -> Self {
        Self {
            processes: recording.processes,
            state: Arc::new(Mutex::new(ReplayState::default())),
            journal: Journal::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(Recording::load(path)?))
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn process(&self, pid: Pid) -> std::result::Result<&RecordedProcess, EngineError> {
        self.processes
            .iter()
            .find(|p| p.pid == pid)
            .ok_or(EngineError::ProcessNotFound(pid))
    }

    fn lock(&self) -> MutexGuard<'_, ReplayState> {
        lock(&self.state)
    }

    fn session_pid(&self, session: SessionHandle) -> std::result::Result<Pid, EngineError> {
        self.lock()
            .sessions
            .get(&session)
            .copied()
            .ok_or_else(|| EngineError::Transport(format!("unknown session {}", session.0)))
    }
}

impl Engine for ReplayEngine {
    fn spawn(&mut self, program: &str, args: &[String]) -> std::result::Result<Pid, EngineError> {
        let process = self
            .processes
            .iter()
            .find(|p| p.path.eq_ignore_ascii_case(program))
            .ok_or_else(|| EngineError::TargetNotFound(program.to_string()))?;

        self.journal
            .record(format!("spawn {} {}", process.path, args.join(" ")).trim_end().to_string());
        Ok(process.pid)
    }

    fn attach(&mut self, pid: Pid) -> std::result::Result<SessionHandle, EngineError> {
        let process = self.process(pid)?;
        if let Some(reason) = &process.attach_error {
            self.journal.record(format!("attach-failed {}", pid));
            return Err(EngineError::Transport(reason.clone()));
        }

        let mut state = self.lock();
        let session = SessionHandle(state.next_handle());
        state.sessions.insert(session, pid);
        drop(state);

        self.journal.record(format!("attach {}", pid));
        Ok(session)
    }

    fn resume(&mut self, pid: Pid) -> std::result::Result<(), EngineError> {
        let timeline = self.process(pid)?.timeline.clone();
        if !self.lock().resumed.insert(pid) {
            return Ok(());
        }
        self.journal.record(format!("resume {}", pid));

        let state = Arc::clone(&self.state);
        let journal = self.journal.clone();
        thread::Builder::new()
            .name(format!("replay-{}", pid))
            .spawn(move || play(pid, timeline, &state, &journal))
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(())
    }

    fn enable_child_gating(&mut self, session: SessionHandle) -> std::result::Result<(), EngineError> {
        let pid = self.session_pid(session)?;
        self.lock().gated.insert(pid);
        self.journal.record(format!("gate {}", pid));
        Ok(())
    }

    fn create_script(
        &mut self,
        session: SessionHandle,
        name: &str,
        source: &str,
    ) -> std::result::Result<ScriptHandle, EngineError> {
        let pid = self.session_pid(session)?;
        if source.trim().is_empty() {
            return Err(EngineError::Script(format!("{}: empty script", name)));
        }

        let mut state = self.lock();
        let script = ScriptHandle(state.next_handle());
        state.scripts.insert(
            script,
            ScriptEntry {
                pid,
                name: name.to_string(),
                loaded: false,
                sink: None,
            },
        );
        drop(state);

        self.journal.record(format!("create_script {} {}", pid, name));
        Ok(script)
    }

    fn load_script(&mut self, script: ScriptHandle) -> std::result::Result<(), EngineError> {
        let mut state = self.lock();
        let entry = state
            .scripts
            .get_mut(&script)
            .ok_or_else(|| EngineError::Script(format!("unknown script {}", script.0)))?;
        entry.loaded = true;
        let line = format!("load_script {} {}", entry.pid, entry.name);
        drop(state);

        self.journal.record(line);
        Ok(())
    }

    fn on_device_events(&mut self, sink: EventSink) {
        self.lock().device_sink = Some(sink);
    }

    fn on_detached(
        &mut self,
        session: SessionHandle,
        sink: EventSink,
    ) -> std::result::Result<(), EngineError> {
        let pid = self.session_pid(session)?;
        self.lock().detached_sinks.insert(session, sink);
        self.journal.record(format!("on_detached {}", pid));
        Ok(())
    }

    fn on_message(
        &mut self,
        script: ScriptHandle,
        sink: EventSink,
    ) -> std::result::Result<(), EngineError> {
        let mut state = self.lock();
        let entry = state
            .scripts
            .get_mut(&script)
            .ok_or_else(|| EngineError::Script(format!("unknown script {}", script.0)))?;
        entry.sink = Some(sink);
        let line = format!("on_message {} {}", entry.pid, entry.name);
        drop(state);

        self.journal.record(line);
        Ok(())
    }
}

// Sinks are cloned out of the lock before delivery: a sink may block on a
// full reactor queue while the loop thread is waiting for this lock.
fn play(pid: Pid, timeline: Vec<Step>, state: &Mutex<ReplayState>, journal: &Journal) {
    for step in timeline {
        thread::sleep(step.delay());
        match step {
            Step::Send { probe, payload, .. } => {
                deliver_to_scripts(state, pid, &probe, ScriptMessage::Send { payload }, journal)
            }
            Step::Error {
                probe, description, ..
            } => deliver_to_scripts(
                state,
                pid,
                &probe,
                ScriptMessage::Error {
                    description,
                    stack: None,
                },
                journal,
            ),
            Step::Child {
                pid: child, path, ..
            } => {
                let sink = {
                    let state = lock(state);
                    if state.gated.contains(&pid) {
                        state.device_sink.clone()
                    } else {
                        None
                    }
                };
                match sink {
                    Some(sink) => {
                        journal.record(format!("child {} {}", pid, child));
                        sink.deliver(EngineEvent::ChildAdded { pid: child, path });
                    }
                    None => journal.record(format!("ungated-child {} {}", pid, child)),
                }
            }
            Step::ChildRemoved { pid: child, .. } => {
                let sink = lock(state).device_sink.clone();
                if let Some(sink) = sink {
                    sink.deliver(EngineEvent::ChildRemoved { pid: child });
                }
            }
            Step::Exit { reason, .. } => {
                detach(pid, &reason, state, journal);
                return;
            }
        }
    }

    detach(pid, &default_exit_reason(), state, journal);
}

fn lock(state: &Mutex<ReplayState>) -> MutexGuard<'_, ReplayState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn deliver_to_scripts(
    state: &Mutex<ReplayState>,
    pid: Pid,
    probe: &str,
    message: ScriptMessage,
    journal: &Journal,
) {
    let targets: Vec<(ScriptHandle, EventSink)> = lock(state)
        .scripts
        .iter()
        .filter(|(_, entry)| entry.pid == pid && entry.name == probe && entry.loaded)
        .filter_map(|(handle, entry)| entry.sink.clone().map(|sink| (*handle, sink)))
        .collect();

    if targets.is_empty() {
        journal.record(format!("dropped {} {}", pid, probe));
        return;
    }
    for (script, sink) in targets {
        sink.deliver(EngineEvent::Message {
            script,
            message: message.clone(),
        });
    }
}

fn detach(pid: Pid, reason: &str, state: &Mutex<ReplayState>, journal: &Journal) {
    let sinks: Vec<(SessionHandle, EventSink)> = {
        let state = lock(state);
        state
            .sessions
            .iter()
            .filter(|(_, session_pid)| **session_pid == pid)
            .filter_map(|(session, _)| {
                state
                    .detached_sinks
                    .get(session)
                    .map(|sink| (*session, sink.clone()))
            })
            .collect()
    };

    journal.record(format!("exit {}", pid));
    for (session, sink) in sinks {
        sink.deliver(EngineEvent::Detached {
            session,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc::{Receiver, channel};

    fn recording() -> Recording {
        Recording::from_json(
            &json!({
                "processes": [
                    {
                        "pid": 100,
                        "path": "C:\\app.exe",
                        "timeline": [
                            {"kind": "send", "probe": "socket", "payload": {"function": "connect"}},
                            {"kind": "child", "pid": 101, "path": "C:\\child.exe"},
                            {"kind": "exit", "reason": "process-terminated"}
                        ]
                    },
                    {"pid": 101, "path": "C:\\child.exe"},
                    {"pid": 200, "path": "C:\\locked.exe", "attach_error": "access denied"}
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn collector() -> (EventSink, Receiver<EngineEvent>) {
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        let sink = EventSink::new(move |event| {
            let _ = tx.lock().unwrap().send(event);
        });
        (sink, rx)
    }

    #[test]
    fn test_spawn_unknown_target() {
        let mut engine = ReplayEngine::new(recording());

        assert_eq!(
            engine.spawn("C:\\missing.exe", &[]),
            Err(EngineError::TargetNotFound("C:\\missing.exe".to_string()))
        );
        assert!(engine.journal().entries().is_empty());
    }

    #[test]
    fn test_spawn_matches_path_case_insensitively() {
        let mut engine = ReplayEngine::new(recording());
        assert_eq!(engine.spawn("c:\\APP.exe", &[]), Ok(100));
    }

    #[test]
    fn test_attach_error_is_transport() {
        let mut engine = ReplayEngine::new(recording());

        match engine.attach(200) {
            Err(EngineError::Transport(reason)) => assert_eq!(reason, "access denied"),
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_timeline_delivers_through_sinks() {
        let mut engine = ReplayEngine::new(recording());
        let (sink, events) = collector();
        engine.on_device_events(sink.clone());

        let pid = engine.spawn("C:\\app.exe", &[]).unwrap();
        let session = engine.attach(pid).unwrap();
        engine.enable_child_gating(session).unwrap();
        engine.on_detached(session, sink.clone()).unwrap();
        let script = engine.create_script(session, "socket", "send({});").unwrap();
        engine.on_message(script, sink).unwrap();
        engine.load_script(script).unwrap();
        engine.resume(pid).unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(
            events.recv_timeout(timeout).unwrap(),
            EngineEvent::Message {
                script,
                message: ScriptMessage::send(json!({"function": "connect"})),
            }
        );
        assert_eq!(
            events.recv_timeout(timeout).unwrap(),
            EngineEvent::ChildAdded {
                pid: 101,
                path: "C:\\child.exe".to_string()
            }
        );
        assert_eq!(
            events.recv_timeout(timeout).unwrap(),
            EngineEvent::Detached {
                session,
                reason: "process-terminated".to_string()
            }
        );
    }

    #[test]
    fn test_child_is_not_reported_without_gating() {
        let mut engine = ReplayEngine::new(recording());
        let (sink, events) = collector();
        engine.on_device_events(sink.clone());

        let session = engine.attach(100).unwrap();
        engine.on_detached(session, sink).unwrap();
        engine.resume(100).unwrap();

        let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, EngineEvent::Detached { .. }));
        assert!(engine.journal().contains("ungated-child 100 101"));
        assert!(engine.journal().contains("dropped 100 socket"));
    }

    #[test]
    fn test_empty_script_is_rejected() {
        let mut engine = ReplayEngine::new(recording());
        let session = engine.attach(100).unwrap();

        assert!(matches!(
            engine.create_script(session, "socket", "  "),
            Err(EngineError::Script(_))
        ));
    }
}
