//! Boundary to the code-injection engine.
//!
//! The orchestrator only talks to the engine through [`Engine`]. Engines
//! deliver asynchronous events from their own threads through an
//! [`EventSink`]; the runtime's sink forwards them onto the reactor.

pub mod replay;

use std::fmt;
use std::sync::Arc;
use winstrument_types::{Pid, ScriptMessage};

use crate::EngineError;

/// Engine-side attachment to one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(pub u64);

/// One injected script inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A gated child process was created and is waiting for `resume`.
    ChildAdded { pid: Pid, path: String },
    ChildRemoved { pid: Pid },
    Detached { session: SessionHandle, reason: String },
    Message {
        script: ScriptHandle,
        message: ScriptMessage,
    },
}

/// Callback an engine invokes, from any thread, to report an event.
#[derive(Clone)]
pub struct EventSink(Arc<dyn Fn(EngineEvent) + Send + Sync>);

impl EventSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(deliver))
    }

    pub fn deliver(&self, event: EngineEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventSink")
    }
}

/// Spawn / attach / resume primitives plus the event channels into a target.
///
/// Called only from the reactor thread.
pub trait Engine: Send {
    /// Start `program` suspended. Fails with `TargetNotFound`.
    fn spawn(&mut self, program: &str, args: &[String]) -> Result<Pid, EngineError>;

    /// Fails with `Transport` when the process cannot be instrumented.
    fn attach(&mut self, pid: Pid) -> Result<SessionHandle, EngineError>;

    fn resume(&mut self, pid: Pid) -> Result<(), EngineError>;

    /// Hold new children of this session suspended and report them as
    /// `ChildAdded`.
    fn enable_child_gating(&mut self, session: SessionHandle) -> Result<(), EngineError>;

    fn create_script(
        &mut self,
        session: SessionHandle,
        name: &str,
        source: &str,
    ) -> Result<ScriptHandle, EngineError>;

    fn load_script(&mut self, script: ScriptHandle) -> Result<(), EngineError>;

    /// Device-wide events: `ChildAdded` and `ChildRemoved`.
    fn on_device_events(&mut self, sink: EventSink);

    fn on_detached(&mut self, session: SessionHandle, sink: EventSink) -> Result<(), EngineError>;

    fn on_message(&mut self, script: ScriptHandle, sink: EventSink) -> Result<(), EngineError>;
}
