//! Session orchestration. Every method here runs on the reactor thread.

use std::collections::HashMap;
use std::time::Duration;
use winstrument_index::Database;
use winstrument_types::{Pid, ScriptMessage, SessionState, SessionSummary};

use crate::driver::{DriverEnv, LifecycleDriver};
use crate::engine::{Engine, EngineEvent, EventSink, ScriptHandle, SessionHandle};
use crate::reactor::ReactorHandle;
use crate::registry::ProbeRegistry;
use crate::session::Session;
use crate::settings::Settings;

/// How long the active set must stay empty before the loop stops.
pub const IDLE_DEBOUNCE: Duration = Duration::from_millis(500);

pub type Handle = ReactorHandle<Orchestrator>;

pub struct Orchestrator {
    engine: Box<dyn Engine>,
    pub(crate) db: Database,
    pub(crate) settings: Settings,
    pub(crate) registry: ProbeRegistry,
    driver: LifecycleDriver,
    sessions: HashMap<SessionHandle, Session>,
    scripts: HashMap<ScriptHandle, SessionHandle>,
    events: EventSink,
    /// Bumped whenever a session enters or leaves the active set
    generation: u64,
}

impl Orchestrator {
    pub fn new(
        mut engine: Box<dyn Engine>,
        db: Database,
        settings: Settings,
        registry: ProbeRegistry,
        events: EventSink,
    ) -> Self {
        engine.on_device_events(events.clone());
        let driver = LifecycleDriver::new(registry.catalog().clone());

        Self {
            engine,
            db,
            settings,
            registry,
            driver,
            sessions: HashMap::new(),
            scripts: HashMap::new(),
            events,
            generation: 0,
        }
    }

    pub fn active_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> =
            self.sessions.values().map(Session::summary).collect();
        sessions.sort_by_key(|s| s.pid);
        sessions
    }

    pub fn has_sessions(&self) -> bool {
        !self.sessions.is_empty()
    }

    /// Spawn `target` and instrument it.
    pub fn start(&mut self, target: &str, args: &[String], handle: &Handle) {
        match self.engine.spawn(target, args) {
            Ok(pid) => {
                tracing::info!(pid, target = %target, "spawned");
                self.instrument(pid, target, handle);
            }
            Err(err) => {
                tracing::error!(target = %target, error = %err, "could not start target");
                self.stop_if_idle(handle);
            }
        }
    }

    /// Attach, gate children, load probes and resume. The session becomes
    /// active only when every step up to `resume` succeeded.
    pub fn instrument(&mut self, pid: Pid, path: &str, handle: &Handle) {
        if self.sessions.values().any(|s| s.pid == pid) {
            tracing::warn!(pid, "process is already instrumented");
            return;
        }

        tracing::debug!(pid, state = %SessionState::Attaching, "attaching");
        let session_handle = match self.engine.attach(pid) {
            Ok(session_handle) => session_handle,
            Err(err) => {
                tracing::error!(pid, path = %path, error = %err, "attach failed, abandoning process");
                self.schedule_idle_check(handle);
                return;
            }
        };

        let mut session = Session::new(pid, path, session_handle);

        if let Err(err) = self.engine.enable_child_gating(session_handle) {
            tracing::error!(pid, error = %err, "could not enable child gating");
            self.release(pid, handle);
            return;
        }
        if let Err(err) = self.engine.on_detached(session_handle, self.events.clone()) {
            tracing::error!(pid, error = %err, "could not subscribe to detach");
            self.release(pid, handle);
            return;
        }

        let names = self.registry.loaded().to_vec();
        let mut env = DriverEnv {
            engine: self.engine.as_mut(),
            db: &self.db,
            settings: &self.settings,
            events: &self.events,
        };
        self.driver.load_all(&mut env, &mut session, &names);

        if let Err(err) = env.engine.resume(pid) {
            tracing::error!(pid, error = %err, "resume failed, abandoning process");
            self.driver.finish(&env, &mut session);
            self.schedule_idle_check(handle);
            return;
        }

        session.state = SessionState::Instrumented;
        for probe in &session.probes {
            self.scripts.insert(probe.script, session_handle);
        }
        tracing::info!(
            pid,
            path = %path,
            probes = session.probes.len(),
            "instrumented"
        );
        self.sessions.insert(session_handle, session);
        self.generation += 1;
    }

    /// Let an attached but uninstrumented process run on its own.
    fn release(&mut self, pid: Pid, handle: &Handle) {
        match self.engine.resume(pid) {
            Ok(()) => tracing::warn!(pid, "resumed without instrumentation"),
            Err(err) => tracing::error!(pid, error = %err, "could not resume abandoned process"),
        }
        self.schedule_idle_check(handle);
    }

    pub fn handle_event(&mut self, event: EngineEvent, handle: &Handle) {
        match event {
            EngineEvent::ChildAdded { pid, path } => {
                tracing::info!(pid, path = %path, "child process gated");
                self.instrument(pid, &path, handle);
            }
            EngineEvent::ChildRemoved { pid } => {
                tracing::info!(pid, "child process removed");
            }
            EngineEvent::Detached { session, reason } => self.on_detach(session, &reason, handle),
            EngineEvent::Message { script, message } => self.on_script_message(script, message),
        }
    }

    fn on_script_message(&mut self, script: ScriptHandle, message: ScriptMessage) {
        let Some(session_handle) = self.scripts.get(&script).copied() else {
            tracing::debug!(script = script.0, "message for unknown script");
            return;
        };
        let Some(session) = self.sessions.get_mut(&session_handle) else {
            return;
        };
        let Some(index) = session.probe_index(script) else {
            return;
        };

        let env = DriverEnv {
            engine: self.engine.as_mut(),
            db: &self.db,
            settings: &self.settings,
            events: &self.events,
        };
        self.driver.deliver(&env, session, index, message);
    }

    /// Finish every probe, drop the session, then re-check idleness after
    /// the debounce window.
    pub fn on_detach(&mut self, session_handle: SessionHandle, reason: &str, handle: &Handle) {
        let Some(session) = self.sessions.get_mut(&session_handle) else {
            tracing::debug!(session = session_handle.0, "detach for unknown session");
            return;
        };

        tracing::info!(pid = session.pid, reason = %reason, "detached");
        let env = DriverEnv {
            engine: self.engine.as_mut(),
            db: &self.db,
            settings: &self.settings,
            events: &self.events,
        };
        self.driver.finish(&env, session);

        let Some(mut session) = self.sessions.remove(&session_handle) else {
            return;
        };
        session.state = SessionState::Detached;
        self.generation += 1;
        self.scripts.retain(|_, owner| *owner != session_handle);

        if self.settings.verbosity() >= 1 {
            for message in session.output() {
                tracing::info!(target: "winstrument::output", "{}", message);
            }
        }

        self.schedule_idle_check(handle);
    }

    pub fn stop_if_idle(&mut self, handle: &Handle) {
        if !self.has_sessions() {
            tracing::info!("no sessions remain, stopping");
            handle.stop();
        }
    }

    /// Stop after `IDLE_DEBOUNCE` unless the active set changed meanwhile.
    /// A later change schedules its own check.
    fn schedule_idle_check(&self, handle: &Handle) {
        let generation = self.generation;
        let scheduled = handle.schedule_after(IDLE_DEBOUNCE, "stop-if-idle", move |core, h| {
            if core.generation == generation {
                core.stop_if_idle(h);
            } else {
                tracing::debug!("active set changed during debounce");
            }
            Ok(())
        });
        if let Err(err) = scheduled {
            tracing::error!(error = %err, "could not schedule idle check");
        }
    }
}
