//! Probe lifecycle: load → message* → finish, once per probe per session.

use anyhow::Context;
use winstrument_index::Database;
use winstrument_probes::{MessageSink, ProbeCatalog, ProbeContext, ScriptHooks};
use winstrument_types::{Message, ProbeState, ScriptMessage};

use crate::engine::{Engine, EventSink, ScriptHandle};
use crate::session::{ProbeInstance, Session};
use crate::settings::Settings;

/// Collaborators a lifecycle step needs, borrowed from the orchestrator.
pub struct DriverEnv<'a> {
    pub engine: &'a mut dyn Engine,
    pub db: &'a Database,
    pub settings: &'a Settings,
    pub events: &'a EventSink,
}

/// Writes to the store and keeps a copy for the detach report.
struct StoreSink<'a> {
    db: &'a Database,
    output: &'a mut Vec<Message>,
}

impl MessageSink for StoreSink<'_> {
    fn write(&mut self, message: Message) -> anyhow::Result<()> {
        self.db.write_message(&message)?;
        self.output.push(message);
        Ok(())
    }
}

struct EngineHooks<'a> {
    engine: &'a mut dyn Engine,
    script: ScriptHandle,
    events: &'a EventSink,
}

impl ScriptHooks for EngineHooks<'_> {
    fn subscribe_messages(&mut self) -> anyhow::Result<()> {
        self.engine.on_message(self.script, self.events.clone())?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleDriver {
    catalog: ProbeCatalog,
}

impl LifecycleDriver {
    pub fn new(catalog: ProbeCatalog) -> Self {
        Self { catalog }
    }

    /// Instantiate `names` against `session` in order. A probe that fails
    /// any step is dropped for this session only.
    pub fn load_all(&self, env: &mut DriverEnv<'_>, session: &mut Session, names: &[String]) {
        for name in names {
            match self.load(env, session, name) {
                Ok(instance) => {
                    tracing::debug!(probe = %name, pid = session.pid, "probe running");
                    session.probes.push(instance);
                }
                Err(err) => {
                    let detail = format!("{:#}", err);
                    tracing::warn!(probe = %name, pid = session.pid, error = %detail, "dropping probe for this session");
                }
            }
        }
    }

    fn load(
        &self,
        env: &mut DriverEnv<'_>,
        session: &Session,
        name: &str,
    ) -> anyhow::Result<ProbeInstance> {
        let mut probe = self.catalog.create(name)?;
        let script = env
            .engine
            .create_script(session.handle, name, probe.script())
            .context("create script")?;

        let mut hooks = EngineHooks {
            engine: &mut *env.engine,
            script,
            events: env.events,
        };
        probe.register_callbacks(&mut hooks)?;
        env.engine.load_script(script).context("load script")?;

        let mut instance = ProbeInstance::new(name, probe, script);
        {
            let mut sink = StoreSink {
                db: env.db,
                output: &mut instance.output,
            };
            let mut ctx = ProbeContext {
                probe: &instance.name,
                target: &session.path,
                pid: session.pid,
                session_state: session.state,
                settings: env.settings.namespace(name),
                sink: &mut sink,
            };
            instance.probe.on_load(&mut ctx).context("on_load")?;
        }
        instance.state = ProbeState::Running;
        Ok(instance)
    }

    /// Hand one script message to the probe at `index`.
    ///
    /// Error-tagged messages are logged and never reach the probe or the store.
    pub fn deliver(
        &self,
        env: &DriverEnv<'_>,
        session: &mut Session,
        index: usize,
        message: ScriptMessage,
    ) {
        let Some(instance) = session.probes.get_mut(index) else {
            return;
        };

        let payload = match message {
            ScriptMessage::Error { description, stack } => {
                tracing::error!(
                    probe = %instance.name,
                    pid = session.pid,
                    stack = stack.as_deref().unwrap_or(""),
                    "script error: {}",
                    description
                );
                return;
            }
            ScriptMessage::Send { payload } => payload,
        };

        if instance.state != ProbeState::Running {
            tracing::debug!(probe = %instance.name, state = ?instance.state, "message after finish ignored");
            return;
        }

        let mut sink = StoreSink {
            db: env.db,
            output: &mut instance.output,
        };
        let mut ctx = ProbeContext {
            probe: &instance.name,
            target: &session.path,
            pid: session.pid,
            session_state: session.state,
            settings: env.settings.namespace(&instance.name),
            sink: &mut sink,
        };
        if let Err(err) = instance.probe.on_message(&mut ctx, payload) {
            tracing::warn!(probe = %instance.name, pid = session.pid, error = %err, "probe rejected message");
        }
    }

    /// Run `on_finish` on every instance that has not finished yet, in load order.
    pub fn finish(&self, env: &DriverEnv<'_>, session: &mut Session) {
        for instance in session.probes.iter_mut() {
            if instance.state == ProbeState::Finished {
                continue;
            }

            let mut sink = StoreSink {
                db: env.db,
                output: &mut instance.output,
            };
            let mut ctx = ProbeContext {
                probe: &instance.name,
                target: &session.path,
                pid: session.pid,
                session_state: session.state,
                settings: env.settings.namespace(&instance.name),
                sink: &mut sink,
            };
            if let Err(err) = instance.probe.on_finish(&mut ctx) {
                tracing::warn!(probe = %instance.name, pid = session.pid, error = %err, "on_finish failed");
            }
            instance.state = ProbeState::Finished;
        }
    }
}
