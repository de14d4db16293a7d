use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use winstrument_index::{Database, Namespace};
use winstrument_probes::ProbeCatalog;
use winstrument_types::{Message, ProbeDescriptor, SessionSummary};

use crate::config::Config;
use crate::engine::{Engine, EventSink};
use crate::orchestrator::{Handle, Orchestrator};
use crate::reactor::Reactor;
use crate::registry::ProbeRegistry;
use crate::settings::{CORE_NAMESPACE, Settings};
use crate::{Error, Result};

/// How a [`Runtime`] is wired to its store and probes.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Store file; `None` keeps everything in memory
    pub database: Option<PathBuf>,
    pub queue_capacity: usize,
    /// Optional `probes.toml` with probe descriptors
    pub metadata: Option<PathBuf>,
    pub catalog: ProbeCatalog,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            database: None,
            queue_capacity: Config::default().queue_capacity,
            metadata: None,
            catalog: ProbeCatalog::builtin(),
        }
    }
}

impl RuntimeConfig {
    /// Paths and limits from `config.toml` in `data_dir`.
    pub fn from_data_dir(data_dir: &Path) -> Result<Self> {
        let config = Config::load_from(&Config::path_in(data_dir))?;
        Ok(Self {
            database: Some(config.database_path(data_dir)),
            queue_capacity: config.queue_capacity,
            metadata: Some(config.metadata_path(data_dir)),
            catalog: ProbeCatalog::builtin(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every session detached and the loop stopped on its own
    Idle,
    /// `RuntimeHandle::stop` ended the run
    Cancelled,
}

/// Entry point for embedding the orchestrator.
///
/// Outside of [`Runtime::run`] the orchestrator state is reached directly;
/// while `run` blocks, other threads go through a [`RuntimeHandle`].
pub struct Runtime {
    reactor: Reactor<Orchestrator>,
    core: Orchestrator,
    stop_requested: Arc<AtomicBool>,
}

impl Runtime {
    pub fn new(engine: impl Engine + 'static, config: RuntimeConfig) -> Result<Self> {
        let db = match &config.database {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        };
        let settings = Settings::restore(&db);

        for problem in config.catalog.validate() {
            tracing::warn!(problem = %problem, "probe catalog");
        }
        let registry = match &config.metadata {
            Some(path) => ProbeRegistry::from_metadata(config.catalog, path),
            None => ProbeRegistry::new(config.catalog),
        };

        let reactor = Reactor::new(config.queue_capacity);
        let events = forward_to(reactor.handle());
        let core = Orchestrator::new(Box::new(engine), db, settings, registry, events);

        Ok(Self {
            reactor,
            core,
            stop_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            reactor: self.reactor.handle(),
            stop_requested: Arc::clone(&self.stop_requested),
        }
    }

    /// Spawn `target` and block until every session has detached or the
    /// run is cancelled.
    ///
    /// Without an explicit target the `core.target` / `core.args` settings
    /// are used. A stop requested before the call cancels it immediately.
    pub fn run(&mut self, target: Option<&str>, args: Option<Vec<String>>) -> Result<RunOutcome> {
        // Cleared before the check so a stop landing after it still ends the loop
        self.reactor.clear_stop();
        if self.stop_requested.swap(false, Ordering::SeqCst) {
            return Ok(RunOutcome::Cancelled);
        }

        let target = match target {
            Some(target) => target.to_string(),
            None => self
                .core
                .settings
                .get(CORE_NAMESPACE, "target")
                .map(str::to_string)
                .ok_or_else(|| Error::Config("no target configured".to_string()))?,
        };
        let args = args.unwrap_or_else(|| {
            self.core
                .settings
                .get(CORE_NAMESPACE, "args")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        });

        tracing::info!(target = %target, "starting run");
        self.reactor.handle().schedule("start", move |core, h| {
            core.start(&target, &args, h);
            Ok(())
        })?;
        self.reactor.run(&mut self.core);

        if self.stop_requested.swap(false, Ordering::SeqCst) {
            Ok(RunOutcome::Cancelled)
        } else {
            Ok(RunOutcome::Idle)
        }
    }

    /// Queue a probe for sessions created from now on.
    pub fn load_probe(&mut self, name: &str) -> bool {
        self.core.registry.load_probe(name)
    }

    /// Remove a probe from future sessions. Running instances keep going.
    pub fn unload_probe(&mut self, name: &str) -> bool {
        self.core.registry.unload_probe(name)
    }

    pub fn available_probes(&self) -> &[String] {
        self.core.registry.available()
    }

    pub fn loaded_probes(&self) -> &[String] {
        self.core.registry.loaded()
    }

    pub fn descriptors(&self) -> &[ProbeDescriptor] {
        self.core.registry.descriptors()
    }

    pub fn descriptor(&self, name: &str) -> Option<&ProbeDescriptor> {
        self.core.registry.descriptor(name)
    }

    pub fn get_setting(&self, namespace: &str, key: &str) -> Option<&str> {
        self.core.settings.get(namespace, key)
    }

    pub fn set_setting(&mut self, namespace: &str, key: &str, value: impl Into<String>) {
        self.core.settings.set(namespace, key, value);
    }

    pub fn get_settings(&self, namespace: &str) -> Namespace {
        self.core.settings.get_all(namespace)
    }

    pub fn settings(&self) -> &Settings {
        &self.core.settings
    }

    pub fn save_settings(&self) -> Result<()> {
        self.core.settings.save(&self.core.db)
    }

    pub fn read_messages(&self, probe: &str) -> Result<Vec<Message>> {
        Ok(self.core.db.read_messages(probe)?)
    }

    pub fn probes_with_output(&self) -> Result<Vec<String>> {
        Ok(self.core.db.probes_with_output()?)
    }

    pub fn clear_messages(&self) -> Result<usize> {
        Ok(self.core.db.clear_messages()?)
    }

    pub fn active_sessions(&self) -> Vec<SessionSummary> {
        self.core.active_sessions()
    }

    /// Save every settings namespace, then decide whether captured output
    /// survives. `confirm` is only asked when `core.always_persist` is not
    /// true. Returns whether messages were kept.
    pub fn quit<F>(&self, confirm: F) -> Result<bool>
    where
        F: FnOnce() -> bool,
    {
        self.save_settings()?;

        let always_persist = self
            .core
            .settings
            .get_bool(CORE_NAMESPACE, "always_persist")
            .unwrap_or(false);
        if always_persist || confirm() {
            return Ok(true);
        }

        let cleared = self.clear_messages()?;
        tracing::info!(cleared, "discarded captured output");
        Ok(false)
    }
}

/// Cloneable, thread-safe control over a running [`Runtime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    reactor: Handle,
    stop_requested: Arc<AtomicBool>,
}

impl RuntimeHandle {
    /// Cancel the current (or next) run.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.reactor.stop();
    }

    pub fn load_probe(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.reactor.schedule("load-probe", move |core, _| {
            core.registry.load_probe(&name);
            Ok(())
        })
    }

    pub fn unload_probe(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.reactor.schedule("unload-probe", move |core, _| {
            core.registry.unload_probe(&name);
            Ok(())
        })
    }
}

/// Engine callbacks land on whatever thread the engine uses; hop onto the
/// loop before touching orchestrator state.
fn forward_to(reactor: Handle) -> EventSink {
    EventSink::new(move |event| {
        let result = reactor.schedule("engine-event", move |core, h| {
            core.handle_event(event, h);
            Ok(())
        });
        if let Err(err) = result {
            tracing::debug!(error = %err, "dropping engine event");
        }
    })
}
