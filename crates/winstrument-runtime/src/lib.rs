pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod reactor;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod settings;

pub use config::{Config, resolve_data_dir};
pub use engine::replay::{Journal, Recording, ReplayEngine};
pub use engine::{Engine, EngineEvent, EventSink, ScriptHandle, SessionHandle};
pub use error::{EngineError, Error, Result};
pub use orchestrator::IDLE_DEBOUNCE;
pub use reactor::{Reactor, ReactorHandle};
pub use registry::ProbeRegistry;
pub use runtime::{RunOutcome, Runtime, RuntimeConfig, RuntimeHandle};
pub use settings::{CORE_NAMESPACE, Settings};
