pub mod builtin;
pub mod catalog;
pub mod error;
pub mod probe;

pub use catalog::{ProbeCatalog, ProbeFactory};
pub use error::{Error, Result};
pub use probe::{MessageSink, Probe, ProbeContext, ScriptHooks, record_payload};
