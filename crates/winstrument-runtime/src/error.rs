use std::fmt;

use winstrument_types::Pid;

/// Result type for winstrument-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Faults reported by the instrumentation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The executable to spawn does not exist
    TargetNotFound(String),

    /// Attaching to or talking with the target failed
    Transport(String),

    /// A script could not be created or loaded
    Script(String),

    /// No process with this pid is known to the engine
    ProcessNotFound(Pid),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::TargetNotFound(path) => write!(f, "Target not found: {}", path),
            EngineError::Transport(msg) => write!(f, "Transport error: {}", msg),
            EngineError::Script(msg) => write!(f, "Script error: {}", msg),
            EngineError::ProcessNotFound(pid) => write!(f, "No such process: {}", pid),
        }
    }
}

impl std::error::Error for EngineError {}

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Message store error
    Index(winstrument_index::Error),

    /// Instrumentation engine error
    Engine(EngineError),

    /// Probe catalog error
    Probe(winstrument_probes::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Invalid operation or state
    InvalidOperation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Index(err) => write!(f, "Store error: {}", err),
            Error::Engine(err) => write!(f, "Engine error: {}", err),
            Error::Probe(err) => write!(f, "Probe error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Index(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Probe(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Config(_) | Error::InvalidOperation(_) => None,
        }
    }
}

impl From<winstrument_index::Error> for Error {
    fn from(err: winstrument_index::Error) -> Self {
        Error::Index(err)
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Error::Engine(err)
    }
}

impl From<winstrument_probes::Error> for Error {
    fn from(err: winstrument_probes::Error) -> Self {
        Error::Probe(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
