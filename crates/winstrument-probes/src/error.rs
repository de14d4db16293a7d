use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// No factory is registered under this name
    ProbeNotFound(String),

    /// A script delivered a payload the probe cannot interpret
    MalformedEvent(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ProbeNotFound(name) => write!(f, "Probe not found: {}", name),
            Error::MalformedEvent(msg) => write!(f, "Malformed event: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
