use std::fmt;

/// Result type for winstrument-index operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the store layer
#[derive(Debug)]
pub enum Error {
    /// Database operation failed
    Database(rusqlite::Error),

    /// Stored payload or settings blob could not be (de)serialized
    Json(serde_json::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Query-specific error (invalid input, unexpected shape, etc.)
    Query(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Json(err) => write!(f, "Serialization error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Query(msg) => write!(f, "Query error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Query(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
