use std::fmt;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for SDK operations.
#[derive(Debug)]
pub enum Error {
    /// Resource not found (session, project, etc.).
    NotFound(String),
    /// Invalid input parameters or configuration.
    InvalidInput(String),
    /// Error from the underlying runtime layer.
    Runtime(ascope_monitor::Error),
    /// Error from the snapshot storage layer.
    Snapshot(ascope_snapshot::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Runtime(err) => write!(f, "{}", err),
            Error::Snapshot(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Runtime(err) => Some(err),
            Error::Snapshot(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ascope_monitor::Error> for Error {
    fn from(err: ascope_monitor::Error) -> Self {
        Error::Runtime(err)
    }
}

impl From<ascope_snapshot::Error> for Error {
    fn from(err: ascope_snapshot::Error) -> Self {
        Error::Snapshot(err)
    }
}
