use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Snapshot(ascope_snapshot::Error),
    Provider(ascope_providers::Error),
    Io(std::io::Error),
    Config(String),
    Watch(notify::Error),
    UnknownProvider(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Snapshot(err) => write!(f, "snapshot error: {err}"),
            Error::Provider(err) => write!(f, "provider error: {err}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Watch(err) => write!(f, "filesystem watch error: {err}"),
            Error::UnknownProvider(id) => write!(f, "unknown provider: {id}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Snapshot(err) => Some(err),
            Error::Provider(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Watch(err) => Some(err),
            Error::Config(_) | Error::UnknownProvider(_) => None,
        }
    }
}

impl From<ascope_snapshot::Error> for Error {
    fn from(err: ascope_snapshot::Error) -> Self {
        Error::Snapshot(err)
    }
}

impl From<ascope_providers::Error> for Error {
    fn from(err: ascope_providers::Error) -> Self {
        Error::Provider(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watch(err)
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


