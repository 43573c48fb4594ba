//! Error types for the exporter

use std::fmt;

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the exporter
#[derive(Debug)]
pub enum Error {
    /// IO errors
    Io(std::io::Error),
    /// HTTP transport errors against the management bridge
    Http(reqwest::Error),
    /// Configuration file parsing errors
    Yaml(serde_yaml::Error),
    /// Invalid scrape/blacklist pattern
    Pattern(regex::Error),
    /// Configuration errors
    Config(String),
    /// Management-protocol level errors (bad response shape, error status)
    Transport(String),
    /// Topology resolution failure; a cycle must never run on partial topology
    Topology(String),
    /// The remote side signalled the attribute does not support reads
    UnsupportedAttribute,
    /// Internal error
    Internal(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Yaml(e) => Some(e),
            Error::Pattern(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Yaml(e) => write!(f, "YAML error: {}", e),
            Error::Pattern(e) => write!(f, "Invalid pattern: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::Topology(msg) => write!(f, "Topology resolution failed: {}", msg),
            Error::UnsupportedAttribute => write!(f, "Attribute does not support reads"),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Yaml(e)
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::Pattern(e)
    }
}
