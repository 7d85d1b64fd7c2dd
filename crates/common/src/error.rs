//! Error types for bypasser

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using bypasser Error
pub type Result<T> = std::result::Result<T, Error>;

/// bypasser error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {kind} name {name:?}: use only lowercase letters and numbers")]
    InvalidName { kind: &'static str, name: String },

    #[error("invalid peer name {0:?}: expected vpn:peer")]
    InvalidPeerRef(String),

    #[error("{kind} {name:?} does not exist ({})", path.display())]
    NotFound {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("{kind} {name:?} already exists ({})", path.display())]
    AlreadyExists {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("no available {resource} in {bound}")]
    Exhausted { resource: &'static str, bound: String },

    #[error("malformed config {}: {detail}", path.display())]
    MalformedConfig { path: PathBuf, detail: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("{} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{0}")]
    CommandNotFound(String),

    #[error("command `{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Network detection error: {0}")]
    Detection(String),
}

impl Error {
    /// Build a `MalformedConfig` for a file
    pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Error::MalformedConfig {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True for errors that describe a missing referenced entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_resource() {
        let err = Error::Exhausted {
            resource: "port",
            bound: "range 55107-55207".to_string(),
        };
        assert_eq!(err.to_string(), "no available port in range 55107-55207");

        let err = Error::AlreadyExists {
            kind: "vpn",
            name: "home".to_string(),
            path: PathBuf::from("/etc/wireguard/bp-home.conf"),
        };
        assert_eq!(
            err.to_string(),
            "vpn \"home\" already exists (/etc/wireguard/bp-home.conf)"
        );
    }
}
