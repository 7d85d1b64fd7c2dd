//! Core types for bypasser

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Validate a VPN or peer name against `[a-z0-9]+`
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9'));
    if !valid {
        return Err(Error::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Reference to a peer inside a VPN, serialized as `vpn:peer`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerRef {
    pub vpn: String,
    pub peer: String,
}

impl PeerRef {
    /// Build a reference, validating both halves
    pub fn new(vpn: impl Into<String>, peer: impl Into<String>) -> Result<Self> {
        let peer_ref = Self {
            vpn: vpn.into(),
            peer: peer.into(),
        };
        peer_ref.validate()?;
        Ok(peer_ref)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("vpn", &self.vpn)?;
        validate_name("peer", &self.peer)
    }
}

impl std::fmt::Display for PeerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.vpn, self.peer)
    }
}

impl FromStr for PeerRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (vpn, peer) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidPeerRef(s.to_string()))?;
        if vpn.is_empty() || peer.is_empty() {
            return Err(Error::InvalidPeerRef(s.to_string()));
        }
        PeerRef::new(vpn, peer)
    }
}

/// What happened to a path on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Created => write!(f, "created"),
            ChangeAction::Updated => write!(f, "updated"),
            ChangeAction::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: ChangeAction,
    pub path: PathBuf,
}

/// Whether a runtime command actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    Executed,
    Suggested,
}

/// A system command the operation ran, or would have run with privileges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeAction {
    pub description: String,
    pub command: String,
    pub status: RuntimeStatus,
    pub message: String,
}

/// Accumulated side effects and non-fatal warnings of one operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub changes: Vec<Change>,
    pub runtime_actions: Vec<RuntimeAction>,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn add_change(&mut self, action: ChangeAction, path: impl AsRef<Path>) {
        self.changes.push(Change {
            action,
            path: path.as_ref().to_path_buf(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("warning: {}", message);
        self.warnings.push(message);
    }

    pub fn add_runtime(&mut self, action: RuntimeAction) {
        self.runtime_actions.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.runtime_actions.is_empty() && self.warnings.is_empty()
    }
}

/// Result of creating a VPN
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddVpnResult {
    pub report: Report,
    pub vpn: String,
    pub interface: String,
    pub config_path: PathBuf,
    pub listen_port: u16,
    pub address: String,
}

/// Result of creating a peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPeerResult {
    pub report: Report,
    pub peer: PeerRef,
    pub config_path: PathBuf,
    pub config: String,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        for name in ["home", "a", "vpn01", "0"] {
            assert!(validate_name("vpn", name).is_ok(), "{name} should be valid");
        }
        for name in ["", "Home", "my-vpn", "my vpn", "vpn_1", "é", "a:b"] {
            assert!(validate_name("vpn", name).is_err(), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_parse_peer_ref() {
        let peer_ref: PeerRef = "home:laptop".parse().unwrap();
        assert_eq!(peer_ref.vpn, "home");
        assert_eq!(peer_ref.peer, "laptop");
        assert_eq!(peer_ref.to_string(), "home:laptop");
    }

    #[test]
    fn test_parse_peer_ref_rejects_malformed() {
        for raw in ["home", ":laptop", "home:", "", "home:lap:top"] {
            assert!(raw.parse::<PeerRef>().is_err(), "{raw:?} should be rejected");
        }
        assert!(matches!(
            "home".parse::<PeerRef>(),
            Err(Error::InvalidPeerRef(_))
        ));
        assert!(matches!(
            "Home:laptop".parse::<PeerRef>(),
            Err(Error::InvalidName { kind: "vpn", .. })
        ));
    }

    #[test]
    fn test_peer_refs_sort_by_vpn_then_peer() {
        let mut refs: Vec<PeerRef> = ["work:b", "home:z", "home:a"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        refs.sort();
        let rendered: Vec<String> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["home:a", "home:z", "work:b"]);
    }

    #[test]
    fn test_report_accumulates() {
        let mut report = Report::default();
        assert!(report.is_empty());
        report.add_change(ChangeAction::Created, "/tmp/x.conf");
        report.warn("something odd");
        assert_eq!(report.changes[0].action, ChangeAction::Created);
        assert_eq!(report.warnings, vec!["something odd".to_string()]);
        assert!(!report.is_empty());
    }
}
