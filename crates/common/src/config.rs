//! bypasser configuration
//!
//! Defaults, an optional TOML file, then `BP_*` environment overrides.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where WireGuard keys come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBackend {
    /// Shell out to `wg genkey`/`wg pubkey`/`wg genpsk`
    #[default]
    Wg,
    /// Generate x25519 keys in process
    Native,
}

impl std::str::FromStr for KeyBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wg" => Ok(KeyBackend::Wg),
            "native" => Ok(KeyBackend::Native),
            other => Err(Error::InvalidConfig(format!("unknown key backend {:?}", other))),
        }
    }
}

/// bypasser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the VPN config files
    pub wireguard_dir: PathBuf,

    /// Subdirectory of `wireguard_dir` holding client configs
    pub peers_subdir: String,

    /// Prefix of interface names and config filenames
    pub interface_prefix: String,

    /// sysctl drop-in enabling forwarding; skipped when unset
    pub sysctl_file: Option<PathBuf>,

    /// Listen port range (inclusive)
    pub min_port: u16,
    pub max_port: u16,

    /// First two octets of every mesh address
    pub subnet_prefix: String,
    pub interface_mask: u8,
    pub peer_mask: u8,

    /// Uplink interface for NAT rules; detected when unset
    pub public_interface: Option<String>,

    /// Host written into client `Endpoint`; detected when unset
    pub endpoint_host: Option<String>,

    /// Permission bits for written files and created directories
    pub file_mode: u32,
    pub dir_mode: u32,

    pub key_backend: KeyBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wireguard_dir: default_wireguard_dir(),
            peers_subdir: "peers".to_string(),
            interface_prefix: "bp-".to_string(),
            sysctl_file: default_sysctl_file(),
            min_port: 55107,
            max_port: 55207,
            subnet_prefix: "69.0".to_string(),
            interface_mask: 24,
            peer_mask: 32,
            public_interface: None,
            endpoint_host: None,
            file_mode: 0o600,
            dir_mode: 0o700,
            key_backend: KeyBackend::Wg,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `BP_*` overrides; unparsable numbers and empty values are ignored
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(dir) = var("BP_WG_DIR") {
            self.wireguard_dir = PathBuf::from(dir);
        }
        if let Some(file) = var("SYSCTL_CONF_FILE") {
            self.sysctl_file = Some(PathBuf::from(file));
        }
        if let Some(port) = var("BP_WG_DEFAULT_MIN_PORT").and_then(|v| v.parse().ok()) {
            self.min_port = port;
        }
        if let Some(port) = var("BP_WG_DEFAULT_MAX_PORT").and_then(|v| v.parse().ok()) {
            self.max_port = port;
        }
        if let Some(iface) = var("BP_PUBLIC_IFACE") {
            self.public_interface = Some(iface);
        }
        if let Some(host) = var("BP_ENDPOINT_HOST") {
            self.endpoint_host = Some(host);
        }
        if let Some(backend) = var("BP_KEY_BACKEND").and_then(|v| v.parse().ok()) {
            self.key_backend = backend;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_port == 0 || self.min_port > self.max_port {
            return Err(Error::InvalidConfig(format!(
                "invalid port range {}-{}",
                self.min_port, self.max_port
            )));
        }
        let octets: Vec<&str> = self.subnet_prefix.split('.').collect();
        if octets.len() != 2 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
            return Err(Error::InvalidConfig(format!(
                "subnet prefix must be two octets, got {:?}",
                self.subnet_prefix
            )));
        }
        if self.interface_mask > 32 || self.peer_mask > 32 {
            return Err(Error::InvalidConfig("masks must be at most 32".to_string()));
        }
        if self.interface_prefix.is_empty() || self.peers_subdir.is_empty() {
            return Err(Error::InvalidConfig(
                "interface prefix and peers subdirectory must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding client configs
    pub fn peers_dir(&self) -> PathBuf {
        self.wireguard_dir.join(&self.peers_subdir)
    }

    /// Interface name of a VPN, e.g. `bp-home`
    pub fn interface_name(&self, vpn: &str) -> String {
        format!("{}{}", self.interface_prefix, vpn)
    }

    pub fn vpn_config_path(&self, vpn: &str) -> PathBuf {
        self.wireguard_dir
            .join(format!("{}.conf", self.interface_name(vpn)))
    }

    pub fn peer_config_path(&self, vpn: &str, peer: &str) -> PathBuf {
        self.peers_dir()
            .join(format!("{}-{}.conf", self.interface_name(vpn), peer))
    }
}

/// Platform default for the WireGuard config directory
pub fn default_wireguard_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        PathBuf::from("/etc/wireguard")
    } else if cfg!(target_os = "macos") {
        let candidates = darwin_wireguard_candidates(
            std::env::var("HOMEBREW_PREFIX").ok().as_deref(),
            cfg!(target_arch = "aarch64"),
        );
        candidates
            .iter()
            .find(|path| path.is_dir())
            .or_else(|| candidates.first())
            .cloned()
            .unwrap_or_else(|| PathBuf::from("/usr/local/etc/wireguard"))
    } else if cfg!(windows) {
        let program_files =
            std::env::var("ProgramFiles").unwrap_or_else(|_| r"C:\Program Files".to_string());
        PathBuf::from(program_files)
            .join("WireGuard")
            .join("Data")
            .join("Configurations")
    } else {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .map(|dir| dir.join("wireguard"))
            .unwrap_or_else(|| PathBuf::from(".").join("wireguard"))
    }
}

fn default_sysctl_file() -> Option<PathBuf> {
    cfg!(target_os = "linux").then(|| PathBuf::from("/etc/sysctl.d/bypasser-forwarding.conf"))
}

fn darwin_wireguard_candidates(brew_prefix: Option<&str>, arm64: bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(prefix) = brew_prefix.filter(|p| !p.is_empty()) {
        out.push(Path::new(prefix).join("etc").join("wireguard"));
    }
    let (first, second) = if arm64 {
        ("/opt/homebrew/etc/wireguard", "/usr/local/etc/wireguard")
    } else {
        ("/usr/local/etc/wireguard", "/opt/homebrew/etc/wireguard")
    };
    out.push(PathBuf::from(first));
    out.push(PathBuf::from(second));
    out.push(PathBuf::from("/etc/wireguard"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.min_port, 55107);
        assert_eq!(config.max_port, 55207);
        assert_eq!(config.subnet_prefix, "69.0");
        assert_eq!(config.file_mode, 0o600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_derivation() {
        let config = Config {
            wireguard_dir: PathBuf::from("/srv/wg"),
            ..Config::default()
        };
        assert_eq!(config.interface_name("home"), "bp-home");
        assert_eq!(config.vpn_config_path("home"), PathBuf::from("/srv/wg/bp-home.conf"));
        assert_eq!(
            config.peer_config_path("home", "laptop"),
            PathBuf::from("/srv/wg/peers/bp-home-laptop.conf")
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BP_WG_DIR", "/tmp/wg"),
            ("BP_WG_DEFAULT_MIN_PORT", "60000"),
            ("BP_WG_DEFAULT_MAX_PORT", "not-a-number"),
            ("BP_ENDPOINT_HOST", "vpn.example.org"),
            ("BP_PUBLIC_IFACE", ""),
            ("BP_KEY_BACKEND", "native"),
        ]
        .into_iter()
        .collect();
        let config = Config::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.wireguard_dir, PathBuf::from("/tmp/wg"));
        assert_eq!(config.min_port, 60000);
        assert_eq!(config.max_port, 55207);
        assert_eq!(config.endpoint_host.as_deref(), Some("vpn.example.org"));
        assert_eq!(config.public_interface, None);
        assert_eq!(config.key_backend, KeyBackend::Native);
        // min above max after overrides
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bypasser.toml");
        std::fs::write(
            &path,
            "wireguard_dir = \"/data/wg\"\nsubnet_prefix = \"10.77\"\nkey_backend = \"native\"\n",
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let config: Config = toml::from_str(&content).unwrap();
        assert_eq!(config.wireguard_dir, PathBuf::from("/data/wg"));
        assert_eq!(config.subnet_prefix, "10.77");
        assert_eq!(config.key_backend, KeyBackend::Native);
        assert_eq!(config.interface_prefix, "bp-");
        assert_eq!(config.peer_mask, 32);
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        for prefix in ["69", "69.0.1", "69.x", "300.0"] {
            let config = Config {
                subnet_prefix: prefix.to_string(),
                ..Config::default()
            };
            assert!(config.validate().is_err(), "{prefix} should be rejected");
        }
    }

    #[test]
    fn test_darwin_candidates_order() {
        let arm = darwin_wireguard_candidates(Some("/brew"), true);
        assert_eq!(arm[0], PathBuf::from("/brew/etc/wireguard"));
        assert_eq!(arm[1], PathBuf::from("/opt/homebrew/etc/wireguard"));
        let intel = darwin_wireguard_candidates(None, false);
        assert_eq!(intel[0], PathBuf::from("/usr/local/etc/wireguard"));
        assert_eq!(intel.last().unwrap(), &PathBuf::from("/etc/wireguard"));
    }
}
