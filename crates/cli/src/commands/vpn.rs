//! VPN Commands

use anyhow::{bail, Result};
use bypasser_common::codec::first_value;
use bypasser_common::{validate_name, Manager};
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;

use super::with_list_hint;
use crate::output::{
    print_detail, print_list, print_report, print_serialized, print_success, OutputFormat,
    TableDisplay,
};
use crate::prompt::Prompter;

#[derive(Subcommand)]
pub enum VpnCommands {
    /// List VPNs
    #[command(visible_alias = "ls")]
    List,

    /// Create a VPN (prompts for the name when omitted)
    Add {
        /// VPN name ([a-z0-9]+)
        name: Option<String>,
    },

    /// Delete a VPN (offers a selection when omitted)
    #[command(visible_alias = "delete")]
    Del {
        /// VPN name
        name: Option<String>,
    },
}

/// VPN display wrapper for serialization
#[derive(Debug, Serialize)]
pub struct VpnDisplay {
    pub name: String,
    pub interface: String,
    pub listen_port: Option<u16>,
    pub address: Option<String>,
    pub peers: usize,
    pub config_path: PathBuf,
}

impl VpnDisplay {
    fn from_config(name: &str, interface: String, config_path: PathBuf, content: Option<&str>) -> Self {
        let content = content.unwrap_or_default();
        Self {
            name: name.to_string(),
            interface,
            listen_port: first_value(content, "Interface", "ListenPort").and_then(|p| p.parse().ok()),
            address: first_value(content, "Interface", "Address").map(str::to_string),
            peers: content.lines().filter(|l| l.trim() == "[Peer]").count(),
            config_path,
        }
    }
}

impl TableDisplay for VpnDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Interface", "Port", "Address", "Peers", "Config"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.interface.clone(),
            self.listen_port.map_or_else(|| "-".to_string(), |p| p.to_string()),
            self.address.clone().unwrap_or_else(|| "-".to_string()),
            self.peers.to_string(),
            self.config_path.display().to_string(),
        ]
    }
}

fn describe(manager: &Manager, name: &str) -> Result<VpnDisplay> {
    let config = manager.config();
    let path = config.vpn_config_path(name);
    let content = manager.store().read_optional(&path)?;
    Ok(VpnDisplay::from_config(
        name,
        config.interface_name(name),
        path,
        content.as_deref(),
    ))
}

fn select_vpn(manager: &Manager) -> Result<String> {
    let vpns = manager.list_vpns()?;
    if vpns.is_empty() {
        bail!("no VPNs found");
    }
    Prompter::stdio().select("Select VPN to delete:", "name", &vpns, |s| {
        validate_name("vpn", s).map(|_| s.to_string())
    })
}

pub async fn execute(cmd: VpnCommands, manager: &Manager, format: OutputFormat) -> Result<()> {
    match cmd {
        VpnCommands::List => {
            let displays = manager
                .list_vpns()?
                .iter()
                .map(|name| describe(manager, name))
                .collect::<Result<Vec<_>>>()?;
            print_list(&displays, format)?;
        }

        VpnCommands::Add { name } => {
            let name = match name {
                Some(name) => {
                    validate_name("vpn", &name)?;
                    name
                }
                None => Prompter::stdio().name("vpn")?,
            };
            let result = manager.add_vpn(&name).await?;
            if format.is_structured() {
                return print_serialized(&result, format);
            }
            print_success(&format!("Created VPN {:?} ({})", result.vpn, result.interface));
            print_detail("Config", result.config_path.display());
            print_detail("Listen port", result.listen_port);
            print_detail("Address", &result.address);
            print_report(&result.report);
        }

        VpnCommands::Del { name } => {
            let name = match name {
                Some(name) => {
                    validate_name("vpn", &name)?;
                    name
                }
                None => select_vpn(manager)?,
            };
            let report = manager
                .delete_vpn(&name)
                .await
                .map_err(|e| with_list_hint(e, "vpn"))?;
            if format.is_structured() {
                return print_serialized(&report, format);
            }
            print_success(&format!("Deleted VPN {:?}", name));
            print_report(&report);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_from_config() {
        let content = "# bp-managed: vpn=home\n[Interface]\nListenPort = 55107\nAddress = 69.0.1.1/24\n\n\
                       # bp-managed: vpn=home,peer=laptop\n[Peer]\nAllowedIPs = 69.0.1.2/32\n";
        let display = VpnDisplay::from_config(
            "home",
            "bp-home".to_string(),
            PathBuf::from("/etc/wireguard/bp-home.conf"),
            Some(content),
        );
        assert_eq!(display.listen_port, Some(55107));
        assert_eq!(display.address.as_deref(), Some("69.0.1.1/24"));
        assert_eq!(display.peers, 1);
        assert_eq!(display.row()[2], "55107");
    }

    #[test]
    fn test_display_for_missing_file() {
        let display = VpnDisplay::from_config("gone", "bp-gone".to_string(), PathBuf::from("x"), None);
        assert_eq!(display.row(), vec!["gone", "bp-gone", "-", "-", "0", "x"]);
    }
}
