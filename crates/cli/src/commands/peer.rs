//! Peer Commands

use anyhow::{bail, Result};
use bypasser_common::codec::first_value;
use bypasser_common::{Manager, PeerRef};
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
pub enum PeerCommands {
    /// List peers of every VPN
    #[command(visible_alias = "ls")]
    List,

    /// Add a peer and print its client config
    Add {
        /// Peer reference as vpn:peer
        peer: Option<PeerRef>,
    },

    /// Delete a peer (offers a selection when omitted)
    #[command(visible_alias = "delete")]
    Del {
        /// Peer reference as vpn:peer
        peer: Option<PeerRef>,
    },
}

/// Peer display wrapper for serialization
#[derive(Debug, Serialize)]
pub struct PeerDisplay {
    pub vpn: String,
    pub peer: String,
    pub address: Option<String>,
    pub endpoint: Option<String>,
    pub config_path: PathBuf,
}

impl PeerDisplay {
    fn from_config(peer_ref: &PeerRef, config_path: PathBuf, content: Option<&str>) -> Self {
        let content = content.unwrap_or_default();
        Self {
            vpn: peer_ref.vpn.clone(),
            peer: peer_ref.peer.clone(),
            address: first_value(content, "Interface", "Address").map(str::to_string),
            endpoint: first_value(content, "Peer", "Endpoint").map(str::to_string),
            config_path,
        }
    }
}

impl TableDisplay for PeerDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["VPN", "Peer", "Address", "Endpoint", "Config"]
    }

    fn row(&self) -> Vec<String> {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        vec![
            self.vpn.clone(),
            self.peer.clone(),
            or_dash(&self.address),
            or_dash(&self.endpoint),
            self.config_path.display().to_string(),
        ]
    }
}

fn describe(manager: &Manager, peer_ref: &PeerRef) -> Result<PeerDisplay> {
    let path = manager.config().peer_config_path(&peer_ref.vpn, &peer_ref.peer);
    let content = manager.store().read_optional(&path)?;
    Ok(PeerDisplay::from_config(peer_ref, path, content.as_deref()))
}

fn select_peer(manager: &Manager) -> Result<PeerRef> {
    let peers = manager.list_peers()?;
    if peers.is_empty() {
        bail!("no peers found");
    }
    Prompter::stdio().select("Select peer to delete:", "vpn:peer", &peers, str::parse::<PeerRef>)
}

pub async fn execute(cmd: PeerCommands, manager: &Manager, format: OutputFormat) -> Result<()> {
    match cmd {
        PeerCommands::List => {
            let displays = manager
                .list_peers()?
                .iter()
                .map(|peer_ref| describe(manager, peer_ref))
                .collect::<Result<Vec<_>>>()?;
            print_list(&displays, format)?;
        }

        PeerCommands::Add { peer } => {
            let peer_ref = match peer {
                Some(peer_ref) => peer_ref,
                None => Prompter::stdio().peer_ref()?,
            };
            let result = manager.add_peer(&peer_ref).await?;
            if format.is_structured() {
                return print_serialized(&result, format);
            }
            print_success(&format!("Created peer {:?}", result.peer.to_string()));
            print_detail("Client config", result.config_path.display());
            print_detail("Address", &result.address);
            print_report(&result.report);
            println!();
            println!("Client configuration:");
            println!("{}", result.config);
        }

        PeerCommands::Del { peer } => {
            let peer_ref = match peer {
                Some(peer_ref) => peer_ref,
                None => select_peer(manager)?,
            };
            let report = manager
                .delete_peer(&peer_ref)
                .await
                .map_err(|e| with_list_hint(e, "peer"))?;
            if format.is_structured() {
                return print_serialized(&report, format);
            }
            print_success(&format!("Deleted peer {:?}", peer_ref.to_string()));
            print_report(&report);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_from_client_config() {
        let peer_ref: PeerRef = "home:laptop".parse().unwrap();
        let content = "[Interface]\nAddress = 69.0.1.2/32\n\n[Peer]\nEndpoint = 203.0.113.5:55107\n";
        let display = PeerDisplay::from_config(&peer_ref, PathBuf::from("p.conf"), Some(content));
        assert_eq!(
            display.row(),
            vec!["home", "laptop", "69.0.1.2/32", "203.0.113.5:55107", "p.conf"]
        );
    }
}
