//! VPN and peer lifecycle
//!
//! Every operation starts from the files on disk: allocation rescans the
//! existing configs, mutations re-render whole documents and hand them to
//! the store, which skips writes that would not change anything.

use crate::address::{normalize_cidr, MeshAddress, MeshSubnet};
use crate::allocator::{next_peer_octet, next_port, next_vpn_octet};
use crate::codec::first_value;
use crate::config::KeyBackend;
use crate::keys::{KeyGenerator, NativeKeyGenerator, WgCliKeyGenerator};
use crate::locator::remove_peer_block;
use crate::netinfo;
use crate::render::{ClientPeerConfig, ServerPeerBlock, VpnConfig};
use crate::store::ConfigStore;
use crate::system::{command_line, ExecSystem, System};
use crate::types::{
    validate_name, AddPeerResult, AddVpnResult, PeerRef, Report, RuntimeAction, RuntimeStatus,
};
use crate::{Config, Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Written into client configs when the server address cannot be detected
pub const ENDPOINT_PLACEHOLDER: &str = "<server-public-ip>";

const SYSCTL_FORWARDING: &str = "net.ipv4.ip_forward = 1\nnet.ipv6.conf.all.forwarding = 1\n";

/// Injectable collaborators; `None` picks the real implementation
#[derive(Default, Clone)]
pub struct Dependencies {
    pub system: Option<Arc<dyn System>>,
    pub keys: Option<Arc<dyn KeyGenerator>>,
}

/// Orchestrates VPN and peer operations over the config directory
pub struct Manager {
    store: ConfigStore,
    system: Arc<dyn System>,
    keys: Arc<dyn KeyGenerator>,
}

impl Manager {
    pub fn new(config: Config, deps: Dependencies) -> Self {
        let system: Arc<dyn System> = match deps.system {
            Some(system) => system,
            None => Arc::new(ExecSystem),
        };
        let keys: Arc<dyn KeyGenerator> = match (deps.keys, config.key_backend) {
            (Some(keys), _) => keys,
            (None, KeyBackend::Wg) => Arc::new(WgCliKeyGenerator::new(system.clone())),
            (None, KeyBackend::Native) => Arc::new(NativeKeyGenerator),
        };
        Self {
            store: ConfigStore::new(config),
            system,
            keys,
        }
    }

    pub fn config(&self) -> &Config {
        self.store.config()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Prepare base directories and the forwarding sysctl drop-in
    pub async fn setup_server(&self) -> Result<Report> {
        let mut report = Report::default();
        let config = self.config();

        self.store.ensure_dir(&config.wireguard_dir, &mut report)?;
        self.store.ensure_dir(&config.peers_dir(), &mut report)?;

        let Some(sysctl_file) = &config.sysctl_file else {
            report.warn(format!(
                "skipping sysctl forwarding file setup on {}; set SYSCTL_CONF_FILE if you want to override",
                std::env::consts::OS
            ));
            return Ok(report);
        };
        self.store
            .write_if_changed(sysctl_file, SYSCTL_FORWARDING.as_bytes(), &mut report)?;

        self.maybe_run(&mut report, "Apply sysctl forwarding settings", &["sysctl", "--system"])
            .await;
        Ok(report)
    }

    pub fn list_vpns(&self) -> Result<Vec<String>> {
        self.store.list_vpns()
    }

    pub fn list_peers(&self) -> Result<Vec<PeerRef>> {
        self.store.list_peers()
    }

    /// Create a VPN config with the next free port and subnet
    pub async fn add_vpn(&self, name: &str) -> Result<AddVpnResult> {
        validate_name("vpn", name)?;
        let config = self.config();
        let mut report = Report::default();

        self.store.ensure_dir(&config.wireguard_dir, &mut report)?;
        self.store.ensure_dir(&config.peers_dir(), &mut report)?;

        let config_path = config.vpn_config_path(name);
        if config_path.try_exists()? {
            return Err(Error::AlreadyExists {
                kind: "vpn",
                name: name.to_string(),
                path: config_path,
            });
        }

        let listen_port = next_port(&self.store, config.min_port, config.max_port)?;
        let vpn_octet = next_vpn_octet(&self.store, &config.subnet_prefix)?;
        let public_interface = self.detect_default_interface().await?;
        let private_key = self.keys.generate_private_key().await?;

        let subnet = MeshSubnet::new(&config.subnet_prefix, vpn_octet);
        let interface = config.interface_name(name);
        let address = subnet.server(config.interface_mask);
        let mesh_cidr = subnet.network(config.interface_mask);
        let rendered = VpnConfig {
            vpn: name,
            interface: &interface,
            private_key: &private_key,
            listen_port,
            address: &address,
            mesh_cidr: &mesh_cidr,
            public_interface: &public_interface,
        }
        .render();
        self.store
            .write_if_changed(&config_path, rendered.as_bytes(), &mut report)?;
        info!("Created vpn {} on port {} with {}", name, listen_port, address);

        self.enable_interface(&mut report, &interface).await;

        Ok(AddVpnResult {
            report,
            vpn: name.to_string(),
            interface,
            config_path,
            listen_port,
            address,
        })
    }

    /// Remove a VPN config; its peer files are left for the caller
    pub async fn delete_vpn(&self, name: &str) -> Result<Report> {
        validate_name("vpn", name)?;
        let config = self.config();
        let mut report = Report::default();

        let config_path = config.vpn_config_path(name);
        if !config_path.try_exists()? {
            return Err(Error::NotFound {
                kind: "vpn",
                name: name.to_string(),
                path: config_path,
            });
        }

        self.disable_interface(&mut report, &config.interface_name(name))
            .await;
        self.store.remove_file(&config_path, &mut report)?;

        let leftover = self
            .list_peers()
            .map(|peers| peers.iter().filter(|p| p.vpn == name).count())
            .unwrap_or(0);
        if leftover > 0 {
            report.warn(format!(
                "{} peer file(s) for vpn {:?} still exist under {}",
                leftover,
                name,
                config.peers_dir().display()
            ));
        }
        Ok(report)
    }

    /// Add a peer: append its server block and write its client config
    pub async fn add_peer(&self, peer_ref: &PeerRef) -> Result<AddPeerResult> {
        peer_ref.validate()?;
        let PeerRef { vpn, peer } = peer_ref;
        let config = self.config();
        let mut report = Report::default();

        self.store.ensure_dir(&config.peers_dir(), &mut report)?;

        let vpn_path = config.vpn_config_path(vpn);
        let vpn_content = self.store.read_optional(&vpn_path)?.ok_or_else(|| Error::NotFound {
            kind: "vpn",
            name: vpn.clone(),
            path: vpn_path.clone(),
        })?;

        let peer_path = config.peer_config_path(vpn, peer);
        if peer_path.try_exists()? {
            return Err(Error::AlreadyExists {
                kind: "peer",
                name: peer_ref.to_string(),
                path: peer_path,
            });
        }

        let server_private = require_interface_value(&vpn_content, &vpn_path, "PrivateKey")?;
        let server_public = self.keys.derive_public_key(server_private).await?;
        let listen_port = require_interface_value(&vpn_content, &vpn_path, "ListenPort")?;
        let listen_port: u16 = listen_port.parse().map_err(|_| {
            Error::malformed(&vpn_path, format!("invalid ListenPort {:?}", listen_port))
        })?;
        let server_address = require_interface_value(&vpn_content, &vpn_path, "Address")?;
        let vpn_octet = MeshAddress::parse(&config.subnet_prefix, server_address)
            .map_err(|e| Error::malformed(&vpn_path, e.to_string()))?
            .vpn_octet;
        let host_octet = next_peer_octet(&vpn_content, &config.subnet_prefix, vpn_octet)?;

        let peer_private = self.keys.generate_private_key().await?;
        let peer_public = self.keys.derive_public_key(&peer_private).await?;
        let preshared = self.keys.generate_preshared_key().await?;

        let endpoint_host = match &config.endpoint_host {
            Some(host) => host.clone(),
            None => match self.detect_server_ipv4().await {
                Ok(ip) => ip.to_string(),
                Err(e) => {
                    report.warn(format!(
                        "could not detect server public IPv4 automatically: {}",
                        e
                    ));
                    ENDPOINT_PLACEHOLDER.to_string()
                }
            },
        };

        let subnet = MeshSubnet::new(&config.subnet_prefix, vpn_octet);
        let address = subnet.host(host_octet, config.peer_mask);
        let mesh_cidr = subnet.network(config.interface_mask);

        let server_block = ServerPeerBlock {
            vpn,
            peer,
            public_key: &peer_public,
            preshared_key: &preshared,
            allowed_ip: &address,
        }
        .render();
        let updated_vpn = format!("{}\n\n{}", vpn_content.trim_end_matches('\n'), server_block);
        self.store
            .write_if_changed(&vpn_path, updated_vpn.as_bytes(), &mut report)?;

        let client_config = ClientPeerConfig {
            vpn,
            peer,
            private_key: &peer_private,
            address: &address,
            server_public_key: &server_public,
            preshared_key: &preshared,
            allowed_ips: &mesh_cidr,
            endpoint_host: &endpoint_host,
            endpoint_port: listen_port,
        }
        .render();
        self.store
            .write_if_changed(&peer_path, client_config.as_bytes(), &mut report)?;
        info!("Created peer {} at {}", peer_ref, address);

        self.restart_interface(&mut report, &config.interface_name(vpn))
            .await;

        Ok(AddPeerResult {
            report,
            peer: peer_ref.clone(),
            config_path: peer_path,
            config: client_config,
            address,
        })
    }

    /// Remove a peer's server block and delete its client config
    pub async fn delete_peer(&self, peer_ref: &PeerRef) -> Result<Report> {
        peer_ref.validate()?;
        let config = self.config();
        let mut report = Report::default();

        let peer_path = config.peer_config_path(&peer_ref.vpn, &peer_ref.peer);
        let peer_content = self.store.read_optional(&peer_path)?.ok_or_else(|| Error::NotFound {
            kind: "peer",
            name: peer_ref.to_string(),
            path: peer_path.clone(),
        })?;

        let probe = first_value(&peer_content, "Interface", "Address")
            .map(|addr| normalize_cidr(addr, config.peer_mask));
        if probe.is_none() {
            report.warn(format!(
                "peer file {} missing Interface.Address; will remove file but may not clean vpn peer block",
                peer_path.display()
            ));
        }

        let vpn_path = config.vpn_config_path(&peer_ref.vpn);
        match self.store.read_optional(&vpn_path)? {
            None => report.warn(format!(
                "vpn config {} not found; only deleting peer file",
                vpn_path.display()
            )),
            Some(vpn_content) => {
                match remove_peer_block(&vpn_content, peer_ref, probe.as_deref()) {
                    Some(updated) => {
                        self.store
                            .write_if_changed(&vpn_path, updated.as_bytes(), &mut report)?;
                    }
                    None => report.warn(format!(
                        "peer block for {} was not found in {}",
                        peer_ref,
                        vpn_path.display()
                    )),
                }
            }
        }

        self.store.remove_file(&peer_path, &mut report)?;

        self.restart_interface(&mut report, &config.interface_name(&peer_ref.vpn))
            .await;
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Host detection
    // ------------------------------------------------------------------------

    async fn detect_default_interface(&self) -> Result<String> {
        if let Some(iface) = &self.config().public_interface {
            return Ok(iface.clone());
        }

        if let Ok(local) = netinfo::outbound_ipv4().await {
            match netinfo::interface_for_ipv4(local) {
                Ok(iface) => return Ok(iface),
                Err(e) => debug!("Native interface lookup failed: {}", e),
            }
        }

        if !self.system.has_command("ip") {
            return Err(Error::Detection(
                "could not determine default interface natively and ip command not found; set BP_PUBLIC_IFACE or public_interface".to_string(),
            ));
        }
        let out = self
            .system
            .output("ip", &["-4", "route", "show", "default"])
            .await?;
        netinfo::parse_default_route_device(&out).ok_or_else(|| {
            Error::Detection(format!("could not determine default interface from {:?}", out))
        })
    }

    async fn detect_server_ipv4(&self) -> Result<std::net::Ipv4Addr> {
        if let Ok(local) = netinfo::outbound_ipv4().await {
            return Ok(local);
        }

        let iface = self.detect_default_interface().await?;
        if !self.system.has_command("ip") {
            return Err(Error::Detection("ip command not found".to_string()));
        }
        let out = self
            .system
            .output(
                "ip",
                &["-4", "-o", "addr", "show", "dev", iface.as_str(), "scope", "global"],
            )
            .await?;
        netinfo::parse_global_inet(&out)
            .ok_or_else(|| Error::Detection(format!("could not detect ipv4 on interface {}", iface)))
    }

    // ------------------------------------------------------------------------
    // Runtime helper
    // ------------------------------------------------------------------------

    /// Run `cmd` when possible; otherwise record it as a suggestion
    async fn maybe_run(&self, report: &mut Report, description: &str, cmd: &[&str]) {
        let Some((program, args)) = cmd.split_first() else {
            return;
        };
        let mut action = RuntimeAction {
            description: description.to_string(),
            command: command_line(program, args),
            status: RuntimeStatus::Suggested,
            message: String::new(),
        };

        if !self.system.has_command(program) {
            action.message = "command not available".to_string();
        } else if !self.system.is_root() {
            action.message = "not running as root".to_string();
        } else {
            match self.system.run(program, args).await {
                Ok(()) => {
                    info!("Executed {}", action.command);
                    action.status = RuntimeStatus::Executed;
                    action.message = "ok".to_string();
                }
                Err(e) => action.message = e.to_string(),
            }
        }
        report.add_runtime(action);
    }

    async fn enable_interface(&self, report: &mut Report, iface: &str) {
        if self.system.has_command("systemctl") {
            let unit = format!("wg-quick@{}", iface);
            self.maybe_run(
                report,
                "Enable/start WireGuard interface",
                &["systemctl", "enable", "--now", unit.as_str()],
            )
            .await;
            return;
        }
        self.maybe_run(report, "Bring up WireGuard interface", &["wg-quick", "up", iface])
            .await;
    }

    async fn disable_interface(&self, report: &mut Report, iface: &str) {
        if self.system.has_command("systemctl") {
            let unit = format!("wg-quick@{}", iface);
            self.maybe_run(
                report,
                "Disable/stop WireGuard interface",
                &["systemctl", "disable", "--now", unit.as_str()],
            )
            .await;
            return;
        }
        self.maybe_run(report, "Bring down WireGuard interface", &["wg-quick", "down", iface])
            .await;
    }

    async fn restart_interface(&self, report: &mut Report, iface: &str) {
        if self.system.has_command("systemctl") {
            let unit = format!("wg-quick@{}", iface);
            self.maybe_run(
                report,
                "Restart WireGuard interface",
                &["systemctl", "restart", unit.as_str()],
            )
            .await;
            return;
        }
        self.maybe_run(report, "Restart WireGuard interface", &["wg-quick", "down", iface])
            .await;
        self.maybe_run(report, "Restart WireGuard interface", &["wg-quick", "up", iface])
            .await;
    }
}

/// Required `[Interface]` key of a VPN file
fn require_interface_value<'a>(content: &'a str, path: &Path, key: &str) -> Result<&'a str> {
    first_value(content, "Interface", key)
        .ok_or_else(|| Error::malformed(path, format!("missing Interface.{}", key)))
}
