//! Canonical text layout for every file bypasser writes
//!
//! Each block starts with its ownership tag so the locator can find it
//! again without relying on position.

use crate::codec::ownership_tag;

/// Server-side interface block of a VPN file
#[derive(Debug, Clone)]
pub struct VpnConfig<'a> {
    pub vpn: &'a str,
    pub interface: &'a str,
    pub private_key: &'a str,
    pub listen_port: u16,
    /// Server address, e.g. `69.0.1.1/24`
    pub address: &'a str,
    /// Mesh network, e.g. `69.0.1.0/24`
    pub mesh_cidr: &'a str,
    /// Uplink interface used for masquerading
    pub public_interface: &'a str,
}

impl VpnConfig<'_> {
    fn firewall_rules(&self, op: char) -> String {
        format!(
            "iptables -t nat -{op} POSTROUTING -s {cidr} -o {uplink} -j MASQUERADE; \
             iptables -{op} INPUT -p udp -m udp --dport {port} -j ACCEPT; \
             iptables -{op} FORWARD -i {iface} -j ACCEPT; \
             iptables -{op} FORWARD -o {iface} -j ACCEPT;",
            op = op,
            cidr = self.mesh_cidr,
            uplink = self.public_interface,
            port = self.listen_port,
            iface = self.interface,
        )
    }

    pub fn render(&self) -> String {
        format!(
            r#"{tag}
[Interface]
PrivateKey = {private_key}
ListenPort = {listen_port}
Address = {address}
PostUp = {post_up}
PostDown = {post_down}
"#,
            tag = ownership_tag(self.vpn, None),
            private_key = self.private_key,
            listen_port = self.listen_port,
            address = self.address,
            post_up = self.firewall_rules('A'),
            post_down = self.firewall_rules('D'),
        )
    }
}

/// `[Peer]` block appended to the VPN file for one client
#[derive(Debug, Clone)]
pub struct ServerPeerBlock<'a> {
    pub vpn: &'a str,
    pub peer: &'a str,
    pub public_key: &'a str,
    pub preshared_key: &'a str,
    pub allowed_ip: &'a str,
}

impl ServerPeerBlock<'_> {
    pub fn render(&self) -> String {
        format!(
            r#"{tag}
[Peer]
PublicKey = {public_key}
PresharedKey = {preshared_key}
AllowedIPs = {allowed_ip}
"#,
            tag = ownership_tag(self.vpn, Some(self.peer)),
            public_key = self.public_key,
            preshared_key = self.preshared_key,
            allowed_ip = self.allowed_ip,
        )
    }
}

/// Standalone config handed to the client
#[derive(Debug, Clone)]
pub struct ClientPeerConfig<'a> {
    pub vpn: &'a str,
    pub peer: &'a str,
    pub private_key: &'a str,
    pub address: &'a str,
    pub server_public_key: &'a str,
    pub preshared_key: &'a str,
    /// Routed through the tunnel; the whole mesh /24
    pub allowed_ips: &'a str,
    pub endpoint_host: &'a str,
    pub endpoint_port: u16,
}

/// Keepalive written into every client config
pub const PERSISTENT_KEEPALIVE: u16 = 25;

impl ClientPeerConfig<'_> {
    pub fn render(&self) -> String {
        format!(
            r#"{tag}
[Interface]
PrivateKey = {private_key}
Address = {address}

[Peer]
PublicKey = {server_public_key}
PresharedKey = {preshared_key}
AllowedIPs = {allowed_ips}
Endpoint = {endpoint_host}:{endpoint_port}
PersistentKeepalive = {keepalive}
"#,
            tag = ownership_tag(self.vpn, Some(self.peer)),
            private_key = self.private_key,
            address = self.address,
            server_public_key = self.server_public_key,
            preshared_key = self.preshared_key,
            allowed_ips = self.allowed_ips,
            endpoint_host = self.endpoint_host,
            endpoint_port = self.endpoint_port,
            keepalive = PERSISTENT_KEEPALIVE,
        )
    }
}
