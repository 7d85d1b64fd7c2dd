//! Port and address allocation
//!
//! Nothing is persisted: every call rescans the existing configs and picks
//! one past the highest value in use, failing once the range is exhausted.
//! Two processes allocating at the same time can pick the same value.

use crate::address::{MeshAddress, MAX_OCTET, SERVER_HOST_OCTET};
use crate::codec::{all_values, first_value};
use crate::{Error, Result};
use tracing::debug;

/// Read access to the existing VPN configs
pub trait ConfigSource {
    /// Names of every VPN with a config file
    fn vpn_names(&self) -> Result<Vec<String>>;

    /// Full text of one VPN's config file
    fn read_vpn_config(&self, vpn: &str) -> Result<String>;
}

/// Next free listen port in `min_port..=max_port`
pub fn next_port(source: &impl ConfigSource, min_port: u16, max_port: u16) -> Result<u16> {
    let floor = u32::from(min_port).saturating_sub(1);
    let mut highest = floor;
    for vpn in source.vpn_names()? {
        let content = source.read_vpn_config(&vpn)?;
        let Some(raw) = first_value(&content, "Interface", "ListenPort") else {
            continue;
        };
        match raw.parse::<u32>() {
            Ok(port) => highest = highest.max(port),
            Err(_) => debug!("Ignoring unparsable ListenPort {:?} in vpn {}", raw, vpn),
        }
    }

    let next = highest.saturating_add(1).max(u32::from(min_port));
    if next > u32::from(max_port) {
        return Err(Error::Exhausted {
            resource: "port",
            bound: format!("range {}-{}", min_port, max_port),
        });
    }
    // bounded by max_port above
    Ok(next as u16)
}

/// Next free vpn octet (third octet of the mesh /24)
pub fn next_vpn_octet(source: &impl ConfigSource, prefix: &str) -> Result<u32> {
    let mut highest: u32 = 0;
    for vpn in source.vpn_names()? {
        let content = source.read_vpn_config(&vpn)?;
        let Some(addr) = first_value(&content, "Interface", "Address") else {
            continue;
        };
        match MeshAddress::parse(prefix, addr) {
            Ok(parsed) => highest = highest.max(parsed.vpn_octet),
            Err(e) => debug!("Skipping address of vpn {}: {}", vpn, e),
        }
    }

    let next = highest.saturating_add(1);
    if next > MAX_OCTET {
        return Err(Error::Exhausted {
            resource: "vpn subnet octet",
            bound: format!("{}.X.0/24", prefix),
        });
    }
    Ok(next)
}

/// Next free host octet among the `[Peer]` blocks of one VPN's text
///
/// Host 1 belongs to the server, so the first peer gets host 2.
pub fn next_peer_octet(vpn_config: &str, prefix: &str, vpn_octet: u32) -> Result<u32> {
    let highest = all_values(vpn_config, "Peer", "AllowedIPs")
        .into_iter()
        .filter_map(|ip| MeshAddress::parse(prefix, ip).ok())
        .filter(|addr| addr.vpn_octet == vpn_octet)
        .map(|addr| addr.host_octet)
        .fold(SERVER_HOST_OCTET, u32::max);

    let next = highest.saturating_add(1);
    if next > MAX_OCTET {
        return Err(Error::Exhausted {
            resource: "peer addresses",
            bound: format!("vpn {} ({}.{}.0/24)", vpn_octet, prefix, vpn_octet),
        });
    }
    Ok(next)
}
