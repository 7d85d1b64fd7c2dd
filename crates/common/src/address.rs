//! Mesh address scheme: `<prefix>.<vpn octet>.<host octet>/<mask>`

use crate::{Error, Result};

/// Host octet reserved for the VPN server's own interface address
pub const SERVER_HOST_OCTET: u32 = 1;

/// Highest usable vpn or host octet
pub const MAX_OCTET: u32 = 254;

/// The two variable octets of a mesh address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshAddress {
    pub vpn_octet: u32,
    pub host_octet: u32,
}

impl MeshAddress {
    /// Parse an address (CIDR suffix optional) against a two-octet prefix
    pub fn parse(prefix: &str, addr: &str) -> Result<Self> {
        let base = addr.split_once('/').map_or(addr, |(ip, _)| ip);
        let rest = base
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix('.'))
            .ok_or_else(|| {
                Error::InvalidAddress(format!("{:?} does not match prefix {:?}", addr, prefix))
            })?;

        let (vpn, host) = match rest.split('.').collect::<Vec<_>>()[..] {
            [vpn, host] => (vpn, host),
            _ => return Err(Error::InvalidAddress(format!("{:?}", addr))),
        };
        let vpn_octet = vpn
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid vpn octet in {:?}", addr)))?;
        let host_octet = host
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid host octet in {:?}", addr)))?;

        Ok(Self {
            vpn_octet,
            host_octet,
        })
    }
}

/// One VPN's /24 inside the configured prefix
#[derive(Debug, Clone, Copy)]
pub struct MeshSubnet<'a> {
    pub prefix: &'a str,
    pub vpn_octet: u32,
}

impl<'a> MeshSubnet<'a> {
    pub fn new(prefix: &'a str, vpn_octet: u32) -> Self {
        Self { prefix, vpn_octet }
    }

    /// Network CIDR, e.g. `69.0.3.0/24`
    pub fn network(&self, mask: u8) -> String {
        self.host(0, mask)
    }

    /// Address of one host, e.g. `69.0.3.7/32`
    pub fn host(&self, host_octet: u32, mask: u8) -> String {
        format!("{}.{}.{}/{}", self.prefix, self.vpn_octet, host_octet, mask)
    }

    /// Server interface address
    pub fn server(&self, mask: u8) -> String {
        self.host(SERVER_HOST_OCTET, mask)
    }
}

/// Append `/<mask>` unless the address already carries one
pub fn normalize_cidr(addr: &str, mask: u8) -> String {
    if addr.contains('/') {
        addr.to_string()
    } else {
        format!("{}/{}", addr, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mesh_address() {
        let addr = MeshAddress::parse("69.0", "69.0.3.17/32").unwrap();
        assert_eq!(addr.vpn_octet, 3);
        assert_eq!(addr.host_octet, 17);

        let addr = MeshAddress::parse("69.0", "69.0.12.1").unwrap();
        assert_eq!((addr.vpn_octet, addr.host_octet), (12, 1));
    }

    #[test]
    fn test_parse_rejects_foreign_or_garbled() {
        assert!(MeshAddress::parse("69.0", "10.8.0.2/32").is_err());
        assert!(MeshAddress::parse("69.0", "69.01.2.3/32").is_err());
        assert!(MeshAddress::parse("69.0", "69.0.2/32").is_err());
        assert!(MeshAddress::parse("69.0", "69.0.2.3.4/32").is_err());
        assert!(MeshAddress::parse("69.0", "69.0.x.3/32").is_err());
        assert!(MeshAddress::parse("69.0", "69.0.2.-3/32").is_err());
    }

    #[test]
    fn test_subnet_rendering() {
        let subnet = MeshSubnet::new("69.0", 4);
        assert_eq!(subnet.network(24), "69.0.4.0/24");
        assert_eq!(subnet.server(24), "69.0.4.1/24");
        assert_eq!(subnet.host(9, 32), "69.0.4.9/32");
    }

    #[test]
    fn test_normalize_cidr() {
        assert_eq!(normalize_cidr("69.0.1.2", 32), "69.0.1.2/32");
        assert_eq!(normalize_cidr("69.0.1.2/32", 24), "69.0.1.2/32");
    }
}
