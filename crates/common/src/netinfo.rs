//! Host network detection used to fill in NAT rules and client endpoints

use crate::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// Well-known resolvers used only to pick a route; nothing is sent
const ROUTE_PROBES: [&str; 2] = ["1.1.1.1:53", "8.8.8.8:53"];

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Local IPv4 address the kernel would use for outbound traffic
pub async fn outbound_ipv4() -> Result<Ipv4Addr> {
    let mut last_err = Error::Detection("no probe address succeeded".to_string());
    for probe in ROUTE_PROBES {
        match tokio::time::timeout(PROBE_TIMEOUT, probe_local_addr(probe)).await {
            Ok(Ok(SocketAddr::V4(local))) => return Ok(*local.ip()),
            Ok(Ok(local)) => {
                last_err = Error::Detection(format!("detected non-ipv4 local address {}", local.ip()));
            }
            Ok(Err(e)) => last_err = e,
            Err(_) => last_err = Error::Detection(format!("probe {} timed out", probe)),
        }
        debug!("Route probe via {} failed: {}", probe, last_err);
    }
    Err(last_err)
}

async fn probe_local_addr(probe: &str) -> Result<SocketAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    // UDP connect only selects a route and source address
    socket.connect(probe).await?;
    Ok(socket.local_addr()?)
}

/// Name of the interface carrying `target`
pub fn interface_for_ipv4(target: Ipv4Addr) -> Result<String> {
    get_if_addrs::get_if_addrs()?
        .into_iter()
        .find(|iface| iface.ip() == IpAddr::V4(target))
        .map(|iface| iface.name)
        .ok_or_else(|| Error::Detection(format!("no interface found for local ipv4 {}", target)))
}

/// Device of the default route in `ip -4 route show default` output
pub fn parse_default_route_device(output: &str) -> Option<String> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    fields
        .windows(2)
        .find(|pair| pair[0] == "dev")
        .map(|pair| pair[1].to_string())
}

/// First IPv4 in `ip -4 -o addr show` output
pub fn parse_global_inet(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        fields
            .windows(2)
            .filter(|pair| pair[0] == "inet")
            .find_map(|pair| pair[1].split('/').next()?.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_route_device() {
        let out = "default via 192.168.1.1 dev eth0 proto dhcp src 192.168.1.20 metric 100";
        assert_eq!(parse_default_route_device(out).as_deref(), Some("eth0"));
        assert_eq!(parse_default_route_device(""), None);
        assert_eq!(parse_default_route_device("default via 10.0.0.1 dev"), None);
    }

    #[test]
    fn test_parse_global_inet() {
        let out = "2: eth0    inet 203.0.113.7/24 brd 203.0.113.255 scope global eth0\\       valid_lft forever preferred_lft forever\n\
                   2: eth0    inet 203.0.113.8/24 scope global secondary eth0";
        assert_eq!(parse_global_inet(out), Some(Ipv4Addr::new(203, 0, 113, 7)));
        assert_eq!(parse_global_inet("2: eth0    inet6 fe80::1/64 scope link"), None);
        assert_eq!(parse_global_inet("inet garbage/24"), None);
    }

    #[test]
    #[ignore = "needs a host interface bound to 127.0.0.1"]
    fn test_interface_for_loopback() {
        let name = interface_for_ipv4(Ipv4Addr::LOCALHOST).unwrap();
        assert!(!name.is_empty());
        assert!(interface_for_ipv4(Ipv4Addr::new(192, 0, 2, 254)).is_err());
    }
}
