//! System information snapshot
//!
//! A snapshot is a pure read of the host's identity and interface state; the
//! sender takes a fresh one every tick so address changes are picked up
//! without restarting.

use crate::{MacAddr, Result};
use ipnetwork::IpNetwork;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// Per-interface state at snapshot time
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g. "eth0", "enp3s0")
    pub name: String,
    /// OS interface index (ifIndex)
    pub index: u32,
    /// MAC address, if the interface has one
    pub mac: Option<MacAddr>,
    /// IPv4 addresses assigned to this interface
    pub ipv4: Vec<Ipv4Addr>,
    /// IPv6 addresses assigned to this interface
    pub ipv6: Vec<Ipv6Addr>,
    /// Whether the interface is administratively and operationally up
    pub is_up: bool,
    /// Whether the interface is a loopback
    pub is_loopback: bool,
}

impl InterfaceInfo {
    /// An interface takes part in LLDP when it is up, has an L2 MAC and is
    /// not a loopback.
    pub fn is_operational(&self) -> bool {
        self.is_up && !self.is_loopback && self.mac.is_some_and(|mac| !mac.is_zero())
    }

    /// First IPv4 address, if any
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4.first().copied()
    }
}

impl From<&pnet_datalink::NetworkInterface> for InterfaceInfo {
    fn from(iface: &pnet_datalink::NetworkInterface) -> Self {
        let mac = iface
            .mac
            .map(|mac| MacAddr([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]));

        let mut ipv4 = Vec::new();
        let mut ipv6 = Vec::new();
        for network in &iface.ips {
            match network {
                IpNetwork::V4(net) => ipv4.push(net.ip()),
                IpNetwork::V6(net) => ipv6.push(net.ip()),
            }
        }

        InterfaceInfo {
            name: iface.name.clone(),
            index: iface.index,
            mac,
            ipv4,
            ipv6,
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

/// Host identity and interface state at a point in time
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Host name, `"unknown"` if resolution fails
    pub hostname: String,
    /// `<family> <release> <arch>`, e.g. `Linux 6.8.0 x86_64`
    pub os_description: String,
    /// All interfaces, in OS enumeration order
    pub interfaces: Vec<InterfaceInfo>,
}

impl SystemSnapshot {
    /// Take a fresh snapshot.
    pub fn take() -> Self {
        let interfaces: Vec<InterfaceInfo> = pnet_datalink::interfaces()
            .iter()
            .map(InterfaceInfo::from)
            .collect();
        debug!(count = interfaces.len(), "enumerated interfaces");

        SystemSnapshot {
            hostname: resolve_hostname(),
            os_description: os_description(),
            interfaces,
        }
    }

    /// Interfaces eligible for LLDP, in enumeration order.
    pub fn operational_interfaces(&self) -> impl Iterator<Item = &InterfaceInfo> {
        self.interfaces.iter().filter(|i| i.is_operational())
    }

    /// Look up an interface by name.
    pub fn interface(&self, name: &str) -> Option<&InterfaceInfo> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Look up an interface by name, as a `Result`.
    pub fn interface_or_err(&self, name: &str) -> Result<&InterfaceInfo> {
        self.interface(name)
            .ok_or_else(|| crate::Error::InterfaceNotFound(name.to_string()))
    }
}

fn resolve_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn os_description() -> String {
    let mut uts = std::mem::MaybeUninit::<libc::utsname>::uninit();
    if unsafe { libc::uname(uts.as_mut_ptr()) } != 0 {
        return std::env::consts::OS.to_string();
    }
    let uts = unsafe { uts.assume_init() };
    format!(
        "{} {} {}",
        uname_field(&uts.sysname),
        uname_field(&uts.release),
        uname_field(&uts.machine)
    )
}

fn uname_field(field: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, mac: Option<MacAddr>, up: bool, loopback: bool) -> InterfaceInfo {
        InterfaceInfo {
            name: name.to_string(),
            index: 1,
            mac,
            ipv4: vec![],
            ipv6: vec![],
            is_up: up,
            is_loopback: loopback,
        }
    }

    #[test]
    fn test_operational_requires_mac_and_up() {
        let mac = Some(MacAddr([0, 0x11, 0x22, 0x33, 0x44, 0x55]));
        assert!(iface("eth0", mac, true, false).is_operational());
        assert!(!iface("eth0", mac, false, false).is_operational());
        assert!(!iface("eth0", None, true, false).is_operational());
        assert!(!iface("lo", mac, true, true).is_operational());
        assert!(!iface("tun0", Some(MacAddr::ZERO), true, false).is_operational());
    }

    #[test]
    fn test_snapshot_hostname_never_empty() {
        let snapshot = SystemSnapshot::take();
        assert!(!snapshot.hostname.is_empty());
        assert!(!snapshot.os_description.is_empty());
    }

    #[test]
    fn test_primary_ipv4() {
        let mut i = iface("eth0", None, true, false);
        assert_eq!(i.primary_ipv4(), None);
        i.ipv4 = vec!["10.0.0.2".parse().unwrap(), "10.0.0.3".parse().unwrap()];
        assert_eq!(i.primary_ipv4(), Some("10.0.0.2".parse().unwrap()));
    }
}
