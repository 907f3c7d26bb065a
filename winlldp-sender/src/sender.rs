//! LLDP advertisement sender
//!
//! Builds one frame per target interface from a fresh system snapshot and
//! hands the bytes to the raw L2 driver. The periodic loop runs on a
//! monotonic clock with drift compensation: the next tick fires at
//! `tick_start + interval`, not `now + interval`.

use pnet_datalink::Channel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use winlldp_core::{
    Config, Error, InterfaceInfo, InterfaceSelection, ManagementAddress, Result, SystemSnapshot,
};
use winlldp_protocol::{capability, ChassisId, LldpFrame, ManagementAddress as MgmtAddrTlv, PortId, Tlv};

/// Granularity of the inter-tick sleep, so the stop flag is honored quickly
const STOP_POLL: Duration = Duration::from_millis(100);

/// The advertisement sender
pub struct Sender {
    config: Config,
}

impl Sender {
    pub fn new(config: Config) -> Self {
        Sender { config }
    }

    /// Interfaces the next tick will emit on, in enumeration order.
    ///
    /// In `all` mode an interface qualifies when it is operational and has
    /// at least one IPv4 address; when two interfaces share a MAC the first
    /// wins and later ones are skipped. A single named interface is used
    /// as-is (it must exist and be operational).
    pub fn resolve_targets<'a>(
        &self,
        snapshot: &'a SystemSnapshot,
    ) -> Result<Vec<&'a InterfaceInfo>> {
        match &self.config.interface {
            InterfaceSelection::Named(name) => {
                let iface = snapshot.interface_or_err(name)?;
                if !iface.is_operational() {
                    return Err(Error::link(name.clone(), "interface is not operational"));
                }
                Ok(vec![iface])
            }
            InterfaceSelection::All => {
                let mut seen_macs = std::collections::HashSet::new();
                let mut targets = Vec::new();
                for iface in snapshot.operational_interfaces() {
                    if iface.ipv4.is_empty() {
                        debug!(interface = %iface.name, "skipped: no IPv4 address");
                        continue;
                    }
                    let Some(mac) = iface.mac else { continue };
                    if !seen_macs.insert(mac) {
                        warn!(interface = %iface.name, mac = %mac,
                              "skipped: MAC already advertised by an earlier interface");
                        continue;
                    }
                    targets.push(iface);
                }
                Ok(targets)
            }
        }
    }

    /// Build the advertisement frame for one interface.
    pub fn build_frame(&self, snapshot: &SystemSnapshot, iface: &InterfaceInfo) -> Result<Vec<u8>> {
        let mac = iface
            .mac
            .ok_or_else(|| Error::link(iface.name.clone(), "interface has no MAC address"))?;

        let mut frame = LldpFrame::new(
            mac,
            ChassisId::mac(mac),
            PortId::interface_name(&iface.name),
            self.config.ttl,
        );

        frame.push(Tlv::PortDescription(self.config.port_description.clone()));

        let system_name = self
            .config
            .system_name
            .clone()
            .unwrap_or_else(|| snapshot.hostname.clone());
        frame.push(Tlv::SystemName(system_name));

        let system_description = self
            .config
            .system_description
            .clone()
            .unwrap_or_else(|| snapshot.os_description.clone());
        frame.push(Tlv::SystemDescription(system_description));

        frame.push(Tlv::SystemCapabilities {
            supported: capability::STATION_ONLY,
            enabled: capability::STATION_ONLY,
        });

        let management_ip = match &self.config.management_address {
            ManagementAddress::Fixed(ip) => Some(*ip),
            ManagementAddress::Auto => iface.primary_ipv4(),
        };
        match management_ip {
            Some(ip) => frame.push(Tlv::ManagementAddress(MgmtAddrTlv::ipv4(ip, iface.index))),
            None => debug!(interface = %iface.name, "no IPv4, omitting management address TLV"),
        }

        frame.encode()
    }

    /// Build the TTL=0 withdraw frame for one interface: mandatory TLVs
    /// only.
    pub fn build_withdraw_frame(&self, iface: &InterfaceInfo) -> Result<Vec<u8>> {
        let mac = iface
            .mac
            .ok_or_else(|| Error::link(iface.name.clone(), "interface has no MAC address"))?;
        LldpFrame::new(mac, ChassisId::mac(mac), PortId::interface_name(&iface.name), 0).encode()
    }

    /// One tick: fresh snapshot, one frame per target interface.
    ///
    /// A failure on one interface is logged and does not abort the others;
    /// the tick fails only when every emission failed.
    pub fn send_once(&self) -> Result<usize> {
        let snapshot = SystemSnapshot::take();
        let targets = self.resolve_targets(&snapshot)?;
        if targets.is_empty() {
            warn!("no eligible interfaces, nothing sent");
            return Ok(0);
        }

        let mut sent = 0usize;
        let mut last_error = None;
        for iface in targets {
            match self
                .build_frame(&snapshot, iface)
                .and_then(|bytes| send_raw(&iface.name, &bytes))
            {
                Ok(()) => {
                    debug!(interface = %iface.name, "LLDP advertisement sent");
                    sent += 1;
                }
                Err(e) => {
                    warn!(interface = %iface.name, error = %e, "emission failed");
                    last_error = Some(e);
                }
            }
        }

        match (sent, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(sent),
        }
    }

    /// Emit one TTL=0 frame per target interface, best effort.
    pub fn send_withdraw(&self) {
        let snapshot = SystemSnapshot::take();
        let targets = match self.resolve_targets(&snapshot) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "withdraw skipped");
                return;
            }
        };

        for iface in targets {
            match self
                .build_withdraw_frame(iface)
                .and_then(|bytes| send_raw(&iface.name, &bytes))
            {
                Ok(()) => info!(interface = %iface.name, "withdraw frame sent"),
                Err(e) => warn!(interface = %iface.name, error = %e, "withdraw failed"),
            }
        }
    }

    /// Periodic loop: one tick every `interval` seconds until `stop` is
    /// set. The flag is checked between ticks, never mid-emission.
    pub fn run(&self, stop: &AtomicBool) -> Result<()> {
        let interval = Duration::from_secs(self.config.interval);
        info!(interval_secs = self.config.interval, "sender loop started");

        while !stop.load(Ordering::Relaxed) {
            let tick_start = Instant::now();
            if let Err(e) = self.send_once() {
                // Per-process init failures abort; transmit errors retry
                // next tick.
                match e {
                    Error::PrivilegeDenied(_) | Error::InterfaceNotFound(_) => return Err(e),
                    other => warn!(error = %other, "tick failed"),
                }
            }

            let next_tick = tick_start + interval;
            while Instant::now() < next_tick {
                if stop.load(Ordering::Relaxed) {
                    info!("sender loop stopping");
                    return Ok(());
                }
                std::thread::sleep(STOP_POLL.min(next_tick.saturating_duration_since(Instant::now())));
            }
        }

        info!("sender loop stopping");
        Ok(())
    }
}

/// Send raw L2 bytes on the named interface.
fn send_raw(interface: &str, packet: &[u8]) -> Result<()> {
    let iface = pnet_datalink::interfaces()
        .into_iter()
        .find(|i| i.name == interface)
        .ok_or_else(|| Error::InterfaceNotFound(interface.to_string()))?;

    let (mut tx, _rx) = match pnet_datalink::channel(&iface, Default::default()) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => {
            return Err(Error::link(interface, "unsupported channel type"));
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Error::PrivilegeDenied(format!(
                "{}: raw socket access denied (try elevated privileges)",
                interface
            )));
        }
        Err(e) => return Err(Error::link(interface, e.to_string())),
    };

    tx.send_to(packet, None)
        .ok_or_else(|| Error::link(interface, "send not supported on this channel"))?
        .map_err(|e| Error::link(interface, e.to_string()))
}
