//! Neighbor record model
//!
//! A record is keyed by (receiving interface, chassis id, port id). On disk
//! identifiers render per their subtype: colon-separated hex for MAC
//! subtypes, plain UTF-8 for name-like subtypes, `hex:`-prefixed hex for
//! everything else.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use winlldp_core::{Error, MacAddr, Result};
use winlldp_protocol::{chassis_subtype, port_subtype, ChassisId, LldpFrame, PortId};

/// Which identifier namespace a subtype belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Chassis,
    Port,
}

impl IdKind {
    fn is_mac(self, subtype: u8) -> bool {
        match self {
            IdKind::Chassis => subtype == chassis_subtype::MAC_ADDRESS,
            IdKind::Port => subtype == port_subtype::MAC_ADDRESS,
        }
    }

    fn is_text(self, subtype: u8) -> bool {
        match self {
            IdKind::Chassis => matches!(
                subtype,
                chassis_subtype::INTERFACE_ALIAS
                    | chassis_subtype::INTERFACE_NAME
                    | chassis_subtype::LOCALLY_ASSIGNED
            ),
            IdKind::Port => matches!(
                subtype,
                port_subtype::INTERFACE_ALIAS
                    | port_subtype::INTERFACE_NAME
                    | port_subtype::LOCALLY_ASSIGNED
            ),
        }
    }
}

/// Render identifier bytes for display and persistence.
pub fn format_id(kind: IdKind, subtype: u8, bytes: &[u8]) -> String {
    if kind.is_mac(subtype) && bytes.len() == 6 {
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    } else if kind.is_text(subtype) {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        format!("hex:{}", hex::encode(bytes))
    }
}

/// Inverse of [`format_id`].
pub fn parse_id(kind: IdKind, subtype: u8, value: &str) -> Result<Vec<u8>> {
    if let Some(raw) = value.strip_prefix("hex:") {
        return hex::decode(raw)
            .map_err(|_| Error::malformed(format!("bad hex identifier '{}'", value)));
    }
    if kind.is_mac(subtype) {
        let mac: MacAddr = value
            .parse()
            .map_err(|_| Error::malformed(format!("bad MAC identifier '{}'", value)))?;
        return Ok(mac.octets().to_vec());
    }
    Ok(value.as_bytes().to_vec())
}

/// Identity of a neighbor as seen from one local interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NeighborKey {
    pub interface: String,
    pub chassis_id: Vec<u8>,
    pub port_id: Vec<u8>,
}

/// One discovered neighbor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr", into = "RecordRepr")]
pub struct NeighborRecord {
    /// Local interface the advertisement arrived on
    pub interface: String,
    /// Source MAC of the Ethernet frame
    pub source_mac: MacAddr,
    pub chassis_id: ChassisId,
    pub port_id: PortId,
    pub port_description: Option<String>,
    pub system_name: Option<String>,
    pub system_description: Option<String>,
    pub capabilities_supported: u16,
    pub capabilities_enabled: u16,
    pub management_addresses: Vec<IpAddr>,
    /// TTL received in the advertisement, seconds; 0 is a withdraw
    pub ttl: u16,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Raw LLDPDU hex dump, for diagnostics
    pub raw_tlvs: String,
}

impl NeighborRecord {
    /// Build a record from a decoded frame observed on `interface` at `now`.
    pub fn from_frame(
        interface: &str,
        frame: &LldpFrame,
        raw_lldpdu: &[u8],
        now: DateTime<Utc>,
    ) -> Self {
        let (capabilities_supported, capabilities_enabled) =
            frame.capabilities().unwrap_or((0, 0));

        NeighborRecord {
            interface: interface.to_string(),
            source_mac: frame.source,
            chassis_id: frame.chassis_id.clone(),
            port_id: frame.port_id.clone(),
            port_description: frame.port_description().map(str::to_string),
            system_name: frame.system_name().map(str::to_string),
            system_description: frame.system_description().map(str::to_string),
            capabilities_supported,
            capabilities_enabled,
            management_addresses: frame.management_addresses().filter_map(|m| m.ip()).collect(),
            ttl: frame.ttl,
            first_seen: now,
            last_seen: now,
            raw_tlvs: hex::encode(raw_lldpdu),
        }
    }

    /// The (interface, chassis id, port id) key of this record.
    pub fn key(&self) -> NeighborKey {
        NeighborKey {
            interface: self.interface.clone(),
            chassis_id: self.chassis_id.id.clone(),
            port_id: self.port_id.id.clone(),
        }
    }

    /// A record is live while `now - last_seen <= ttl`; a withdraw
    /// (`ttl == 0`) is never live.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if self.ttl == 0 {
            return false;
        }
        now.signed_duration_since(self.last_seen) <= chrono::Duration::seconds(self.ttl.into())
    }

    /// Merge a newer observation of the same key: mutable fields refresh,
    /// `first_seen` is preserved.
    pub fn absorb(&mut self, newer: NeighborRecord) {
        let first_seen = self.first_seen;
        *self = newer;
        self.first_seen = first_seen;
    }

    /// Seconds until this record expires; zero when already expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        let deadline = self.last_seen + chrono::Duration::seconds(self.ttl.into());
        deadline.signed_duration_since(now).num_seconds().max(0)
    }

    /// Human-readable age since first observation, e.g. `3d 4h`, `2h 10m`,
    /// `5m 12s`.
    pub fn age(&self, now: DateTime<Utc>) -> String {
        let total = now
            .signed_duration_since(self.first_seen)
            .num_seconds()
            .max(0);
        let (days, hours, minutes, seconds) =
            (total / 86_400, (total % 86_400) / 3600, (total % 3600) / 60, total % 60);
        if days > 0 {
            format!("{}d {}h", days, hours)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    }

    /// Display form of the chassis identifier.
    pub fn chassis_display(&self) -> String {
        format_id(IdKind::Chassis, self.chassis_id.subtype, &self.chassis_id.id)
    }

    /// Display form of the port identifier.
    pub fn port_display(&self) -> String {
        format_id(IdKind::Port, self.port_id.subtype, &self.port_id.id)
    }
}

/// On-disk shape of a record
#[derive(Debug, Serialize, Deserialize)]
struct RecordRepr {
    interface: String,
    source_mac: MacAddr,
    chassis_id_subtype: u8,
    chassis_id: String,
    port_id_subtype: u8,
    port_id: String,
    #[serde(default)]
    port_description: Option<String>,
    #[serde(default)]
    system_name: Option<String>,
    #[serde(default)]
    system_description: Option<String>,
    capabilities_supported: u16,
    capabilities_enabled: u16,
    #[serde(default)]
    management_addresses: Vec<IpAddr>,
    ttl: u16,
    #[serde(with = "iso_millis")]
    first_seen: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    last_seen: DateTime<Utc>,
    #[serde(default)]
    raw_tlvs: String,
}

impl From<NeighborRecord> for RecordRepr {
    fn from(record: NeighborRecord) -> Self {
        RecordRepr {
            interface: record.interface,
            source_mac: record.source_mac,
            chassis_id_subtype: record.chassis_id.subtype,
            chassis_id: format_id(IdKind::Chassis, record.chassis_id.subtype, &record.chassis_id.id),
            port_id_subtype: record.port_id.subtype,
            port_id: format_id(IdKind::Port, record.port_id.subtype, &record.port_id.id),
            port_description: record.port_description,
            system_name: record.system_name,
            system_description: record.system_description,
            capabilities_supported: record.capabilities_supported,
            capabilities_enabled: record.capabilities_enabled,
            management_addresses: record.management_addresses,
            ttl: record.ttl,
            first_seen: record.first_seen,
            last_seen: record.last_seen,
            raw_tlvs: record.raw_tlvs,
        }
    }
}

impl TryFrom<RecordRepr> for NeighborRecord {
    type Error = Error;

    fn try_from(repr: RecordRepr) -> Result<Self> {
        let chassis_bytes = parse_id(IdKind::Chassis, repr.chassis_id_subtype, &repr.chassis_id)?;
        let port_bytes = parse_id(IdKind::Port, repr.port_id_subtype, &repr.port_id)?;

        Ok(NeighborRecord {
            interface: repr.interface,
            source_mac: repr.source_mac,
            chassis_id: ChassisId {
                subtype: repr.chassis_id_subtype,
                id: chassis_bytes,
            },
            port_id: PortId {
                subtype: repr.port_id_subtype,
                id: port_bytes,
            },
            port_description: repr.port_description,
            system_name: repr.system_name,
            system_description: repr.system_description,
            capabilities_supported: repr.capabilities_supported,
            capabilities_enabled: repr.capabilities_enabled,
            management_addresses: repr.management_addresses,
            ttl: repr.ttl,
            first_seen: repr.first_seen,
            last_seen: repr.last_seen,
            raw_tlvs: repr.raw_tlvs,
        })
    }
}

/// ISO-8601 UTC with millisecond precision
mod iso_millis {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
