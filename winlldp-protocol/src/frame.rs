//! LLDP frame construction and parsing
//!
//! A frame is an Ethernet-II header (destination `01:80:C2:00:00:0E`,
//! EtherType `0x88CC`) followed by the TLV stream: Chassis ID, Port ID and
//! TTL in that order, then any optional TLVs, then End-of-LLDPDU.

use crate::tlv::{decode_tlv, ChassisId, ManagementAddress, PortId, Tlv};
use bytes::{BufMut, BytesMut};
use winlldp_core::{Error, MacAddr, Result};

/// LLDP EtherType
pub const LLDP_ETHERTYPE: u16 = 0x88CC;

/// Ethernet-II header size (dst + src + ethertype)
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Maximum bytes an emitted frame may occupy on the wire
pub const MAX_FRAME_LEN: usize = 1500;

/// A structured LLDP frame
///
/// The three mandatory TLVs are dedicated fields so a frame cannot be built
/// without them; `optional` holds everything between TTL and End in wire
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LldpFrame {
    /// Source MAC from the Ethernet header
    pub source: MacAddr,
    /// Destination MAC from the Ethernet header
    pub destination: MacAddr,
    pub chassis_id: ChassisId,
    pub port_id: PortId,
    /// Advertised time-to-live, seconds; 0 withdraws the advertisement
    pub ttl: u16,
    /// Optional TLVs in wire order, unknown types preserved
    pub optional: Vec<Tlv>,
}

impl LldpFrame {
    /// Build a frame with the mandatory TLVs only.
    pub fn new(source: MacAddr, chassis_id: ChassisId, port_id: PortId, ttl: u16) -> Self {
        LldpFrame {
            source,
            destination: MacAddr::LLDP_MULTICAST,
            chassis_id,
            port_id,
            ttl,
            optional: Vec::new(),
        }
    }

    /// Append an optional TLV.
    pub fn push(&mut self, tlv: Tlv) {
        self.optional.push(tlv);
    }

    /// Encode the full Ethernet frame, End-of-LLDPDU included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(128);

        buf.put_slice(self.destination.as_bytes());
        buf.put_slice(self.source.as_bytes());
        buf.put_u16(LLDP_ETHERTYPE);

        Tlv::ChassisId(self.chassis_id.clone()).encode(&mut buf)?;
        Tlv::PortId(self.port_id.clone()).encode(&mut buf)?;
        Tlv::Ttl(self.ttl).encode(&mut buf)?;
        for tlv in &self.optional {
            tlv.encode(&mut buf)?;
        }
        Tlv::End.encode(&mut buf)?;

        if buf.len() > MAX_FRAME_LEN {
            return Err(Error::FrameTooLong(buf.len()));
        }
        Ok(buf.to_vec())
    }

    /// Parse a raw Ethernet frame.
    ///
    /// Stops at End-of-LLDPDU or buffer exhaustion; a missing End TLV is
    /// tolerated. The mandatory Chassis → Port → TTL prefix is enforced and
    /// a TLV whose declared length overruns the buffer aborts the whole
    /// frame.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < ETHERNET_HEADER_LEN {
            return Err(Error::malformed("frame shorter than Ethernet header"));
        }

        let ethertype = u16::from_be_bytes([data[12], data[13]]);
        if ethertype != LLDP_ETHERTYPE {
            return Err(Error::malformed(format!(
                "EtherType 0x{:04x} is not LLDP",
                ethertype
            )));
        }

        let destination = MacAddr([data[0], data[1], data[2], data[3], data[4], data[5]]);
        let source = MacAddr([data[6], data[7], data[8], data[9], data[10], data[11]]);

        let mut tlvs = Vec::new();
        let mut offset = ETHERNET_HEADER_LEN;
        while offset < data.len() {
            let (tlv, consumed) = decode_tlv(&data[offset..])?;
            offset += consumed;
            if tlv == Tlv::End {
                break;
            }
            tlvs.push(tlv);
        }

        let mut iter = tlvs.into_iter();
        let chassis_id = match iter.next() {
            Some(Tlv::ChassisId(chassis)) => chassis,
            _ => return Err(Error::FrameOrderInvalid),
        };
        let port_id = match iter.next() {
            Some(Tlv::PortId(port)) => port,
            _ => return Err(Error::FrameOrderInvalid),
        };
        let ttl = match iter.next() {
            Some(Tlv::Ttl(seconds)) => seconds,
            _ => return Err(Error::FrameOrderInvalid),
        };

        Ok(LldpFrame {
            source,
            destination,
            chassis_id,
            port_id,
            ttl,
            optional: iter.collect(),
        })
    }

    /// The raw LLDPDU (everything after the Ethernet header), for
    /// diagnostics.
    pub fn lldpdu(data: &[u8]) -> &[u8] {
        &data[data.len().min(ETHERNET_HEADER_LEN)..]
    }

    /// First System Name TLV, if present.
    pub fn system_name(&self) -> Option<&str> {
        self.optional.iter().find_map(|tlv| match tlv {
            Tlv::SystemName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// First System Description TLV, if present.
    pub fn system_description(&self) -> Option<&str> {
        self.optional.iter().find_map(|tlv| match tlv {
            Tlv::SystemDescription(desc) => Some(desc.as_str()),
            _ => None,
        })
    }

    /// First Port Description TLV, if present.
    pub fn port_description(&self) -> Option<&str> {
        self.optional.iter().find_map(|tlv| match tlv {
            Tlv::PortDescription(desc) => Some(desc.as_str()),
            _ => None,
        })
    }

    /// First System Capabilities TLV, if present.
    pub fn capabilities(&self) -> Option<(u16, u16)> {
        self.optional.iter().find_map(|tlv| match tlv {
            Tlv::SystemCapabilities { supported, enabled } => Some((*supported, *enabled)),
            _ => None,
        })
    }

    /// All Management Address TLVs, in wire order.
    pub fn management_addresses(&self) -> impl Iterator<Item = &ManagementAddress> {
        self.optional.iter().filter_map(|tlv| match tlv {
            Tlv::ManagementAddress(mgmt) => Some(mgmt),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::{capability, ManagementAddress};

    fn mac() -> MacAddr {
        MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
    }

    #[test]
    fn test_mandatory_only_vector() {
        let frame = LldpFrame::new(
            mac(),
            ChassisId::mac(mac()),
            PortId::interface_name("eth0"),
            120,
        );
        let bytes = frame.encode().unwrap();

        assert_eq!(&bytes[0..6], MacAddr::LLDP_MULTICAST.as_bytes());
        assert_eq!(&bytes[6..12], mac().as_bytes());
        assert_eq!(u16::from_be_bytes([bytes[12], bytes[13]]), 0x88CC);

        let expected = hex::decode("02070400112233445504050565746830060200780000").unwrap();
        assert_eq!(&bytes[ETHERNET_HEADER_LEN..], &expected[..]);
    }

    #[test]
    fn test_encode_decode_identity() {
        let mut frame = LldpFrame::new(
            mac(),
            ChassisId::mac(mac()),
            PortId::interface_name("eth0"),
            120,
        );
        frame.push(Tlv::PortDescription("Ethernet Port".to_string()));
        frame.push(Tlv::SystemName("host-a".to_string()));
        frame.push(Tlv::SystemDescription("Linux 6.8.0 x86_64".to_string()));
        frame.push(Tlv::SystemCapabilities {
            supported: capability::STATION_ONLY,
            enabled: capability::STATION_ONLY,
        });
        frame.push(Tlv::ManagementAddress(ManagementAddress::ipv4(
            "10.1.2.3".parse().unwrap(),
            3,
        )));

        let bytes = frame.encode().unwrap();
        let decoded = LldpFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);

        // Re-encoding the decoded frame reproduces the bytes.
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_decode_without_end_tlv() {
        let frame = LldpFrame::new(
            mac(),
            ChassisId::mac(mac()),
            PortId::interface_name("eth0"),
            60,
        );
        let mut bytes = frame.encode().unwrap();
        bytes.truncate(bytes.len() - 2); // drop End
        let decoded = LldpFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.ttl, 60);
    }

    #[test]
    fn test_decode_rejects_wrong_ethertype() {
        let mut bytes = LldpFrame::new(
            mac(),
            ChassisId::mac(mac()),
            PortId::interface_name("eth0"),
            60,
        )
        .encode()
        .unwrap();
        bytes[12] = 0x08;
        bytes[13] = 0x00;
        assert!(matches!(
            LldpFrame::decode(&bytes),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_overrun() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MacAddr::LLDP_MULTICAST.as_bytes());
        bytes.extend_from_slice(mac().as_bytes());
        bytes.extend_from_slice(&LLDP_ETHERTYPE.to_be_bytes());
        bytes.extend_from_slice(&Tlv::ChassisId(ChassisId::mac(mac())).to_bytes().unwrap());
        // Port ID header declares 200 bytes, then the buffer ends after 4
        bytes.extend_from_slice(&((2u16 << 9) | 200).to_be_bytes());
        bytes.extend_from_slice(&[0x05, b'e', b't', b'h']);

        assert!(matches!(
            LldpFrame::decode(&bytes),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_enforces_mandatory_order() {
        // TTL before Port ID
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MacAddr::LLDP_MULTICAST.as_bytes());
        bytes.extend_from_slice(mac().as_bytes());
        bytes.extend_from_slice(&LLDP_ETHERTYPE.to_be_bytes());
        bytes.extend_from_slice(&Tlv::ChassisId(ChassisId::mac(mac())).to_bytes().unwrap());
        bytes.extend_from_slice(&Tlv::Ttl(120).to_bytes().unwrap());
        bytes.extend_from_slice(
            &Tlv::PortId(PortId::interface_name("eth0")).to_bytes().unwrap(),
        );
        bytes.extend_from_slice(&Tlv::End.to_bytes().unwrap());

        assert!(matches!(
            LldpFrame::decode(&bytes),
            Err(Error::FrameOrderInvalid)
        ));
    }

    #[test]
    fn test_unknown_tlv_preserved_through_roundtrip() {
        let mut frame = LldpFrame::new(
            mac(),
            ChassisId::mac(mac()),
            PortId::interface_name("eth0"),
            120,
        );
        frame.push(Tlv::Unknown {
            tlv_type: 42,
            data: vec![1, 2, 3],
        });

        let bytes = frame.encode().unwrap();
        let decoded = LldpFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.optional, frame.optional);
    }

    #[test]
    fn test_frame_stays_under_wire_limit() {
        let mut frame = LldpFrame::new(
            mac(),
            ChassisId::mac(mac()),
            PortId::interface_name("eth0"),
            120,
        );
        for _ in 0..3 {
            frame.push(Tlv::SystemDescription("d".repeat(511)));
        }
        assert!(matches!(frame.encode(), Err(Error::FrameTooLong(_))));
    }

    #[test]
    fn test_accessors() {
        let mut frame = LldpFrame::new(
            mac(),
            ChassisId::mac(mac()),
            PortId::interface_name("eth0"),
            120,
        );
        assert_eq!(frame.system_name(), None);
        frame.push(Tlv::SystemName("sw1".to_string()));
        frame.push(Tlv::SystemCapabilities {
            supported: capability::BRIDGE,
            enabled: capability::BRIDGE,
        });
        assert_eq!(frame.system_name(), Some("sw1"));
        assert_eq!(frame.capabilities(), Some((capability::BRIDGE, capability::BRIDGE)));
    }
}
