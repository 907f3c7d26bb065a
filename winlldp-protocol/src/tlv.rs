//! LLDP TLV stream codec
//!
//! A TLV carries a 7-bit type and a 9-bit length in one big-endian 16-bit
//! header, followed by `length` payload bytes. Type 0 terminates the stream.

use bytes::{BufMut, BytesMut};
use winlldp_core::{Error, MacAddr, Result};

/// Maximum TLV payload length representable in the 9-bit length field
pub const TLV_MAX_LEN: usize = 511;

/// TLV type codes
pub mod tlv_type {
    pub const END_OF_LLDPDU: u8 = 0;
    pub const CHASSIS_ID: u8 = 1;
    pub const PORT_ID: u8 = 2;
    pub const TTL: u8 = 3;
    pub const PORT_DESCRIPTION: u8 = 4;
    pub const SYSTEM_NAME: u8 = 5;
    pub const SYSTEM_DESCRIPTION: u8 = 6;
    pub const SYSTEM_CAPABILITIES: u8 = 7;
    pub const MANAGEMENT_ADDRESS: u8 = 8;
    pub const ORGANIZATIONALLY_SPECIFIC: u8 = 127;
}

/// Chassis ID subtypes (IEEE 802.1AB-2016 table 8-2)
pub mod chassis_subtype {
    pub const CHASSIS_COMPONENT: u8 = 1;
    pub const INTERFACE_ALIAS: u8 = 2;
    pub const PORT_COMPONENT: u8 = 3;
    pub const MAC_ADDRESS: u8 = 4;
    pub const NETWORK_ADDRESS: u8 = 5;
    pub const INTERFACE_NAME: u8 = 6;
    pub const LOCALLY_ASSIGNED: u8 = 7;
}

/// Port ID subtypes (IEEE 802.1AB-2016 table 8-3)
pub mod port_subtype {
    pub const INTERFACE_ALIAS: u8 = 1;
    pub const PORT_COMPONENT: u8 = 2;
    pub const MAC_ADDRESS: u8 = 3;
    pub const NETWORK_ADDRESS: u8 = 4;
    pub const INTERFACE_NAME: u8 = 5;
    pub const AGENT_CIRCUIT_ID: u8 = 6;
    pub const LOCALLY_ASSIGNED: u8 = 7;
}

/// Management address subtypes (IANA AddressFamilyNumbers)
pub mod address_subtype {
    pub const IPV4: u8 = 1;
    pub const IPV6: u8 = 2;
}

/// System capability bits (IEEE 802.1AB-2016 table 8-4)
pub mod capability {
    pub const OTHER: u16 = 1 << 0;
    pub const REPEATER: u16 = 1 << 1;
    pub const BRIDGE: u16 = 1 << 2;
    pub const WLAN_ACCESS_POINT: u16 = 1 << 3;
    pub const ROUTER: u16 = 1 << 4;
    pub const TELEPHONE: u16 = 1 << 5;
    pub const DOCSIS: u16 = 1 << 6;
    pub const STATION_ONLY: u16 = 1 << 7;
}

/// Chassis ID: subtype plus identifier bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChassisId {
    pub subtype: u8,
    pub id: Vec<u8>,
}

impl ChassisId {
    /// MAC-address chassis identifier (subtype 4)
    pub fn mac(mac: MacAddr) -> Self {
        ChassisId {
            subtype: chassis_subtype::MAC_ADDRESS,
            id: mac.octets().to_vec(),
        }
    }

    pub fn is_mac(&self) -> bool {
        self.subtype == chassis_subtype::MAC_ADDRESS && self.id.len() == 6
    }
}

/// Port ID: subtype plus identifier bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortId {
    pub subtype: u8,
    pub id: Vec<u8>,
}

impl PortId {
    /// Interface-name port identifier (subtype 5)
    pub fn interface_name(name: &str) -> Self {
        PortId {
            subtype: port_subtype::INTERFACE_NAME,
            id: name.as_bytes().to_vec(),
        }
    }

    /// MAC-address port identifier (subtype 3)
    pub fn mac(mac: MacAddr) -> Self {
        PortId {
            subtype: port_subtype::MAC_ADDRESS,
            id: mac.octets().to_vec(),
        }
    }

    pub fn is_mac(&self) -> bool {
        self.subtype == port_subtype::MAC_ADDRESS && self.id.len() == 6
    }
}

/// Management Address TLV payload (type 8)
///
/// Wire layout: 1-byte address-string length (address length + 1), 1-byte
/// address subtype, N-byte address, 1-byte interface-numbering subtype,
/// 4-byte interface number, 1-byte OID length, OID bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementAddress {
    pub address_subtype: u8,
    pub address: Vec<u8>,
    pub interface_subtype: u8,
    pub interface_index: u32,
    pub oid: Vec<u8>,
}

impl ManagementAddress {
    /// Interface-numbering subtype "ifIndex"
    pub const IF_NUMBERING_IFINDEX: u8 = 2;

    /// IPv4 management address with an ifIndex interface number and no OID.
    pub fn ipv4(addr: std::net::Ipv4Addr, interface_index: u32) -> Self {
        ManagementAddress {
            address_subtype: address_subtype::IPV4,
            address: addr.octets().to_vec(),
            interface_subtype: Self::IF_NUMBERING_IFINDEX,
            interface_index,
            oid: Vec::new(),
        }
    }

    /// Decode the address bytes into an IP address, when the subtype is one
    /// of the IP families.
    pub fn ip(&self) -> Option<std::net::IpAddr> {
        match self.address_subtype {
            address_subtype::IPV4 => <[u8; 4]>::try_from(self.address.as_slice())
                .ok()
                .map(std::net::IpAddr::from),
            address_subtype::IPV6 => <[u8; 16]>::try_from(self.address.as_slice())
                .ok()
                .map(std::net::IpAddr::from),
            _ => None,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        // Both lengths are encoded in one byte; the address length byte
        // also counts the subtype.
        if self.address.len() + 1 > u8::MAX as usize {
            return Err(Error::MgmtAddressTooLong(self.address.len()));
        }
        if self.oid.len() > u8::MAX as usize {
            return Err(Error::MgmtAddressTooLong(self.oid.len()));
        }

        let mut value = Vec::with_capacity(8 + self.address.len() + self.oid.len());
        value.push(self.address.len() as u8 + 1);
        value.push(self.address_subtype);
        value.extend_from_slice(&self.address);
        value.push(self.interface_subtype);
        value.extend_from_slice(&self.interface_index.to_be_bytes());
        value.push(self.oid.len() as u8);
        value.extend_from_slice(&self.oid);
        Ok(value)
    }

    fn decode_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < 2 {
            return Err(Error::malformed("management address TLV truncated"));
        }
        let addr_string_len = payload[0] as usize;
        if addr_string_len < 1 || payload.len() < 1 + addr_string_len + 6 {
            return Err(Error::malformed("management address length mismatch"));
        }
        let address_subtype = payload[1];
        let address = payload[2..1 + addr_string_len].to_vec();

        let rest = &payload[1 + addr_string_len..];
        let interface_subtype = rest[0];
        let interface_index = u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]]);
        let oid_len = rest[5] as usize;
        if rest.len() < 6 + oid_len {
            return Err(Error::malformed("management address OID overruns TLV"));
        }
        let oid = rest[6..6 + oid_len].to_vec();

        Ok(ManagementAddress {
            address_subtype,
            address,
            interface_subtype,
            interface_index,
            oid,
        })
    }
}

/// One TLV, as a tagged value
///
/// `Unknown` preserves unrecognized optional types verbatim so a decoded
/// frame can be re-encoded without losing forward-compatible content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tlv {
    ChassisId(ChassisId),
    PortId(PortId),
    Ttl(u16),
    PortDescription(String),
    SystemName(String),
    SystemDescription(String),
    SystemCapabilities { supported: u16, enabled: u16 },
    ManagementAddress(ManagementAddress),
    OrgSpecific { oui: [u8; 3], subtype: u8, data: Vec<u8> },
    Unknown { tlv_type: u8, data: Vec<u8> },
    End,
}

impl Tlv {
    /// Wire type code of this TLV
    pub fn type_code(&self) -> u8 {
        match self {
            Tlv::End => tlv_type::END_OF_LLDPDU,
            Tlv::ChassisId(_) => tlv_type::CHASSIS_ID,
            Tlv::PortId(_) => tlv_type::PORT_ID,
            Tlv::Ttl(_) => tlv_type::TTL,
            Tlv::PortDescription(_) => tlv_type::PORT_DESCRIPTION,
            Tlv::SystemName(_) => tlv_type::SYSTEM_NAME,
            Tlv::SystemDescription(_) => tlv_type::SYSTEM_DESCRIPTION,
            Tlv::SystemCapabilities { .. } => tlv_type::SYSTEM_CAPABILITIES,
            Tlv::ManagementAddress(_) => tlv_type::MANAGEMENT_ADDRESS,
            Tlv::OrgSpecific { .. } => tlv_type::ORGANIZATIONALLY_SPECIFIC,
            Tlv::Unknown { tlv_type, .. } => *tlv_type,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Tlv::End => Vec::new(),
            Tlv::ChassisId(chassis) => {
                let mut value = Vec::with_capacity(1 + chassis.id.len());
                value.push(chassis.subtype);
                value.extend_from_slice(&chassis.id);
                value
            }
            Tlv::PortId(port) => {
                let mut value = Vec::with_capacity(1 + port.id.len());
                value.push(port.subtype);
                value.extend_from_slice(&port.id);
                value
            }
            Tlv::Ttl(seconds) => seconds.to_be_bytes().to_vec(),
            Tlv::PortDescription(text)
            | Tlv::SystemName(text)
            | Tlv::SystemDescription(text) => text.as_bytes().to_vec(),
            Tlv::SystemCapabilities { supported, enabled } => {
                let mut value = Vec::with_capacity(4);
                value.extend_from_slice(&supported.to_be_bytes());
                value.extend_from_slice(&enabled.to_be_bytes());
                value
            }
            Tlv::ManagementAddress(mgmt) => mgmt.encode_payload()?,
            Tlv::OrgSpecific { oui, subtype, data } => {
                let mut value = Vec::with_capacity(4 + data.len());
                value.extend_from_slice(oui);
                value.push(*subtype);
                value.extend_from_slice(data);
                value
            }
            Tlv::Unknown { data, .. } => data.clone(),
        };
        Ok(payload)
    }

    /// Encode this TLV (header and payload) into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let payload = self.encode_payload()?;
        if payload.len() > TLV_MAX_LEN {
            return Err(Error::TlvTooLong {
                tlv_type: self.type_code(),
                len: payload.len(),
            });
        }

        let header = ((self.type_code() as u16 & 0x7F) << 9) | (payload.len() as u16 & 0x1FF);
        buf.put_u16(header);
        buf.put_slice(&payload);
        Ok(())
    }

    /// Encode this TLV to a standalone byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.to_vec())
    }

    /// Interpret a raw type and payload as a typed TLV.
    ///
    /// Known types with truncated payloads are rejected; unknown optional
    /// types are preserved opaquely.
    pub fn from_payload(tlv_type: u8, payload: &[u8]) -> Result<Self> {
        match tlv_type {
            tlv_type::END_OF_LLDPDU => Ok(Tlv::End),
            tlv_type::CHASSIS_ID => {
                if payload.len() < 2 {
                    return Err(Error::malformed("chassis ID TLV truncated"));
                }
                Ok(Tlv::ChassisId(ChassisId {
                    subtype: payload[0],
                    id: payload[1..].to_vec(),
                }))
            }
            tlv_type::PORT_ID => {
                if payload.len() < 2 {
                    return Err(Error::malformed("port ID TLV truncated"));
                }
                Ok(Tlv::PortId(PortId {
                    subtype: payload[0],
                    id: payload[1..].to_vec(),
                }))
            }
            tlv_type::TTL => {
                if payload.len() < 2 {
                    return Err(Error::malformed("TTL TLV truncated"));
                }
                Ok(Tlv::Ttl(u16::from_be_bytes([payload[0], payload[1]])))
            }
            tlv_type::PORT_DESCRIPTION => Ok(Tlv::PortDescription(lossy_text(payload))),
            tlv_type::SYSTEM_NAME => Ok(Tlv::SystemName(lossy_text(payload))),
            tlv_type::SYSTEM_DESCRIPTION => Ok(Tlv::SystemDescription(lossy_text(payload))),
            tlv_type::SYSTEM_CAPABILITIES => {
                if payload.len() < 4 {
                    return Err(Error::malformed("system capabilities TLV truncated"));
                }
                Ok(Tlv::SystemCapabilities {
                    supported: u16::from_be_bytes([payload[0], payload[1]]),
                    enabled: u16::from_be_bytes([payload[2], payload[3]]),
                })
            }
            tlv_type::MANAGEMENT_ADDRESS => {
                ManagementAddress::decode_payload(payload).map(Tlv::ManagementAddress)
            }
            tlv_type::ORGANIZATIONALLY_SPECIFIC => {
                if payload.len() < 4 {
                    return Err(Error::malformed("organizationally specific TLV truncated"));
                }
                Ok(Tlv::OrgSpecific {
                    oui: [payload[0], payload[1], payload[2]],
                    subtype: payload[3],
                    data: payload[4..].to_vec(),
                })
            }
            other => Ok(Tlv::Unknown {
                tlv_type: other,
                data: payload.to_vec(),
            }),
        }
    }
}

/// Parse one TLV from the front of `data`.
///
/// Returns the TLV and the number of bytes consumed. A header whose declared
/// length would overrun `data` is a `MalformedFrame` error.
pub fn decode_tlv(data: &[u8]) -> Result<(Tlv, usize)> {
    if data.len() < 2 {
        return Err(Error::malformed("TLV header truncated"));
    }

    let header = u16::from_be_bytes([data[0], data[1]]);
    let tlv_type = (header >> 9) as u8 & 0x7F;
    let length = (header & 0x1FF) as usize;

    if data.len() < 2 + length {
        return Err(Error::malformed(format!(
            "TLV type {} declares {} bytes but only {} remain",
            tlv_type,
            length,
            data.len() - 2
        )));
    }

    let tlv = Tlv::from_payload(tlv_type, &data[2..2 + length])?;
    Ok((tlv, 2 + length))
}

fn lossy_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_packing() {
        let bytes = Tlv::SystemName("TestRouter".to_string()).to_bytes().unwrap();
        // Type 5 << 9 | length 10 = 0x0A0A
        assert_eq!(bytes[0], 0x0A);
        assert_eq!(bytes[1], 0x0A);
        assert_eq!(&bytes[2..], b"TestRouter");
    }

    #[test]
    fn test_chassis_id_mac() {
        let mac = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let bytes = Tlv::ChassisId(ChassisId::mac(mac)).to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0x02, 0x07, 0x04, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55]
        );
    }

    #[test]
    fn test_ttl_encoding() {
        let bytes = Tlv::Ttl(120).to_bytes().unwrap();
        assert_eq!(bytes, vec![0x06, 0x02, 0x00, 0x78]);
    }

    #[test]
    fn test_end_encoding() {
        assert_eq!(Tlv::End.to_bytes().unwrap(), vec![0x00, 0x00]);
    }

    #[test]
    fn test_payload_511_roundtrips_512_rejected() {
        let ok = Tlv::SystemDescription("x".repeat(511));
        let bytes = ok.to_bytes().unwrap();
        let (decoded, consumed) = decode_tlv(&bytes).unwrap();
        assert_eq!(consumed, 513);
        assert_eq!(decoded, ok);

        let too_long = Tlv::SystemDescription("x".repeat(512));
        assert!(matches!(
            too_long.to_bytes(),
            Err(Error::TlvTooLong { tlv_type: 6, len: 512 })
        ));
    }

    #[test]
    fn test_declared_length_overrun_rejected() {
        // Port ID claims 200 bytes, only 4 present
        let mut data = vec![0x04, 0xC8];
        data.extend_from_slice(&[0x05, b'e', b't', b'h']);
        assert!(matches!(decode_tlv(&data), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_truncated_known_payloads_rejected() {
        // TTL with one byte
        assert!(decode_tlv(&[0x06, 0x01, 0x78]).is_err());
        // Chassis ID with only a subtype
        assert!(decode_tlv(&[0x02, 0x01, 0x04]).is_err());
        // Capabilities with two bytes
        assert!(decode_tlv(&[0x0E, 0x02, 0x00, 0x80]).is_err());
    }

    #[test]
    fn test_unknown_type_preserved() {
        let mut data = ((42u16 << 9) | 3).to_be_bytes().to_vec();
        data.extend_from_slice(&[0xDE, 0xAD, 0xBE]);
        let (tlv, consumed) = decode_tlv(&data).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(
            tlv,
            Tlv::Unknown {
                tlv_type: 42,
                data: vec![0xDE, 0xAD, 0xBE]
            }
        );
        assert_eq!(tlv.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_lossy_text_never_fails() {
        let (tlv, _) = decode_tlv(&[0x0A, 0x03, 0xFF, 0xFE, b'a']).unwrap();
        match tlv {
            Tlv::SystemName(name) => assert!(name.ends_with('a')),
            other => panic!("expected system name, got {:?}", other),
        }
    }

    #[test]
    fn test_management_address_roundtrip() {
        let mgmt = ManagementAddress::ipv4("192.168.1.10".parse().unwrap(), 7);
        let tlv = Tlv::ManagementAddress(mgmt.clone());
        let bytes = tlv.to_bytes().unwrap();

        // addr_string_len(5), subtype(1), 4 addr bytes, if subtype(2),
        // if index(4 bytes), oid len(0)
        assert_eq!(
            &bytes[2..],
            &[5, 1, 192, 168, 1, 10, 2, 0, 0, 0, 7, 0][..]
        );

        let (decoded, _) = decode_tlv(&bytes).unwrap();
        assert_eq!(decoded, tlv);
        match decoded {
            Tlv::ManagementAddress(m) => {
                assert_eq!(m.ip(), Some("192.168.1.10".parse().unwrap()));
                assert_eq!(m.interface_index, 7);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_management_address_length_boundaries() {
        // 254 address bytes is the most the one-byte length field (which
        // also counts the subtype) can carry; it round-trips.
        let mut mgmt = ManagementAddress::ipv4("192.168.1.10".parse().unwrap(), 7);
        mgmt.address = vec![0xAB; 254];
        let tlv = Tlv::ManagementAddress(mgmt.clone());
        let bytes = tlv.to_bytes().unwrap();
        assert_eq!(bytes[2], 255);
        let (decoded, _) = decode_tlv(&bytes).unwrap();
        assert_eq!(decoded, tlv);

        // One more byte cannot be encoded.
        mgmt.address = vec![0xAB; 255];
        assert!(matches!(
            Tlv::ManagementAddress(mgmt.clone()).to_bytes(),
            Err(Error::MgmtAddressTooLong(255))
        ));

        // The OID length byte has the same limit.
        mgmt.address = vec![0xAB; 4];
        mgmt.oid = vec![0x2B; 256];
        assert!(matches!(
            Tlv::ManagementAddress(mgmt).to_bytes(),
            Err(Error::MgmtAddressTooLong(256))
        ));
    }

    #[test]
    fn test_management_address_bad_lengths() {
        // addr_string_len of 0
        assert!(ManagementAddress::decode_payload(&[0, 1, 2, 0, 0, 0, 1, 0]).is_err());
        // OID length overruns payload
        assert!(
            ManagementAddress::decode_payload(&[5, 1, 192, 168, 1, 10, 2, 0, 0, 0, 7, 9]).is_err()
        );
    }

    #[test]
    fn test_org_specific_roundtrip() {
        let tlv = Tlv::OrgSpecific {
            oui: [0x00, 0x12, 0xBB],
            subtype: 1,
            data: vec![0x00, 0x01, 0x03, 0x00],
        };
        let bytes = tlv.to_bytes().unwrap();
        let (decoded, _) = decode_tlv(&bytes).unwrap();
        assert_eq!(decoded, tlv);
    }
}
