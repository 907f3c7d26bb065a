//! LLDP wire codec (IEEE 802.1AB)
//!
//! TLV-level encode/decode and the Ethernet-II frame wrapper. The decoder is
//! strict about the mandatory Chassis ID → Port ID → TTL prefix and about
//! declared lengths, and preserves unknown optional TLVs opaquely.

pub mod frame;
pub mod tlv;

pub use frame::{LldpFrame, ETHERNET_HEADER_LEN, LLDP_ETHERTYPE, MAX_FRAME_LEN};
pub use tlv::{
    address_subtype, capability, chassis_subtype, decode_tlv, port_subtype, tlv_type, ChassisId,
    ManagementAddress, PortId, Tlv, TLV_MAX_LEN,
};
