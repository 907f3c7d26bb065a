//! BPF filter builders

/// LLDP filter: the LLDP EtherType addressed to the nearest-bridge
/// multicast group.
pub fn lldp_filter() -> String {
    "ether proto 0x88cc and ether dst 01:80:c2:00:00:0e".to_string()
}
