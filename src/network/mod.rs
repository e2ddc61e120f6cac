//! Network layer protocols
//!
//! This module contains the pieces of the network layer this crate owns:
//! - IPv4: header construction for outbound raw packets
//! - ARP: the address binding cache

pub mod arp;
pub mod ipv4;

// Re-export commonly used items
pub use arp::{ArpCache, ArpEntry, ArpInfo, ArpList, HardwareAddress};
pub use ipv4::{protocol, tos, Ipv4Header, IPV4_HEADER_LEN};

/// Calculate Internet checksum
///
/// Algorithm: Sum data in 16-bit chunks, add carry bits to the sum,
/// and return the one's complement of the result.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;

    for chunk in data.chunks_exact(2) {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    // Odd trailing byte is padded with zero
    if data.len() % 2 != 0 {
        if let Some(&last_byte) = data.last() {
            sum += (last_byte as u32) << 8;
        }
    }

    while (sum >> 16) > 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_header() {
        // RFC 1071 style example header with checksum field zeroed
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(checksum(&header), 0xb861);
    }

    #[test]
    fn test_checksum_odd_length() {
        assert_eq!(checksum(&[0x01]), !0x0100u16);
    }
}
