//! IPv4 header construction for outbound raw packets
//!
//! The raw send worker builds one of these per packet and writes it into the
//! buffer headroom. Parsing is kept for verifying what was written.

use std::net::Ipv4Addr;

use crate::error::{NetError, Result};
use crate::network::checksum;
use byteorder::{BigEndian, ByteOrder};

pub const IPV4_HEADER_LEN: usize = 20;
const IPV4_VERSION: u8 = 4;
const DEFAULT_IHL: u8 = 5; // 5 * 4 = 20 bytes

/// IPv4 packet header structure
///
/// Represents the standard 20-byte IPv4 header as defined in RFC 791
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags_frag_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl Ipv4Header {
    /// Create a new IPv4 header with a computed checksum.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tos: u8,
        total_len: u16,
        id: u16,
        flags_frag_offset: u16,
        ttl: u8,
        protocol: u8,
        src_addr: Ipv4Addr,
        dst_addr: Ipv4Addr,
    ) -> Self {
        let mut header = Ipv4Header {
            version: IPV4_VERSION,
            ihl: DEFAULT_IHL,
            tos,
            total_len,
            id,
            flags_frag_offset,
            ttl,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
        };
        header.update_checksum();
        header
    }

    /// Parse IPv4 header from byte slice
    ///
    /// Returns None if the data is too short or if the version field is not 4
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < IPV4_HEADER_LEN {
            return None;
        }

        let version = (data[0] & 0xF0) >> 4;
        if version != IPV4_VERSION {
            return None;
        }

        Some(Ipv4Header {
            version,
            ihl: data[0] & 0x0F,
            tos: data[1],
            total_len: BigEndian::read_u16(&data[2..4]),
            id: BigEndian::read_u16(&data[4..6]),
            flags_frag_offset: BigEndian::read_u16(&data[6..8]),
            ttl: data[8],
            protocol: data[9],
            checksum: BigEndian::read_u16(&data[10..12]),
            src_addr: Ipv4Addr::from(BigEndian::read_u32(&data[12..16])),
            dst_addr: Ipv4Addr::from(BigEndian::read_u32(&data[16..20])),
        })
    }

    /// Recalculate the checksum after modifying header fields.
    pub fn update_checksum(&mut self) {
        self.checksum = 0;
        self.checksum = checksum(&self.to_bytes());
    }

    /// Serialize the header into the first 20 bytes of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        let out = buf
            .get_mut(..IPV4_HEADER_LEN)
            .ok_or(NetError::BufferUnderflow)?;
        out.copy_from_slice(&self.to_bytes());
        Ok(())
    }

    /// Convert IPv4 header to bytes
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        bytes[0] = (self.version << 4) | self.ihl;
        bytes[1] = self.tos;
        BigEndian::write_u16(&mut bytes[2..4], self.total_len);
        BigEndian::write_u16(&mut bytes[4..6], self.id);
        BigEndian::write_u16(&mut bytes[6..8], self.flags_frag_offset);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        BigEndian::write_u16(&mut bytes[10..12], self.checksum);
        BigEndian::write_u32(&mut bytes[12..16], u32::from(self.src_addr));
        BigEndian::write_u32(&mut bytes[16..20], u32::from(self.dst_addr));
        bytes
    }

    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    pub fn checksum_ok(&self) -> bool {
        checksum(&self.to_bytes()) == 0
    }
}

/// IPv4 protocol numbers
pub mod protocol {
    /// Reserved number used for application-built raw packets.
    pub const RAW: u8 = 255;
}

/// Type-of-service values as passed to the raw send API.
///
/// The TOS byte travels pre-shifted into bits 16..24, the position it has in
/// the first 32-bit word of the header.
pub mod tos {
    pub const MASK: u32 = 0x00FF_0000;
    pub const NORMAL: u32 = 0x0000_0000;
    pub const MIN_DELAY: u32 = 0x0010_0000;
    pub const MAX_DATA: u32 = 0x0008_0000;
    pub const MAX_RELIABLE: u32 = 0x0004_0000;
    pub const MIN_COST: u32 = 0x0002_0000;

    /// Header byte for a validated TOS value.
    pub const fn to_byte(type_of_service: u32) -> u8 {
        ((type_of_service & MASK) >> 16) as u8
    }
}
