//! IP instance configuration

use std::net::Ipv4Addr;

use crate::error::{NetError, Result};

/// Default ARP cache size when ARP is enabled at creation.
pub const DEFAULT_ARP_CACHE_ENTRIES: usize = 16;
/// Default dynamic ARP lifetime: 120 seconds at a 100 Hz tick.
pub const DEFAULT_ARP_EXPIRATION_TICKS: u64 = 120 * 100;
pub const DEFAULT_TTL: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpConfig {
    pub name: String,
    pub address: Ipv4Addr,
    /// ARP cache size, or `None` to leave ARP disabled until
    /// [`IpInstance::arp_enable`](crate::IpInstance::arp_enable).
    pub arp_cache_entries: Option<usize>,
    /// Lifetime of learned ARP entries in ticks; zero disables aging.
    pub arp_expiration_ticks: u64,
    pub default_ttl: u8,
    pub raw_ip_enabled: bool,
}

impl Default for IpConfig {
    fn default() -> Self {
        IpConfig {
            name: "ip0".to_string(),
            address: Ipv4Addr::UNSPECIFIED,
            arp_cache_entries: Some(DEFAULT_ARP_CACHE_ENTRIES),
            arp_expiration_ticks: DEFAULT_ARP_EXPIRATION_TICKS,
            default_ttl: DEFAULT_TTL,
            raw_ip_enabled: false,
        }
    }
}

impl IpConfig {
    pub fn new(address: Ipv4Addr) -> Self {
        IpConfig {
            address,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_ttl == 0 {
            return Err(NetError::InvalidParameters);
        }
        if self.arp_cache_entries == Some(0) {
            return Err(NetError::InvalidParameters);
        }
        Ok(())
    }
}
