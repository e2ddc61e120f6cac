//! IP instance: identity, protection lock and per-instance state

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::config::IpConfig;
use crate::error::{NetError, Result};
use crate::link::LinkDriver;
use crate::network::arp::ArpCache;
use crate::sync::{context, Protection, ProtectionGuard};

/// Identity tag of a live instance: ASCII `"IP  "`.
pub const IP_ID: u32 = 0x4950_2020;

/// State guarded by the instance protection lock.
pub(crate) struct IpCore {
    pub(crate) arp: Option<ArpCache>,
}

/// Counters for diagnostics. They never influence control flow.
#[derive(Debug, Default)]
pub struct IpStats {
    pub raw_packets_sent: AtomicU64,
    pub raw_send_failures: AtomicU64,
    pub total_bytes_sent: AtomicU64,
    pub arp_static_entries_deleted: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpStatsSnapshot {
    pub raw_packets_sent: u64,
    pub raw_send_failures: u64,
    pub total_bytes_sent: u64,
    pub arp_static_entries_deleted: u64,
}

impl IpStats {
    pub fn snapshot(&self) -> IpStatsSnapshot {
        IpStatsSnapshot {
            raw_packets_sent: self.raw_packets_sent.load(Ordering::Relaxed),
            raw_send_failures: self.raw_send_failures.load(Ordering::Relaxed),
            total_bytes_sent: self.total_bytes_sent.load(Ordering::Relaxed),
            arp_static_entries_deleted: self.arp_static_entries_deleted.load(Ordering::Relaxed),
        }
    }
}

/// One IP instance bound to a link driver.
///
/// Shared between application threads and the stack's own threads by
/// reference (usually behind an `Arc`). All table mutation happens under
/// [`IpInstance::protection`]; flags and counters are atomics.
pub struct IpInstance {
    id: AtomicU32,
    name: String,
    address: Ipv4Addr,
    default_ttl: u8,
    arp_expiration_ticks: u64,
    pub(crate) raw_ip_enabled: AtomicBool,
    pub(crate) arp_enabled: AtomicBool,
    packet_id: AtomicU32,
    pub(crate) protection: Protection<IpCore>,
    stats: IpStats,
    link: Arc<dyn LinkDriver>,
}

impl fmt::Debug for IpInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpInstance")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl IpInstance {
    /// Create an instance from `config`, transmitting through `link`.
    ///
    /// Allowed from thread code and during system initialization.
    pub fn create(config: IpConfig, link: Arc<dyn LinkDriver>) -> Result<Self> {
        context::init_and_threads()?;
        config.validate()?;

        let arp = config
            .arp_cache_entries
            .map(|entries| ArpCache::new(entries, config.arp_expiration_ticks));

        debug!(
            name = %config.name,
            address = %config.address,
            arp = ?config.arp_cache_entries,
            raw = config.raw_ip_enabled,
            "ip instance created"
        );

        Ok(IpInstance {
            id: AtomicU32::new(IP_ID),
            name: config.name,
            address: config.address,
            default_ttl: config.default_ttl,
            arp_expiration_ticks: config.arp_expiration_ticks,
            raw_ip_enabled: AtomicBool::new(config.raw_ip_enabled),
            arp_enabled: AtomicBool::new(arp.is_some()),
            packet_id: AtomicU32::new(0),
            protection: Protection::new(IpCore { arp }),
            stats: IpStats::default(),
            link,
        })
    }

    /// Retire the instance. Every later operation on it fails with
    /// [`NetError::NullOrOwnership`].
    pub fn delete(&self) -> Result<()> {
        self.validate()?;
        context::threads_only()?;

        let mut core = self.protection.lock();
        self.id.store(0, Ordering::Release);
        core.arp = None;
        self.arp_enabled.store(false, Ordering::Release);
        debug!(name = %self.name, "ip instance deleted");
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.id.load(Ordering::Acquire) == IP_ID
    }

    /// Identity check every public entry point starts with.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(NetError::NullOrOwnership)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn default_ttl(&self) -> u8 {
        self.default_ttl
    }

    pub(crate) fn arp_expiration_ticks(&self) -> u64 {
        self.arp_expiration_ticks
    }

    pub fn stats(&self) -> &IpStats {
        &self.stats
    }

    pub fn link(&self) -> &Arc<dyn LinkDriver> {
        &self.link
    }

    /// Next value for the IPv4 identification field.
    pub(crate) fn next_packet_id(&self) -> u16 {
        self.packet_id.fetch_add(1, Ordering::Relaxed) as u16
    }

    pub(crate) fn lock_core(&self) -> ProtectionGuard<'_, IpCore> {
        self.protection.lock()
    }
}
