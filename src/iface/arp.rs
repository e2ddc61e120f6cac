//! Validated ARP operations on an IP instance
//!
//! Each operation checks the instance identity, that ARP is enabled and the
//! calling context, then runs the matching [`ArpCache`] method under the
//! instance lock.

use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;

use tracing::{debug, trace, warn};

use crate::error::{NetError, Result};
use crate::iface::instance::IpInstance;
use crate::network::arp::{ArpCache, ArpEntry, ArpInfo, HardwareAddress};
use crate::sync::context;

impl IpInstance {
    /// Create the ARP cache with room for `entries` bindings.
    pub fn arp_enable(&self, entries: usize) -> Result<()> {
        self.validate()?;
        if entries == 0 {
            return Err(NetError::InvalidParameters);
        }
        context::init_and_threads()?;

        let mut core = self.lock_core();
        if core.arp.is_some() {
            return Err(NetError::AlreadyEnabled);
        }
        core.arp = Some(ArpCache::new(entries, self.arp_expiration_ticks()));
        self.arp_enabled.store(true, Ordering::Release);
        debug!(ip = self.name(), entries, "arp enabled");
        Ok(())
    }

    pub fn arp_static_entry_create(&self, ip: Ipv4Addr, hw: HardwareAddress) -> Result<()> {
        self.check_arp()?;
        check_binding(ip, hw)?;
        context::init_and_threads()?;

        self.with_arp(|arp| arp.static_entry_create(ip, hw))
    }

    pub fn arp_static_entry_delete(&self, ip: Ipv4Addr, hw: HardwareAddress) -> Result<()> {
        self.check_arp()?;
        check_binding(ip, hw)?;
        context::threads_only()?;

        self.with_arp(|arp| arp.static_entry_delete(ip, hw))?;
        self.stats()
            .arp_static_entries_deleted
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Delete every static ARP entry, returning how many were removed.
    ///
    /// The whole drain runs under one acquisition of the instance lock, so no
    /// other thread sees the static list half drained.
    pub fn arp_static_entries_delete(&self) -> Result<usize> {
        self.check_arp()?;
        context::threads_only()?;

        trace!(ip = self.name(), "arp static entries delete");

        let mut core = self.lock_core();
        let arp = core.arp.as_mut().ok_or(NetError::NotEnabled)?;
        let before = arp.static_deleted_count();
        let result = arp.static_entries_delete();
        let deleted = arp.static_deleted_count() - before;
        drop(core);

        self.stats()
            .arp_static_entries_deleted
            .fetch_add(deleted, Ordering::Relaxed);

        match result {
            Ok(count) => {
                debug!(ip = self.name(), deleted = count, "static arp entries deleted");
                Ok(count)
            }
            Err(err) => {
                warn!(ip = self.name(), deleted, "static arp drain aborted: {err}");
                Err(err)
            }
        }
    }

    /// Record a binding learned from the wire. `Ok(false)` means a static
    /// binding for `ip` took precedence.
    pub fn arp_dynamic_entry_set(&self, ip: Ipv4Addr, hw: HardwareAddress) -> Result<bool> {
        self.check_arp()?;
        check_binding(ip, hw)?;
        context::threads_only()?;

        self.with_arp(|arp| arp.dynamic_entry_set(ip, hw))
    }

    /// Remove the binding for `ip`, static or dynamic.
    pub fn arp_entry_delete(&self, ip: Ipv4Addr) -> Result<()> {
        self.check_arp()?;
        if ip.is_unspecified() {
            return Err(NetError::InvalidAddress);
        }
        context::threads_only()?;

        self.with_arp(|arp| arp.entry_delete(ip))
    }

    pub fn arp_dynamic_entries_invalidate(&self) -> Result<usize> {
        self.check_arp()?;
        context::threads_only()?;

        let count = self.with_arp(|arp| Ok(arp.dynamic_entries_invalidate()))?;
        debug!(ip = self.name(), count, "dynamic arp entries invalidated");
        Ok(count)
    }

    pub fn arp_hardware_address_find(&self, ip: Ipv4Addr) -> Result<HardwareAddress> {
        self.check_arp()?;
        if ip.is_unspecified() {
            return Err(NetError::InvalidAddress);
        }
        context::threads_only()?;

        self.with_arp(|arp| {
            arp.hardware_address_find(ip)
                .ok_or(NetError::EntryNotFound)
        })
    }

    pub fn arp_ip_address_find(&self, hw: HardwareAddress) -> Result<Ipv4Addr> {
        self.check_arp()?;
        if hw.is_zero() {
            return Err(NetError::InvalidParameters);
        }
        context::threads_only()?;

        self.with_arp(|arp| arp.ip_address_find(hw).ok_or(NetError::EntryNotFound))
    }

    /// Periodic aging hook, driven by the stack timer or a thread.
    pub fn arp_age(&self, elapsed_ticks: u64) -> Result<usize> {
        self.check_arp()?;
        context::not_interrupt()?;

        self.with_arp(|arp| Ok(arp.age(elapsed_ticks)))
    }

    pub fn arp_info(&self) -> Result<ArpInfo> {
        self.check_arp()?;
        context::threads_only()?;

        self.with_arp(|arp| Ok(arp.info()))
    }

    /// Copy of the static bindings, most recent first.
    pub fn arp_static_entries(&self) -> Result<Vec<ArpEntry>> {
        self.check_arp()?;
        context::threads_only()?;

        self.with_arp(|arp| Ok(arp.static_entries().cloned().collect()))
    }

    fn check_arp(&self) -> Result<()> {
        self.validate()?;
        if !self.arp_enabled.load(Ordering::Acquire) {
            return Err(NetError::NotEnabled);
        }
        Ok(())
    }

    fn with_arp<R>(&self, f: impl FnOnce(&mut ArpCache) -> Result<R>) -> Result<R> {
        let mut core = self.lock_core();
        let arp = core.arp.as_mut().ok_or(NetError::NotEnabled)?;
        f(arp)
    }
}

fn check_binding(ip: Ipv4Addr, hw: HardwareAddress) -> Result<()> {
    if ip.is_unspecified() {
        return Err(NetError::InvalidAddress);
    }
    if hw.is_zero() {
        return Err(NetError::InvalidParameters);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::config::IpConfig;
    use crate::iface::instance::tests::test_instance;
    use crate::network::arp::ArpList;
    use crate::sync::ExecutionContext;

    fn hw(n: u32) -> HardwareAddress {
        HardwareAddress::new(0x0002, 0xaabb_0000 + n)
    }

    fn ip(n: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, n)
    }

    fn instance() -> IpInstance {
        let config = IpConfig {
            arp_cache_entries: Some(64),
            ..IpConfig::new(ip(1))
        };
        test_instance(config).0
    }

    #[test]
    fn test_drain_removes_all_static_entries() {
        let ip0 = instance();
        for n in 2..10 {
            ip0.arp_static_entry_create(ip(n), hw(n as u32)).unwrap();
        }
        ip0.arp_dynamic_entry_set(ip(50), hw(50)).unwrap();

        assert_eq!(ip0.arp_static_entries_delete(), Ok(8));
        let info = ip0.arp_info().unwrap();
        assert_eq!(info.static_entries, 0);
        assert_eq!(info.dynamic_entries, 1);
        assert_eq!(ip0.stats().snapshot().arp_static_entries_deleted, 8);
        assert!(!ip0.protection.is_locked());
    }

    #[test]
    fn test_drain_of_empty_table() {
        let ip0 = instance();
        assert_eq!(ip0.arp_static_entries_delete(), Ok(0));
        assert!(!ip0.protection.is_locked());
    }

    #[test]
    fn test_drain_failure_releases_lock() {
        let ip0 = Arc::new(instance());
        ip0.arp_static_entry_create(ip(2), hw(2)).unwrap();
        ip0.arp_static_entry_create(ip(3), hw(3)).unwrap();
        {
            // Corrupt the head so the single-entry delete cannot match it.
            let mut core = ip0.lock_core();
            mark_head_dynamic(core.arp.as_mut().unwrap());
        }

        assert_eq!(
            ip0.arp_static_entries_delete(),
            Err(NetError::EntryNotFound)
        );
        assert!(!ip0.protection.is_locked());

        let other = Arc::clone(&ip0);
        let handle = thread::spawn(move || other.arp_info().map(|i| i.static_entries));
        assert_eq!(handle.join().unwrap(), Ok(2));
    }

    fn mark_head_dynamic(arp: &mut ArpCache) {
        let (head_ip, _) = arp.static_head().unwrap();
        arp.corrupt_list_marker(head_ip, ArpList::Dynamic);
    }

    #[test]
    fn test_drain_is_never_observed_half_done() {
        const ENTRIES: usize = 200;

        for _ in 0..20 {
            let ip0 = Arc::new(test_instance(IpConfig {
                arp_cache_entries: Some(ENTRIES),
                ..IpConfig::new(ip(1))
            })
            .0);
            for n in 0..ENTRIES as u32 {
                let addr = Ipv4Addr::from(0x0a00_0100 + n);
                ip0.arp_static_entry_create(addr, hw(n)).unwrap();
            }

            let done = Arc::new(AtomicBool::new(false));
            let barrier = Arc::new(Barrier::new(2));
            let observer = {
                let ip0 = Arc::clone(&ip0);
                let done = Arc::clone(&done);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    barrier.wait();
                    while !done.load(Ordering::Acquire) {
                        seen.push(ip0.arp_info().unwrap().static_entries);
                    }
                    seen.push(ip0.arp_info().unwrap().static_entries);
                    seen
                })
            };

            barrier.wait();
            assert_eq!(ip0.arp_static_entries_delete(), Ok(ENTRIES));
            done.store(true, Ordering::Release);

            let seen = observer.join().unwrap();
            let partial: Vec<_> = seen
                .iter()
                .filter(|&&count| count != ENTRIES && count != 0)
                .collect();
            assert!(partial.is_empty(), "static list seen half drained: {partial:?}");
            assert_eq!(seen.last(), Some(&0));
        }
    }

    #[test]
    fn test_arp_checks_order() {
        let (ip0, _) = test_instance(IpConfig {
            arp_cache_entries: None,
            ..IpConfig::default()
        });
        assert_eq!(ip0.arp_static_entries_delete(), Err(NetError::NotEnabled));
        ip0.arp_enable(4).unwrap();
        assert_eq!(ip0.arp_enable(4), Err(NetError::AlreadyEnabled));

        assert_eq!(
            ip0.arp_static_entry_create(Ipv4Addr::UNSPECIFIED, hw(1)),
            Err(NetError::InvalidAddress)
        );
        assert_eq!(
            ip0.arp_static_entry_create(ip(1), HardwareAddress::default()),
            Err(NetError::InvalidParameters)
        );

        {
            let _isr = context::enter(ExecutionContext::Interrupt);
            assert_eq!(ip0.arp_static_entries_delete(), Err(NetError::CallerError));
            assert_eq!(ip0.arp_age(1), Err(NetError::CallerError));
        }
        {
            let _timer = context::enter(ExecutionContext::Timer);
            assert_eq!(ip0.arp_age(1), Ok(0));
        }

        ip0.delete().unwrap();
        assert_eq!(
            ip0.arp_static_entries_delete(),
            Err(NetError::NullOrOwnership)
        );
    }

    #[test]
    fn test_lookup_and_delete_through_instance() {
        let ip0 = instance();
        ip0.arp_static_entry_create(ip(2), hw(2)).unwrap();
        ip0.arp_dynamic_entry_set(ip(3), hw(3)).unwrap();

        assert_eq!(ip0.arp_hardware_address_find(ip(3)), Ok(hw(3)));
        assert_eq!(ip0.arp_ip_address_find(hw(2)), Ok(ip(2)));
        assert_eq!(ip0.arp_static_entry_delete(ip(2), hw(2)), Ok(()));
        assert_eq!(
            ip0.arp_hardware_address_find(ip(2)),
            Err(NetError::EntryNotFound)
        );
        assert_eq!(ip0.arp_entry_delete(ip(3)), Ok(()));
        assert_eq!(ip0.arp_dynamic_entries_invalidate(), Ok(0));
    }
}
