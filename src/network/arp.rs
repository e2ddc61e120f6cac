//! ARP cache: bounded IPv4 to hardware address bindings
//!
//! Bindings live in a fixed arena of slots and are referenced by slot index
//! from one of two sublists:
//!
//! - the **static** sublist, holding entries installed by configuration; they
//!   are never aged and never evicted;
//! - the **dynamic** sublist, holding entries learned from the wire; they age
//!   out and the oldest one is evicted when the arena is full.
//!
//! Both sublists are kept most-recent-first. Removing a binding unlinks its
//! slot index and frees the slot in one step, so there is no window in which a
//! sublist points at a freed binding.
//!
//! `ArpCache` itself does no locking. It is owned by an
//! [`IpInstance`](crate::IpInstance) and only reachable through that
//! instance's protection lock; methods taking `&mut self` are therefore only
//! callable by a lock holder.

use std::collections::VecDeque;
use std::fmt;
use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use tracing::trace;

use crate::error::{NetError, Result};

/// 48-bit hardware address split into two words: `msw` carries the upper 16
/// bits, `lsw` the lower 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HardwareAddress {
    pub msw: u32,
    pub lsw: u32,
}

impl HardwareAddress {
    pub const fn new(msw: u32, lsw: u32) -> Self {
        HardwareAddress { msw, lsw }
    }

    pub fn from_bytes(mac: [u8; 6]) -> Self {
        HardwareAddress {
            msw: BigEndian::read_u16(&mac[0..2]) as u32,
            lsw: BigEndian::read_u32(&mac[2..6]),
        }
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        BigEndian::write_u16(&mut mac[0..2], self.msw as u16);
        BigEndian::write_u32(&mut mac[2..6], self.lsw);
        mac
    }

    pub fn is_zero(&self) -> bool {
        self.msw == 0 && self.lsw == 0
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.to_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Which sublist a binding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpList {
    Static,
    Dynamic,
}

/// One resolved binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub hw: HardwareAddress,
    pub list: ArpList,
    /// Ticks left before a dynamic entry expires. Unused for static entries.
    pub remaining_ticks: u64,
}

/// Snapshot of cache occupancy and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArpInfo {
    pub capacity: usize,
    pub static_entries: usize,
    pub dynamic_entries: usize,
    pub dynamic_entries_aged: u64,
    pub dynamic_entries_evicted: u64,
    pub static_entries_deleted: u64,
}

type Slot = usize;

pub struct ArpCache {
    slots: Vec<Option<ArpEntry>>,
    free: Vec<Slot>,
    static_list: VecDeque<Slot>,
    dynamic_list: VecDeque<Slot>,
    expiration_ticks: u64,
    aged: u64,
    evicted: u64,
    static_deleted: u64,
}

impl fmt::Debug for ArpCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArpCache")
            .field("capacity", &self.capacity())
            .field("static", &self.static_list.len())
            .field("dynamic", &self.dynamic_list.len())
            .finish()
    }
}

impl ArpCache {
    /// Create a cache with room for `capacity` bindings. Dynamic entries live
    /// for `expiration_ticks` ticks; zero disables aging.
    pub fn new(capacity: usize, expiration_ticks: u64) -> Self {
        ArpCache {
            slots: vec![None; capacity],
            // Reversed so slot 0 is handed out first.
            free: (0..capacity).rev().collect(),
            static_list: VecDeque::new(),
            dynamic_list: VecDeque::new(),
            expiration_ticks,
            aged: 0,
            evicted: 0,
            static_deleted: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn static_len(&self) -> usize {
        self.static_list.len()
    }

    pub fn dynamic_len(&self) -> usize {
        self.dynamic_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.static_list.is_empty() && self.dynamic_list.is_empty()
    }

    /// Total number of static entries ever removed by
    /// [`static_entry_delete`](Self::static_entry_delete).
    pub fn static_deleted_count(&self) -> u64 {
        self.static_deleted
    }

    /// Key of the most recently installed static entry.
    pub fn static_head(&self) -> Option<(Ipv4Addr, HardwareAddress)> {
        let slot = *self.static_list.front()?;
        self.slots[slot].as_ref().map(|e| (e.ip, e.hw))
    }

    pub fn static_entries(&self) -> impl Iterator<Item = &ArpEntry> + '_ {
        self.static_list
            .iter()
            .filter_map(move |&slot| self.slots[slot].as_ref())
    }

    pub fn dynamic_entries(&self) -> impl Iterator<Item = &ArpEntry> + '_ {
        self.dynamic_list
            .iter()
            .filter_map(move |&slot| self.slots[slot].as_ref())
    }

    pub fn info(&self) -> ArpInfo {
        ArpInfo {
            capacity: self.capacity(),
            static_entries: self.static_list.len(),
            dynamic_entries: self.dynamic_list.len(),
            dynamic_entries_aged: self.aged,
            dynamic_entries_evicted: self.evicted,
            static_entries_deleted: self.static_deleted,
        }
    }

    pub fn hardware_address_find(&self, ip: Ipv4Addr) -> Option<HardwareAddress> {
        self.static_entries()
            .chain(self.dynamic_entries())
            .find(|e| e.ip == ip)
            .map(|e| e.hw)
    }

    pub fn ip_address_find(&self, hw: HardwareAddress) -> Option<Ipv4Addr> {
        self.static_entries()
            .chain(self.dynamic_entries())
            .find(|e| e.hw == hw)
            .map(|e| e.ip)
    }

    /// Install a static binding for `ip`.
    ///
    /// Any existing binding for the address, static or dynamic, is replaced.
    /// When no slot is free the oldest dynamic binding is evicted; static
    /// bindings are never evicted.
    pub fn static_entry_create(&mut self, ip: Ipv4Addr, hw: HardwareAddress) -> Result<()> {
        self.remove_address(ip);

        let slot = self.claim_slot().ok_or(NetError::NoMoreEntries)?;
        self.slots[slot] = Some(ArpEntry {
            ip,
            hw,
            list: ArpList::Static,
            remaining_ticks: 0,
        });
        self.static_list.push_front(slot);
        trace!(%ip, %hw, slot, "arp static entry created");
        Ok(())
    }

    /// Unlink and free the static binding matching both `ip` and `hw`.
    pub fn static_entry_delete(&mut self, ip: Ipv4Addr, hw: HardwareAddress) -> Result<()> {
        let pos = self
            .static_list
            .iter()
            .position(|&slot| {
                matches!(&self.slots[slot],
                    Some(e) if e.ip == ip && e.hw == hw && e.list == ArpList::Static)
            })
            .ok_or(NetError::EntryNotFound)?;

        self.unlink(ArpList::Static, pos);
        self.static_deleted += 1;
        trace!(%ip, %hw, "arp static entry deleted");
        Ok(())
    }

    /// Remove every static binding, returning how many were removed.
    ///
    /// The head is re-read after every deletion because the deletion itself
    /// moves it. A deletion failure ends the drain and is returned: with the
    /// caller holding the lock nothing else can have removed the head, so a
    /// failure means the sublist is inconsistent.
    pub fn static_entries_delete(&mut self) -> Result<usize> {
        let mut deleted = 0;
        while let Some((ip, hw)) = self.static_head() {
            self.static_entry_delete(ip, hw)?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Record a binding learned from the wire.
    ///
    /// Returns `Ok(false)` when a static binding already covers `ip`; static
    /// bindings always win over learned ones.
    pub fn dynamic_entry_set(&mut self, ip: Ipv4Addr, hw: HardwareAddress) -> Result<bool> {
        if self.find(ArpList::Static, ip).is_some() {
            return Ok(false);
        }

        let expiration = self.expiration_ticks;
        if let Some(pos) = self.find(ArpList::Dynamic, ip) {
            let slot = self.dynamic_list.remove(pos).ok_or(NetError::EntryNotFound)?;
            if let Some(entry) = self.slots[slot].as_mut() {
                entry.hw = hw;
                entry.remaining_ticks = expiration;
            }
            self.dynamic_list.push_front(slot);
            return Ok(true);
        }

        let slot = self.claim_slot().ok_or(NetError::NoMoreEntries)?;
        self.slots[slot] = Some(ArpEntry {
            ip,
            hw,
            list: ArpList::Dynamic,
            remaining_ticks: expiration,
        });
        self.dynamic_list.push_front(slot);
        trace!(%ip, %hw, slot, "arp dynamic entry learned");
        Ok(true)
    }

    /// Remove the binding for `ip` from whichever sublist holds it.
    pub fn entry_delete(&mut self, ip: Ipv4Addr) -> Result<()> {
        if self.remove_address(ip) {
            Ok(())
        } else {
            Err(NetError::EntryNotFound)
        }
    }

    /// Drop every dynamic binding, returning how many were dropped.
    pub fn dynamic_entries_invalidate(&mut self) -> usize {
        let count = self.dynamic_list.len();
        while let Some(slot) = self.dynamic_list.pop_front() {
            self.release_slot(slot);
        }
        count
    }

    /// Advance dynamic lifetimes by `elapsed_ticks` and drop the expired ones.
    pub fn age(&mut self, elapsed_ticks: u64) -> usize {
        if self.expiration_ticks == 0 || elapsed_ticks == 0 {
            return 0;
        }

        let mut expired = Vec::new();
        for &slot in &self.dynamic_list {
            if let Some(entry) = self.slots[slot].as_mut() {
                entry.remaining_ticks = entry.remaining_ticks.saturating_sub(elapsed_ticks);
                if entry.remaining_ticks == 0 {
                    expired.push(slot);
                }
            }
        }

        self.dynamic_list.retain(|slot| !expired.contains(slot));
        for &slot in &expired {
            if let Some(entry) = self.slots[slot].take() {
                trace!(ip = %entry.ip, "arp dynamic entry expired");
            }
            self.free.push(slot);
        }
        self.aged += expired.len() as u64;
        expired.len()
    }

    fn list(&self, list: ArpList) -> &VecDeque<Slot> {
        match list {
            ArpList::Static => &self.static_list,
            ArpList::Dynamic => &self.dynamic_list,
        }
    }

    fn find(&self, list: ArpList, ip: Ipv4Addr) -> Option<usize> {
        self.list(list)
            .iter()
            .position(|&slot| matches!(&self.slots[slot], Some(e) if e.ip == ip))
    }

    /// Remove the binding at `pos` of `list` and free its slot.
    fn unlink(&mut self, list: ArpList, pos: usize) -> Option<ArpEntry> {
        let slot = match list {
            ArpList::Static => self.static_list.remove(pos)?,
            ArpList::Dynamic => self.dynamic_list.remove(pos)?,
        };
        self.release_slot(slot)
    }

    fn release_slot(&mut self, slot: Slot) -> Option<ArpEntry> {
        let entry = self.slots[slot].take();
        self.free.push(slot);
        entry
    }

    fn remove_address(&mut self, ip: Ipv4Addr) -> bool {
        for list in [ArpList::Static, ArpList::Dynamic] {
            if let Some(pos) = self.find(list, ip) {
                self.unlink(list, pos);
                return true;
            }
        }
        false
    }

    /// Overwrite the sublist marker of the binding for `ip` without moving it.
    #[cfg(test)]
    pub(crate) fn corrupt_list_marker(&mut self, ip: Ipv4Addr, list: ArpList) {
        for entry in self.slots.iter_mut().flatten() {
            if entry.ip == ip {
                entry.list = list;
            }
        }
    }

    /// Take a free slot, evicting the oldest dynamic binding if needed.
    fn claim_slot(&mut self) -> Option<Slot> {
        if let Some(slot) = self.free.pop() {
            return Some(slot);
        }
        let slot = self.dynamic_list.pop_back()?;
        if let Some(old) = self.slots[slot].take() {
            trace!(ip = %old.ip, "arp dynamic entry evicted");
        }
        self.evicted += 1;
        Some(slot)
    }
}
