//! Link layer seam
//!
//! The raw send worker hands finished IP packets to a [`LinkDriver`]. A driver
//! that cannot take a frame gives it back inside [`LinkRejected`] so the
//! sender keeps ownership.

pub mod tun;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{LinkError, LinkRejected};
use crate::packet::PacketBuffer;
use crate::sync::Protection;

pub use tun::TunLink;

pub trait LinkDriver: Send + Sync {
    /// Largest IP packet the link carries, header included.
    fn mtu(&self) -> usize;

    fn transmit(&self, packet: PacketBuffer) -> Result<(), LinkRejected>;
}

/// In-memory link that queues transmitted packets for inspection.
pub struct QueueLink {
    mtu: usize,
    capacity: usize,
    down: AtomicBool,
    frames: Protection<VecDeque<PacketBuffer>>,
}

impl QueueLink {
    pub fn new(mtu: usize, capacity: usize) -> Self {
        QueueLink {
            mtu,
            capacity,
            down: AtomicBool::new(false),
            frames: Protection::new(VecDeque::new()),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::Release);
    }

    /// Take the oldest transmitted packet.
    pub fn pop(&self) -> Option<PacketBuffer> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LinkDriver for QueueLink {
    fn mtu(&self) -> usize {
        self.mtu
    }

    fn transmit(&self, packet: PacketBuffer) -> Result<(), LinkRejected> {
        if self.down.load(Ordering::Acquire) {
            return Err(LinkRejected {
                error: LinkError::Down,
                packet,
            });
        }
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            return Err(LinkRejected {
                error: LinkError::Busy,
                packet,
            });
        }
        frames.push_back(packet);
        Ok(())
    }
}
