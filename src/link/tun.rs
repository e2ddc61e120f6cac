//! Link driver writing raw IP packets to a Linux TUN device

use std::io;

use tracing::warn;
use tun_tap::{Iface, Mode};

use crate::error::{LinkError, LinkRejected};
use crate::link::LinkDriver;
use crate::packet::PacketBuffer;

pub const DEFAULT_TUN_MTU: usize = 1500;

pub struct TunLink {
    iface: Iface,
    mtu: usize,
}

impl TunLink {
    /// Create or attach to the TUN device `name`. Needs CAP_NET_ADMIN.
    pub fn open(name: &str, mtu: usize) -> io::Result<Self> {
        let iface = Iface::without_packet_info(name, Mode::Tun)?;
        Ok(TunLink { iface, mtu })
    }

    /// Kernel-assigned device name.
    pub fn name(&self) -> &str {
        self.iface.name()
    }
}

impl LinkDriver for TunLink {
    fn mtu(&self) -> usize {
        self.mtu
    }

    fn transmit(&self, packet: PacketBuffer) -> Result<(), LinkRejected> {
        let result = match packet.payload() {
            Ok(frame) => self.iface.send(frame).map(|_| ()),
            Err(err) => Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
        };
        match result {
            // The device copied the frame; the buffer is done.
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(device = self.name(), "tun send failed: {err}");
                Err(LinkRejected {
                    error: LinkError::Io(err.to_string()),
                    packet,
                })
            }
        }
    }
}
