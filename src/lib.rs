//! ARP cache management and raw IP transmission for a small TCP/IP stack
//!
//! This library provides the network-layer core shared by application threads
//! and the stack's own threads:
//! - A bounded ARP cache with static and dynamic bindings
//! - Validated raw IP packet send with ownership transfer of the buffer
//! - Range-checked packet buffers
//! - A link driver seam with in-memory and TUN implementations

pub mod config;
pub mod error;
pub mod iface;
pub mod link;
pub mod network;
pub mod packet;
pub mod sync;

// Re-export commonly used types
pub use config::IpConfig;
pub use error::{LinkError, NetError, Rejected, Result};
pub use iface::{IpInstance, RawSendWorker};
pub use link::{LinkDriver, QueueLink, TunLink};
pub use network::arp::{ArpCache, ArpInfo, HardwareAddress};
pub use network::ipv4::tos;
pub use packet::{BufferDescriptor, PacketBuffer, PacketState};
pub use sync::ExecutionContext;
