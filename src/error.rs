//! Status codes surfaced by the IP instance, the ARP cache and the raw send path
//!
//! Every public operation returns [`Result`]. Failures are synchronous and
//! never leave the interface lock held or a buffer half-consumed.

use thiserror::Error;

use crate::packet::PacketBuffer;

pub type Result<T> = core::result::Result<T, NetError>;

/// Failure reported by a [`LinkDriver`](crate::link::LinkDriver).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("link is down")]
    Down,

    #[error("link transmit queue is full")]
    Busy,

    #[error("link i/o failure: {0}")]
    Io(String),
}

/// Error type shared by the ARP cache and the IP send path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    /// Instance tag mismatch, missing packet handle, or a packet that is not
    /// currently owned by the caller.
    #[error("invalid instance or packet reference")]
    NullOrOwnership,

    #[error("feature not enabled on this instance")]
    NotEnabled,

    #[error("feature already enabled on this instance")]
    AlreadyEnabled,

    #[error("invalid IP address")]
    InvalidAddress,

    #[error("invalid option bits")]
    InvalidOption,

    #[error("invalid parameters")]
    InvalidParameters,

    #[error("no headroom for the network header")]
    BufferUnderflow,

    #[error("payload runs past the end of the buffer")]
    BufferOverflow,

    #[error("operation not allowed from this execution context")]
    CallerError,

    #[error("ARP entry not found")]
    EntryNotFound,

    #[error("no free ARP entries")]
    NoMoreEntries,

    #[error("packet of {len} bytes exceeds link MTU {mtu}")]
    PacketTooLarge { len: usize, mtu: usize },

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// A send that did not take ownership of its buffer.
///
/// The buffer comes back exactly as it was handed in, so the caller can retry,
/// inspect or drop it.
#[derive(Debug, Error)]
#[error("raw packet send rejected: {error}")]
pub struct Rejected {
    #[source]
    pub error: NetError,
    pub packet: PacketBuffer,
}

impl Rejected {
    pub fn new(error: NetError, packet: PacketBuffer) -> Self {
        Rejected { error, packet }
    }

    pub fn into_parts(self) -> (NetError, PacketBuffer) {
        (self.error, self.packet)
    }
}

/// Transmit failure from a link driver, returning the frame to the sender.
#[derive(Debug, Error)]
#[error("link rejected frame: {error}")]
pub struct LinkRejected {
    #[source]
    pub error: LinkError,
    pub packet: PacketBuffer,
}
