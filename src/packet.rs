//! Packet buffer with range-checked header push/pull
//!
//! A [`PacketBuffer`] owns its backing storage and four cursors into it:
//!
//! ```text
//! |<- headroom ->|<---- payload ---->|<- tailroom ->|
//! data_start   prepend            append        data_end
//! ```
//!
//! Buffers built with [`PacketBuffer::with_headroom`] always satisfy
//! `data_start <= prepend <= append <= data_end <= storage.len()`. Buffers
//! rebuilt from a caller-supplied [`BufferDescriptor`] may not, so every
//! accessor goes through [`PacketBuffer::check_bounds`] instead of trusting
//! the cursors.
//!
//! `PacketBuffer` does not implement `Clone`: whoever holds it owns the packet.

use std::fmt;

use crate::error::{NetError, Result};

/// Lifecycle marker of a packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketState {
    /// Owned by the application or by the stack code currently building it.
    Allocated,
    /// Handed to a link driver and waiting for transmission.
    Queued,
    /// Returned to a pool; must not be used.
    Free,
}

/// Raw cursor set of a buffer, as exchanged with drivers and pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub data_start: usize,
    pub data_end: usize,
    pub prepend: usize,
    pub append: usize,
    pub state: PacketState,
}

#[derive(PartialEq, Eq)]
pub struct PacketBuffer {
    storage: Box<[u8]>,
    desc: BufferDescriptor,
}

impl fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Metadata only, never the packet contents.
        write!(
            f,
            "PacketBuffer {{ cap={}, start={}, prepend={}, append={}, end={}, state={:?} }}",
            self.storage.len(),
            self.desc.data_start,
            self.desc.prepend,
            self.desc.append,
            self.desc.data_end,
            self.desc.state
        )
    }
}

impl PacketBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes with `headroom` bytes
    /// reserved in front of an empty payload.
    pub fn with_headroom(capacity: usize, headroom: usize) -> Result<Self> {
        if headroom > capacity {
            return Err(NetError::InvalidParameters);
        }
        Ok(PacketBuffer {
            storage: vec![0u8; capacity].into_boxed_slice(),
            desc: BufferDescriptor {
                data_start: 0,
                data_end: capacity,
                prepend: headroom,
                append: headroom,
                state: PacketState::Allocated,
            },
        })
    }

    /// Allocate a buffer holding `payload` after `headroom` bytes, with no
    /// tailroom.
    pub fn from_payload(headroom: usize, payload: &[u8]) -> Self {
        let capacity = headroom + payload.len();
        let mut storage = vec![0u8; capacity].into_boxed_slice();
        storage[headroom..].copy_from_slice(payload);
        PacketBuffer {
            storage,
            desc: BufferDescriptor {
                data_start: 0,
                data_end: capacity,
                prepend: headroom,
                append: capacity,
                state: PacketState::Allocated,
            },
        }
    }

    /// Rebuild a buffer from storage and a descriptor produced elsewhere.
    ///
    /// Nothing is checked here; the cursors are validated on use.
    pub fn from_descriptor(storage: Vec<u8>, desc: BufferDescriptor) -> Self {
        PacketBuffer {
            storage: storage.into_boxed_slice(),
            desc,
        }
    }

    pub fn descriptor(&self) -> BufferDescriptor {
        self.desc
    }

    pub fn state(&self) -> PacketState {
        self.desc.state
    }

    pub(crate) fn set_state(&mut self, state: PacketState) {
        self.desc.state = state;
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Validate all four cursors against each other and the storage.
    pub fn check_bounds(&self) -> Result<()> {
        let d = &self.desc;
        if d.prepend < d.data_start {
            return Err(NetError::BufferUnderflow);
        }
        if d.append > d.data_end || d.data_end > self.storage.len() {
            return Err(NetError::BufferOverflow);
        }
        if d.prepend > d.append {
            return Err(NetError::InvalidParameters);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.desc.append.saturating_sub(self.desc.prepend)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes available in front of the payload.
    pub fn headroom(&self) -> usize {
        self.desc.prepend.saturating_sub(self.desc.data_start)
    }

    /// Bytes available after the payload.
    pub fn tailroom(&self) -> usize {
        self.desc.data_end.saturating_sub(self.desc.append)
    }

    pub fn payload(&self) -> Result<&[u8]> {
        self.check_bounds()?;
        Ok(&self.storage[self.desc.prepend..self.desc.append])
    }

    pub fn payload_mut(&mut self) -> Result<&mut [u8]> {
        self.check_bounds()?;
        Ok(&mut self.storage[self.desc.prepend..self.desc.append])
    }

    /// Grow the payload `len` bytes to the left and return the new header
    /// bytes for the caller to fill in.
    pub fn push_header(&mut self, len: usize) -> Result<&mut [u8]> {
        self.check_bounds()?;
        if self.headroom() < len {
            return Err(NetError::BufferUnderflow);
        }
        self.desc.prepend -= len;
        let start = self.desc.prepend;
        Ok(&mut self.storage[start..start + len])
    }

    /// Consume `len` bytes from the front of the payload.
    pub fn pull_header(&mut self, len: usize) -> Result<&[u8]> {
        self.check_bounds()?;
        if len > self.len() {
            return Err(NetError::InvalidParameters);
        }
        let start = self.desc.prepend;
        self.desc.prepend += len;
        Ok(&self.storage[start..start + len])
    }

    /// Undo a [`push_header`](Self::push_header), putting back the bytes the
    /// header overwrote.
    pub(crate) fn unpush_header(&mut self, saved: &[u8]) -> Result<()> {
        self.check_bounds()?;
        if saved.len() > self.len() {
            return Err(NetError::InvalidParameters);
        }
        let start = self.desc.prepend;
        self.storage[start..start + saved.len()].copy_from_slice(saved);
        self.desc.prepend += saved.len();
        Ok(())
    }

    /// Grow the payload to the right with `src`.
    pub fn append(&mut self, src: &[u8]) -> Result<()> {
        self.check_bounds()?;
        if self.tailroom() < src.len() {
            return Err(NetError::BufferOverflow);
        }
        let start = self.desc.append;
        self.storage[start..start + src.len()].copy_from_slice(src);
        self.desc.append += src.len();
        Ok(())
    }
}
