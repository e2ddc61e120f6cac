//! Raw IP packet transmission
//!
//! Two tiers:
//!
//! - [`IpInstance::raw_packet_send`] is the application entry point. It
//!   validates the instance, the buffer and the arguments, in a fixed order,
//!   before anything is touched.
//! - [`RawSendWorker`] builds the IPv4 header and hands the packet to the link.
//!   It trusts its inputs; stack-internal callers that already validated use
//!   it directly.
//!
//! A successful send consumes the buffer. Every failure hands it back
//! unchanged inside [`Rejected`].

use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;

use tracing::{debug, trace};

use crate::error::{LinkRejected, NetError, Rejected, Result};
use crate::iface::instance::IpInstance;
use crate::network::ipv4::{protocol, tos, Ipv4Header, IPV4_HEADER_LEN};
use crate::packet::{PacketBuffer, PacketState};
use crate::sync::context;

impl IpInstance {
    pub fn raw_packet_enable(&self) -> Result<()> {
        self.validate()?;
        context::init_and_threads()?;
        self.raw_ip_enabled.store(true, Ordering::Release);
        debug!(ip = self.name(), "raw ip enabled");
        Ok(())
    }

    pub fn raw_packet_disable(&self) -> Result<()> {
        self.validate()?;
        context::init_and_threads()?;
        self.raw_ip_enabled.store(false, Ordering::Release);
        debug!(ip = self.name(), "raw ip disabled");
        Ok(())
    }

    pub fn is_raw_packet_enabled(&self) -> bool {
        self.raw_ip_enabled.load(Ordering::Acquire)
    }

    /// Send an application-built payload as the body of a raw IP packet.
    ///
    /// `type_of_service` is one of the pre-shifted [`tos`] values. On success
    /// the stack owns `packet`; on failure it is returned in [`Rejected`].
    pub fn raw_packet_send(
        &self,
        packet: PacketBuffer,
        destination: Ipv4Addr,
        type_of_service: u32,
    ) -> core::result::Result<(), Rejected> {
        trace!(
            ip = self.name(),
            %destination,
            type_of_service,
            len = packet.len(),
            "raw packet send"
        );

        if let Err(error) = self.check_raw_send(&packet, destination, type_of_service) {
            return Err(Rejected::new(error, packet));
        }

        RawSendWorker::new(self).send(packet, destination, type_of_service)
    }

    /// Like [`raw_packet_send`](Self::raw_packet_send) for callers that keep
    /// their packet in an `Option` slot.
    ///
    /// The slot is emptied on success and left exactly as it was on failure.
    /// An empty slot is rejected with [`NetError::NullOrOwnership`].
    pub fn raw_packet_send_slot(
        &self,
        slot: &mut Option<PacketBuffer>,
        destination: Ipv4Addr,
        type_of_service: u32,
    ) -> Result<()> {
        let packet = slot.take().ok_or(NetError::NullOrOwnership)?;
        match self.raw_packet_send(packet, destination, type_of_service) {
            Ok(()) => Ok(()),
            Err(rejected) => {
                let (error, packet) = rejected.into_parts();
                *slot = Some(packet);
                Err(error)
            }
        }
    }

    /// Caller-facing checks, first failure wins.
    fn check_raw_send(
        &self,
        packet: &PacketBuffer,
        destination: Ipv4Addr,
        type_of_service: u32,
    ) -> Result<()> {
        if !self.is_valid() || packet.state() != PacketState::Allocated {
            return Err(NetError::NullOrOwnership);
        }

        if !self.is_raw_packet_enabled() {
            return Err(NetError::NotEnabled);
        }

        if destination.is_unspecified() {
            return Err(NetError::InvalidAddress);
        }

        if type_of_service & !tos::MASK != 0 {
            return Err(NetError::InvalidOption);
        }

        // Room for the header the worker will write in front of the payload.
        let desc = packet.descriptor();
        match desc.prepend.checked_sub(IPV4_HEADER_LEN) {
            Some(header_start) if header_start >= desc.data_start => {}
            _ => return Err(NetError::BufferUnderflow),
        }

        if desc.append > desc.data_end || desc.data_end > packet.capacity() {
            return Err(NetError::BufferOverflow);
        }

        context::threads_only()
    }
}

/// Trusted raw send: header construction and link handoff.
pub struct RawSendWorker<'a> {
    ip: &'a IpInstance,
}

impl<'a> RawSendWorker<'a> {
    pub fn new(ip: &'a IpInstance) -> Self {
        RawSendWorker { ip }
    }

    pub fn send(
        &self,
        mut packet: PacketBuffer,
        destination: Ipv4Addr,
        type_of_service: u32,
    ) -> core::result::Result<(), Rejected> {
        let total_len = match packet.len().checked_add(IPV4_HEADER_LEN) {
            Some(total_len) => total_len,
            None => return Err(self.fail(NetError::BufferOverflow, packet)),
        };
        let mtu = self.ip.link().mtu().min(u16::MAX as usize);
        if total_len > mtu {
            return Err(self.fail(NetError::PacketTooLarge { len: total_len, mtu }, packet));
        }

        let mut saved = [0u8; IPV4_HEADER_LEN];
        let pushed = packet.push_header(IPV4_HEADER_LEN).and_then(|bytes| {
            saved.copy_from_slice(bytes);
            // The identification number is taken only once the header fits.
            let header = Ipv4Header::new(
                tos::to_byte(type_of_service),
                total_len as u16,
                self.ip.next_packet_id(),
                0,
                self.ip.default_ttl(),
                protocol::RAW,
                self.ip.address(),
                destination,
            );
            header.write_to(bytes)
        });
        if let Err(error) = pushed {
            return Err(self.fail(error, packet));
        }

        packet.set_state(PacketState::Queued);
        match self.ip.link().transmit(packet) {
            Ok(()) => {
                let stats = self.ip.stats();
                stats.raw_packets_sent.fetch_add(1, Ordering::Relaxed);
                stats
                    .total_bytes_sent
                    .fetch_add(total_len as u64, Ordering::Relaxed);
                trace!(ip = self.ip.name(), %destination, total_len, "raw packet queued");
                Ok(())
            }
            Err(LinkRejected { error, mut packet }) => {
                packet.set_state(PacketState::Allocated);
                // Hand back the buffer as it came in: cursor and headroom bytes.
                let restored = packet.unpush_header(&saved);
                debug!(ip = self.ip.name(), %destination, "link rejected raw packet: {error}");
                let error = match restored {
                    Ok(()) => NetError::Link(error),
                    Err(err) => err,
                };
                Err(self.fail(error, packet))
            }
        }
    }

    fn fail(&self, error: NetError, packet: PacketBuffer) -> Rejected {
        self.ip
            .stats()
            .raw_send_failures
            .fetch_add(1, Ordering::Relaxed);
        Rejected::new(error, packet)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::IpConfig;
    use crate::error::LinkError;
    use crate::iface::instance::tests::test_instance;
    use crate::link::QueueLink;
    use crate::packet::BufferDescriptor;
    use crate::sync::ExecutionContext;

    const DEST: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    fn raw_instance(enabled: bool) -> (IpInstance, Arc<QueueLink>) {
        test_instance(IpConfig {
            raw_ip_enabled: enabled,
            ..IpConfig::new(Ipv4Addr::new(10, 0, 0, 1))
        })
    }

    fn packet() -> PacketBuffer {
        PacketBuffer::from_payload(64, b"raw payload")
    }

    fn packet_with(data_start: usize, data_end: usize, prepend: usize, append: usize) -> PacketBuffer {
        PacketBuffer::from_descriptor(
            vec![0u8; 128],
            BufferDescriptor {
                data_start,
                data_end,
                prepend,
                append,
                state: PacketState::Allocated,
            },
        )
    }

    fn send_slot(ip: &IpInstance, pkt: PacketBuffer, dst: Ipv4Addr, tos: u32) -> (Result<()>, Option<PacketBuffer>) {
        let mut slot = Some(pkt);
        let result = ip.raw_packet_send_slot(&mut slot, dst, tos);
        (result, slot)
    }

    #[test]
    fn test_disabled_then_enabled_scenario() {
        let (ip, link) = raw_instance(false);

        let (result, slot) = send_slot(&ip, packet(), DEST, tos::NORMAL);
        assert_eq!(result, Err(NetError::NotEnabled));
        assert_eq!(slot, Some(packet()));

        ip.raw_packet_enable().unwrap();
        let (result, slot) = send_slot(&ip, packet(), DEST, tos::NORMAL);
        assert_eq!(result, Ok(()));
        assert!(slot.is_none());
        assert_eq!(link.len(), 1);
    }

    #[test]
    fn test_each_check_in_isolation() {
        let (ip, link) = raw_instance(true);

        let mut queued = packet();
        queued.set_state(PacketState::Queued);
        let cases = [
            (queued, DEST, tos::NORMAL, NetError::NullOrOwnership),
            (packet(), Ipv4Addr::UNSPECIFIED, tos::NORMAL, NetError::InvalidAddress),
            (packet(), DEST, 0x0100_0000, NetError::InvalidOption),
            (packet(), DEST, 0x0000_0001, NetError::InvalidOption),
            (packet_with(0, 128, 19, 40), DEST, tos::NORMAL, NetError::BufferUnderflow),
            (packet_with(0, 100, 40, 101), DEST, tos::NORMAL, NetError::BufferOverflow),
        ];

        for (pkt, dst, type_of_service, expected) in cases {
            let before = pkt.descriptor();
            let (result, slot) = send_slot(&ip, pkt, dst, type_of_service);
            assert_eq!(result, Err(expected));
            assert_eq!(slot.unwrap().descriptor(), before);
        }

        {
            let _isr = context::enter(ExecutionContext::Interrupt);
            let (result, slot) = send_slot(&ip, packet(), DEST, tos::NORMAL);
            assert_eq!(result, Err(NetError::CallerError));
            assert_eq!(slot, Some(packet()));
        }

        assert!(link.is_empty());
        assert_eq!(ip.stats().snapshot().raw_packets_sent, 0);
    }

    #[test]
    fn test_deleted_instance_and_empty_slot() {
        let (ip, _) = raw_instance(true);
        let mut empty = None;
        assert_eq!(
            ip.raw_packet_send_slot(&mut empty, DEST, tos::NORMAL),
            Err(NetError::NullOrOwnership)
        );

        ip.delete().unwrap();
        let (result, slot) = send_slot(&ip, packet(), DEST, tos::NORMAL);
        assert_eq!(result, Err(NetError::NullOrOwnership));
        assert_eq!(slot, Some(packet()));
    }

    #[test]
    fn test_first_failing_check_wins() {
        let (ip, _) = raw_instance(false);
        // Disabled, zero destination and bad TOS: the feature check comes first.
        let (result, _) = send_slot(&ip, packet(), Ipv4Addr::UNSPECIFIED, 0xFFFF_FFFF);
        assert_eq!(result, Err(NetError::NotEnabled));

        ip.raw_packet_enable().unwrap();
        let (result, _) = send_slot(&ip, packet_with(0, 100, 4, 101), Ipv4Addr::UNSPECIFIED, 0);
        assert_eq!(result, Err(NetError::InvalidAddress));
    }

    #[test]
    fn test_buffer_boundaries_are_inclusive() {
        let (ip, link) = raw_instance(true);

        // prepend - header == data_start passes, one byte less fails.
        let (result, _) = send_slot(&ip, packet_with(10, 128, 30, 50), DEST, 0);
        assert_eq!(result, Ok(()));
        let (result, _) = send_slot(&ip, packet_with(10, 128, 29, 50), DEST, 0);
        assert_eq!(result, Err(NetError::BufferUnderflow));

        // append == data_end passes, one byte more fails.
        let (result, _) = send_slot(&ip, packet_with(0, 100, 40, 100), DEST, 0);
        assert_eq!(result, Ok(()));
        let (result, _) = send_slot(&ip, packet_with(0, 100, 40, 101), DEST, 0);
        assert_eq!(result, Err(NetError::BufferOverflow));

        assert_eq!(link.len(), 2);
    }

    #[test]
    fn test_prepend_below_header_size_does_not_wrap() {
        let (ip, _) = raw_instance(true);
        let (result, _) = send_slot(&ip, packet_with(0, 128, 0, 10), DEST, 0);
        assert_eq!(result, Err(NetError::BufferUnderflow));
    }

    #[test]
    fn test_crossed_cursors_rejected_by_worker() {
        let (ip, link) = raw_instance(true);
        let rejected = ip
            .raw_packet_send(packet_with(0, 128, 60, 40), DEST, 0)
            .unwrap_err();
        assert_eq!(rejected.error, NetError::InvalidParameters);
        assert_eq!(rejected.packet.descriptor().prepend, 60);
        assert!(link.is_empty());

        // The rejected buffer did not use up an identification number.
        ip.raw_packet_send(packet(), DEST, 0).unwrap();
        let sent = link.pop().unwrap();
        let header = Ipv4Header::from_bytes(sent.payload().unwrap()).unwrap();
        assert_eq!(header.id, 0);
    }

    #[test]
    fn test_worker_length_overflow_is_rejected() {
        let (ip, link) = raw_instance(true);
        let huge = packet_with(0, usize::MAX, 0, usize::MAX - 4);

        let rejected = RawSendWorker::new(&ip).send(huge, DEST, 0).unwrap_err();
        assert_eq!(rejected.error, NetError::BufferOverflow);
        assert_eq!(rejected.packet.descriptor().append, usize::MAX - 4);
        assert!(link.is_empty());
        assert_eq!(ip.stats().snapshot().raw_send_failures, 1);
    }

    #[test]
    fn test_worker_writes_valid_header() {
        let (ip, link) = raw_instance(true);
        ip.raw_packet_send(packet(), DEST, tos::MIN_DELAY).unwrap();

        let sent = link.pop().unwrap();
        assert_eq!(sent.state(), PacketState::Queued);
        let frame = sent.payload().unwrap();
        assert_eq!(frame.len(), IPV4_HEADER_LEN + b"raw payload".len());
        assert_eq!(&frame[IPV4_HEADER_LEN..], b"raw payload");

        let header = Ipv4Header::from_bytes(frame).unwrap();
        assert!(header.checksum_ok());
        assert_eq!(header.tos, 0x10);
        assert_eq!(header.protocol, protocol::RAW);
        assert_eq!(header.ttl, ip.default_ttl());
        assert_eq!(header.total_len as usize, frame.len());
        assert_eq!(header.src_addr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(header.dst_addr, DEST);

        let stats = ip.stats().snapshot();
        assert_eq!(stats.raw_packets_sent, 1);
        assert_eq!(stats.total_bytes_sent, frame.len() as u64);
    }

    #[test]
    fn test_link_failure_returns_buffer_untouched() {
        let (ip, link) = raw_instance(true);
        link.set_down(true);

        let rejected = ip.raw_packet_send(packet(), DEST, tos::NORMAL).unwrap_err();
        assert_eq!(rejected.error, NetError::Link(LinkError::Down));
        assert_eq!(rejected.packet, packet());

        let (result, slot) = send_slot(&ip, packet(), DEST, tos::NORMAL);
        assert_eq!(result, Err(NetError::Link(LinkError::Down)));
        assert_eq!(slot, Some(packet()));
        assert_eq!(ip.stats().snapshot().raw_send_failures, 2);
    }

    #[test]
    fn test_packet_larger_than_mtu() {
        let link = Arc::new(QueueLink::new(64, 4));
        let config = IpConfig {
            raw_ip_enabled: true,
            ..IpConfig::new(Ipv4Addr::new(10, 0, 0, 1))
        };
        let ip = IpInstance::create(config, link.clone()).unwrap();

        let big = PacketBuffer::from_payload(IPV4_HEADER_LEN, &[0u8; 45]);
        let rejected = ip.raw_packet_send(big, DEST, 0).unwrap_err();
        assert_eq!(rejected.error, NetError::PacketTooLarge { len: 65, mtu: 64 });

        let fits = PacketBuffer::from_payload(IPV4_HEADER_LEN, &[0u8; 44]);
        assert!(ip.raw_packet_send(fits, DEST, 0).is_ok());
        assert_eq!(link.len(), 1);
    }

    #[test]
    fn test_internal_caller_skips_validation() {
        let (ip, link) = raw_instance(false);
        // Raw processing is off, but the worker does not check it.
        RawSendWorker::new(&ip).send(packet(), DEST, 0).unwrap();
        assert_eq!(link.len(), 1);
    }
}
