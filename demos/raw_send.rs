//! Send raw IP packets out of a TUN device
//!
//! Creates `tun0`, gives the host side 10.0.0.254/24, and sends a few raw IP
//! packets from 10.0.0.1 to the host. Watch them with
//! `tcpdump -i tun0 -n ip proto 255`.
//!
//! ```sh
//! cargo run --example raw_send
//! ```
//!
//! Note: Root/sudo privileges are required to create and configure the TUN device.

use std::net::Ipv4Addr;
use std::sync::Arc;

use toy_ipcore::link::tun::DEFAULT_TUN_MTU;
use toy_ipcore::network::IPV4_HEADER_LEN;
use toy_ipcore::{tos, IpConfig, IpInstance, PacketBuffer, TunLink};
use tracing::{error, info};

mod utils;
use utils::{configure_interface, init_logging};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let link = TunLink::open("tun0", DEFAULT_TUN_MTU)?;
    info!(device = link.name(), "TUN device created");
    configure_interface(link.name(), "10.0.0.254/24")?;

    let config = IpConfig {
        raw_ip_enabled: true,
        ..IpConfig::new(Ipv4Addr::new(10, 0, 0, 1))
    };
    let ip = IpInstance::create(config, Arc::new(link))?;
    let host = Ipv4Addr::new(10, 0, 0, 254);

    for seq in 0..4u32 {
        let body = format!("raw packet #{seq}");
        let mut slot = Some(PacketBuffer::from_payload(IPV4_HEADER_LEN, body.as_bytes()));

        match ip.raw_packet_send_slot(&mut slot, host, tos::NORMAL) {
            Ok(()) => info!(seq, "sent"),
            Err(err) => error!(seq, "send failed: {err}"),
        }
        if let Some(kept) = slot {
            info!(seq, len = kept.len(), "buffer still ours after failure");
        }
    }

    // No headroom for the IP header: rejected before reaching the device.
    let cramped = PacketBuffer::from_payload(4, b"no room");
    if let Err(rejected) = ip.raw_packet_send(cramped, host, tos::NORMAL) {
        info!(len = rejected.packet.len(), "buffer returned: {}", rejected.error);
    }

    info!(stats = ?ip.stats().snapshot(), "done");
    Ok(())
}
