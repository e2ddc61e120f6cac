//! Administer the ARP cache of an IP instance
//!
//! Installs static bindings, learns a few dynamic ones, ages the cache and
//! finally drains every static entry, logging the table at each step. Runs
//! entirely in memory.
//!
//! ```sh
//! cargo run --example arp_admin
//! ```

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;

use toy_ipcore::{HardwareAddress, IpConfig, IpInstance, QueueLink};
use tracing::info;

mod utils;
use utils::init_logging;

fn log_table(ip: &IpInstance) -> toy_ipcore::Result<()> {
    let info = ip.arp_info()?;
    info!(
        static_entries = info.static_entries,
        dynamic_entries = info.dynamic_entries,
        aged = info.dynamic_entries_aged,
        "arp table"
    );
    for entry in ip.arp_static_entries()? {
        info!("  static {} -> {}", entry.ip, entry.hw);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = IpConfig {
        arp_expiration_ticks: 50,
        ..IpConfig::new(Ipv4Addr::new(192, 168, 1, 1))
    };
    let ip = Arc::new(IpInstance::create(config, Arc::new(QueueLink::new(1500, 16)))?);

    for host in 10..14u8 {
        let mac = HardwareAddress::from_bytes([0x02, 0x00, 0x5e, 0x00, 0x01, host]);
        ip.arp_static_entry_create(Ipv4Addr::new(192, 168, 1, host), mac)?;
    }

    // Receive-path learner running alongside the administrator.
    let learner = {
        let ip = Arc::clone(&ip);
        thread::spawn(move || -> toy_ipcore::Result<()> {
            for host in 100..104u8 {
                let mac = HardwareAddress::from_bytes([0x02, 0x00, 0x5e, 0x00, 0x02, host]);
                ip.arp_dynamic_entry_set(Ipv4Addr::new(192, 168, 1, host), mac)?;
            }
            Ok(())
        })
    };
    learner.join().map_err(|_| "learner thread panicked")??;
    log_table(&ip)?;

    let expired = ip.arp_age(50)?;
    info!(expired, "aged dynamic entries");

    let deleted = ip.arp_static_entries_delete()?;
    info!(deleted, "static entries drained");
    log_table(&ip)?;

    Ok(())
}
