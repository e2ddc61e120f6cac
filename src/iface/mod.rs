//! IP instance and its externally reachable operations
//!
//! - `instance`: identity tag, protection lock, statistics
//! - `arp`: validated ARP cache operations
//! - `raw`: validated raw IP send and the trusted send worker

pub mod arp;
pub mod instance;
pub mod raw;

// Re-export commonly used items
pub use instance::{IpInstance, IpStats, IpStatsSnapshot, IP_ID};
pub use raw::RawSendWorker;
