//! Utility functions for the demos
//!
//! Host-side TUN configuration and logging setup shared by the demos. Each
//! demo compiles this module on its own and uses only part of it.

#![allow(dead_code)]

pub mod network;

pub use network::*;
