use std::io;
use std::process::Command;

use tracing::info;

fn run_ip(args: &[&str]) -> io::Result<()> {
    let status = Command::new("ip").args(args).status()?;
    if !status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("`ip {}` exited with {}", args.join(" "), status),
        ));
    }
    Ok(())
}

/// Assign `ip_cidr` to the host side of `iface_name` and bring it up.
pub fn configure_interface(iface_name: &str, ip_cidr: &str) -> io::Result<()> {
    run_ip(&["addr", "add", ip_cidr, "dev", iface_name])?;
    run_ip(&["link", "set", "up", "dev", iface_name])?;

    info!(iface = iface_name, ip = ip_cidr, "interface configured and up");
    Ok(())
}

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();
}
