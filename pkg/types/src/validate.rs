use anyhow::{Result, bail};

/// Validate a `host:port` address as accepted on the command line.
/// Rules: non-empty host, numeric port in 1..=65535, IPv6 hosts bracketed.
/// A scheme prefix (`http://`) is rejected.
pub fn validate_host_port(addr: &str) -> Result<()> {
    if addr.is_empty() {
        bail!("address must not be empty");
    }
    if addr.contains("://") {
        bail!("address '{}' must be host:port without a scheme", addr);
    }
    let Some((host, port)) = addr.rsplit_once(':') else {
        bail!("address '{}' must be in host:port form", addr);
    };
    if host.is_empty() {
        bail!("address '{}' has an empty host", addr);
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        bail!("IPv6 host in '{}' must be enclosed in brackets", addr);
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => bail!("address '{}' has an invalid port '{}'", addr, port),
        Ok(_) => Ok(()),
    }
}
