//! Host identity announced in the listing banner.
//!
//! Resolved once at startup: an explicit host name wins, then a specific
//! listen interface, then the OS host name.

use crate::config::Config;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

const FALLBACK_IDENTITY: &str = "localhost";

/// Resolve the server identity for this process
pub fn resolve(config: &Config) -> Arc<str> {
    let identity = choose(
        config.hostname.as_deref(),
        config.interface.as_deref(),
        os_hostname,
    );
    Arc::from(identity)
}

fn choose(
    hostname: Option<&str>,
    interface: Option<&str>,
    os_hostname: impl FnOnce() -> Option<String>,
) -> String {
    if let Some(hostname) = hostname {
        return hostname.to_string();
    }

    if let Some(interface) = interface.filter(|i| is_specific(i)) {
        return interface.to_string();
    }

    os_hostname()
        .or_else(|| interface.map(str::to_string))
        .unwrap_or_else(|| FALLBACK_IDENTITY.to_string())
}

/// An interface names this host unless it is empty or a wildcard address.
fn is_specific(interface: &str) -> bool {
    match interface.parse::<IpAddr>() {
        Ok(ip) => !ip.is_unspecified(),
        Err(_) => !interface.is_empty(),
    }
}

fn os_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => match name.into_string() {
            Ok(name) if !name.is_empty() => Some(name),
            _ => None,
        },
        Err(e) => {
            warn!(error = %e, "Failed to read host name");
            None
        }
    }
}
