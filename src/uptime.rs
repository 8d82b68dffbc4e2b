//! System uptime source and formatter.

use tracing::debug;

/// Placeholder shown when uptime cannot be measured
pub const UNKNOWN: &str = "unknown";

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

/// Source of elapsed seconds since boot
pub trait UptimeSource: Send + Sync {
    /// Seconds since boot, or `None` if unavailable
    fn uptime_seconds(&self) -> Option<u64>;
}

/// Reads uptime from the kernel via `sysinfo(2)`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemUptime;

impl UptimeSource for SystemUptime {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn uptime_seconds(&self) -> Option<u64> {
        match nix::sys::sysinfo::sysinfo() {
            Ok(info) => Some(info.uptime().as_secs()),
            Err(e) => {
                debug!(error = %e, "sysinfo failed");
                None
            }
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn uptime_seconds(&self) -> Option<u64> {
        debug!("uptime not supported on this platform");
        None
    }
}

/// Format uptime as `D days H:MM:SS`, or `unknown`.
pub fn format_uptime(seconds: Option<u64>) -> String {
    let Some(total) = seconds else {
        return UNKNOWN.to_string();
    };

    let days = total / SECONDS_PER_DAY;
    let hours = total % SECONDS_PER_DAY / SECONDS_PER_HOUR;
    let minutes = total % SECONDS_PER_HOUR / SECONDS_PER_MINUTE;
    let secs = total % SECONDS_PER_MINUTE;

    format!("{days} days {hours}:{minutes:02}:{secs:02}")
}

/// Uptime source returning a fixed value
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedUptime(pub Option<u64>);

#[cfg(test)]
impl UptimeSource for FixedUptime {
    fn uptime_seconds(&self) -> Option<u64> {
        self.0
    }
}
