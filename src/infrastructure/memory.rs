//! Process memory probe backing resource governance.
//!
//! The supervisor polls resident-set size on a fixed interval and
//! sheds or restarts workers when the high-water mark is crossed. The
//! probe is a trait so tests can script pressure scenarios.

use std::sync::atomic::{AtomicU64, Ordering};

/// Resident memory observer.
pub trait MemoryProbe: Send + Sync {
    /// Current resident-set size in bytes, or `None` when the probe
    /// cannot read it on this platform.
    fn rss_bytes(&self) -> Option<u64>;
}

/// Probe backed by `/proc/self/status` (Linux). On platforms without
/// procfs it reports `None` and governance stays inactive.
#[derive(Debug, Default)]
pub struct ProcMemoryProbe;

impl MemoryProbe for ProcMemoryProbe {
    fn rss_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())?;
    Some(kb * 1024)
}

/// Scriptable probe for tests.
#[derive(Debug, Default)]
pub struct FixedMemoryProbe {
    rss: AtomicU64,
}

impl FixedMemoryProbe {
    #[must_use]
    pub fn new(rss_bytes: u64) -> Self {
        Self {
            rss: AtomicU64::new(rss_bytes),
        }
    }

    pub fn set_rss(&self, rss_bytes: u64) {
        self.rss.store(rss_bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn rss_bytes(&self) -> Option<u64> {
        Some(self.rss.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vm_rss_line() {
        let status = "Name:\tstorecrawl\nVmPeak:\t  200000 kB\nVmRSS:\t  123456 kB\n";
        assert_eq!(parse_vm_rss(status), Some(123_456 * 1024));
    }

    #[test]
    fn missing_vm_rss_yields_none() {
        assert_eq!(parse_vm_rss("Name:\tstorecrawl\n"), None);
    }

    #[test]
    fn fixed_probe_is_scriptable() {
        let probe = FixedMemoryProbe::new(10);
        assert_eq!(probe.rss_bytes(), Some(10));
        probe.set_rss(99);
        assert_eq!(probe.rss_bytes(), Some(99));
    }
}
