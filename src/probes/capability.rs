//! One-time startup probe for `CAP_NET_RAW`, the capability ICMP echo
//! sockets require.
//!
//! The reference monitor carries a `caps` dependency but never calls it —
//! it instead documents that ICMP checks "may not work in daemon mode"
//! after privileges are dropped. This crate is the thing that dependency
//! was for: a single check at startup, not per-tick, since the capability
//! set does not change while the process runs.

use caps::{CapSet, Capability};
use tracing::{info, warn};

/// Returns `true` if this process holds `CAP_NET_RAW` (or is privileged
/// enough that raw sockets will work regardless, e.g. root).
///
/// Logged once via `tracing` before the alternate screen opens, so the
/// outcome is visible even if the session later ends uncleanly.
pub fn probe_icmp_capability() -> bool {
    match caps::read(None, CapSet::Effective) {
        Ok(effective) => {
            let capable = effective.contains(&Capability::CAP_NET_RAW);
            if capable {
                info!("CAP_NET_RAW is available, ICMP checks enabled");
            } else {
                warn!("CAP_NET_RAW is not available, ICMP checks will be disabled for this run");
            }
            capable
        }
        Err(e) => {
            warn!("could not read process capabilities ({e}), assuming ICMP is unavailable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn probe_does_not_panic() {
        // Outcome depends on the sandbox this test runs in; only the
        // absence of a panic is asserted.
        let _ = probe_icmp_capability();
    }

    #[traced_test]
    #[test]
    fn probe_logs_its_outcome() {
        let capable = probe_icmp_capability();
        if capable {
            assert!(logs_contain("CAP_NET_RAW is available"));
        } else {
            assert!(logs_contain("CAP_NET_RAW is not available"));
        }
    }
}
