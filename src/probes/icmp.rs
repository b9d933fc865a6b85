//! ICMP echo probe (spec §4.2 `IcmpProbe`).
//!
//! Grounded almost verbatim on the reference monitor's
//! `checks::just_fucking_ping`: the same `ping::rawsock::ping` call and the
//! same "measure wall time around a blocking call" latency shape. The only
//! change is the bridge into the async scheduler via
//! `tokio::task::spawn_blocking`, since `ping::rawsock::ping` blocks the
//! calling thread for the duration of the echo exchange.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::model::{CheckKind, CheckResult, Status};

/// Sends one ICMP echo request and waits up to `deadline` for the reply.
///
/// Capability denial is the caller's concern: the scheduler checks
/// [`crate::probes::capability::probe_icmp_capability`] once at startup and
/// never calls this adapter at all when it is unavailable, per spec §4.2
/// ("the endpoint's Icmp check is marked permanently disabled and never
/// rescheduled").
pub async fn probe_icmp(address: IpAddr, deadline: Duration) -> CheckResult {
    let started_at = Instant::now();
    let remaining = deadline;

    let ping_task = tokio::task::spawn_blocking(move || {
        let now = Instant::now();
        match ping::rawsock::ping(address, Some(remaining), None, None, None, None) {
            Ok(_) => Ok(now.elapsed()),
            Err(e) => Err(e.to_string()),
        }
    });

    match timeout(deadline, ping_task).await {
        Err(_) => CheckResult::failed(CheckKind::Icmp, started_at, Status::Timeout, "deadline reached"),
        Ok(Err(join_err)) => {
            CheckResult::internal_error(CheckKind::Icmp, format!("ping task panicked: {join_err}"))
        }
        Ok(Ok(Err(reason))) => CheckResult::failed(
            CheckKind::Icmp,
            started_at,
            Status::Unreachable { reason: Some(reason.clone()) },
            reason,
        ),
        Ok(Ok(Ok(elapsed))) => {
            CheckResult::ok(CheckKind::Icmp, started_at, elapsed.as_secs_f64() * 1000.0, "echo reply received")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_ping_either_succeeds_or_fails_cleanly() {
        let result = probe_icmp("127.0.0.1".parse().unwrap(), Duration::from_millis(500)).await;
        assert_eq!(result.check_kind, CheckKind::Icmp);
        // In a sandbox without CAP_NET_RAW this is Unreachable, not a panic.
        assert!(matches!(result.status, Status::Ok { .. } | Status::Unreachable { .. } | Status::Timeout));
    }
}
