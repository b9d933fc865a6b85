//! UDP probe (spec §4.2 `UdpProbe`).
//!
//! UDP has no handshake, so a clean send with no ICMP port-unreachable
//! before the deadline is the best available signal and is reported as
//! "unverified" rather than a confident `Ok`, per spec §4.2/§9's open
//! question on UDP semantics. Grounded on the same `tokio::net` + deadline
//! shape as [`crate::probes::tcp`], adapted to a connected `UdpSocket` so a
//! `recv` that surfaces a port-unreachable ICMP error resolves promptly
//! instead of hanging for the full deadline.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::model::{CheckKind, CheckResult};

/// Sends a zero-payload datagram to `address:port` and waits up to
/// `deadline` for either a reply or a connection-refused signal.
pub async fn probe_udp(address: IpAddr, port: u16, deadline: Duration) -> CheckResult {
    let started_at = Instant::now();

    let bind_addr = match address {
        IpAddr::V4(_) => "0.0.0.0:0",
        IpAddr::V6(_) => "[::]:0",
    };
    let socket = match UdpSocket::bind(bind_addr).await {
        Ok(s) => s,
        Err(e) => return CheckResult::unreachable(CheckKind::Udp, e.to_string()),
    };
    if let Err(e) = socket.connect((address, port)).await {
        return CheckResult::unreachable(CheckKind::Udp, e.to_string());
    }
    if let Err(e) = socket.send(&[]).await {
        return CheckResult::unreachable(CheckKind::Udp, e.to_string());
    }

    let mut buf = [0u8; 1];
    match timeout(deadline, socket.recv(&mut buf)).await {
        Err(_) => CheckResult::unverified_ok(CheckKind::Udp, started_at, "no reply, no rejection observed"),
        Ok(Ok(_)) => {
            CheckResult::ok(CheckKind::Udp, started_at, started_at.elapsed().as_secs_f64() * 1000.0, "datagram reply received")
        }
        Ok(Err(e)) => CheckResult::unreachable(CheckKind::Udp, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unresponsive_host_is_unverified_ok_not_failed() {
        // 192.0.2.0/24 is TEST-NET-1 (RFC 5737); nothing answers there and
        // no host on the local segment will generate a port-unreachable.
        let result = probe_udp("192.0.2.1".parse().unwrap(), 33333, Duration::from_millis(200)).await;
        assert_eq!(result.check_kind, CheckKind::Udp);
        assert!(result.status.is_unverified_ok() || !result.is_success());
    }
}
