//! Core result types shared by the probe adapters, the scheduler and the
//! timeline store: [`CheckKind`], [`Status`], [`CheckResult`] and
//! [`SampleBucket`].
//!
//! These mirror the role of the reference monitor's `records.rs`
//! (`CheckType`/`CheckFlag`/`Check`), but trade its bitflag encoding for a
//! plain enum: this crate never persists results to disk, so there is no
//! space pressure that would justify a bitset.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::net::IpAddr;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// One layer of connectivity check.
///
/// Ordering here is declaration order, used only for stable iteration and
/// `BTreeMap` keys. Display priority for [`PrimaryPick`] is a separate,
/// explicit ranking via [`CheckKind::priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckKind {
    Dns,
    Icmp,
    Tcp,
    Udp,
    Http,
}

impl CheckKind {
    /// Layer priority for [`PrimaryPick`] and suppression, highest first:
    /// `Http > Tcp ~ Udp > Dns > Icmp`.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Http => 4,
            Self::Tcp => 3,
            Self::Udp => 3,
            Self::Dns => 2,
            Self::Icmp => 1,
        }
    }

    /// Short upper-case name used in the latency column and problem lines.
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Dns => "DNS",
            Self::Icmp => "ICMP",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Http => "HTTP",
        }
    }
}

impl Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Outcome of a single probe attempt.
///
/// `Ok` carries whether the sample is "unverified" (spec's UDP case: no
/// reply and no rejection were observed before the deadline, so success is
/// assumed rather than confirmed).
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Ok { unverified: bool },
    Timeout,
    Refused,
    Unreachable { reason: Option<String> },
    NameError,
    ProtocolError(String),
    CapabilityDenied,
    Canceled,
}

impl Status {
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub const fn is_unverified_ok(&self) -> bool {
        matches!(self, Self::Ok { unverified: true })
    }

    /// A short, canonical message for the problems block (spec §4.4).
    pub fn problem_message(&self, kind: CheckKind) -> String {
        match self {
            Self::Ok { .. } => String::new(),
            Self::Timeout => format!("{kind} timeout"),
            Self::Refused => format!("{kind} connection refused"),
            Self::Unreachable { reason: Some(r) } => format!("{kind} unreachable ({r})"),
            Self::Unreachable { reason: None } => format!("{kind} unreachable"),
            Self::NameError => format!("{kind} name error"),
            Self::ProtocolError(code) if kind == CheckKind::Http => format!("HTTP {code}"),
            Self::ProtocolError(code) => format!("{kind} protocol error ({code})"),
            Self::CapabilityDenied => format!("{kind} unavailable"),
            Self::Canceled => format!("{kind} canceled"),
        }
    }
}

/// Result of one probe attempt against one endpoint, for one check kind.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check_kind: CheckKind,
    pub started_at: Instant,
    pub wall_time: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub status: Status,
    pub detail: String,
    pub resolved_addresses: Option<Vec<IpAddr>>,
}

impl CheckResult {
    pub fn ok(kind: CheckKind, started_at: Instant, latency_ms: f64, detail: impl Into<String>) -> Self {
        Self {
            check_kind: kind,
            started_at,
            wall_time: Utc::now(),
            latency_ms: Some(latency_ms),
            status: Status::Ok { unverified: false },
            detail: detail.into(),
            resolved_addresses: None,
        }
    }

    pub fn unverified_ok(kind: CheckKind, started_at: Instant, detail: impl Into<String>) -> Self {
        Self {
            check_kind: kind,
            started_at,
            wall_time: Utc::now(),
            latency_ms: Some(0.0),
            status: Status::Ok { unverified: true },
            detail: detail.into(),
            resolved_addresses: None,
        }
    }

    pub fn failed(kind: CheckKind, started_at: Instant, status: Status, detail: impl Into<String>) -> Self {
        Self {
            check_kind: kind,
            started_at,
            wall_time: Utc::now(),
            latency_ms: None,
            status,
            detail: detail.into(),
            resolved_addresses: None,
        }
    }

    pub fn timeout(kind: CheckKind) -> Self {
        Self::failed(kind, Instant::now(), Status::Timeout, "deadline reached")
    }

    pub fn canceled(kind: CheckKind) -> Self {
        Self::failed(kind, Instant::now(), Status::Canceled, "superseded by next tick")
    }

    pub fn unreachable(kind: CheckKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::failed(
            kind,
            Instant::now(),
            Status::Unreachable { reason: Some(reason.clone()) },
            reason,
        )
    }

    pub fn internal_error(kind: CheckKind, detail: impl Into<String>) -> Self {
        Self::failed(kind, Instant::now(), Status::ProtocolError("internal".into()), detail)
    }

    pub const fn is_success(&self) -> bool {
        self.status.is_ok()
    }
}

/// One tick's outcome for one endpoint: a mapping of check kind to result.
#[derive(Debug, Clone)]
pub struct SampleBucket {
    pub bucket_index: u64,
    pub wall_time: DateTime<Utc>,
    pub results: BTreeMap<CheckKind, CheckResult>,
}

impl SampleBucket {
    pub fn empty(bucket_index: u64) -> Self {
        Self {
            bucket_index,
            wall_time: Utc::now(),
            results: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, result: CheckResult) {
        self.results.insert(result.check_kind, result);
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_matches_spec() {
        assert!(CheckKind::Http.priority() > CheckKind::Tcp.priority());
        assert!(CheckKind::Tcp.priority() == CheckKind::Udp.priority());
        assert!(CheckKind::Udp.priority() > CheckKind::Dns.priority());
        assert!(CheckKind::Dns.priority() > CheckKind::Icmp.priority());
    }

    #[test]
    fn problem_message_for_http_status_uses_code() {
        let msg = Status::ProtocolError("503".into()).problem_message(CheckKind::Http);
        assert_eq!(msg, "HTTP 503");
    }
}
