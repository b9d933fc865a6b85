//! Probe adapters (C2): one module per check kind, each exposing a single
//! `probe(..., deadline) -> CheckResult` operation.
//!
//! Every adapter is deadline-honoring and cancellation-safe, and none of
//! them ever return an `Err` upward — a failed or timed-out attempt is
//! represented as a [`crate::model::CheckResult`] with a failing
//! [`crate::model::Status`], exactly as spec §7's propagation policy
//! requires ("adapters never throw upward"). Unexpected panics inside a
//! spawned probe task are caught by the scheduler and folded into
//! `ProtocolError("internal")`, not here.

pub mod capability;
pub mod dns;
pub mod http;
pub mod icmp;
pub mod tcp;
pub mod udp;

pub use capability::probe_icmp_capability;
pub use dns::probe_dns;
pub use http::probe_http;
pub use icmp::probe_icmp;
pub use tcp::probe_tcp;
pub use udp::probe_udp;
