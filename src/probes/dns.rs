//! DNS resolution probe (spec §4.2 `DnsProbe`).
//!
//! Grounded on `hickory-resolver`'s async `TokioAsyncResolver`, the
//! resolver pack's `Mozart409-uptime-forge` and the
//! `hickory-dns` reference file both reach for. When multiple
//! `custom_servers` are configured, each is queried concurrently with its
//! own resolver instance and the earliest successful response wins via
//! `futures::future::select_ok`, per spec §4.2.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use futures::future::select_ok;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolveError, ResolveErrorKind, TokioResolver};

use crate::endpoint::IpVersionPref;
use crate::model::{CheckKind, CheckResult, Status};

/// Resolves `host`, optionally restricted to one IP family and optionally
/// against a fixed set of `custom_servers` instead of the system resolver.
pub async fn probe_dns(
    host: &str,
    custom_servers: &[IpAddr],
    family_pref: IpVersionPref,
    deadline: Duration,
) -> CheckResult {
    let started_at = Instant::now();

    let resolvers = build_resolvers(custom_servers, deadline);
    let host = host.to_string();

    let attempts = resolvers.into_iter().map(|resolver| {
        let host = host.clone();
        Box::pin(async move { resolver.lookup_ip(host.as_str()).await })
    });

    let outcome = tokio::time::timeout(deadline, select_ok(attempts)).await;

    match outcome {
        Err(_) => CheckResult::timeout(CheckKind::Dns),
        Ok(Err(errors)) => classify_resolve_error(started_at, errors),
        Ok(Ok((lookup, _remaining))) => {
            let mut addresses: Vec<IpAddr> = lookup.iter().filter(|addr| family_matches(*addr, family_pref)).collect();
            if addresses.is_empty() {
                return CheckResult::failed(
                    CheckKind::Dns,
                    started_at,
                    Status::NameError,
                    "resolved, but no address matched the requested IP family",
                );
            }
            addresses.sort();
            let latency_ms = started_at.elapsed().as_secs_f64() * 1000.0;
            let mut result = CheckResult::ok(CheckKind::Dns, started_at, latency_ms, format!("{} address(es)", addresses.len()));
            result.resolved_addresses = Some(addresses);
            result
        }
    }
}

fn family_matches(addr: IpAddr, pref: IpVersionPref) -> bool {
    match pref {
        IpVersionPref::Any => true,
        IpVersionPref::V4 => addr.is_ipv4(),
        IpVersionPref::V6 => addr.is_ipv6(),
    }
}

fn classify_resolve_error(started_at: Instant, error: ResolveError) -> CheckResult {
    if error.is_no_records_found() {
        return CheckResult::failed(CheckKind::Dns, started_at, Status::NameError, "NXDOMAIN / NODATA");
    }
    let is_timeout = matches!(
        error.kind(),
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), hickory_resolver::proto::ProtoErrorKind::Timeout)
    );
    if is_timeout {
        return CheckResult::timeout(CheckKind::Dns);
    }
    CheckResult::failed(
        CheckKind::Dns,
        started_at,
        Status::ProtocolError(error.to_string()),
        error.to_string(),
    )
}

fn build_resolver(config: ResolverConfig, opts: ResolverOpts) -> TokioResolver {
    let mut builder = TokioResolver::builder_with_config(config, TokioConnectionProvider::default());
    *builder.options_mut() = opts;
    builder.build()
}

fn build_resolvers(custom_servers: &[IpAddr], deadline: Duration) -> Vec<TokioResolver> {
    let mut opts = ResolverOpts::default();
    opts.timeout = deadline;

    if custom_servers.is_empty() {
        let (config, _) = hickory_resolver::system_conf::read_system_conf().unwrap_or((ResolverConfig::default(), ResolverOpts::default()));
        return vec![build_resolver(config, opts)];
    }

    custom_servers
        .iter()
        .map(|server| {
            let group = NameServerConfigGroup::from_ips_clear(&[*server], 53, true);
            let config = ResolverConfig::from_parts(None, vec![], group);
            build_resolver(config, opts.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolving_localhost_succeeds() {
        let result = probe_dns("localhost", &[], IpVersionPref::Any, Duration::from_secs(2)).await;
        assert_eq!(result.check_kind, CheckKind::Dns);
        assert!(result.is_success());
        assert!(result.resolved_addresses.is_some());
    }

    #[tokio::test]
    async fn nonexistent_tld_is_name_error() {
        let result = probe_dns("this-should-not-resolve.invalid", &[], IpVersionPref::Any, Duration::from_secs(3)).await;
        assert_eq!(result.check_kind, CheckKind::Dns);
        assert!(!result.is_success());
    }
}
