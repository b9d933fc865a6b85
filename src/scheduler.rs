//! Scheduler (C3): drives the periodic tick, fans out probes per endpoint,
//! enforces per-probe deadlines and tick-overlap cancellation, and
//! assembles completed results into [`SampleBucket`]s.
//!
//! Grounded on the pack's cloud-ping `ProbeRunner`: a `tokio::spawn` +
//! `tokio::time::timeout` per probe, results flowing back over an
//! `mpsc` channel to a single aggregator. The tick-barrier idiom (one
//! `tokio::time::interval` driving fan-out for every endpoint without
//! drift) is this crate's realization of spec §9's "multiplexed runtime"
//! note. Per-`(endpoint, check_kind)` overlap cancellation has no direct
//! corpus precedent; it is implemented here as a single-threaded map of
//! `JoinHandle`s owned by the scheduler's own task, matching spec §5's
//! "the scheduler itself is single-threaded coordinator".

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::endpoint::{Endpoint, EndpointKind, HttpScheme, PortProtocol};
use crate::model::{CheckKind, CheckResult, SampleBucket, Status};
use crate::probes;
use crate::timeline::Timeline;

/// Runtime configuration the scheduler needs, distinct from the on-disk
/// [`crate::config::Config`] so CLI overrides (`--no-dns`, `--no-icmp`) can
/// be layered on without re-touching the parsed file.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub custom_dns_servers: Vec<IpAddr>,
    pub dns_enabled: bool,
    /// `None` until the one-time capability probe runs; `Some(false)`
    /// disables Icmp globally for the rest of the process per spec §4.3.
    pub icmp_enabled: bool,
}

/// One probe's outcome, addressed to the aggregator.
struct ProbeOutcome {
    endpoint_id: String,
    bucket_index: u64,
    result: CheckResult,
}

/// Resolution outcome broadcast to dependent probes of a `Domain`/`Http`
/// endpoint for one tick, so Icmp/Tcp/Http can either use the resolved
/// address or synthesize the DNS-failure cascade (spec §7 scenario 4)
/// without each re-running DNS themselves.
#[derive(Debug, Clone)]
enum DnsOutcome {
    Pending,
    Resolved(IpAddr),
    Failed,
}

/// Drives the tick loop. Owns the per-`(endpoint, check_kind)` in-flight
/// map so overlap-cancellation never needs cross-task coordination.
pub struct Scheduler {
    endpoints: Vec<Endpoint>,
    config: SchedulerConfig,
    timeline: Timeline,
    in_flight: HashMap<(String, CheckKind), JoinHandle<()>>,
    bucket_index: u64,
    icmp_disabled_notice_shown: bool,
}

impl Scheduler {
    pub fn new(endpoints: Vec<Endpoint>, config: SchedulerConfig, timeline: Timeline) -> Self {
        Self {
            endpoints,
            config,
            timeline,
            in_flight: HashMap::new(),
            bucket_index: 0,
            icmp_disabled_notice_shown: false,
        }
    }

    /// Runs ticks forever until `shutdown` resolves. Cancels all in-flight
    /// probes and returns once shutdown fires, per spec §4.6.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.cancel_all();
                        return;
                    }
                }
            }
        }
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.in_flight.drain() {
            handle.abort();
        }
    }

    async fn run_tick(&mut self) {
        let tick_index = self.bucket_index;
        self.bucket_index += 1;
        let tick_time = Instant::now();
        let deadline = tick_time + self.config.timeout;

        if !self.config.icmp_enabled && !self.icmp_disabled_notice_shown {
            warn!("ICMP unavailable, disabled globally for this run");
            self.icmp_disabled_notice_shown = true;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ProbeOutcome>();
        let mut expected: HashMap<String, usize> = HashMap::new();

        // Cloned up front so the per-endpoint borrows below (cancellation,
        // spawning) don't have to fight the scheduler's own `&mut self`.
        let endpoints = self.endpoints.clone();
        for endpoint in &endpoints {
            let active_checks = self.active_checks_for(endpoint);
            expected.insert(endpoint.id.clone(), active_checks.len());

            if active_checks.is_empty() {
                self.timeline.append(&endpoint.id, SampleBucket::empty(tick_index));
                continue;
            }

            let canceled = self.cancel_superseded(endpoint, &active_checks);
            for kind in &canceled {
                let _ = tx.send(ProbeOutcome {
                    endpoint_id: endpoint.id.clone(),
                    bucket_index: tick_index,
                    result: CheckResult::canceled(*kind),
                });
            }
            let remaining: Vec<CheckKind> = active_checks.iter().copied().filter(|k| !canceled.contains(k)).collect();
            self.spawn_endpoint_probes(endpoint, &remaining, tick_index, deadline, tx.clone());
        }
        drop(tx);

        // Raced against the tick's own deadline: a probe that ignores its
        // timeout (bug, or a dependent-probe chain that overruns) must never
        // stall this loop, since that would stall `run()`'s select! for
        // every other endpoint and delay shutdown observation along with it.
        let mut pending: HashMap<String, SampleBucket> = HashMap::new();
        let deadline_sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
        tokio::pin!(deadline_sleep);
        loop {
            tokio::select! {
                maybe_outcome = rx.recv() => {
                    let Some(outcome) = maybe_outcome else { break };
                    let bucket = pending.entry(outcome.endpoint_id.clone()).or_insert_with(|| SampleBucket::empty(outcome.bucket_index));
                    bucket.insert(outcome.result);
                    let want = expected.get(&outcome.endpoint_id).copied().unwrap_or(0);
                    if bucket.results.len() >= want {
                        if let Some(finished) = pending.remove(&outcome.endpoint_id) {
                            self.timeline.append(&outcome.endpoint_id, finished);
                        }
                    }
                }
                _ = &mut deadline_sleep => {
                    break;
                }
            }
        }

        // Anything left unfinished when the loop ended (channel drained or
        // deadline hit) missed its deadline and never reported; append what
        // landed so the bucket is still appended strictly in order (spec
        // §5). Probes still running past this point are left in `in_flight`
        // and get cancelled by the next tick that supersedes them.
        for (endpoint_id, bucket) in pending {
            self.timeline.append(&endpoint_id, bucket);
        }
    }

    fn active_checks_for(&self, endpoint: &Endpoint) -> Vec<CheckKind> {
        endpoint
            .applicable_checks
            .iter()
            .copied()
            .filter(|kind| match kind {
                CheckKind::Icmp => self.config.icmp_enabled,
                CheckKind::Dns => self.config.dns_enabled,
                _ => true,
            })
            .collect()
    }

    /// Aborts a prior tick's still-running probe of the same
    /// `(endpoint, check_kind)` and returns which kinds were actually still
    /// running, so the caller can record them as `Canceled` and skip
    /// spawning a fresh probe for that kind this tick, per spec §4.3.
    fn cancel_superseded(&mut self, endpoint: &Endpoint, active_checks: &[CheckKind]) -> Vec<CheckKind> {
        let mut canceled = Vec::new();
        for kind in active_checks {
            let key = (endpoint.id.clone(), *kind);
            if let Some(handle) = self.in_flight.get(&key) {
                if !handle.is_finished() {
                    handle.abort();
                    canceled.push(*kind);
                }
            }
            self.in_flight.remove(&key);
        }
        canceled
    }

    fn spawn_endpoint_probes(
        &mut self,
        endpoint: &Endpoint,
        active_checks: &[CheckKind],
        tick_index: u64,
        deadline: Instant,
        tx: mpsc::UnboundedSender<ProbeOutcome>,
    ) {
        let custom_dns_servers = Arc::new(self.config.custom_dns_servers.clone());

        // Domain/Http endpoints resolve first; dependent probes wait on this
        // watch channel instead of re-resolving, and synthesize the dns
        // cascade (spec §7 scenario 4) on failure.
        let (dns_tx, dns_rx) = watch::channel(DnsOutcome::Pending);
        let needs_dns_wait = matches!(endpoint.kind, EndpointKind::Domain { .. } | EndpointKind::Http { .. });

        for kind in active_checks {
            let key = (endpoint.id.clone(), *kind);
            let endpoint_id = endpoint.id.clone();
            let kind = *kind;
            let kind_tx = tx.clone();
            let endpoint_kind = endpoint.kind.clone();
            let ip_version_pref = endpoint.ip_version_pref;
            let custom_dns_servers = Arc::clone(&custom_dns_servers);
            let dns_tx = dns_tx.clone();
            let mut dns_rx = dns_rx.clone();

            let handle = tokio::spawn(async move {
                // Each stage spends only what's left of the tick's shared
                // deadline, not the full per-tick timeout again — a Domain
                // endpoint that spends half its budget waiting on DNS must
                // not then get the full budget a second time for the probe
                // that depends on it.
                let result = match kind {
                    CheckKind::Dns => {
                        let host = domain_host(&endpoint_kind).unwrap_or_default();
                        let r = probes::probe_dns(&host, &custom_dns_servers, ip_version_pref, remaining(deadline)).await;
                        let _ = dns_tx.send(match (&r.status, &r.resolved_addresses) {
                            (s, Some(addrs)) if s.is_ok() => addrs.first().copied().map(DnsOutcome::Resolved).unwrap_or(DnsOutcome::Failed),
                            _ => DnsOutcome::Failed,
                        });
                        r
                    }
                    CheckKind::Icmp => {
                        match resolved_address(&endpoint_kind, needs_dns_wait, &mut dns_rx, deadline, CheckKind::Icmp).await {
                            Ok(addr) => probes::probe_icmp(addr, remaining(deadline)).await,
                            Err(cascaded) => cascaded,
                        }
                    }
                    CheckKind::Tcp => probe_tcp_layer(&endpoint_kind, needs_dns_wait, &mut dns_rx, deadline).await,
                    CheckKind::Udp => match &endpoint_kind {
                        EndpointKind::IpPort { addr, port, .. } => probes::probe_udp(*addr, *port, remaining(deadline)).await,
                        _ => CheckResult::internal_error(CheckKind::Udp, "udp check on non-IpPort endpoint"),
                    },
                    CheckKind::Http => match resolved_address(&endpoint_kind, needs_dns_wait, &mut dns_rx, deadline, CheckKind::Http).await {
                        Ok(_) => probes::probe_http(&http_url(&endpoint_kind), remaining(deadline)).await,
                        Err(cascaded) => cascaded,
                    },
                };

                let _ = kind_tx.send(ProbeOutcome { endpoint_id, bucket_index: tick_index, result });
            });

            self.in_flight.insert(key, handle);
        }
    }
}

fn domain_host(kind: &EndpointKind) -> Option<String> {
    match kind {
        EndpointKind::Domain { host } => Some(host.clone()),
        EndpointKind::Http { host, .. } => Some(host.clone()),
        _ => None,
    }
}

fn http_url(kind: &EndpointKind) -> String {
    match kind {
        EndpointKind::Http { host, port, scheme, path } => {
            let scheme_str = match scheme {
                HttpScheme::Http => "http",
                HttpScheme::Https => "https",
            };
            format!("{scheme_str}://{host}:{port}{path}")
        }
        _ => String::new(),
    }
}

/// Time left until `deadline`, computed fresh at the call site rather than
/// passed down once — each stage of a DNS-then-probe chain must spend only
/// what the earlier stages left behind, never the full per-tick budget
/// again.
fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Resolves the address a non-Dns probe should use: immediate for
/// Ip/IpPort endpoints, or awaited from the Dns probe's watch channel for
/// Domain/Http endpoints. Returns `Err` with the synthesized cascade result
/// when Dns failed or timed out.
async fn resolved_address(
    kind: &EndpointKind,
    needs_dns_wait: bool,
    dns_rx: &mut watch::Receiver<DnsOutcome>,
    deadline: Instant,
    waiting_kind: CheckKind,
) -> Result<IpAddr, CheckResult> {
    match kind {
        EndpointKind::Ip { addr } => Ok(*addr),
        EndpointKind::IpPort { addr, .. } => Ok(*addr),
        _ if needs_dns_wait => await_dns(dns_rx, deadline, waiting_kind).await,
        _ => Err(CheckResult::internal_error(waiting_kind, "no address available")),
    }
}

async fn await_dns(
    dns_rx: &mut watch::Receiver<DnsOutcome>,
    deadline: Instant,
    waiting_kind: CheckKind,
) -> Result<IpAddr, CheckResult> {
    let wait = tokio::time::timeout(remaining(deadline), async {
        loop {
            match &*dns_rx.borrow() {
                DnsOutcome::Pending => {}
                DnsOutcome::Resolved(addr) => return Ok(*addr),
                DnsOutcome::Failed => return Err(()),
            }
            if dns_rx.changed().await.is_err() {
                return Err(());
            }
        }
    })
    .await;

    match wait {
        Ok(Ok(addr)) => Ok(addr),
        _ => Err(CheckResult::unreachable(waiting_kind, "dns failed")),
    }
}

async fn probe_tcp_layer(
    kind: &EndpointKind,
    needs_dns_wait: bool,
    dns_rx: &mut watch::Receiver<DnsOutcome>,
    deadline: Instant,
) -> CheckResult {
    match kind {
        EndpointKind::IpPort { addr, port, protocol: PortProtocol::Tcp } => {
            probes::probe_tcp(*addr, *port, remaining(deadline)).await
        }
        EndpointKind::IpPort { .. } => CheckResult::internal_error(CheckKind::Tcp, "tcp check on udp endpoint"),
        EndpointKind::Domain { .. } => match resolved_address(kind, needs_dns_wait, dns_rx, deadline, CheckKind::Tcp).await {
            Ok(addr) => {
                let budget = remaining(deadline);
                let (a, b) = tokio::join!(probes::probe_tcp(addr, 80, budget), probes::probe_tcp(addr, 443, budget));
                probes::tcp::merge_best(a, b)
            }
            Err(cascaded) => cascaded,
        },
        EndpointKind::Http { port, .. } => {
            let port = *port;
            match resolved_address(kind, needs_dns_wait, dns_rx, deadline, CheckKind::Tcp).await {
                Ok(addr) => probes::probe_tcp(addr, port, remaining(deadline)).await,
                Err(cascaded) => cascaded,
            }
        }
        EndpointKind::Ip { .. } => CheckResult::internal_error(CheckKind::Tcp, "tcp check on plain ip endpoint"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{parse_targets, RawTarget};

    fn endpoint(url: &str) -> Endpoint {
        parse_targets(&[RawTarget::Bare(url.to_string())]).unwrap().remove(0)
    }

    #[test]
    fn active_checks_excludes_icmp_when_disabled() {
        let scheduler = Scheduler::new(
            vec![],
            SchedulerConfig {
                interval: Duration::from_secs(5),
                timeout: Duration::from_secs(5),
                custom_dns_servers: vec![],
                dns_enabled: true,
                icmp_enabled: false,
            },
            Timeline::new(10),
        );
        let ep = endpoint("example.com");
        let active = scheduler.active_checks_for(&ep);
        assert!(!active.contains(&CheckKind::Icmp));
        assert!(active.contains(&CheckKind::Dns));
    }

    #[tokio::test]
    async fn empty_active_set_appends_empty_bucket_immediately() {
        let timeline = Timeline::new(10);
        let mut scheduler = Scheduler::new(
            vec![endpoint("8.8.8.8")],
            SchedulerConfig {
                interval: Duration::from_millis(50),
                timeout: Duration::from_millis(50),
                custom_dns_servers: vec![],
                dns_enabled: true,
                icmp_enabled: false,
            },
            timeline.clone(),
        );
        scheduler.run_tick().await;
        let snapshot = timeline.snapshot("8.8.8.8");
        let bucket = snapshot.into_iter().flatten().next().unwrap();
        assert!(bucket.is_empty());
    }
}
