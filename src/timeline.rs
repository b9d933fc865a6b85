//! Timeline store (C4): per-endpoint fixed-capacity ring of
//! [`SampleBucket`]s, the `PrimaryPick` selection rule, the suppression
//! policy, and the aggregates the dashboard reads.
//!
//! The reference monitor keeps one flat, unbounded `Vec<Check>` per store
//! (it persists to disk, so unbounded history is the point). This crate's
//! Non-goal on historical persistence means the bounded-ring shape is new;
//! what's kept from the teacher is the "one result, several derived views"
//! idea embodied there by `Check::calc_type`/`Check::is_success` — here
//! realized as `PrimaryPick` and the suppression list computed from a
//! `SampleBucket` rather than bitflags.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::{CheckKind, CheckResult, SampleBucket, Status};

/// The checked-out result chosen to represent one bucket in the UI,
/// selected per the rule in spec §3.
#[derive(Debug, Clone)]
pub enum PrimaryPick {
    /// A concrete result was selected.
    Result(CheckResult),
    /// The tick ran but no probe completed (e.g. every applicable check
    /// was disabled or canceled).
    Empty,
}

impl PrimaryPick {
    pub fn check_kind(&self) -> Option<CheckKind> {
        match self {
            Self::Result(r) => Some(r.check_kind),
            Self::Empty => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Result(r) if r.is_success())
    }
}

/// Picks the `CheckResult` to represent a bucket, per spec §3:
/// 1. `primary_check_override`, if present and it ran this bucket.
/// 2. Else the highest-priority *successful* layer.
/// 3. Else the lowest-priority layer that ran at all (so a row still shows
///    "something broke" rather than going blank).
/// 4. Else [`PrimaryPick::Empty`].
pub fn pick_primary(bucket: &SampleBucket, primary_check_override: Option<CheckKind>) -> PrimaryPick {
    if let Some(kind) = primary_check_override {
        if let Some(result) = bucket.results.get(&kind) {
            return PrimaryPick::Result(result.clone());
        }
    }

    let best_success = bucket
        .results
        .values()
        .filter(|r| r.is_success())
        .max_by_key(|r| r.check_kind.priority());
    if let Some(result) = best_success {
        return PrimaryPick::Result(result.clone());
    }

    let lowest_failure = bucket.results.values().min_by_key(|r| r.check_kind.priority());
    match lowest_failure {
        Some(result) => PrimaryPick::Result(result.clone()),
        None => PrimaryPick::Empty,
    }
}

/// A single line for the problems block: `<label>: <message>` for a
/// per-endpoint problem, or just `<message>` for a global one (spec §4.4:
/// "a globally disabled check surfaces exactly once as a standalone notice,
/// not per-endpoint").
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub label: Option<String>,
    pub message: String,
}

impl Problem {
    pub fn global(message: impl Into<String>) -> Self {
        Self { label: None, message: message.into() }
    }
}

/// Computes the suppression-filtered problem list for the most recent
/// non-empty bucket of one endpoint (spec §4.4): a failure at layer `L` is
/// suppressed if any strictly-higher layer succeeded in the same bucket.
///
/// Scenario 4's DNS-cascade rule is a special case of this: when Dns fails,
/// its cascaded descendants carry `Status::Unreachable{reason: Some("dns
/// failed")}`, which this function also suppresses in favor of the single
/// Dns failure, since Dns has lower priority than Icmp/Tcp/Http but is the
/// actual root cause — descendants synthesized from a dns failure are
/// tagged with that specific reason string so this function can special-
/// case them rather than reporting three redundant lines.
pub fn active_problems(label: &str, bucket: &SampleBucket) -> Vec<Problem> {
    let dns_failed = bucket.results.get(&CheckKind::Dns).map(|r| !r.is_success()).unwrap_or(false);

    let mut problems = Vec::new();
    for result in bucket.results.values() {
        if result.is_success() {
            continue;
        }
        if result.check_kind != CheckKind::Dns && dns_failed && is_dns_cascade(&result.status) {
            continue;
        }
        let suppressed = bucket
            .results
            .values()
            .any(|other| other.check_kind.priority() > result.check_kind.priority() && other.is_success());
        if suppressed {
            continue;
        }
        problems.push(Problem {
            label: Some(label.to_string()),
            message: result.status.problem_message(result.check_kind),
        });
    }
    problems
}

fn is_dns_cascade(status: &Status) -> bool {
    matches!(status, Status::Unreachable { reason: Some(r) } if r == "dns failed")
}

/// Per-endpoint aggregates over the current window (spec §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregates {
    pub packet_loss_pct: f64,
    pub latency_last: Option<f64>,
    pub latency_mean: Option<f64>,
}

/// A fixed-capacity ring of `SampleBucket`s for one endpoint.
///
/// `append` is the only mutator; callers serialize access per endpoint via
/// the `Mutex` in [`Timeline`], matching spec §5 ("writes are per-endpoint
/// serialized... reads are snapshot-based").
pub struct Ring {
    capacity: usize,
    buckets: Vec<Option<SampleBucket>>,
    next_index: u64,
}

impl Ring {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), buckets: vec![None; capacity.max(1)], next_index: 0 }
    }

    /// Appends `bucket`, asserting strictly-increasing `bucket_index` per
    /// spec §5 ("buckets are appended strictly in increasing bucket_index
    /// order").
    pub fn append(&mut self, bucket: SampleBucket) {
        debug_assert_eq!(bucket.bucket_index, self.next_index, "ticks must be appended in order");
        let bucket_index = bucket.bucket_index;
        let slot = (bucket_index as usize) % self.capacity;
        self.buckets[slot] = Some(bucket);
        self.next_index = bucket_index + 1;
    }

    /// Snapshot of up to `capacity` buckets, oldest to newest, with gaps for
    /// ticks that have not yet landed (spec §3: "missing ticks are explicit
    /// empty buckets, not gaps").
    pub fn snapshot(&self) -> Vec<Option<SampleBucket>> {
        if self.next_index == 0 {
            return vec![None; self.capacity];
        }
        let oldest = self.next_index.saturating_sub(self.capacity as u64);
        (oldest..self.next_index)
            .map(|idx| self.buckets[(idx as usize) % self.capacity].clone())
            .collect()
    }

    /// Resizes the ring, preserving the newest `min(old_capacity,
    /// new_capacity)` buckets, per spec §9.
    pub fn resize(&mut self, new_capacity: usize) {
        let new_capacity = new_capacity.max(1);
        if new_capacity == self.capacity {
            return;
        }
        let snapshot = self.snapshot();
        let keep = snapshot.len().min(new_capacity);
        let kept = snapshot[snapshot.len() - keep..].to_vec();

        self.capacity = new_capacity;
        self.buckets = vec![None; new_capacity];
        for bucket in kept.into_iter().flatten() {
            let slot = (bucket.bucket_index as usize) % new_capacity;
            self.buckets[slot] = Some(bucket);
        }
    }

    pub fn latest_non_empty(&self) -> Option<SampleBucket> {
        self.snapshot().into_iter().flatten().rev().find(|b| !b.is_empty())
    }

    pub fn aggregates(&self, primary_check_override: Option<CheckKind>) -> Aggregates {
        let snapshot = self.snapshot();
        let picks: Vec<PrimaryPick> = snapshot
            .iter()
            .filter_map(|b| b.as_ref())
            .map(|b| pick_primary(b, primary_check_override))
            .collect();

        if picks.is_empty() {
            return Aggregates::default();
        }

        let failures = picks.iter().filter(|p| !p.is_success()).count();
        let packet_loss_pct = failures as f64 / picks.len() as f64;

        let successful_latencies: Vec<f64> = picks
            .iter()
            .filter_map(|p| match p {
                PrimaryPick::Result(r) if r.is_success() => r.latency_ms,
                _ => None,
            })
            .collect();

        let latency_last = picks.iter().rev().find_map(|p| match p {
            PrimaryPick::Result(r) if r.is_success() => r.latency_ms,
            _ => None,
        });
        let latency_mean = if successful_latencies.is_empty() {
            None
        } else {
            Some(successful_latencies.iter().sum::<f64>() / successful_latencies.len() as f64)
        };

        Aggregates { packet_loss_pct, latency_last, latency_mean }
    }
}

/// Owns one [`Ring`] per endpoint id, guarded independently so a slow
/// writer on one endpoint never blocks another's append or any reader.
#[derive(Clone)]
pub struct Timeline {
    rings: Arc<Mutex<HashMap<String, Arc<Mutex<Ring>>>>>,
    capacity: Arc<Mutex<usize>>,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self { rings: Arc::new(Mutex::new(HashMap::new())), capacity: Arc::new(Mutex::new(capacity.max(1))) }
    }

    fn ring_for(&self, endpoint_id: &str) -> Arc<Mutex<Ring>> {
        let capacity = *self.capacity.lock();
        self.rings
            .lock()
            .entry(endpoint_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Ring::new(capacity))))
            .clone()
    }

    pub fn append(&self, endpoint_id: &str, bucket: SampleBucket) {
        self.ring_for(endpoint_id).lock().append(bucket);
    }

    pub fn snapshot(&self, endpoint_id: &str) -> Vec<Option<SampleBucket>> {
        self.ring_for(endpoint_id).lock().snapshot()
    }

    pub fn latest_non_empty(&self, endpoint_id: &str) -> Option<SampleBucket> {
        self.ring_for(endpoint_id).lock().latest_non_empty()
    }

    pub fn aggregates(&self, endpoint_id: &str, primary_check_override: Option<CheckKind>) -> Aggregates {
        self.ring_for(endpoint_id).lock().aggregates(primary_check_override)
    }

    /// Resizes every endpoint's ring to `new_capacity`, for `graph_width =
    /// 0` terminal-resize tracking (spec §4.6/§8).
    pub fn resize_all(&self, new_capacity: usize) {
        *self.capacity.lock() = new_capacity.max(1);
        for ring in self.rings.lock().values() {
            ring.lock().resize(new_capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn ok_bucket(index: u64, kind: CheckKind, latency: f64) -> SampleBucket {
        let mut bucket = SampleBucket::empty(index);
        bucket.insert(CheckResult::ok(kind, Instant::now(), latency, "ok"));
        bucket
    }

    #[test]
    fn primary_pick_prefers_highest_priority_success() {
        let mut bucket = SampleBucket::empty(0);
        bucket.insert(CheckResult::ok(CheckKind::Tcp, Instant::now(), 30.0, "ok"));
        bucket.insert(CheckResult::ok(CheckKind::Http, Instant::now(), 120.0, "ok"));
        bucket.insert(CheckResult::failed(CheckKind::Icmp, Instant::now(), Status::Unreachable { reason: None }, "x"));

        let pick = pick_primary(&bucket, None);
        assert_eq!(pick.check_kind(), Some(CheckKind::Http));
    }

    #[test]
    fn primary_pick_falls_back_to_lowest_priority_failure_when_all_fail() {
        let mut bucket = SampleBucket::empty(0);
        bucket.insert(CheckResult::failed(CheckKind::Http, Instant::now(), Status::Timeout, "x"));
        bucket.insert(CheckResult::failed(CheckKind::Icmp, Instant::now(), Status::Timeout, "x"));

        let pick = pick_primary(&bucket, None);
        assert_eq!(pick.check_kind(), Some(CheckKind::Icmp));
    }

    #[test]
    fn primary_pick_honors_override_when_present() {
        let mut bucket = SampleBucket::empty(0);
        bucket.insert(CheckResult::ok(CheckKind::Http, Instant::now(), 120.0, "ok"));
        bucket.insert(CheckResult::ok(CheckKind::Tcp, Instant::now(), 30.0, "ok"));

        let pick = pick_primary(&bucket, Some(CheckKind::Tcp));
        assert_eq!(pick.check_kind(), Some(CheckKind::Tcp));
    }

    #[test]
    fn suppression_hides_lower_layer_failure_when_higher_succeeds() {
        let mut bucket = SampleBucket::empty(0);
        bucket.insert(CheckResult::ok(CheckKind::Http, Instant::now(), 120.0, "ok"));
        bucket.insert(CheckResult::failed(CheckKind::Icmp, Instant::now(), Status::Unreachable { reason: None }, "x"));

        let problems = active_problems("example.com", &bucket);
        assert!(problems.is_empty());
    }

    #[test]
    fn dns_failure_suppresses_cascaded_descendants() {
        let mut bucket = SampleBucket::empty(0);
        bucket.insert(CheckResult::timeout(CheckKind::Dns));
        bucket.insert(CheckResult::failed(
            CheckKind::Icmp,
            Instant::now(),
            Status::Unreachable { reason: Some("dns failed".to_string()) },
            "dns failed",
        ));

        let problems = active_problems("google.com", &bucket);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].message, "DNS timeout");
    }

    #[test]
    fn ring_resize_preserves_newest_entries() {
        let mut ring = Ring::new(4);
        for i in 0..4 {
            ring.append(ok_bucket(i, CheckKind::Icmp, 10.0));
        }
        ring.resize(2);
        let snapshot: Vec<_> = ring.snapshot().into_iter().flatten().collect();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].bucket_index, 2);
        assert_eq!(snapshot[1].bucket_index, 3);
    }

    #[test]
    fn aggregates_compute_loss_and_mean_latency() {
        let timeline = Timeline::new(4);
        timeline.append("a", ok_bucket(0, CheckKind::Icmp, 10.0));
        timeline.append("a", ok_bucket(1, CheckKind::Icmp, 30.0));
        let mut failed = SampleBucket::empty(2);
        failed.insert(CheckResult::timeout(CheckKind::Icmp));
        timeline.append("a", failed);

        let agg = timeline.aggregates("a", None);
        assert!((agg.packet_loss_pct - (1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(agg.latency_mean, Some(20.0));
    }
}
