//! HTTP(S) probe (spec §4.2 `HttpProbe`).
//!
//! Grounded on the reference monitor's `checks::check_http` ("measure wall
//! time around the request" shape), with the blocking `curl` call replaced
//! by async `reqwest`, per the concurrency substrate rationale — `reqwest`
//! is the corpus's standard async HTTP client and its `redirect::Policy`
//! maps directly onto the "follow up to 5 redirects" rule.

use std::time::{Duration, Instant};

use reqwest::redirect::Policy;
use reqwest::Client;

use crate::model::{CheckKind, CheckResult, Status};

/// Issues a GET request to `url`, measuring latency to the response
/// headers. `Ok` for any status below 300; `ProtocolError(status)` for
/// 300 and above, since a redirect loop or terminal 3xx still indicates
/// something short of full success worth surfacing.
pub async fn probe_http(url: &str, deadline: Duration) -> CheckResult {
    let started_at = Instant::now();

    let client = match Client::builder().redirect(Policy::limited(5)).timeout(deadline).build() {
        Ok(c) => c,
        Err(e) => return CheckResult::internal_error(CheckKind::Http, e.to_string()),
    };

    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            let latency_ms = started_at.elapsed().as_secs_f64() * 1000.0;
            if status.as_u16() < 300 {
                CheckResult::ok(CheckKind::Http, started_at, latency_ms, format!("HTTP {}", status.as_u16()))
            } else {
                CheckResult::failed(
                    CheckKind::Http,
                    started_at,
                    Status::ProtocolError(status.as_u16().to_string()),
                    format!("HTTP {}", status.as_u16()),
                )
            }
        }
        Err(e) if e.is_timeout() => CheckResult::timeout(CheckKind::Http),
        Err(e) => CheckResult::unreachable(CheckKind::Http, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_unreachable_not_a_panic() {
        let result = probe_http("not a url", Duration::from_millis(200)).await;
        assert_eq!(result.check_kind, CheckKind::Http);
        assert!(!result.is_success());
    }
}
