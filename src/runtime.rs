//! Runtime loop (C6): wires config → endpoints → capability probe →
//! scheduler → timeline → dashboard → terminal, and handles shutdown.
//!
//! Grounded on the reference monitor's `bins/daemon.rs` main-loop shape
//! (load state, loop, watch for a termination signal, clean up, exit),
//! translated from a polling `AtomicBool` + SIGTERM handler to
//! `tokio::signal::ctrl_c()` — the idiomatic async equivalent, used
//! throughout the pack's `firezone-firezone` for the same purpose.

use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::dashboard::build_frame;
use crate::endpoint::Endpoint;
use crate::errors::RunError;
use crate::probes::probe_icmp_capability;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::term::Terminal;
use crate::timeline::Timeline;

/// CLI overrides layered onto the loaded [`Config`], per spec §6
/// ("flags override their respective config values at runtime only").
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interval_seconds: Option<f64>,
    pub timeout_seconds: Option<f64>,
    pub no_dns: bool,
    pub no_icmp: bool,
}

const RENDER_HZ_CAP: f64 = 4.0;

/// Why the run loop ended, distinguishing a clean interrupt (exit 130,
/// spec §6) from reaching this point some other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Interrupted,
    Other,
}

/// Runs the dashboard until an interrupt is received. Any `Err` is fatal
/// and its [`RunError::exit_code`] should be used as the process exit
/// code; on success, [`ExitReason`] tells the caller whether to use exit
/// code 130.
pub async fn run(config: Config, endpoints: Vec<Endpoint>, overrides: Overrides) -> Result<ExitReason, RunError> {
    let interval = Duration::from_secs_f64(overrides.interval_seconds.unwrap_or(config.checks.interval_seconds));
    let timeout = Duration::from_secs_f64(overrides.timeout_seconds.unwrap_or(config.checks.timeout_seconds));

    let icmp_enabled = !overrides.no_icmp && probe_icmp_capability();
    let dns_enabled = !overrides.no_dns;

    let custom_dns_servers = config
        .dns
        .custom_servers
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect::<Vec<_>>();

    let mut terminal = Terminal::enter()?;
    let (width, _height) = terminal.size()?;

    let configured_width = config.ui.graph_width as usize;
    let initial_capacity = if configured_width == 0 { width as usize } else { configured_width };
    let timeline = Timeline::new(initial_capacity.max(1));

    let scheduler_config = SchedulerConfig { interval, timeout, custom_dns_servers, dns_enabled, icmp_enabled };
    let scheduler = Scheduler::new(endpoints.clone(), scheduler_config, timeline.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    // Render at min(4 Hz, 1/interval), per spec §4.6: never faster than the
    // scheduler could possibly produce new data.
    let render_period = Duration::from_secs_f64(interval.as_secs_f64().max(1.0 / RENDER_HZ_CAP));
    let mut render_ticker = tokio::time::interval(render_period);
    let auto_resize = configured_width == 0;

    let result = loop {
        tokio::select! {
            _ = render_ticker.tick() => {
                if auto_resize {
                    if let Ok((new_width, _)) = terminal.size() {
                        timeline.resize_all(new_width as usize);
                    }
                }
                let (current_width, _) = terminal.size()?;
                let frame = build_frame(current_width as usize, &endpoints, &timeline, icmp_enabled);
                terminal.draw(&frame)?;
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if ctrl_c.is_err() {
                    break ExitReason::Other;
                }
                info!("interrupt received, shutting down");
                let _ = shutdown_tx.send(true);
                break ExitReason::Interrupted;
            }
        }
    };

    let _ = scheduler_task.await;

    // One final frame so the last known state is visible before the
    // terminal is restored, per spec §4.6.
    if let Ok((current_width, _)) = terminal.size() {
        let frame = build_frame(current_width as usize, &endpoints, &timeline, icmp_enabled);
        let _ = terminal.draw(&frame);
    }

    Ok(result)
}
