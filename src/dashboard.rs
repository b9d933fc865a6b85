//! Dashboard view-model (C5): flattens a [`crate::timeline::Timeline`]
//! snapshot into a renderable frame — rows of label/sparkline/latency text,
//! plus the problems block.
//!
//! Column-width arithmetic and row assembly are grounded on the reference
//! monitor's `analyze::key_value_write` fixed-width formatting idiom
//! (right-aligned numeric columns, computed widths), adapted from a static
//! report table to a single live row recomputed every frame. The sparkline
//! glyph/color binning has no teacher analog; spec §4.5 gives the exact
//! formula.

use crate::endpoint::Endpoint;
use crate::model::{CheckKind, Status};
use crate::timeline::{active_problems, pick_primary, Problem, Timeline};

/// The one-time message spec §4.4/§8 requires when the startup capability
/// probe denies raw sockets: `Status::CapabilityDenied` is never attached to
/// a per-tick `CheckResult` (the check is never scheduled at all once
/// disabled), so this is the only place that status's message is ever
/// rendered.
fn icmp_disabled_notice() -> Problem {
    Problem::global(Status::CapabilityDenied.problem_message(CheckKind::Icmp))
}

/// One of the 8 latency-bin glyphs, or a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Placeholder,
    Failure,
    UnverifiedUdp,
    Bar(u8),
}

/// Color class for a [`Glyph`], independent of the terminal's actual color
/// depth (that mapping lives in `term`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorClass {
    Dim,
    Green,
    Yellow,
    Orange,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: Glyph,
    pub color: ColorClass,
}

const BLOCK_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const BIN_SIZE_MS: f64 = 25.0;

impl Cell {
    pub fn placeholder() -> Self {
        Self { glyph: Glyph::Placeholder, color: ColorClass::Dim }
    }

    /// Maps one bucket's `PrimaryPick` to a rendered cell, per spec §4.5.
    fn from_pick(pick: &crate::timeline::PrimaryPick) -> Self {
        use crate::timeline::PrimaryPick;
        match pick {
            PrimaryPick::Empty => Self::placeholder(),
            PrimaryPick::Result(result) => {
                if matches!(result.status, Status::Canceled) {
                    return Self::placeholder();
                }
                if result.status.is_unverified_ok() {
                    return Self { glyph: Glyph::UnverifiedUdp, color: ColorClass::Yellow };
                }
                if !result.is_success() {
                    return Self { glyph: Glyph::Failure, color: ColorClass::Red };
                }
                let latency = result.latency_ms.unwrap_or(0.0);
                let bin = ((latency / BIN_SIZE_MS).floor() as i64).clamp(0, 7) as u8;
                let color = if latency < 50.0 {
                    ColorClass::Green
                } else if latency < 100.0 {
                    ColorClass::Yellow
                } else if latency < 200.0 {
                    ColorClass::Orange
                } else {
                    ColorClass::Red
                };
                Self { glyph: Glyph::Bar(bin), color }
            }
        }
    }

    /// The plain character to draw, used whether or not color is applied.
    pub fn character(&self) -> char {
        match self.glyph {
            Glyph::Placeholder | Glyph::UnverifiedUdp => '.',
            Glyph::Failure => '!',
            Glyph::Bar(bin) => BLOCK_GLYPHS[bin as usize],
        }
    }
}

/// One endpoint's rendered row.
pub struct Row {
    pub label: String,
    pub cells: Vec<Cell>,
    pub latency_text: String,
}

/// Column widths computed once per frame from terminal width `T`, per the
/// exact formulas in spec §4.5.
pub struct Layout {
    pub label_width: usize,
    pub latency_width: usize,
    pub graph_width: usize,
}

const LATENCY_TEXT_WIDTH: usize = 14;
const MIN_GRAPH_WIDTH: usize = 8;

impl Layout {
    pub fn compute(terminal_width: usize, endpoints: &[Endpoint]) -> Self {
        let max_label_len = endpoints.iter().map(|e| e.label.len()).max().unwrap_or(0);
        let label_width = max_label_len.min((terminal_width as f64 * 0.4).floor() as usize);
        let latency_width = LATENCY_TEXT_WIDTH;
        let graph_width = terminal_width.saturating_sub(label_width + latency_width + 2);
        Self { label_width, latency_width, graph_width }
    }

    /// If the graph column would be unusably narrow, the frame renders
    /// label + latency only, per spec §4.5/§8.
    pub fn graph_fits(&self) -> bool {
        self.graph_width >= MIN_GRAPH_WIDTH
    }
}

/// Formats the 14-char latency column: `"%6.1fms (%s)"`.
fn format_latency_text(latency_ms: Option<f64>, kind: Option<CheckKind>) -> String {
    match (latency_ms, kind) {
        (Some(ms), Some(kind)) => format!("{:6.1}ms ({})", ms, kind.short_name()),
        _ => format!("{:>6} ({})", "--", "--"),
    }
}

/// A fully-assembled frame: rows plus the problems block.
pub struct Frame {
    pub layout: Layout,
    pub rows: Vec<Row>,
    pub problems: Vec<Problem>,
}

/// Builds a [`Frame`] from a consistent snapshot of the timeline, per C5.
/// `icmp_enabled` is the outcome of the one-time startup capability probe;
/// when `false` a single standalone notice is added ahead of any
/// per-endpoint problem lines.
pub fn build_frame(terminal_width: usize, endpoints: &[Endpoint], timeline: &Timeline, icmp_enabled: bool) -> Frame {
    let layout = Layout::compute(terminal_width, endpoints);
    let window = if layout.graph_fits() { layout.graph_width } else { 0 };

    let mut rows = Vec::with_capacity(endpoints.len());
    let mut problems = Vec::new();
    if !icmp_enabled {
        problems.push(icmp_disabled_notice());
    }

    for endpoint in endpoints {
        let snapshot = timeline.snapshot(&endpoint.id);
        let picks: Vec<_> = snapshot.iter().map(|bucket| match bucket {
            Some(b) => pick_primary(b, endpoint.primary_check_override),
            None => crate::timeline::PrimaryPick::Empty,
        }).collect();

        let cells: Vec<Cell> = if window == 0 {
            Vec::new()
        } else {
            let start = picks.len().saturating_sub(window);
            let mut cells: Vec<Cell> = picks[start..].iter().map(Cell::from_pick).collect();
            while cells.len() < window {
                cells.insert(0, Cell::placeholder());
            }
            cells
        };

        let latest_pick = picks.iter().rev().find(|p| !matches!(p, crate::timeline::PrimaryPick::Empty));
        let (latency_ms, kind) = match latest_pick {
            Some(crate::timeline::PrimaryPick::Result(r)) if r.is_success() => (r.latency_ms, Some(r.check_kind)),
            _ => (None, None),
        };

        rows.push(Row {
            label: endpoint.label.clone(),
            cells,
            latency_text: format_latency_text(latency_ms, kind),
        });

        if let Some(bucket) = timeline.latest_non_empty(&endpoint.id) {
            problems.extend(active_problems(&endpoint.label, &bucket));
        }
    }

    Frame { layout, rows, problems }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{parse_targets, RawTarget};
    use crate::model::CheckResult;
    use std::time::Instant;

    fn endpoint(url: &str) -> Endpoint {
        parse_targets(&[RawTarget::Bare(url.to_string())]).unwrap().remove(0)
    }

    #[test]
    fn layout_falls_back_to_no_graph_below_minimum_width() {
        let endpoints = vec![endpoint("1.1.1.1")];
        let layout = Layout::compute(20, &endpoints);
        assert!(!layout.graph_fits());
    }

    #[test]
    fn latency_text_matches_format_for_successful_pick() {
        let text = format_latency_text(Some(120.0), Some(CheckKind::Http));
        assert_eq!(text, " 120.0ms (HTTP)");
    }

    #[test]
    fn bar_glyph_bin_index_follows_25ms_buckets() {
        let mut bucket = crate::model::SampleBucket::empty(0);
        bucket.insert(CheckResult::ok(CheckKind::Icmp, Instant::now(), 40.0, "ok"));
        let pick = pick_primary(&bucket, None);
        let cell = Cell::from_pick(&pick);
        assert_eq!(cell.glyph, Glyph::Bar(1));
        assert_eq!(cell.color, ColorClass::Green);
    }

    #[test]
    fn unverified_udp_renders_dim_yellow_dot() {
        let mut bucket = crate::model::SampleBucket::empty(0);
        bucket.insert(CheckResult::unverified_ok(CheckKind::Udp, Instant::now(), "unverified"));
        let pick = pick_primary(&bucket, None);
        let cell = Cell::from_pick(&pick);
        assert_eq!(cell.character(), '.');
        assert_eq!(cell.color, ColorClass::Yellow);
    }

    #[test]
    fn frame_builds_one_row_per_endpoint() {
        let endpoints = vec![endpoint("1.1.1.1"), endpoint("example.com")];
        let timeline = Timeline::new(40);
        let frame = build_frame(120, &endpoints, &timeline, true);
        assert_eq!(frame.rows.len(), 2);
    }

    #[test]
    fn disabled_icmp_surfaces_one_standalone_notice() {
        let endpoints = vec![endpoint("8.8.8.8")];
        let timeline = Timeline::new(40);
        let frame = build_frame(120, &endpoints, &timeline, false);
        assert_eq!(frame.problems.len(), 1);
        assert_eq!(frame.problems[0].label, None);
        assert_eq!(frame.problems[0].message, "ICMP unavailable");
    }
}
